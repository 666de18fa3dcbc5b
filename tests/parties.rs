//! Each party on its own thread and runtime, with many small chunks in flight at once.

use std::{future::Future, sync::Arc, thread, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use relshare::{
    Context, EngineConfig, Error, Party, SeededDealer, SimpleChannel, SortKey, Table,
    TagAllocator, View,
    client::{reconstruct, share_table},
    share::{combine, split},
};
use tokio::time::timeout;

fn many_chunks() -> EngineConfig {
    EngineConfig {
        batch_size: 1,
        parallelism: 64,
        bucket_bits: 2,
    }
}

/// Runs `run` for both parties, each blocking its own thread on its own runtime.
fn on_threads<T, F, Fut>(config: EngineConfig, seed: u64, run: F) -> Result<(T, T), Error>
where
    T: Send,
    F: Fn(Context<SimpleChannel>) -> Fut + Sync,
    Fut: Future<Output = Result<T, Error>>,
{
    let (channel0, channel1) = SimpleChannel::pair();
    let (dealer0, dealer1) = SeededDealer::pair(seed);
    let ctx0 = Context::new(Party::P0, channel0, Arc::new(dealer0), config.clone())?;
    let ctx1 = Context::new(Party::P1, channel1, Arc::new(dealer1), config)?;
    let party = |ctx: Context<SimpleChannel>| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("could not build runtime");
        runtime.block_on(async {
            timeout(Duration::from_secs(60), run(ctx))
                .await
                .expect("parties stopped making progress")
        })
    };
    thread::scope(|s| {
        let p0 = s.spawn(|| party(ctx0));
        let r1 = party(ctx1);
        let r0 = p0.join().expect("party 0 panicked");
        Ok((r0?, r1?))
    })
}

fn share(name: &str, key: Option<&str>, rows: &[Vec<u64>], seed: u64) -> Result<[Table; 2], Error> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let (t0, t1) = share_table(name, &[("k", 8), ("v", 16)], key, rows, &mut rng)?;
    Ok([t0, t1])
}

#[test]
fn comparisons_with_one_element_chunks() -> Result<(), Error> {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let xs: Vec<u64> = (0..600).map(|_| rng.random()).collect();
    let ys: Vec<u64> = (0..600).map(|_| rng.random()).collect();
    let (x0, x1): (Vec<_>, Vec<_>) = xs.iter().map(|v| split(*v, 64, &mut rng)).unzip();
    let (y0, y1): (Vec<_>, Vec<_>) = ys.iter().map(|v| split(*v, 64, &mut rng)).unzip();
    let inputs = [(x0, y0), (x1, y1)];
    for iteration in 0..4 {
        let (lt0, lt1) = on_threads(many_chunks(), iteration, |ctx| {
            let (x, y) = &inputs[ctx.party().index()];
            async move {
                let mut tags = TagAllocator::new();
                ctx.lt(&mut tags, x, y, 64).await
            }
        })?;
        let less: Vec<u64> = lt0.iter().zip(&lt1).map(|(a, b)| combine(*a, *b, 1)).collect();
        let expected: Vec<u64> = xs.iter().zip(&ys).map(|(x, y)| u64::from(x < y)).collect();
        assert_eq!(less, expected, "iteration {iteration}");
    }
    Ok(())
}

#[test]
fn sort_and_hash_join_with_one_element_chunks() -> Result<(), Error> {
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let left_rows: Vec<Vec<u64>> = (0..24).map(|i| vec![rng.random_range(0..12), i]).collect();
    let right_rows: Vec<Vec<u64>> = (0..20)
        .map(|i| vec![rng.random_range(0..12), 100 + i])
        .collect();
    let left = share("l", Some("k"), &left_rows, 3)?;
    let right = share("r", Some("k"), &right_rows, 4)?;

    let ((sorted0, joined0), (sorted1, joined1)) = on_threads(many_chunks(), 5, |ctx| {
        let p = ctx.party();
        let left = View::from_table(left[p.index()].clone(), p);
        let right = View::from_table(right[p.index()].clone(), p);
        async move {
            let mut tags = TagAllocator::new();
            let sorted = left
                .clone()
                .sort(&ctx, &mut tags, &[SortKey::asc("k")])
                .await?;
            let joined = left.hash_join(&ctx, &mut tags, right, "k", "k").await?;
            Ok::<_, Error>((sorted, joined))
        }
    })?;

    let keys = reconstruct(&sorted0, &sorted1)?.column("k").unwrap_or_default();
    assert_eq!(keys.len(), left_rows.len());
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));

    let joined = reconstruct(&joined0, &joined1)?;
    let mut pairs: Vec<(u64, u64)> = joined
        .column("l.v")
        .unwrap_or_default()
        .into_iter()
        .zip(joined.column("r.v").unwrap_or_default())
        .collect();
    pairs.sort();
    let mut expected = vec![];
    for l in &left_rows {
        for r in &right_rows {
            if l[0] == r[0] {
                expected.push((l[1], r[1]));
            }
        }
    }
    expected.sort();
    assert_eq!(pairs, expected);
    Ok(())
}
