use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use relshare::{
    Comparator, EngineConfig, Error, Operand, Predicate, SortKey, Table, TagAllocator, View,
    client::{reconstruct, share_table},
    ops::COUNT_COL_NAME,
    protocol::simulate,
    share::combine,
};

fn share(
    name: &str,
    fields: &[(&str, u32)],
    rows: &[Vec<u64>],
    seed: u64,
) -> Result<[Table; 2], Error> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let (t0, t1) = share_table(name, fields, None, rows, &mut rng)?;
    Ok([t0, t1])
}

fn pairs(values: &[(u64, u64)]) -> Vec<Vec<u64>> {
    values.iter().map(|(a, b)| vec![*a, *b]).collect()
}

fn small_batches() -> EngineConfig {
    EngineConfig {
        batch_size: 16,
        parallelism: 4,
        ..EngineConfig::default()
    }
}

fn sorted(mut rows: Vec<Vec<u64>>) -> Vec<Vec<u64>> {
    rows.sort();
    rows
}

#[tokio::test]
async fn sort_is_an_ordered_permutation() -> Result<(), Error> {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let rows: Vec<Vec<u64>> = (0..37).map(|i| vec![rng.random_range(0..64), i]).collect();
    let tables = share("t", &[("k", 6), ("id", 8)], &rows, 1)?;
    let (v0, v1) = simulate(small_batches(), 2, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        async move {
            let mut tags = TagAllocator::new();
            view.sort(&ctx, &mut tags, &[SortKey::desc("k")]).await
        }
    })
    .await?;
    let result = reconstruct(&v0, &v1)?;
    let keys = result.column("k").unwrap_or_default();
    assert_eq!(keys.len(), 37);
    assert!(keys.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(sorted(result.rows), sorted(rows));
    Ok(())
}

#[tokio::test]
async fn filter_is_idempotent_and_monotone() -> Result<(), Error> {
    let rows = pairs(&[
        (17, 80),
        (18, 20),
        (42, 49),
        (65, 50),
        (9, 10),
        (30, 99),
        (18, 18),
        (70, 3),
    ]);
    let tables = share("people", &[("age", 7), ("score", 7)], &rows, 3)?;
    let adult = Predicate::new("age", Comparator::GreaterEq, Operand::Public(18));
    let low = Predicate::new("score", Comparator::Less, Operand::Public(50));
    let ((once0, twice0, none0, both0), (once1, twice1, none1, both1)) =
        simulate(small_batches(), 4, |ctx| {
            let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
            let (adult, low) = (adult.clone(), low.clone());
            async move {
                let mut tags = TagAllocator::new();
                let tags = &mut tags;
                let once = view.clone().filter(&ctx, tags, &[adult.clone()]).await?;
                let twice = once.clone().filter(&ctx, tags, &[adult.clone()]).await?;
                let none = view.clone().filter(&ctx, tags, &[]).await?;
                let both = view.filter(&ctx, tags, &[adult, low]).await?;
                Ok::<_, Error>((once, twice, none, both))
            }
        })
        .await?;

    let once = reconstruct(&once0, &once1)?;
    let twice = reconstruct(&twice0, &twice1)?;
    let none = reconstruct(&none0, &none1)?;
    let both = reconstruct(&both0, &both1)?;
    assert_eq!(
        sorted(once.rows.clone()),
        pairs(&[(18, 18), (18, 20), (30, 99), (42, 49), (65, 50), (70, 3)])
    );
    assert_eq!(sorted(twice.rows), sorted(once.rows.clone()));
    assert_eq!(none.rows, rows);
    assert_eq!(sorted(both.rows.clone()), pairs(&[(18, 18), (18, 20), (42, 49), (70, 3)]));
    assert!(both.rows.len() <= once.rows.len());
    Ok(())
}

#[tokio::test]
async fn filter_compares_fields_and_secret_constants() -> Result<(), Error> {
    let rows = pairs(&[(3, 5), (5, 3), (4, 4), (9, 1), (0, 0), (7, 8)]);
    let tables = share("t", &[("a", 4), ("b", 4)], &rows, 5)?;
    let (v0, v1) = simulate(small_batches(), 6, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        // the secret constant 4, shared as 1 ^ 5
        let four = if ctx.party().index() == 0 { 1 } else { 5 };
        let predicates = [
            Predicate::new("a", Comparator::Greater, Operand::Field("b".into())),
            Predicate::new("b", Comparator::NotEqual, Operand::Const(relshare::Share(four))),
            Predicate::new("a", Comparator::LessEq, Operand::Public(9)),
        ];
        async move {
            let mut tags = TagAllocator::new();
            view.filter(&ctx, &mut tags, &predicates).await
        }
    })
    .await?;
    assert_eq!(sorted(reconstruct(&v0, &v1)?.rows), pairs(&[(5, 3), (9, 1)]));
    Ok(())
}

#[tokio::test]
async fn group_heads_mark_first_occurrences() -> Result<(), Error> {
    let keys = [2, 0, 3, 1, 2, 1, 2];
    let rows: Vec<Vec<u64>> = keys.iter().map(|k| vec![*k]).collect();
    let tables = share("t", &[("k", 2)], &rows, 7)?;
    let ((view0, heads0), (view1, heads1)) = simulate(small_batches(), 8, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        async move {
            let mut tags = TagAllocator::new();
            view.group_by(&ctx, &mut tags, &["k"]).await
        }
    })
    .await?;
    let keys = reconstruct(&view0, &view1)?.column("k").unwrap_or_default();
    assert_eq!(keys, [0, 1, 1, 2, 2, 2, 3]);
    let heads: Vec<u64> = heads0
        .iter()
        .zip(&heads1)
        .map(|(a, b)| combine(*a, *b, 1))
        .collect();
    assert_eq!(heads, [1, 1, 0, 1, 0, 0, 1]);
    Ok(())
}

#[tokio::test]
async fn aggregates_per_group() -> Result<(), Error> {
    let rows = pairs(&[(2, 40), (0, 9), (3, 1), (1, 17), (2, 3), (1, 5), (2, 77), (0, 12)]);
    let tables = share("t", &[("k", 2), ("v", 8)], &rows, 9)?;
    let ((count0, ext0), (count1, ext1)) = simulate(small_batches(), 10, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        async move {
            let mut tags = TagAllocator::new();
            let tags = &mut tags;
            let (grouped, heads) = view.clone().group_by(&ctx, tags, &["k"]).await?;
            let counts = grouped
                .count(&ctx, tags, &["k"], &heads, COUNT_COL_NAME)
                .await?;
            let (grouped, heads) = view.group_by(&ctx, tags, &["k"]).await?;
            let extrema = grouped
                .min_and_max(&ctx, tags, &heads, "v", "v", "lo", "hi")
                .await?;
            Ok::<_, Error>((counts, extrema))
        }
    })
    .await?;

    let counts = reconstruct(&count0, &count1)?;
    assert_eq!(counts.fields, ["k", COUNT_COL_NAME]);
    assert_eq!(sorted(counts.rows), pairs(&[(0, 2), (1, 2), (2, 3), (3, 1)]));

    let extrema = reconstruct(&ext0, &ext1)?;
    let mut groups: Vec<(u64, u64, u64)> = extrema
        .rows
        .iter()
        .map(|row| (row[0], row[2], row[3]))
        .collect();
    groups.sort();
    assert_eq!(groups, [(0, 9, 12), (1, 5, 17), (2, 3, 77), (3, 1, 1)]);
    Ok(())
}

#[tokio::test]
async fn max_of_a_single_group() -> Result<(), Error> {
    let rows = pairs(&[(1, 4), (1, 200), (1, 13)]);
    let tables = share("t", &[("k", 1), ("v", 8)], &rows, 13)?;
    let (v0, v1) = simulate(small_batches(), 14, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        async move {
            let mut tags = TagAllocator::new();
            let (grouped, heads) = view.group_by(&ctx, &mut tags, &["k"]).await?;
            grouped
                .max(&ctx, &mut tags, &heads, "v", &relshare::ops::max_col_name("v"))
                .await
        }
    })
    .await?;
    let result = reconstruct(&v0, &v1)?;
    assert_eq!(result.column("max_v"), Some(vec![200]));
    Ok(())
}

#[tokio::test]
async fn distinct_keeps_one_row_per_key() -> Result<(), Error> {
    let keys = [1, 2, 1, 3, 2, 1, 4, 3];
    let rows: Vec<Vec<u64>> = keys
        .iter()
        .enumerate()
        .map(|(i, k)| vec![*k, i as u64])
        .collect();
    let tables = share("t", &[("k", 3), ("pos", 4)], &rows, 15)?;
    let dupes = share("d", &[("a", 3), ("b", 3)], &pairs(&[(1, 2), (1, 2), (2, 1), (1, 2)]), 16)?;
    let ((by_key0, all0), (by_key1, all1)) = simulate(small_batches(), 17, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        let dupes = View::from_table(dupes[ctx.party().index()].clone(), ctx.party());
        async move {
            let mut tags = TagAllocator::new();
            let by_key = view.distinct(&ctx, &mut tags, &["k"]).await?;
            let all = dupes.distinct(&ctx, &mut tags, &[]).await?;
            Ok::<_, Error>((by_key, all))
        }
    })
    .await?;
    let by_key = reconstruct(&by_key0, &by_key1)?;
    let mut distinct = by_key.column("k").unwrap_or_default();
    distinct.sort();
    assert_eq!(distinct, [1, 2, 3, 4]);
    for row in &by_key.rows {
        assert_eq!(keys[row[1] as usize], row[0]);
    }
    assert_eq!(sorted(reconstruct(&all0, &all1)?.rows), pairs(&[(1, 2), (2, 1)]));
    Ok(())
}

#[tokio::test]
async fn semi_join_keeps_members() -> Result<(), Error> {
    let left = share("l", &[("x", 4)], &[vec![1], vec![5], vec![9], vec![3], vec![7]], 19)?;
    let right = share("r", &[("y", 4)], &[vec![3], vec![4], vec![5], vec![7], vec![11]], 20)?;
    let empty = share("e", &[("y", 4)], &[], 21)?;
    let ((hits0, miss0, none0), (hits1, miss1, none1)) = simulate(small_batches(), 22, |ctx| {
        let p = ctx.party();
        let left = View::from_table(left[p.index()].clone(), p);
        let right = View::from_table(right[p.index()].clone(), p);
        let empty = View::from_table(empty[p.index()].clone(), p);
        async move {
            let mut tags = TagAllocator::new();
            let tags = &mut tags;
            let hits = left.clone().semi_join(&ctx, tags, "x", &right, "y").await?;
            let miss = left.semi_join(&ctx, tags, "x", &empty, "y").await?;
            let none = empty.clone().semi_join(&ctx, tags, "y", &right, "y").await?;
            Ok::<_, Error>((hits, miss, none))
        }
    })
    .await?;
    assert_eq!(
        sorted(reconstruct(&hits0, &hits1)?.rows),
        [vec![3], vec![5], vec![7]]
    );
    assert!(reconstruct(&miss0, &miss1)?.rows.is_empty());
    assert!(reconstruct(&none0, &none1)?.rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_views_make_no_rounds() -> Result<(), Error> {
    let tables = share("t", &[("k", 8), ("v", 8)], &[], 20)?;
    let over_ten = [Predicate::new("v", Comparator::Greater, Operand::Public(10))];
    let (results, _) = simulate(small_batches(), 21, |ctx| {
        let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
        let over_ten = &over_ten;
        async move {
            let mut tags = TagAllocator::new();
            let tags = &mut tags;
            let sorted = view.clone().sort(&ctx, tags, &[SortKey::asc("k")]).await?;
            let filtered = view.clone().filter(&ctx, tags, over_ten).await?;
            let compacted = view.clone().clear_invalid_entries(&ctx, tags).await?;
            let (grouped, heads) = view.clone().group_by(&ctx, tags, &["k"]).await?;
            let counted = grouped
                .clone()
                .count(&ctx, tags, &["k"], &heads, COUNT_COL_NAME)
                .await?;
            let min = grouped.clone().min(&ctx, tags, &heads, "v", "min_v").await?;
            let max = grouped.clone().max(&ctx, tags, &heads, "v", "max_v").await?;
            let both = grouped
                .clone()
                .min_and_max(&ctx, tags, &heads, "v", "v", "min_v", "max_v")
                .await?;
            let distinct = view.distinct(&ctx, tags, &[]).await?;
            assert!(heads.is_empty());
            assert_eq!(counted.col_index(COUNT_COL_NAME), Some(1));
            assert!(both.col_index("max_v").is_some());
            let rows: Vec<usize> = [
                sorted, filtered, compacted, grouped, counted, min, max, both, distinct,
            ]
            .iter()
            .map(View::row_num)
            .collect();
            Ok::<_, Error>((rows, tags.peek()))
        }
    })
    .await?;
    assert_eq!(results, (vec![0; 9], 0));
    Ok(())
}
