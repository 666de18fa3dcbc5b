//! Boolean primitives: AND, select, equality and less-than on XOR shares.

use crate::{
    Error,
    channel::Channel,
    config::{eq_rounds, lt_rounds},
    protocol::Context,
    share::{Party, Share, mask},
    tags::{Tag, TagAllocator},
};

use super::check_len;

/// Bit `i` is a share of 1 iff `x` and `y` agree on bit `i`, bits above `width` always agree.
fn agree(party: Party, x: Share, y: Share, width: u32) -> Share {
    let diff = (x.0 ^ y.0) & mask(width);
    match party {
        Party::P0 => Share(!diff),
        Party::P1 => Share(diff),
    }
}

impl<C: Channel> Context<C> {
    /// One AND round on whole 64-bit words, using the triples of `tag`.
    pub(crate) async fn and_round(
        &self,
        tag: Tag,
        x: &[Share],
        y: &[Share],
    ) -> Result<Vec<Share>, Error> {
        let triples = self.dealer().and_triples(tag, x.len());
        let mut masked = Vec::with_capacity(2 * x.len());
        for ((x, y), t) in x.iter().zip(y).zip(&triples) {
            masked.push(x.0 ^ t.a);
            masked.push(y.0 ^ t.b);
        }
        let theirs = self.exchange(tag, "and", &masked).await?;
        let first = self.party() == Party::P0;
        Ok(triples
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let d = masked[2 * i] ^ theirs[2 * i];
                let e = masked[2 * i + 1] ^ theirs[2 * i + 1];
                let mut z = t.c ^ (d & t.b) ^ (e & t.a);
                if first {
                    z ^= d & e;
                }
                Share(z)
            })
            .collect())
    }

    /// Bitwise AND of two columns.
    pub async fn and(
        &self,
        tags: &mut TagAllocator,
        x: &[Share],
        y: &[Share],
    ) -> Result<Vec<Share>, Error> {
        check_len(x.len(), y.len())?;
        self.chunked(tags, x.len(), 1, |range, mut tags| async move {
            self.and_round(tags.next_tag()?, &x[range.clone()], &y[range])
                .await
        })
        .await
    }

    /// Element-wise `cond ? x : y`, where `cond` holds 1-bit shares.
    ///
    /// Both operands are always touched, the other one (`cond ? y : x`) is `x ^ y ^ result`.
    pub async fn select(
        &self,
        tags: &mut TagAllocator,
        cond: &[Share],
        x: &[Share],
        y: &[Share],
    ) -> Result<Vec<Share>, Error> {
        check_len(cond.len(), x.len())?;
        check_len(x.len(), y.len())?;
        let spread: Vec<Share> = cond.iter().map(|c| c.spread()).collect();
        let diff: Vec<Share> = x.iter().zip(y).map(|(x, y)| *x ^ *y).collect();
        let chosen = self.and(tags, &spread, &diff).await?;
        Ok(chosen.into_iter().zip(y).map(|(c, y)| c ^ *y).collect())
    }

    /// Negates a column of 1-bit shares.
    pub fn not(&self, x: &[Share]) -> Vec<Share> {
        let party = self.party();
        x.iter().map(|b| party.not(*b)).collect()
    }

    /// 1-bit shares of `x == y` on the low `width` bits.
    pub async fn eq(
        &self,
        tags: &mut TagAllocator,
        x: &[Share],
        y: &[Share],
        width: u32,
    ) -> Result<Vec<Share>, Error> {
        check_len(x.len(), y.len())?;
        let party = self.party();
        self.chunked(tags, x.len(), eq_rounds(width), |range, mut tags| async move {
            let mut t: Vec<Share> = x[range.clone()]
                .iter()
                .zip(&y[range])
                .map(|(a, b)| agree(party, *a, *b, width))
                .collect();
            let mut shift = 1;
            while shift < width {
                let shifted: Vec<Share> = t.iter().map(|v| Share(v.0 >> shift)).collect();
                t = self.and_round(tags.next_tag()?, &t, &shifted).await?;
                shift <<= 1;
            }
            Ok(t.into_iter().map(|v| v.bit(0)).collect())
        })
        .await
    }

    /// 1-bit shares of `x < y` for unsigned values on the low `width` bits.
    pub async fn lt(
        &self,
        tags: &mut TagAllocator,
        x: &[Share],
        y: &[Share],
        width: u32,
    ) -> Result<Vec<Share>, Error> {
        check_len(x.len(), y.len())?;
        let party = self.party();
        let m = mask(width);
        self.chunked(tags, x.len(), lt_rounds(width), |range, mut tags| async move {
            let xs = &x[range.clone()];
            let ys = &y[range];
            // g: bit i set iff x_i < y_i, e: bit i set iff x_i == y_i. Merging blocks of
            // doubling length from the low end leaves the decision for the whole value in bit 0.
            let not_x: Vec<Share> = xs
                .iter()
                .map(|a| Share(a.0 & m) ^ party.constant(m))
                .collect();
            let y_masked: Vec<Share> = ys.iter().map(|b| b.masked(width)).collect();
            let mut g = self.and_round(tags.next_tag()?, &not_x, &y_masked).await?;
            let mut e: Vec<Share> = xs
                .iter()
                .zip(ys)
                .map(|(a, b)| agree(party, *a, *b, width))
                .collect();
            let n = g.len();
            let mut len = 1;
            while len < width {
                let e_high: Vec<Share> = e.iter().map(|v| Share(v.0 >> len)).collect();
                let lhs = [e_high.as_slice(), e_high.as_slice()].concat();
                let rhs = [g.as_slice(), e.as_slice()].concat();
                let prod = self.and_round(tags.next_tag()?, &lhs, &rhs).await?;
                g = g
                    .iter()
                    .zip(&prod[..n])
                    .map(|(g, p)| Share(g.0 >> len) ^ *p)
                    .collect();
                e = prod[n..].to_vec();
                len <<= 1;
            }
            Ok(g.into_iter().map(|v| v.bit(0)).collect())
        })
        .await
    }

    /// AND of several equally long columns, reduced pairwise in `ceil(log2(count))` rounds.
    ///
    /// With an odd number of columns the last one is carried into the next round unchanged.
    pub async fn and_all(
        &self,
        tags: &mut TagAllocator,
        mut columns: Vec<Vec<Share>>,
    ) -> Result<Vec<Share>, Error> {
        let Some(len) = columns.first().map(Vec::len) else {
            return Ok(vec![]);
        };
        for column in &columns {
            check_len(len, column.len())?;
        }
        if len == 0 {
            return Ok(vec![]);
        }
        while columns.len() > 1 {
            let carry = if columns.len() % 2 == 1 {
                columns.pop()
            } else {
                None
            };
            let mut lhs = Vec::with_capacity(columns.len() / 2 * len);
            let mut rhs = Vec::with_capacity(columns.len() / 2 * len);
            for pair in columns.chunks(2) {
                lhs.extend_from_slice(&pair[0]);
                rhs.extend_from_slice(&pair[1]);
            }
            let out = self.and(tags, &lhs, &rhs).await?;
            columns = out.chunks(len).map(<[Share]>::to_vec).collect();
            columns.extend(carry);
        }
        Ok(columns.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use proptest::prelude::*;

    use super::*;
    use crate::{
        compute::tests::{chunky_config, combine_all, share_all},
        protocol::simulate,
    };

    fn block_on<T>(f: impl Future<Output = Result<T, Error>>) -> T {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("could not build runtime")
            .block_on(f)
            .expect("protocol failed")
    }

    #[tokio::test]
    async fn and_and_select() -> Result<(), Error> {
        let xs = [0b1100, 0xffff, 0, 5, 9, 1, 0, 3, 7, 7, 1];
        let ys = [0b1010, 0x0f0f, 1, 5, 3, 0, 0, 1, 2, 7, 1];
        let cond = [1, 0, 1, 0, 1, 0, 1, 1, 0, 0, 1];
        let (x0, x1) = share_all(&xs, 16, 1);
        let (y0, y1) = share_all(&ys, 16, 2);
        let (c0, c1) = share_all(&cond, 1, 3);
        let inputs = [(x0, y0, c0), (x1, y1, c1)];
        let ((and0, sel0, not0), (and1, sel1, not1)) = simulate(chunky_config(), 1, |ctx| {
            let (x, y, c) = &inputs[ctx.party().index()];
            async move {
                let mut tags = TagAllocator::new();
                let and = ctx.and(&mut tags, x, y).await?;
                let sel = ctx.select(&mut tags, c, x, y).await?;
                Ok::<_, Error>((and, sel, ctx.not(c)))
            }
        })
        .await?;

        let expected_and: Vec<u64> = xs.iter().zip(&ys).map(|(x, y)| x & y).collect();
        assert_eq!(combine_all(&and0, &and1, 16), expected_and);
        let expected_sel: Vec<u64> = (0..xs.len())
            .map(|i| if cond[i] == 1 { xs[i] } else { ys[i] })
            .collect();
        assert_eq!(combine_all(&sel0, &sel1, 16), expected_sel);
        let expected_not: Vec<u64> = cond.iter().map(|c| c ^ 1).collect();
        assert_eq!(combine_all(&not0, &not1, 1), expected_not);
        Ok(())
    }

    #[tokio::test]
    async fn and_all_reduces_odd_column_counts() -> Result<(), Error> {
        let cols = [
            vec![1, 1, 0, 1, 1, 1, 1, 1, 0],
            vec![1, 0, 1, 1, 1, 1, 1, 1, 0],
            vec![1, 1, 1, 0, 1, 1, 1, 1, 0],
            vec![1, 1, 1, 1, 1, 1, 1, 1, 1],
            vec![1, 1, 1, 1, 0, 1, 1, 1, 0],
        ];
        let (mut shares0, mut shares1) = (vec![], vec![]);
        for (i, col) in cols.iter().enumerate() {
            let (a, b) = share_all(col, 1, i as u64);
            shares0.push(a);
            shares1.push(b);
        }
        let inputs = [shares0, shares1];
        let (r0, r1) = simulate(chunky_config(), 2, |ctx| {
            let columns = inputs[ctx.party().index()].clone();
            async move {
                let mut tags = TagAllocator::new();
                let out = ctx.and_all(&mut tags, columns).await?;
                let expected = ctx.config().and_all_tag_stride(5, 9);
                assert_eq!(tags.peek(), expected);
                Ok::<_, Error>(out)
            }
        })
        .await?;
        assert_eq!(combine_all(&r0, &r1, 1), vec![1, 0, 0, 0, 0, 1, 1, 1, 0]);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn comparisons_match_plaintext(
            width in 1u32..=64,
            pairs in prop::collection::vec((any::<u64>(), any::<u64>()), 0..20),
        ) {
            let m = mask(width);
            let xs: Vec<u64> = pairs.iter().map(|(x, _)| x & m).collect();
            let ys: Vec<u64> = pairs
                .iter()
                .enumerate()
                .map(|(i, (x, y))| if i % 3 == 0 { x & m } else { y & m })
                .collect();
            let (x0, x1) = share_all(&xs, width, 5);
            let (y0, y1) = share_all(&ys, width, 6);
            let inputs = [(x0, y0), (x1, y1)];
            let ((eq0, lt0), (eq1, lt1)) = block_on(simulate(chunky_config(), 3, |ctx| {
                let (x, y) = &inputs[ctx.party().index()];
                async move {
                    let mut tags = TagAllocator::new();
                    let eq = ctx.eq(&mut tags, x, y, width).await?;
                    let lt = ctx.lt(&mut tags, x, y, width).await?;
                    Ok::<_, Error>((eq, lt))
                }
            }));
            let expected_eq: Vec<u64> = xs.iter().zip(&ys).map(|(x, y)| u64::from(x == y)).collect();
            let expected_lt: Vec<u64> = xs.iter().zip(&ys).map(|(x, y)| u64::from(x < y)).collect();
            prop_assert_eq!(combine_all(&eq0, &eq1, 1), expected_eq);
            prop_assert_eq!(combine_all(&lt0, &lt1, 1), expected_lt);
        }
    }
}
