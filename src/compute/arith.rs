//! Arithmetic shares mod 2^64 and conversions from and to boolean shares.

use crate::{
    Error,
    channel::Channel,
    config::lt_rounds,
    protocol::Context,
    share::{Party, Share},
    tags::{Tag, TagAllocator},
};

use super::check_len;

impl<C: Channel> Context<C> {
    async fn mul_round(&self, tag: Tag, x: &[u64], y: &[u64]) -> Result<Vec<u64>, Error> {
        let triples = self.dealer().mul_triples(tag, x.len());
        let mut masked = Vec::with_capacity(2 * x.len());
        for ((x, y), t) in x.iter().zip(y).zip(&triples) {
            masked.push(x.wrapping_sub(t.a));
            masked.push(y.wrapping_sub(t.b));
        }
        let theirs = self.exchange(tag, "multiply", &masked).await?;
        let first = self.party() == Party::P0;
        Ok(triples
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let d = masked[2 * i].wrapping_add(theirs[2 * i]);
                let e = masked[2 * i + 1].wrapping_add(theirs[2 * i + 1]);
                let mut z = t
                    .c
                    .wrapping_add(d.wrapping_mul(t.b))
                    .wrapping_add(e.wrapping_mul(t.a));
                if first {
                    z = z.wrapping_add(d.wrapping_mul(e));
                }
                z
            })
            .collect())
    }

    /// Element-wise product of two columns of arithmetic shares.
    pub async fn arith_mul(
        &self,
        tags: &mut TagAllocator,
        x: &[u64],
        y: &[u64],
    ) -> Result<Vec<u64>, Error> {
        check_len(x.len(), y.len())?;
        self.chunked(tags, x.len(), 1, |range, mut tags| async move {
            self.mul_round(tags.next_tag()?, &x[range.clone()], &y[range])
                .await
        })
        .await
    }

    /// Converts 1-bit XOR shares into arithmetic shares of the same bit.
    ///
    /// `b = b0 ^ b1 = b0 + b1 - 2 * b0 * b1`, where the product is one multiplication.
    pub async fn bool_to_arith(
        &self,
        tags: &mut TagAllocator,
        bits: &[Share],
    ) -> Result<Vec<u64>, Error> {
        let own: Vec<u64> = bits.iter().map(|b| b.0 & 1).collect();
        let zeros = vec![0; own.len()];
        let prod = match self.party() {
            Party::P0 => self.arith_mul(tags, &own, &zeros).await?,
            Party::P1 => self.arith_mul(tags, &zeros, &own).await?,
        };
        Ok(own
            .iter()
            .zip(&prod)
            .map(|(b, p)| b.wrapping_sub(p.wrapping_mul(2)))
            .collect())
    }

    /// Converts arithmetic shares into XOR shares of the low `width` bits of the sum.
    ///
    /// Each party's arithmetic share is one operand of a Kogge-Stone adder evaluated on XOR
    /// shares, where the other party inputs zero.
    pub async fn arith_to_bool(
        &self,
        tags: &mut TagAllocator,
        x: &[u64],
        width: u32,
    ) -> Result<Vec<Share>, Error> {
        let party = self.party();
        self.chunked(tags, x.len(), lt_rounds(width), |range, mut tags| async move {
            let own: Vec<Share> = x[range].iter().map(|v| Share(*v)).collect();
            let zeros = vec![Share(0); own.len()];
            let (a, b) = match party {
                Party::P0 => (own, zeros),
                Party::P1 => (zeros, own),
            };
            let n = a.len();
            let sum: Vec<Share> = a.iter().zip(&b).map(|(a, b)| *a ^ *b).collect();
            let mut generate = self.and_round(tags.next_tag()?, &a, &b).await?;
            let mut propagate = sum.clone();
            let mut shift = 1;
            while shift < width {
                let lhs = [propagate.as_slice(), propagate.as_slice()].concat();
                let rhs: Vec<Share> = generate
                    .iter()
                    .chain(&propagate)
                    .map(|v| Share(v.0 << shift))
                    .collect();
                let prod = self.and_round(tags.next_tag()?, &lhs, &rhs).await?;
                for (g, p) in generate.iter_mut().zip(&prod[..n]) {
                    *g ^= *p;
                }
                propagate = prod[n..].to_vec();
                shift <<= 1;
            }
            Ok(sum
                .iter()
                .zip(&generate)
                .map(|(s, g)| Share(s.0 ^ (g.0 << 1)).masked(width))
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::{
        compute::tests::{chunky_config, combine_all, share_all},
        protocol::simulate,
        share::mask,
    };

    fn arith_split(values: &[u64], seed: u64) -> (Vec<u64>, Vec<u64>) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        values
            .iter()
            .map(|v| {
                let r: u64 = rng.random();
                (r, v.wrapping_sub(r))
            })
            .unzip()
    }

    #[tokio::test]
    async fn multiplication() -> Result<(), Error> {
        let xs = [0, 1, 2, 3, u64::MAX, 1 << 40, 17, 99, 5];
        let ys = [7, 1, 2, 0, 2, 1 << 30, 3, 1000, 5];
        let (x0, x1) = arith_split(&xs, 1);
        let (y0, y1) = arith_split(&ys, 2);
        let inputs = [(x0, y0), (x1, y1)];
        let (p0, p1) = simulate(chunky_config(), 4, |ctx| {
            let (x, y) = &inputs[ctx.party().index()];
            async move { ctx.arith_mul(&mut TagAllocator::new(), x, y).await }
        })
        .await?;
        for i in 0..xs.len() {
            assert_eq!(p0[i].wrapping_add(p1[i]), xs[i].wrapping_mul(ys[i]));
        }
        Ok(())
    }

    #[tokio::test]
    async fn conversions() -> Result<(), Error> {
        let bits = [1, 0, 1, 1, 0, 0, 1, 0, 1, 1];
        let (b0, b1) = share_all(&bits, 1, 9);
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let values: Vec<u64> = (0..10).map(|_| rng.random()).collect();
        let (v0, v1) = arith_split(&values, 11);
        let inputs = [(b0, v0), (b1, v1)];
        let ((a0, full0, short0), (a1, full1, short1)) = simulate(chunky_config(), 5, |ctx| {
            let (b, v) = &inputs[ctx.party().index()];
            async move {
                let mut tags = TagAllocator::new();
                let a = ctx.bool_to_arith(&mut tags, b).await?;
                let full = ctx.arith_to_bool(&mut tags, v, 64).await?;
                let short = ctx.arith_to_bool(&mut tags, v, 13).await?;
                Ok::<_, Error>((a, full, short))
            }
        })
        .await?;
        let sums: Vec<u64> = a0.iter().zip(&a1).map(|(a, b)| a.wrapping_add(*b)).collect();
        assert_eq!(sums, bits);
        assert_eq!(combine_all(&full0, &full1, 64), values);
        let low: Vec<u64> = values.iter().map(|v| v & mask(13)).collect();
        assert_eq!(combine_all(&short0, &short1, 13), low);
        Ok(())
    }
}
