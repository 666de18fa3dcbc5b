//! Membership tests between two columns.

use tracing::{Level, instrument};

use crate::{
    Error,
    channel::Channel,
    compute::check_len,
    protocol::Context,
    share::Share,
    tags::TagAllocator,
    view::View,
};

impl<C: Channel> Context<C> {
    /// 1-bit shares of "`left[i]` occurs in `right`" for every `i`, comparing `width` bits.
    ///
    /// All `left.len() * right.len()` equalities are computed in one batched call, then every
    /// row of the matrix is reduced by a tree of ANDs over the negated matches. Rows marked
    /// invalid by `left_valid` are never members, and elements marked invalid by
    /// `right_valid` never match.
    pub async fn is_in(
        &self,
        tags: &mut TagAllocator,
        left: &[Share],
        right: &[Share],
        width: u32,
        left_valid: Option<&[Share]>,
        right_valid: Option<&[Share]>,
    ) -> Result<Vec<Share>, Error> {
        let (n, m) = (left.len(), right.len());
        if n == 0 {
            return Ok(vec![]);
        }
        if m == 0 {
            return Ok(vec![Share(0); n]);
        }
        let (mut x, mut y) = (Vec::with_capacity(n * m), Vec::with_capacity(n * m));
        for l in left {
            x.extend(std::iter::repeat_n(*l, m));
            y.extend_from_slice(right);
        }
        let mut matches = vec![self.eq(tags, &x, &y, width).await?];
        if let Some(valid) = left_valid {
            check_len(valid.len(), n)?;
            matches.push(valid.iter().flat_map(|v| std::iter::repeat_n(*v, m)).collect());
        }
        if let Some(valid) = right_valid {
            check_len(valid.len(), m)?;
            matches.push(valid.iter().copied().cycle().take(n * m).collect());
        }
        let matches = self.and_all(tags, matches).await?;

        let mut misses = self.not(&matches);
        let mut row_len = m;
        while row_len > 1 {
            let half = row_len / 2;
            let (mut lhs, mut rhs) = (Vec::with_capacity(n * half), Vec::with_capacity(n * half));
            for row in misses.chunks(row_len) {
                for j in 0..half {
                    lhs.push(row[2 * j]);
                    rhs.push(row[2 * j + 1]);
                }
            }
            let reduced = self.and(tags, &lhs, &rhs).await?;
            let next_len = row_len.div_ceil(2);
            let mut next = Vec::with_capacity(n * next_len);
            for (i, row) in misses.chunks(row_len).enumerate() {
                next.extend_from_slice(&reduced[i * half..(i + 1) * half]);
                if row_len % 2 == 1 {
                    next.push(row[row_len - 1]);
                }
            }
            misses = next;
            row_len = next_len;
        }
        Ok(self.not(&misses))
    }
}

impl View {
    /// Keeps the rows whose `field` value occurs in `other_field` of a valid row of `other`.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num(), other_rows = other.row_num()), err)]
    pub async fn semi_join<C: Channel>(
        mut self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        field: &str,
        other: &View,
        other_field: &str,
    ) -> Result<View, Error> {
        let index = self.index_of(field)?;
        let other_index = other.index_of(other_field)?;
        let width = self.fields()[index]
            .width
            .max(other.fields()[other_index].width);
        let found = ctx
            .is_in(
                tags,
                self.col(index),
                other.col(other_index),
                width,
                Some(self.valid()),
                Some(other.valid()),
            )
            .await?;
        if found.is_empty() {
            return Ok(self);
        }
        self.set_valid(found)?;
        self.clear_invalid_entries(ctx, tags).await
    }
}
