//! Group boundaries and per-group aggregates.
//!
//! Aggregates run a segmented prefix scan (Hillis-Steele) over a view sorted by the grouping
//! fields: in the round with distance `d`, every row `i >= d` folds in row `i - d` unless a
//! group starts in between. After `ceil(log2(rows))` rounds the last row of each group holds
//! the aggregate of the whole group, and only those rows are kept.

use tracing::{Level, instrument};

use crate::{
    Error,
    channel::Channel,
    compute::check_len,
    protocol::Context,
    share::{Party, Share},
    table::Field,
    tags::TagAllocator,
    view::View,
};

use super::SortKey;

/// Default name of the column added by [`View::count`].
pub const COUNT_COL_NAME: &str = "$cnt";

/// Default name of the column added by [`View::min`] for `field`.
pub fn min_col_name(field: &str) -> String {
    format!("min_{field}")
}

/// Default name of the column added by [`View::max`] for `field`.
pub fn max_col_name(field: &str) -> String {
    format!("max_{field}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Min,
    Max,
}

/// A row is the last of its group iff the next row starts a new group.
fn tails(party: Party, heads: &[Share]) -> Vec<Share> {
    if heads.is_empty() {
        return vec![];
    }
    let mut tails = heads[1..].to_vec();
    tails.push(party.constant(1));
    tails
}

/// Segment flags after a scan round of distance `delta`: row `i` is flagged iff a group starts
/// in `(i - 2 * delta, i]`.
async fn merge_flags<C: Channel>(
    ctx: &Context<C>,
    tags: &mut TagAllocator,
    flags: &[Share],
    delta: usize,
) -> Result<Vec<Share>, Error> {
    let m = flags.len() - delta;
    let neither = ctx
        .and(tags, &ctx.not(&flags[..m]), &ctx.not(&flags[delta..]))
        .await?;
    let mut merged = flags[..delta].to_vec();
    merged.extend(ctx.not(&neither));
    Ok(merged)
}

impl View {
    /// Marks the first row of every run of equal values in `fields`.
    ///
    /// Expects the view to be sorted by `fields`. The first row is always a head.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub async fn group_heads<C: Channel>(
        &self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        fields: &[&str],
    ) -> Result<Vec<Share>, Error> {
        let rows = self.row_num();
        if rows == 0 {
            return Ok(vec![]);
        }
        let mut heads = Vec::with_capacity(rows);
        heads.push(ctx.party().constant(1));
        if fields.is_empty() {
            heads.resize(rows, Share(0));
            return Ok(heads);
        }
        let mut equal = Vec::with_capacity(fields.len());
        for name in fields {
            let index = self.index_of(name)?;
            let column = self.col(index);
            let width = self.fields()[index].width;
            equal.push(
                ctx.eq(tags, &column[1..], &column[..rows - 1], width)
                    .await?,
            );
        }
        let same = ctx.and_all(tags, equal).await?;
        heads.extend(ctx.not(&same));
        Ok(heads)
    }

    /// Sorts the view by `fields` and marks the first row of every group.
    pub async fn group_by<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        fields: &[&str],
    ) -> Result<(View, Vec<Share>), Error> {
        let keys: Vec<SortKey> = fields.iter().map(|f| SortKey::asc(*f)).collect();
        let view = self.sort(ctx, tags, &keys).await?;
        let heads = view.group_heads(ctx, tags, fields).await?;
        Ok((view, heads))
    }

    /// Counts the rows of every group.
    ///
    /// Expects a compacted view grouped by `group_fields` with the given `heads`. The result
    /// has one row per group with the group fields and a 64-bit count column `out_name`.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub async fn count<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        group_fields: &[&str],
        heads: &[Share],
        out_name: &str,
    ) -> Result<View, Error> {
        let rows = self.row_num();
        check_len(heads.len(), rows)?;
        let mut view = self.select(group_fields)?;
        let party = ctx.party();
        let mut counts = vec![party.arith_constant(1); rows];
        let mut flags = heads.to_vec();
        let mut delta = 1;
        while delta < rows {
            let m = rows - delta;
            let starts = ctx.bool_to_arith(tags, &flags[delta..]).await?;
            let open: Vec<u64> = starts
                .iter()
                .map(|s| party.arith_constant(1).wrapping_sub(*s))
                .collect();
            let carried = ctx.arith_mul(tags, &open, &counts[..m]).await?;
            for (i, c) in carried.into_iter().enumerate() {
                counts[i + delta] = counts[i + delta].wrapping_add(c);
            }
            flags = merge_flags(ctx, tags, &flags, delta).await?;
            delta <<= 1;
        }
        let counts = ctx.arith_to_bool(tags, &counts, 64).await?;
        view.push_column(Field::new(out_name, 64), counts)?;
        if rows > 0 {
            view.set_valid(tails(party, heads))?;
        }
        view.clear_invalid_entries(ctx, tags).await
    }

    /// Adds the minimum of `field` per group as column `out_name`, one row per group.
    pub async fn min<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        heads: &[Share],
        field: &str,
        out_name: &str,
    ) -> Result<View, Error> {
        self.extrema(ctx, tags, heads, &[(field, Extremum::Min, out_name)])
            .await
    }

    /// Adds the maximum of `field` per group as column `out_name`, one row per group.
    pub async fn max<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        heads: &[Share],
        field: &str,
        out_name: &str,
    ) -> Result<View, Error> {
        self.extrema(ctx, tags, heads, &[(field, Extremum::Max, out_name)])
            .await
    }

    /// Adds both the minimum of `min_field` and the maximum of `max_field` per group in one
    /// scan, one row per group.
    #[allow(clippy::too_many_arguments)]
    pub async fn min_and_max<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        heads: &[Share],
        min_field: &str,
        max_field: &str,
        min_out: &str,
        max_out: &str,
    ) -> Result<View, Error> {
        self.extrema(
            ctx,
            tags,
            heads,
            &[
                (min_field, Extremum::Min, min_out),
                (max_field, Extremum::Max, max_out),
            ],
        )
        .await
    }

    /// Expects a view grouped by `heads`. Every other column keeps the value of the group's
    /// last row.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    async fn extrema<C: Channel>(
        mut self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        heads: &[Share],
        specs: &[(&str, Extremum, &str)],
    ) -> Result<View, Error> {
        let rows = self.row_num();
        check_len(heads.len(), rows)?;
        let mut values = Vec::with_capacity(specs.len());
        for (field, _, _) in specs {
            let index = self.index_of(field)?;
            values.push((self.col(index).to_vec(), self.fields()[index].width));
        }
        let mut flags = heads.to_vec();
        let mut delta = 1;
        while delta < rows {
            let m = rows - delta;
            for ((column, width), (_, kind, _)) in values.iter_mut().zip(specs) {
                let (left, right) = (&column[..m], &column[delta..]);
                let less = ctx.lt(tags, left, right, *width).await?;
                let best = match kind {
                    Extremum::Min => ctx.select(tags, &less, left, right).await?,
                    Extremum::Max => ctx.select(tags, &less, right, left).await?,
                };
                let merged = ctx.select(tags, &flags[delta..], right, &best).await?;
                for (i, v) in merged.into_iter().enumerate() {
                    column[i + delta] = v.masked(*width);
                }
            }
            flags = merge_flags(ctx, tags, &flags, delta).await?;
            delta <<= 1;
        }
        for ((column, width), (_, _, out_name)) in values.into_iter().zip(specs) {
            self.push_column(Field::new(*out_name, width), column)?;
        }
        if rows > 0 {
            self.set_valid(tails(ctx.party(), heads))?;
        }
        self.clear_invalid_entries(ctx, tags).await
    }
}
