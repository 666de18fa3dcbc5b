//! Equi-joins: nested-loop, hash (bucketed by a butterfly network) and left outer.

use std::iter::repeat_n;

use futures::future::{try_join, try_join_all};
use tracing::{Level, debug, instrument};

use crate::{
    Error,
    channel::Channel,
    config::EngineConfig,
    protocol::Context,
    share::Share,
    table::{BUCKET_TAG_PREFIX, Field, check_schema},
    tags::TagAllocator,
    view::{View, prefixed},
};

/// The name and data fields of the join of `left` and `right`.
///
/// Every field is prefixed with its table name. Tables without a name, or two tables with the
/// same name, are called `$t0` and `$t1` instead.
fn join_schema(left: &View, right: &View) -> Result<(String, Vec<Field>), Error> {
    let anonymous =
        left.name().is_empty() || right.name().is_empty() || left.name() == right.name();
    let (n0, n1) = if anonymous {
        ("$t0", "$t1")
    } else {
        (left.name(), right.name())
    };
    let fields: Vec<Field> = left
        .data_fields()
        .iter()
        .map(|f| Field::new(prefixed(n0, &f.name), f.width))
        .chain(
            right
                .data_fields()
                .iter()
                .map(|f| Field::new(prefixed(n1, &f.name), f.width)),
        )
        .collect();
    check_schema(&fields)?;
    Ok((format!("{n0}_{n1}"), fields))
}

fn empty_join(name: String, fields: Vec<Field>) -> View {
    let columns = vec![vec![]; fields.len()];
    View::from_data(name, fields, columns, vec![])
}

fn expand(column: &[Share], times: usize) -> Vec<Share> {
    column.iter().flat_map(|v| repeat_n(*v, times)).collect()
}

fn cycle(column: &[Share], len: usize) -> Vec<Share> {
    column.iter().copied().cycle().take(len).collect()
}

/// Upper bound on the tags consumed by a nested-loop join of `n` and `m` rows into `cols`
/// columns (including validity and padding).
fn nested_loop_tag_stride(
    config: &EngineConfig,
    n: usize,
    m: usize,
    width: u32,
    cols: usize,
) -> u64 {
    config.eq_tag_stride(n * m, width)
        + config.and_all_tag_stride(3, n * m)
        + View::compact_tag_stride(config, n * m, cols)
}

impl View {
    fn key_width(
        &self,
        field: &str,
        other: &View,
        other_field: &str,
    ) -> Result<(usize, usize, u32), Error> {
        let index = self.index_of(field)?;
        let other_index = other.index_of(other_field)?;
        let width = self.fields()[index]
            .width
            .max(other.fields()[other_index].width);
        Ok((index, other_index, width))
    }

    /// Joins every row of `self` with every row of `other` whose `other_field` equals its
    /// `field`.
    ///
    /// Materializes the full cross product, marks the pairs with equal keys (and valid inputs)
    /// in one batched equality, and compacts. The result has the left data fields followed by
    /// the right ones, each renamed to `table.field`.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num(), other_rows = other.row_num()), err)]
    pub async fn nested_loop_join<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        other: View,
        field: &str,
        other_field: &str,
    ) -> Result<View, Error> {
        let (i0, i1, width) = self.key_width(field, &other, other_field)?;
        let (name, fields) = join_schema(&self, &other)?;
        let (n, m) = (self.row_num(), other.row_num());
        if n == 0 || m == 0 {
            return Ok(empty_join(name, fields));
        }
        let mut columns = Vec::with_capacity(fields.len());
        for column in &self.columns()[..self.valid_index()] {
            columns.push(expand(column, m));
        }
        for column in &other.columns()[..other.valid_index()] {
            columns.push(cycle(column, n * m));
        }
        let equal = ctx
            .eq(tags, &expand(self.col(i0), m), &cycle(other.col(i1), n * m), width)
            .await?;
        let valid = ctx
            .and_all(
                tags,
                vec![equal, expand(self.valid(), m), cycle(other.valid(), n * m)],
            )
            .await?;
        View::from_data(name, fields, columns, valid)
            .clear_invalid_entries(ctx, tags)
            .await
    }

    /// Same result as [`View::nested_loop_join`], but first routes both sides into buckets by
    /// their bucket tags, so that only rows of matching buckets are paired.
    ///
    /// Needs a `$tag:` column for both join fields and falls back to the nested-loop join
    /// otherwise. The number of rows that land in each bucket is revealed.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num(), other_rows = other.row_num()), err)]
    pub async fn hash_join<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        other: View,
        field: &str,
        other_field: &str,
    ) -> Result<View, Error> {
        let tag0 = self.col_index(&format!("{BUCKET_TAG_PREFIX}{field}"));
        let tag1 = other.col_index(&format!("{BUCKET_TAG_PREFIX}{other_field}"));
        let (Some(tag0), Some(tag1)) = (tag0, tag1) else {
            debug!(field, other_field, "no bucket tags, using a nested-loop join");
            return self
                .nested_loop_join(ctx, tags, other, field, other_field)
                .await;
        };
        let (_, _, width) = self.key_width(field, &other, other_field)?;
        let (name, fields) = join_schema(&self, &other)?;
        let config = ctx.config();
        let mut tags0 = tags.reserve(self.butterfly_tag_stride(config))?;
        let mut tags1 = tags.reserve(other.butterfly_tag_stride(config))?;
        let (buckets0, buckets1) = try_join(
            self.butterfly(ctx, &mut tags0, tag0),
            other.butterfly(ctx, &mut tags1, tag1),
        )
        .await?;

        let cols = fields.len() + 2;
        let mut joins = vec![];
        for (left, right) in buckets0.into_iter().zip(buckets1) {
            let (n, m) = (left.row_num(), right.row_num());
            if n == 0 || m == 0 {
                continue;
            }
            let mut tags = tags.reserve(nested_loop_tag_stride(config, n, m, width, cols))?;
            joins.push(async move {
                left.nested_loop_join(ctx, &mut tags, right, field, other_field)
                    .await
            });
        }
        let mut joined = empty_join(name, fields);
        for part in try_join_all(joins).await? {
            joined = joined.concat(part)?;
        }
        Ok(joined)
    }

    /// Like [`View::hash_join`], plus every valid row of `self` without a match, with all
    /// right-hand columns set to zero.
    ///
    /// A zero in a right-hand column of the result is therefore ambiguous, no null marker is
    /// carried.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num(), other_rows = other.row_num()), err)]
    pub async fn left_outer_join<C: Channel>(
        self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        other: View,
        field: &str,
        other_field: &str,
    ) -> Result<View, Error> {
        let (i0, i1, width) = self.key_width(field, &other, other_field)?;
        let (name, fields) = join_schema(&self, &other)?;
        let matched = ctx
            .is_in(
                tags,
                self.col(i0),
                other.col(i1),
                width,
                None,
                Some(other.valid()),
            )
            .await?;
        let unmatched = ctx.and(tags, &ctx.not(&matched), self.valid()).await?;
        let rows = self.row_num();
        let mut columns = self.columns()[..self.valid_index()].to_vec();
        columns.extend(repeat_n(vec![Share(0); rows], other.valid_index()));
        let left_only = View::from_data(name, fields, columns, unmatched)
            .clear_invalid_entries(ctx, tags)
            .await?;
        let inner = self
            .hash_join(ctx, tags, other, field, other_field)
            .await?;
        inner.concat(left_only)
    }
}
