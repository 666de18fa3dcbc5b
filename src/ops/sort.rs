//! Oblivious bitonic sort.

use serde::{Deserialize, Serialize};
use tracing::{Level, instrument};

use crate::{
    Error,
    channel::Channel,
    config::EngineConfig,
    protocol::Context,
    share::Share,
    tags::TagAllocator,
    view::View,
};

/// One column of a sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// The field to sort by.
    pub field: String,
    /// Whether smaller values come first.
    pub ascending: bool,
}

impl SortKey {
    /// Sorts by `field`, smallest first.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    /// Sorts by `field`, largest first.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

struct KeyColumn {
    index: usize,
    width: u32,
    ascending: bool,
}

/// A compare-exchange of rows `low` and `high`; in an ascending block the row that sorts first
/// must end up at `low`.
struct Pair {
    low: usize,
    high: usize,
    ascending: bool,
}

impl View {
    fn key_columns(&self, keys: &[SortKey]) -> Result<Vec<KeyColumn>, Error> {
        keys.iter()
            .map(|key| {
                let index = self.index_of(&key.field)?;
                Ok(KeyColumn {
                    index,
                    width: self.fields()[index].width,
                    ascending: key.ascending,
                })
            })
            .collect()
    }

    /// Upper bound on the tags consumed by [`View::sort`] on this view.
    pub fn sort_tag_stride(&self, config: &EngineConfig, keys: &[SortKey]) -> Result<u64, Error> {
        let widths: Vec<u32> = self.key_columns(keys)?.iter().map(|k| k.width).collect();
        Ok(sort_tag_stride(config, self.row_num(), &widths, self.col_num()))
    }

    /// Sorts the rows lexicographically by `keys`.
    ///
    /// Runs a bitonic network over the row count rounded up to a power of two. The compared
    /// index pairs depend only on the row count: padding rows are public and always move to the
    /// tail by a plain swap, every other pair is ordered by a secure comparison followed by a
    /// secure select over all columns. The order among rows with equal keys is unspecified.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub async fn sort<C: Channel>(
        mut self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        keys: &[SortKey],
    ) -> Result<View, Error> {
        let keys = self.key_columns(keys)?;
        let rows = self.row_num();
        if rows <= 1 || keys.is_empty() {
            return Ok(self);
        }
        let size = rows.next_power_of_two();
        self.pad_to(size);
        let mut k = 2;
        while k <= size {
            let mut j = k / 2;
            while j > 0 {
                let mut pairs = Vec::with_capacity(size / 2);
                for low in 0..size {
                    let high = low ^ j;
                    if high <= low {
                        continue;
                    }
                    let ascending = low & k == 0;
                    match (self.is_padding(low), self.is_padding(high)) {
                        (false, false) => pairs.push(Pair {
                            low,
                            high,
                            ascending,
                        }),
                        (true, false) if ascending => self.swap_rows(low, high),
                        (false, true) if !ascending => self.swap_rows(low, high),
                        _ => {}
                    }
                }
                self.compare_exchange(ctx, tags, &keys, &pairs).await?;
                j /= 2;
            }
            k *= 2;
        }
        self.truncate(rows);
        Ok(self)
    }

    /// 1-bit shares of "row `low` sorts strictly before row `high`" for every pair.
    async fn sorts_before<C: Channel>(
        &self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        keys: &[KeyColumn],
        pairs: &[Pair],
    ) -> Result<Vec<Share>, Error> {
        let mut before: Option<Vec<Share>> = None;
        let mut tied: Option<Vec<Share>> = None;
        for (i, key) in keys.iter().enumerate() {
            let column = self.col(key.index);
            let (x, y): (Vec<Share>, Vec<Share>) = pairs
                .iter()
                .map(|p| (column[p.low], column[p.high]))
                .unzip();
            let (first, second) = if key.ascending { (&x, &y) } else { (&y, &x) };
            let less = ctx.lt(tags, first, second, key.width).await?;
            before = Some(match (before, &tied) {
                (Some(before), Some(tied)) => ctx.select(tags, tied, &less, &before).await?,
                _ => less,
            });
            if i + 1 < keys.len() {
                let equal = ctx.eq(tags, &x, &y, key.width).await?;
                tied = Some(match tied {
                    Some(tied) => ctx.and(tags, &tied, &equal).await?,
                    None => equal,
                });
            }
        }
        Ok(before.unwrap_or_default())
    }

    async fn compare_exchange<C: Channel>(
        &mut self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        keys: &[KeyColumn],
        pairs: &[Pair],
    ) -> Result<(), Error> {
        if pairs.is_empty() {
            return Ok(());
        }
        let before = self.sorts_before(ctx, tags, keys, pairs).await?;
        // 1 iff the pair is already in the order its block wants
        let keep: Vec<Share> = before
            .into_iter()
            .zip(pairs)
            .map(|(b, p)| if p.ascending { b } else { ctx.party().not(b) })
            .collect();
        let padding = self.padding_index();
        let moved: Vec<usize> = (0..self.col_num()).filter(|c| *c != padding).collect();
        let n = pairs.len();
        let mut cond = Vec::with_capacity(n * moved.len());
        let mut low = Vec::with_capacity(n * moved.len());
        let mut high = Vec::with_capacity(n * moved.len());
        for &c in &moved {
            let column = self.col(c);
            for (p, k) in pairs.iter().zip(&keep) {
                cond.push(*k);
                low.push(column[p.low]);
                high.push(column[p.high]);
            }
        }
        let first = ctx.select(tags, &cond, &low, &high).await?;
        for (i, &c) in moved.iter().enumerate() {
            let width = self.fields()[c].width;
            for (j, p) in pairs.iter().enumerate() {
                let e = i * n + j;
                let second = low[e] ^ high[e] ^ first[e];
                self.set_cell(c, p.low, first[e].masked(width));
                self.set_cell(c, p.high, second.masked(width));
            }
        }
        Ok(())
    }
}

/// Upper bound on the tags consumed by sorting `rows` rows of `cols` columns (including
/// validity and padding) by keys of the given widths.
pub(crate) fn sort_tag_stride(
    config: &EngineConfig,
    rows: usize,
    key_widths: &[u32],
    cols: usize,
) -> u64 {
    if rows <= 1 || key_widths.is_empty() {
        return 0;
    }
    let size = rows.next_power_of_two();
    let log = u64::from(size.trailing_zeros());
    let passes = log * (log + 1) / 2;
    let pairs = size / 2;
    let mut per_pass = config.select_tag_stride(pairs * (cols - 1));
    for (i, width) in key_widths.iter().enumerate() {
        per_pass += config.lt_tag_stride(pairs, *width);
        if i > 0 {
            per_pass += config.select_tag_stride(pairs);
        }
        if i + 1 < key_widths.len() {
            per_pass += config.eq_tag_stride(pairs, *width);
            if i > 0 {
                per_pass += config.and_tag_stride(pairs);
            }
        }
    }
    passes * per_pass
}
