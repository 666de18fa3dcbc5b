//! Filtering by a conjunction of comparison predicates.

use futures::future::try_join_all;
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

/// How a field is compared with its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// `field < operand`
    Less,
    /// `field > operand`
    Greater,
    /// `field <= operand`
    LessEq,
    /// `field >= operand`
    GreaterEq,
    /// `field == operand`
    Equal,
    /// `field != operand`
    NotEqual,
}

impl Comparator {
    fn tag_stride(self, config: &EngineConfig, rows: usize, width: u32) -> u64 {
        match self {
            Comparator::Equal | Comparator::NotEqual => config.eq_tag_stride(rows, width),
            _ => config.lt_tag_stride(rows, width),
        }
    }
}

/// The right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// This party's share of a secret constant.
    Const(Share),
    /// A public constant.
    Public(u64),
    /// Another field of the same view.
    Field(String),
}

/// A comparison between a field and an operand, evaluated for every row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    /// The compared field.
    pub field: String,
    /// The comparison.
    pub comparator: Comparator,
    /// What the field is compared with.
    pub operand: Operand,
}

impl Predicate {
    /// A predicate `field <comparator> operand`.
    pub fn new(field: impl Into<String>, comparator: Comparator, operand: Operand) -> Self {
        Self {
            field: field.into(),
            comparator,
            operand,
        }
    }
}

impl View {
    fn predicate_width(&self, predicate: &Predicate) -> Result<u32, Error> {
        let width = self.fields()[self.index_of(&predicate.field)?].width;
        Ok(match &predicate.operand {
            Operand::Field(other) => width.max(self.fields()[self.index_of(other)?].width),
            Operand::Const(_) | Operand::Public(_) => width,
        })
    }

    async fn evaluate<C: Channel>(
        &self,
        ctx: &Context<C>,
        mut tags: TagAllocator,
        predicate: &Predicate,
        width: u32,
    ) -> Result<Vec<Share>, Error> {
        let x = self.col(self.index_of(&predicate.field)?);
        let constant;
        let c: &[Share] = match &predicate.operand {
            Operand::Field(other) => self.col(self.index_of(other)?),
            Operand::Const(share) => {
                constant = vec![*share; x.len()];
                &constant
            }
            Operand::Public(value) => {
                constant = vec![ctx.party().constant(*value); x.len()];
                &constant
            }
        };
        let tags = &mut tags;
        Ok(match predicate.comparator {
            Comparator::Less => ctx.lt(tags, x, c, width).await?,
            Comparator::Greater => ctx.lt(tags, c, x, width).await?,
            Comparator::LessEq => ctx.not(&ctx.lt(tags, c, x, width).await?),
            Comparator::GreaterEq => ctx.not(&ctx.lt(tags, x, c, width).await?),
            Comparator::Equal => ctx.eq(tags, x, c, width).await?,
            Comparator::NotEqual => ctx.not(&ctx.eq(tags, x, c, width).await?),
        })
    }

    /// Keeps the rows that satisfy all `predicates`.
    ///
    /// The predicates are evaluated concurrently, each on its own tag range, and combined with
    /// the current validity bits by a tree of ANDs before compaction. Without predicates the
    /// view is returned unchanged.
    #[instrument(level = Level::DEBUG, skip_all, fields(rows = self.row_num()), err)]
    pub async fn filter<C: Channel>(
        mut self,
        ctx: &Context<C>,
        tags: &mut TagAllocator,
        predicates: &[Predicate],
    ) -> Result<View, Error> {
        let rows = self.row_num();
        if predicates.is_empty() || rows == 0 {
            return Ok(self);
        }
        let mut jobs = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let width = self.predicate_width(predicate)?;
            let stride = predicate.comparator.tag_stride(ctx.config(), rows, width);
            jobs.push(self.evaluate(ctx, tags.reserve(stride)?, predicate, width));
        }
        let mut conditions = try_join_all(jobs).await?;
        conditions.push(self.valid().to_vec());
        let valid = ctx.and_all(tags, conditions).await?;
        self.set_valid(valid)?;
        self.clear_invalid_entries(ctx, tags).await
    }
}
