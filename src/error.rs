//! Errors raised by the engine.

use crate::channel;

/// A failed query.
///
/// Every error is fatal to the query that raised it, but never to the process. Both parties
/// run the same deterministic schedule, so schema errors are raised identically on both sides
/// before any message is exchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error occurred while trying to communicate over the channel.
    #[error("channel error: {0}")]
    Channel(#[from] channel::Error),
    /// A field name was looked up that the table or view does not have.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// A field name occurs twice in the same schema.
    #[error("duplicate field `{0}`")]
    DuplicateField(String),
    /// Field widths must be between 1 and 64 bits.
    #[error("invalid width {width} for field `{field}`")]
    InvalidWidth {
        /// The offending field.
        field: String,
        /// The requested width.
        width: u32,
    },
    /// An inserted row does not have one share per column.
    #[error("row has {actual} values, but the table has {expected} columns")]
    RowLength {
        /// Number of columns of the table.
        expected: usize,
        /// Number of values in the row.
        actual: usize,
    },
    /// Two operands of a batched primitive have different lengths.
    #[error("operands have different lengths ({0} vs {1})")]
    LengthMismatch(usize, usize),
    /// Two views were combined whose columns do not line up.
    #[error("views have incompatible schemas")]
    SchemaMismatch,
    /// A tag range was asked for more tags than it has left.
    #[error("tag range exhausted: {requested} tags requested, {available} available")]
    TagsExhausted {
        /// Number of tags that were requested.
        requested: u64,
        /// Number of tags left in the range.
        available: u64,
    },
    /// A revealed valid-row count is larger than the view it was computed from.
    #[error("revealed count {count} exceeds the {rows} rows of the view")]
    InvalidRevealedCount {
        /// The revealed count.
        count: u64,
        /// The number of rows of the view.
        rows: usize,
    },
    /// The engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
