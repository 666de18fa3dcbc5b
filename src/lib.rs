//! Oblivious relational operators over XOR-shared tables, for two-party secure computation.
//!
//! Two computing parties each hold one XOR share of every value of a relation. Neither party
//! learns anything about the values, yet together they can sort, filter, group, deduplicate
//! and join the relation, and hand the shared result back to the data owner.
//!
//! ## Main Components
//!
//! * [`table`] and [`view`]: the data model. A [`Table`] is a party's shares of a relation, a
//!   [`View`] is a table plus a secret validity column and a public padding column.
//! * [`ops`]: the operators, as methods of [`View`]: [`View::sort`],
//!   [`View::clear_invalid_entries`], [`View::filter`], [`View::group_by`], [`View::count`],
//!   [`View::min`], [`View::max`], [`View::distinct`], [`View::semi_join`],
//!   [`View::nested_loop_join`], [`View::hash_join`] and [`View::left_outer_join`].
//! * [`protocol`]: the per-party [`Context`] the operators run on, and [`protocol::simulate`]
//!   to run both parties in one process.
//! * [`tags`]: the [`TagAllocator`] that keeps the messages of concurrent rounds apart.
//! * [`channel`] and [`dealer`]: the transport between the parties and the source of Beaver
//!   triples.
//! * [`client`]: the data owner's side, sharing plaintext tables and reconstructing results.
//!
//! ## Leakage
//!
//! The sequence of messages depends only on public shapes: row counts, column widths and the
//! configuration. Operators that remove rows reveal how many rows remain, and the hash join
//! reveals how many rows fall into each bucket. Nothing else about the data is revealed to
//! either party. Security holds against a semi-honest adversary.
//!
//! ## Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//! use relshare::{
//!     EngineConfig, TagAllocator, View,
//!     client::{reconstruct, share_table},
//!     protocol::simulate,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), relshare::Error> {
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//! let customers = vec![vec![1, 7], vec![2, 3], vec![3, 9]];
//! let orders = vec![vec![1, 250], vec![3, 80], vec![3, 125], vec![4, 60]];
//! let c = share_table("customers", &[("id", 16), ("region", 8)], Some("id"), &customers, &mut rng)?;
//! let o = share_table("orders", &[("customer", 16), ("total", 32)], Some("customer"), &orders, &mut rng)?;
//! let inputs = [(c.0, o.0), (c.1, o.1)];
//!
//! let (j0, j1) = simulate(EngineConfig::default(), 1, |ctx| {
//!     let (c, o) = inputs[ctx.party().index()].clone();
//!     async move {
//!         let mut tags = TagAllocator::new();
//!         let c = View::from_table(c, ctx.party());
//!         let o = View::from_table(o, ctx.party());
//!         c.hash_join(&ctx, &mut tags, o, "id", "customer").await
//!     }
//! })
//! .await?;
//! let joined = reconstruct(&j0, &j1)?;
//! let mut totals = joined.column("orders.total").unwrap_or_default();
//! totals.sort();
//! assert_eq!(totals, [80, 125, 250]);
//! println!("{joined}");
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod channel;
pub mod client;
mod compute;
pub mod config;
pub mod dealer;
mod error;
pub mod ops;
pub mod protocol;
pub mod share;
pub mod table;
pub mod tags;
pub mod view;

pub use channel::{Channel, SimpleChannel};
pub use config::EngineConfig;
pub use dealer::{SeededDealer, TripleSource};
pub use error::Error;
pub use ops::{Comparator, Operand, Predicate, SortKey};
pub use protocol::{Context, simulate};
pub use share::{Party, Share};
pub use table::{Field, Table};
pub use tags::TagAllocator;
pub use view::View;
