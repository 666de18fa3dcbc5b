//! Relational operators on [`View`](crate::View)s.
//!
//! Every operator is a method of [`View`](crate::View) that takes the party's
//! [`Context`](crate::Context) and a [`TagAllocator`](crate::TagAllocator). Both parties must
//! call the same operators in the same order on views of the same shape, and must pass
//! allocators that hand out the same tags. Operators that remove rows end with
//! [`View::clear_invalid_entries`](crate::View::clear_invalid_entries), which reveals the number
//! of remaining rows and nothing else.
//!
//! ```
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//! use relshare::{
//!     Comparator, EngineConfig, Operand, Predicate, TagAllocator, View,
//!     client::{reconstruct, share_table},
//!     protocol::simulate,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), relshare::Error> {
//! let rows = vec![vec![1, 30], vec![2, 17], vec![3, 52]];
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//! let tables = share_table("people", &[("id", 8), ("age", 8)], None, &rows, &mut rng)?;
//! let tables = [tables.0, tables.1];
//! let adults = [Predicate::new("age", Comparator::GreaterEq, Operand::Public(18))];
//!
//! let (v0, v1) = simulate(EngineConfig::default(), 1, |ctx| {
//!     let view = View::from_table(tables[ctx.party().index()].clone(), ctx.party());
//!     let adults = &adults;
//!     async move {
//!         let mut tags = TagAllocator::new();
//!         view.filter(&ctx, &mut tags, adults).await
//!     }
//! })
//! .await?;
//! assert_eq!(reconstruct(&v0, &v1)?.rows.len(), 2);
//! # Ok(())
//! # }
//! ```

mod compact;
mod distinct;
mod filter;
mod group;
mod join;
mod semi_join;
mod shuffle;
mod sort;

pub use filter::{Comparator, Operand, Predicate};
pub use group::{COUNT_COL_NAME, max_col_name, min_col_name};
pub use sort::SortKey;
