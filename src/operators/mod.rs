//! # Operator Library
//!
//! Ready-made operators built on [`Operator`](crate::operator::Operator):
//!
//! | Operator        | Kind        | Inputs            | Output                        |
//! |-----------------|-------------|-------------------|-------------------------------|
//! | [`FromNothing`] | singleton   | one single-bag    | one empty bag                 |
//! | [`FromIter`]    | source      | none              | one bag with the iterator's items |
//! | [`Map`]         | multi-round | one               | one bag per round, 1 to 1     |
//! | [`FlatMap`]     | multi-round | one               | one bag per round, 1 to many  |
//! | [`Filter`]      | multi-round | one               | one bag per round, kept records |
//! | [`Union`]       | multi-round | any number        | one bag per round, all inputs |
//! | [`Collect`]     | sink        | one               | none; rounds land in [`Collected`] |

mod collect;
mod filter;
mod flat_map;
mod from_iter;
mod from_nothing;
mod map;
mod union;

#[cfg(test)]
mod collect_test;
#[cfg(test)]
mod from_nothing_test;
#[cfg(test)]
mod union_test;

pub use collect::{Collect, Collected};
pub use filter::Filter;
pub use flat_map::FlatMap;
pub use from_iter::FromIter;
pub use from_nothing::FromNothing;
pub use map::Map;
pub use union::Union;
