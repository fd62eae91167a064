//! Domain types and pure algorithms over administrative units.

pub mod error;
pub mod history;
pub mod normalize;
pub mod tree;
pub mod units;
