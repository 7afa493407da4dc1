//! Text normalization rules shared by the resolver and the data model.

pub mod amounts;
pub mod patterns;

pub use amounts::{format_brl_amount, parse_brl_amount};
