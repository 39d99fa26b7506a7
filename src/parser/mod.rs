//! Listing parsers for the private registry.

pub mod simple_index;

pub use simple_index::{is_intact_anchor, Anchor, SimpleIndexParser};
