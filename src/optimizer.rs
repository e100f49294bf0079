//! Statistics used to estimate predicate selectivity.

pub mod histogram;

pub use histogram::IntHistogram;
