//! Statistical primitives.

pub mod normal;

pub use normal::{cdf, pdf, quantile};
