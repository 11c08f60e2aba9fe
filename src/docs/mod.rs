pub mod aggregate;
pub mod handlers;

pub use aggregate::{merge, FetchedDescription, MergedApiDescription, SpecAggregator};
