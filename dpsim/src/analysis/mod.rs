pub mod trajectory;
pub mod classifier;
pub mod accumulator;
pub mod results;
pub mod aggregator;
