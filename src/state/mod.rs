pub mod dataset;
pub mod measurement;
