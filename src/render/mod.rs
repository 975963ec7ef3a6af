pub mod canvas;
pub mod chart;
pub mod summary;
