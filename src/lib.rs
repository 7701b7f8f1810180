pub mod compare;
pub mod fusion;
pub mod matching;
pub mod metric_name;
pub mod model;
