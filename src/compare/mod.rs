mod heatmap;
mod matrix;
mod range;
mod selection;

pub use self::heatmap::{Intensity, bucket};
pub use self::matrix::{
    ComparisonMatrix, ComparisonSubject, HeatmapCell, HeatmapRow, MatrixOptions, MetricSource,
    OVERALL_RAGAS_SCORE, SubjectLabel, build_matrix,
};
pub use self::range::{
    DEFAULT_RANGE_MAX, DEFAULT_RANGE_MIN, MetricRange, metric_range, ragas_score_range,
};
pub use self::selection::SelectionSet;
