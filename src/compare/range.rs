use serde::Serialize;

use crate::metric_name::MetricName;
use crate::model::{EvaluationSummary, MetricGroupKind};

pub const DEFAULT_RANGE_MIN: f64 = 0.0;
pub const DEFAULT_RANGE_MAX: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRange {
    pub metric: MetricName,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl MetricRange {
    pub fn neutral(metric: MetricName) -> Self {
        Self {
            metric,
            min: DEFAULT_RANGE_MIN,
            max: DEFAULT_RANGE_MAX,
            samples: 0,
        }
    }

    pub fn from_samples(metric: MetricName, samples: impl IntoIterator<Item = f64>) -> Self {
        let mut bounds: Option<(f64, f64)> = None;
        let mut count = 0_usize;

        for value in samples.into_iter().filter(|value| value.is_finite()) {
            count += 1;
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(value), max.max(value)),
                None => (value, value),
            });
        }

        match bounds {
            Some((min, max)) => Self {
                metric,
                min,
                max,
                samples: count,
            },
            None => Self::neutral(metric),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.min == self.max
    }

    pub fn is_observed(&self) -> bool {
        self.samples > 0
    }
}

pub fn metric_range<'a>(
    metric: &MetricName,
    subjects: impl IntoIterator<Item = &'a EvaluationSummary>,
    group: MetricGroupKind,
) -> MetricRange {
    let samples = subjects
        .into_iter()
        .filter_map(|subject| subject.group(group))
        .filter_map(|values| values.get(metric));
    MetricRange::from_samples(metric.clone(), samples)
}

pub fn ragas_score_range<'a>(
    metric: &MetricName,
    subjects: impl IntoIterator<Item = &'a EvaluationSummary>,
) -> MetricRange {
    let samples = subjects
        .into_iter()
        .filter_map(|subject| subject.overall_ragas_score);
    MetricRange::from_samples(metric.clone(), samples)
}
