use std::collections::BTreeSet;

use serde::{Deserialize, Serialize, Serializer};

use super::heatmap::{Intensity, bucket};
use super::range::{MetricRange, metric_range, ragas_score_range};
use super::selection::SelectionSet;
use crate::metric_name::MetricName;
use crate::model::{EvaluationSummary, EvaluationTask, MetricGroupKind, TaskStatus};

pub const OVERALL_RAGAS_SCORE: &str = "overall_ragas_score";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSubject {
    pub task: EvaluationTask,
    #[serde(default)]
    pub summary: Option<EvaluationSummary>,
}

impl ComparisonSubject {
    pub fn id(&self) -> &str {
        &self.task.id
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum MetricSource {
    Group(MetricGroupKind),
    OverallRagasScore,
}

impl MetricSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group(kind) => kind.field_name(),
            Self::OverallRagasScore => OVERALL_RAGAS_SCORE,
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Self::Group(kind) => kind.short_label(),
            Self::OverallRagasScore => "overall",
        }
    }
}

impl Serialize for MetricSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct MatrixOptions {
    pub groups: Vec<MetricGroupKind>,
    pub include_overall_score: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            groups: MetricGroupKind::ALL.to_vec(),
            include_overall_score: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectLabel {
    pub id: String,
    pub label: String,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub subject_id: String,
    pub value: Option<f64>,
    pub intensity: Option<Intensity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub source: MetricSource,
    pub metric: MetricName,
    pub range: MetricRange,
    pub cells: Vec<HeatmapCell>,
}

impl HeatmapRow {
    pub fn cell(&self, subject_id: &str) -> Option<&HeatmapCell> {
        self.cells.iter().find(|cell| cell.subject_id == subject_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonMatrix {
    pub subjects: Vec<SubjectLabel>,
    pub rows: Vec<HeatmapRow>,
}

impl ComparisonMatrix {
    pub fn row(&self, source: MetricSource, metric: &MetricName) -> Option<&HeatmapRow> {
        self.rows
            .iter()
            .find(|row| row.source == source && &row.metric == metric)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn build_matrix(
    subjects: &[ComparisonSubject],
    selection: &SelectionSet,
    options: &MatrixOptions,
) -> ComparisonMatrix {
    let selected = subjects
        .iter()
        .filter(|subject| selection.contains(subject.id()))
        .collect::<Vec<&ComparisonSubject>>();
    let summaries = selected
        .iter()
        .filter_map(|subject| subject.summary.as_ref())
        .collect::<Vec<&EvaluationSummary>>();

    let mut rows = Vec::new();
    for &group in &options.groups {
        let names = summaries
            .iter()
            .filter_map(|summary| summary.group(group))
            .flat_map(|values| values.names().cloned())
            .collect::<BTreeSet<MetricName>>();

        for name in names {
            let range = metric_range(&name, summaries.iter().copied(), group);
            let cells = selected
                .iter()
                .map(|subject| {
                    let value = subject
                        .summary
                        .as_ref()
                        .and_then(|summary| summary.group(group))
                        .and_then(|values| values.get(&name));
                    heatmap_cell(subject.id(), value, &range)
                })
                .collect();
            rows.push(HeatmapRow {
                source: MetricSource::Group(group),
                metric: name,
                range,
                cells,
            });
        }
    }

    if options.include_overall_score {
        let name = MetricName::parse(OVERALL_RAGAS_SCORE);
        let range = ragas_score_range(&name, summaries.iter().copied());
        if range.is_observed() {
            let cells = selected
                .iter()
                .map(|subject| {
                    let value = subject
                        .summary
                        .as_ref()
                        .and_then(|summary| summary.overall_ragas_score);
                    heatmap_cell(subject.id(), value, &range)
                })
                .collect();
            rows.push(HeatmapRow {
                source: MetricSource::OverallRagasScore,
                metric: name,
                range,
                cells,
            });
        }
    }

    ComparisonMatrix {
        subjects: selected
            .iter()
            .map(|subject| SubjectLabel {
                id: subject.id().to_string(),
                label: subject.task.label().to_string(),
                status: subject.task.status,
            })
            .collect(),
        rows,
    }
}

fn heatmap_cell(subject_id: &str, value: Option<f64>, range: &MetricRange) -> HeatmapCell {
    let value = value.filter(|value| value.is_finite());
    HeatmapCell {
        subject_id: subject_id.to_string(),
        value,
        intensity: value.map(|value| bucket(value, range)),
    }
}
