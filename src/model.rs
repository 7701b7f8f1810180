use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::metric_name::MetricName;

pub const DEFAULT_RELEVANCE_SCORE: f64 = 1.0;

fn default_relevance_score() -> f64 {
    DEFAULT_RELEVANCE_SCORE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedAnswer {
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer_text: String,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(
        default = "default_relevance_score",
        deserialize_with = "lenient_relevance_score"
    )]
    pub relevance_score: f64,
}

impl ExpectedAnswer {
    pub fn external_id(&self) -> Option<&str> {
        non_blank(self.external_id.as_deref())
    }

    pub fn chunk_id(&self) -> Option<&str> {
        non_blank(self.chunk_id.as_deref())
    }

    pub fn has_identifier(&self) -> bool {
        self.external_id().is_some() || self.chunk_id().is_some()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Vector,
    Keyword,
    Hybrid,
}

impl RetrievalSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: Option<f64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub source: Option<RetrievalSource>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

impl RetrievedItem {
    pub fn metadata_external_id(&self) -> Option<&str> {
        self.metadata
            .get("external_id")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn sort_score(&self) -> f64 {
        match self.score {
            Some(score) if !score.is_nan() => score,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    #[serde(default)]
    pub test_set_id: Option<String>,
    #[serde(default)]
    pub test_case_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_answers: Vec<ExpectedAnswer>,
    #[serde(default, alias = "retrieved_items", deserialize_with = "null_as_default")]
    pub retrieved_chunks: Vec<RetrievedItem>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum MetricGroupKind {
    #[serde(rename = "overall_retrieval_metrics")]
    Retrieval,
    #[serde(rename = "overall_ragas_retrieval_metrics")]
    RagasRetrieval,
    #[serde(rename = "overall_ragas_generation_metrics")]
    RagasGeneration,
}

impl MetricGroupKind {
    pub const ALL: [Self; 3] = [Self::Retrieval, Self::RagasRetrieval, Self::RagasGeneration];

    pub fn field_name(self) -> &'static str {
        match self {
            Self::Retrieval => "overall_retrieval_metrics",
            Self::RagasRetrieval => "overall_ragas_retrieval_metrics",
            Self::RagasGeneration => "overall_ragas_generation_metrics",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::RagasRetrieval => "ragas-retrieval",
            Self::RagasGeneration => "ragas-generation",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricGroup(BTreeMap<MetricName, f64>);

impl MetricGroup {
    pub fn from_raw(raw: Map<String, Value>) -> Self {
        let mut values = BTreeMap::new();
        for (name, value) in raw {
            let Some(number) = value.as_f64().filter(|number| number.is_finite()) else {
                debug!(metric = %name, value = %value, "dropping non-numeric metric value");
                continue;
            };

            let canonical = MetricName::parse(&name);
            if !canonical.is_known() {
                debug!(metric = %canonical, "keeping unrecognised metric name");
            }
            if let Some(previous) = values.insert(canonical.clone(), number) {
                debug!(
                    metric = %canonical,
                    raw_name = %name,
                    previous,
                    replacement = number,
                    "metric name alias overwrote an earlier value"
                );
            }
        }
        Self(values)
    }

    pub fn get(&self, name: &MetricName) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: MetricName, value: f64) -> Option<f64> {
        self.0.insert(name, value)
    }

    pub fn names(&self) -> impl Iterator<Item = &MetricName> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, MetricName, f64> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MetricGroup {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_raw(raw))
    }
}

impl<N: Into<MetricName>> FromIterator<(N, f64)> for MetricGroup {
    fn from_iter<I: IntoIterator<Item = (N, f64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    #[serde(alias = "task_id")]
    pub evaluation_task_id: String,
    #[serde(default)]
    pub overall_retrieval_metrics: Option<MetricGroup>,
    #[serde(default)]
    pub overall_ragas_retrieval_metrics: Option<MetricGroup>,
    #[serde(default)]
    pub overall_ragas_generation_metrics: Option<MetricGroup>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub overall_ragas_score: Option<f64>,
}

impl EvaluationSummary {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            evaluation_task_id: task_id.into(),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, kind: MetricGroupKind, group: MetricGroup) -> Self {
        *self.group_slot(kind) = Some(group);
        self
    }

    pub fn group(&self, kind: MetricGroupKind) -> Option<&MetricGroup> {
        match kind {
            MetricGroupKind::Retrieval => self.overall_retrieval_metrics.as_ref(),
            MetricGroupKind::RagasRetrieval => self.overall_ragas_retrieval_metrics.as_ref(),
            MetricGroupKind::RagasGeneration => self.overall_ragas_generation_metrics.as_ref(),
        }
    }

    fn group_slot(&mut self, kind: MetricGroupKind) -> &mut Option<MetricGroup> {
        match kind {
            MetricGroupKind::Retrieval => &mut self.overall_retrieval_metrics,
            MetricGroupKind::RagasRetrieval => &mut self.overall_ragas_retrieval_metrics,
            MetricGroupKind::RagasGeneration => &mut self.overall_ragas_generation_metrics,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Archived,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Archived => "archived",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationType {
    Retrieval,
    Generation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTask {
    pub id: String,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub evaluation_type: Option<EvaluationType>,
    #[serde(default)]
    pub total_cases: u32,
    #[serde(default)]
    pub completed_cases: u32,
    #[serde(default)]
    pub failed_cases: u32,
}

impl EvaluationTask {
    pub fn label(&self) -> &str {
        non_blank(self.task_name.as_deref()).unwrap_or(&self.id)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_relevance_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?.unwrap_or(DEFAULT_RELEVANCE_SCORE))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|number| number.is_finite()))
}
