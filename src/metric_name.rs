use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CUTOFF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>[^@]+?)\s*@\s*(?P<k>\d+)$").expect("valid metric cutoff regex")
});

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    Precision,
    Recall,
    F1Score,
    Mrr,
    Map,
    Ndcg,
    HitRate,
    ContextPrecision,
    ContextRecall,
    ContextRelevancy,
    Faithfulness,
    AnswerRelevancy,
    AnswerCorrectness,
    AnswerSimilarity,
    Other(String),
}

impl MetricKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1Score => "f1_score",
            Self::Mrr => "mrr",
            Self::Map => "map",
            Self::Ndcg => "ndcg",
            Self::HitRate => "hit_rate",
            Self::ContextPrecision => "context_precision",
            Self::ContextRecall => "context_recall",
            Self::ContextRelevancy => "context_relevancy",
            Self::Faithfulness => "faithfulness",
            Self::AnswerRelevancy => "answer_relevancy",
            Self::AnswerCorrectness => "answer_correctness",
            Self::AnswerSimilarity => "answer_similarity",
            Self::Other(name) => name,
        }
    }

    fn from_normalized(name: &str) -> Self {
        match name {
            "precision" => Self::Precision,
            "recall" => Self::Recall,
            "f1" | "f1_score" => Self::F1Score,
            "mrr" => Self::Mrr,
            "map" => Self::Map,
            "ndcg" => Self::Ndcg,
            "hit_rate" => Self::HitRate,
            "context_precision" => Self::ContextPrecision,
            "context_recall" => Self::ContextRecall,
            "context_relevancy" => Self::ContextRelevancy,
            "faithfulness" => Self::Faithfulness,
            "answer_relevancy" => Self::AnswerRelevancy,
            "answer_correctness" => Self::AnswerCorrectness,
            "answer_similarity" => Self::AnswerSimilarity,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MetricName {
    pub kind: MetricKind,
    pub cutoff: Option<u32>,
}

impl MetricName {
    pub fn new(kind: MetricKind) -> Self {
        Self { kind, cutoff: None }
    }

    pub fn at(kind: MetricKind, cutoff: u32) -> Self {
        Self {
            kind,
            cutoff: Some(cutoff),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();

        if let Some(captures) = CUTOFF_PATTERN.captures(&lowered) {
            let cutoff = captures
                .name("k")
                .and_then(|value| value.as_str().parse::<u32>().ok());
            if let (Some(base), Some(cutoff)) = (captures.name("base"), cutoff) {
                let base = normalize_metric_text(base.as_str());
                return Self::at(MetricKind::from_normalized(&base), cutoff);
            }
        }

        Self::new(MetricKind::from_normalized(&normalize_metric_text(&lowered)))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self.kind, MetricKind::Other(_))
    }
}

fn normalize_metric_text(lowered: &str) -> String {
    lowered
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("_")
        .replace('-', "_")
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cutoff {
            Some(cutoff) => write!(f, "{}@{cutoff}", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl FromStr for MetricName {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

impl From<String> for MetricName {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for MetricName {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<MetricName> for String {
    fn from(value: MetricName) -> Self {
        value.to_string()
    }
}
