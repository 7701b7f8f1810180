use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_TOP_K: u32 = 10;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.0;
pub const DEFAULT_RRF_K: u32 = 60;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.7;
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.3;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    #[default]
    Rrf,
    Weighted,
}

impl FusionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rrf => "rrf",
            Self::Weighted => "weighted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFusionConfig")]
pub struct FusionConfig {
    retrieval_mode: RetrievalMode,
    top_k: u32,
    score_threshold: f64,
    fusion_method: FusionMethod,
    rrf_k: u32,
    semantic_weight: f64,
    keyword_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            retrieval_mode: RetrievalMode::default(),
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            fusion_method: FusionMethod::default(),
            rrf_k: DEFAULT_RRF_K,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
        }
    }
}

impl FusionConfig {
    pub fn retrieval_mode(&self) -> RetrievalMode {
        self.retrieval_mode
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }

    pub fn fusion_method(&self) -> FusionMethod {
        self.fusion_method
    }

    pub fn rrf_k(&self) -> u32 {
        self.rrf_k
    }

    pub fn semantic_weight(&self) -> f64 {
        self.semantic_weight
    }

    pub fn keyword_weight(&self) -> f64 {
        self.keyword_weight
    }

    pub fn set_retrieval_mode(&mut self, mode: RetrievalMode) {
        self.retrieval_mode = mode;
    }

    pub fn set_fusion_method(&mut self, method: FusionMethod) {
        self.fusion_method = method;
    }

    pub fn set_top_k(&mut self, top_k: i64) {
        self.top_k = if top_k < 1 {
            debug!(requested = top_k, coerced = DEFAULT_TOP_K, "top_k coerced");
            DEFAULT_TOP_K
        } else {
            u32::try_from(top_k).unwrap_or(u32::MAX)
        };
    }

    pub fn set_score_threshold(&mut self, threshold: f64) {
        self.score_threshold = if threshold.is_nan() {
            debug!(coerced = DEFAULT_SCORE_THRESHOLD, "score_threshold was not a number");
            DEFAULT_SCORE_THRESHOLD
        } else {
            threshold.clamp(0.0, 1.0)
        };
    }

    pub fn set_rrf_k(&mut self, rrf_k: i64) {
        self.rrf_k = if rrf_k < 1 {
            debug!(requested = rrf_k, coerced = DEFAULT_RRF_K, "rrf_k coerced");
            DEFAULT_RRF_K
        } else {
            u32::try_from(rrf_k).unwrap_or(u32::MAX)
        };
    }

    pub fn set_semantic_weight(&mut self, weight: f64) {
        let (semantic, keyword) = complementary_weights(weight, DEFAULT_SEMANTIC_WEIGHT);
        self.semantic_weight = semantic;
        self.keyword_weight = keyword;
    }

    pub fn set_keyword_weight(&mut self, weight: f64) {
        let (keyword, semantic) = complementary_weights(weight, DEFAULT_KEYWORD_WEIGHT);
        self.keyword_weight = keyword;
        self.semantic_weight = semantic;
    }

    pub fn uses_fusion(&self) -> bool {
        self.retrieval_mode == RetrievalMode::Hybrid
    }

    pub fn uses_rrf(&self) -> bool {
        self.uses_fusion() && self.fusion_method == FusionMethod::Rrf
    }

    pub fn uses_weights(&self) -> bool {
        self.uses_fusion() && self.fusion_method == FusionMethod::Weighted
    }

    pub fn rrf_contribution(&self, rank: usize) -> f64 {
        1.0 / (f64::from(self.rrf_k) + rank as f64)
    }

    pub fn apply(&mut self, update: &FusionConfigUpdate) {
        if let Some(mode) = update.retrieval_mode {
            self.set_retrieval_mode(mode);
        }
        if let Some(top_k) = update.top_k {
            self.set_top_k(top_k);
        }
        if let Some(threshold) = update.score_threshold {
            self.set_score_threshold(threshold);
        }
        if let Some(method) = update.fusion_method {
            self.set_fusion_method(method);
        }
        if let Some(rrf_k) = update.rrf_k {
            self.set_rrf_k(rrf_k);
        }
        if let Some(weight) = update.semantic_weight {
            self.set_semantic_weight(weight);
        }
        if let Some(weight) = update.keyword_weight {
            self.set_keyword_weight(weight);
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "retrieval_mode": self.retrieval_mode.as_str(),
            "top_k": self.top_k,
            "score_threshold": self.score_threshold,
            "fusion_method": self.fusion_method.as_str(),
            "rrf_k": self.rrf_k,
            "semantic_weight": self.semantic_weight,
            "keyword_weight": self.keyword_weight,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionConfigUpdate {
    pub retrieval_mode: Option<RetrievalMode>,
    pub top_k: Option<i64>,
    pub score_threshold: Option<f64>,
    pub fusion_method: Option<FusionMethod>,
    pub rrf_k: Option<i64>,
    pub semantic_weight: Option<f64>,
    pub keyword_weight: Option<f64>,
}

impl FusionConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFusionConfig {
    #[serde(default)]
    retrieval_mode: Option<RetrievalMode>,
    #[serde(default)]
    top_k: Option<Value>,
    #[serde(default)]
    score_threshold: Option<Value>,
    #[serde(default)]
    fusion_method: Option<FusionMethod>,
    #[serde(default)]
    rrf_k: Option<Value>,
    #[serde(default)]
    semantic_weight: Option<Value>,
    #[serde(default)]
    keyword_weight: Option<Value>,
}

impl From<RawFusionConfig> for FusionConfig {
    fn from(raw: RawFusionConfig) -> Self {
        let mut config = Self::default();
        let semantic_weight = raw.semantic_weight.as_ref().map(number_or_nan);
        let keyword_weight = raw.keyword_weight.as_ref().map(number_or_nan);

        config.apply(&FusionConfigUpdate {
            retrieval_mode: raw.retrieval_mode,
            top_k: raw.top_k.as_ref().map(integer_or_zero),
            score_threshold: raw.score_threshold.as_ref().map(number_or_nan),
            fusion_method: raw.fusion_method,
            rrf_k: raw.rrf_k.as_ref().map(integer_or_zero),
            semantic_weight,
            keyword_weight: if semantic_weight.is_some() {
                None
            } else {
                keyword_weight
            },
        });
        config
    }
}

fn complementary_weights(weight: f64, fallback: f64) -> (f64, f64) {
    let weight = if weight.is_nan() {
        debug!(coerced = fallback, "fusion weight was not a number");
        fallback
    } else {
        weight.clamp(0.0, 1.0)
    };
    let rounded = round_to_hundredths(weight);
    (rounded, round_to_hundredths(1.0 - rounded))
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn number_or_nan(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn integer_or_zero(value: &Value) -> i64 {
    let parsed = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_RRF_K, DEFAULT_TOP_K, FusionConfig, FusionConfigUpdate, FusionMethod,
        RetrievalMode,
    };

    #[test]
    fn defaults_match_editor_defaults() {
        let config = FusionConfig::default();
        assert_eq!(config.retrieval_mode(), RetrievalMode::Hybrid);
        assert_eq!(config.top_k(), 10);
        assert_eq!(config.score_threshold(), 0.0);
        assert_eq!(config.fusion_method(), FusionMethod::Rrf);
        assert_eq!(config.rrf_k(), 60);
        assert_eq!(config.semantic_weight(), 0.7);
        assert_eq!(config.keyword_weight(), 0.3);
    }

    #[test]
    fn semantic_weight_update_sets_complement() {
        let mut config = FusionConfig::default();
        config.set_semantic_weight(0.45);
        assert_eq!(config.semantic_weight(), 0.45);
        assert_eq!(config.keyword_weight(), 0.55);

        config.set_semantic_weight(0.65);
        assert_eq!(config.keyword_weight(), 0.35);
    }

    #[test]
    fn keyword_weight_update_sets_complement() {
        let mut config = FusionConfig::default();
        config.set_keyword_weight(0.1);
        assert_eq!(config.keyword_weight(), 0.1);
        assert_eq!(config.semantic_weight(), 0.9);
    }

    #[test]
    fn weights_are_rounded_to_two_decimals_and_clamped() {
        let mut config = FusionConfig::default();
        config.set_semantic_weight(0.456);
        assert_eq!(config.semantic_weight(), 0.46);
        assert_eq!(config.keyword_weight(), 0.54);

        config.set_keyword_weight(1.8);
        assert_eq!(config.keyword_weight(), 1.0);
        assert_eq!(config.semantic_weight(), 0.0);

        config.set_semantic_weight(f64::NAN);
        assert_eq!(config.semantic_weight(), 0.7);
        assert_eq!(config.keyword_weight(), 0.3);
    }

    #[test]
    fn weights_always_sum_to_one() {
        let mut config = FusionConfig::default();
        for step in 0..=100 {
            let weight = f64::from(step) / 100.0;
            config.set_semantic_weight(weight);
            let total = config.semantic_weight() + config.keyword_weight();
            assert!((total - 1.0).abs() < 1e-9, "weights drifted at {weight}: {total}");
            config.set_keyword_weight(weight);
            let total = config.semantic_weight() + config.keyword_weight();
            assert!((total - 1.0).abs() < 1e-9, "weights drifted at {weight}: {total}");
        }
    }

    #[test]
    fn out_of_range_numbers_are_coerced() {
        let mut config = FusionConfig::default();
        config.set_top_k(0);
        assert_eq!(config.top_k(), DEFAULT_TOP_K);
        config.set_top_k(-5);
        assert_eq!(config.top_k(), DEFAULT_TOP_K);
        config.set_top_k(25);
        assert_eq!(config.top_k(), 25);

        config.set_rrf_k(0);
        assert_eq!(config.rrf_k(), DEFAULT_RRF_K);
        config.set_rrf_k(5);
        assert_eq!(config.rrf_k(), 5);

        config.set_score_threshold(1.4);
        assert_eq!(config.score_threshold(), 1.0);
        config.set_score_threshold(-0.1);
        assert_eq!(config.score_threshold(), 0.0);
        config.set_score_threshold(f64::NAN);
        assert_eq!(config.score_threshold(), 0.0);
    }

    #[test]
    fn live_controls_depend_on_mode_and_method() {
        let mut config = FusionConfig::default();
        assert!(config.uses_rrf());
        assert!(!config.uses_weights());

        config.set_fusion_method(FusionMethod::Weighted);
        assert!(config.uses_weights());

        config.set_retrieval_mode(RetrievalMode::Semantic);
        assert_eq!(config.fusion_method(), FusionMethod::Weighted);
        assert!(!config.uses_weights());
        assert!(!config.uses_rrf());
    }

    #[test]
    fn larger_rrf_k_flattens_rank_differences() {
        let mut config = FusionConfig::default();
        config.set_rrf_k(1);
        let steep = config.rrf_contribution(1) - config.rrf_contribution(10);
        config.set_rrf_k(100);
        let flat = config.rrf_contribution(1) - config.rrf_contribution(10);
        assert!(flat < steep);
        assert_eq!(config.rrf_contribution(0), 0.01);
    }

    #[test]
    fn update_applies_fields_in_order() {
        let mut config = FusionConfig::default();
        config.apply(&FusionConfigUpdate {
            top_k: Some(20),
            semantic_weight: Some(0.2),
            keyword_weight: Some(0.6),
            ..FusionConfigUpdate::default()
        });
        assert_eq!(config.top_k(), 20);
        assert_eq!(config.keyword_weight(), 0.6);
        assert_eq!(config.semantic_weight(), 0.4);
        assert!(FusionConfigUpdate::default().is_empty());
    }

    #[test]
    fn deserialization_restores_invariants() {
        let raw = serde_json::json!({
            "retrieval_mode": "hybrid",
            "top_k": "0",
            "score_threshold": 2.5,
            "fusion_method": "weighted",
            "rrf_k": null,
            "semantic_weight": 0.8,
            "keyword_weight": 0.8
        });

        let config: FusionConfig = serde_json::from_value(raw).expect("config should deserialize");
        assert_eq!(config.top_k(), DEFAULT_TOP_K);
        assert_eq!(config.score_threshold(), 1.0);
        assert_eq!(config.rrf_k(), DEFAULT_RRF_K);
        assert_eq!(config.semantic_weight(), 0.8);
        assert_eq!(config.keyword_weight(), 0.2);
    }

    #[test]
    fn keyword_only_payload_sets_semantic_complement() {
        let config: FusionConfig =
            serde_json::from_str(r#"{"keyword_weight": 0.25}"#).expect("config should deserialize");
        assert_eq!(config.semantic_weight(), 0.75);
        assert_eq!(config.retrieval_mode(), RetrievalMode::Hybrid);
    }

    #[test]
    fn payload_round_trips_through_deserialization() {
        let mut config = FusionConfig::default();
        config.set_retrieval_mode(RetrievalMode::Keyword);
        config.set_top_k(7);
        let payload = config.to_payload();

        assert_eq!(payload["retrieval_mode"], "keyword");
        assert_eq!(payload["top_k"], 7);
        let restored: FusionConfig =
            serde_json::from_value(payload).expect("payload should deserialize");
        assert_eq!(restored, config);
        assert_eq!(
            serde_json::to_value(&restored).expect("config should serialize"),
            config.to_payload()
        );
    }
}
