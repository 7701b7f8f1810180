use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{DEFAULT_RELEVANCE_SCORE, ExpectedAnswer};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    #[default]
    LastWins,
    FirstWins,
}

impl CollisionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastWins => "last-wins",
            Self::FirstWins => "first-wins",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseKey {
    pub test_set_id: String,
    pub test_case_id: String,
}

impl CaseKey {
    pub fn new(test_set_id: impl Into<String>, test_case_id: impl Into<String>) -> Self {
        Self {
            test_set_id: test_set_id.into(),
            test_case_id: test_case_id.into(),
        }
    }

    pub fn synthetic_external_id(&self, answer_index: usize) -> String {
        format!(
            "test_set_{}_case_{}_answer_{}",
            self.test_set_id, self.test_case_id, answer_index
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub policy: CollisionPolicy,
    pub case: Option<CaseKey>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LookupEntry {
    pub relevance_score: f64,
    pub answer_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifierCollision {
    pub key: String,
    pub kept_answer: usize,
    pub dropped_answer: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierLookup {
    entries: HashMap<String, LookupEntry>,
    collisions: Vec<IdentifierCollision>,
    keyed_answers: BTreeSet<usize>,
    answer_count: usize,
}

impl IdentifierLookup {
    pub fn get(&self, key: &str) -> Option<&LookupEntry> {
        self.entries.get(key)
    }

    pub fn score(&self, key: &str) -> Option<f64> {
        self.entries.get(key).map(|entry| entry.relevance_score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn collisions(&self) -> &[IdentifierCollision] {
        &self.collisions
    }

    pub fn is_keyed(&self, answer_index: usize) -> bool {
        self.keyed_answers.contains(&answer_index)
    }

    pub fn answer_count(&self) -> usize {
        self.answer_count
    }

    pub fn scores(&self) -> HashMap<String, f64> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.relevance_score))
            .collect()
    }

    fn claim(&mut self, key: String, entry: LookupEntry, policy: CollisionPolicy) {
        let Some(existing) = self.entries.get_mut(&key) else {
            self.entries.insert(key, entry);
            return;
        };

        if existing.answer_index == entry.answer_index {
            *existing = entry;
            return;
        }

        let (kept, dropped) = match policy {
            CollisionPolicy::LastWins => {
                let dropped = existing.answer_index;
                *existing = entry;
                (entry.answer_index, dropped)
            }
            CollisionPolicy::FirstWins => (existing.answer_index, entry.answer_index),
        };

        debug!(
            key = %key,
            kept_answer = kept,
            dropped_answer = dropped,
            policy = policy.as_str(),
            "expected answers share an identifier"
        );
        self.collisions.push(IdentifierCollision {
            key,
            kept_answer: kept,
            dropped_answer: dropped,
        });
    }
}

pub fn resolve(answers: &[ExpectedAnswer]) -> IdentifierLookup {
    resolve_with(answers, &ResolveOptions::default())
}

pub fn resolve_with(answers: &[ExpectedAnswer], options: &ResolveOptions) -> IdentifierLookup {
    let mut lookup = IdentifierLookup {
        answer_count: answers.len(),
        ..IdentifierLookup::default()
    };

    for (answer_index, answer) in answers.iter().enumerate() {
        let entry = LookupEntry {
            relevance_score: unit_score(answer.relevance_score),
            answer_index,
        };

        let keys = answer_keys(answer, answer_index, options.case.as_ref());
        if !keys.is_empty() {
            lookup.keyed_answers.insert(answer_index);
        }
        for key in keys {
            lookup.claim(key, entry, options.policy);
        }
    }

    lookup
}

fn answer_keys(
    answer: &ExpectedAnswer,
    answer_index: usize,
    case: Option<&CaseKey>,
) -> Vec<String> {
    let mut keys = Vec::with_capacity(3);

    if let Some(external_id) = answer.external_id() {
        keys.push(external_id.to_string());
    }

    if let Some(chunk_id) = answer.chunk_id() {
        keys.push(chunk_id.to_string());
        keys.push(chunk_id.to_lowercase());
    }

    if !answer.has_identifier()
        && let Some(case) = case
    {
        keys.push(case.synthetic_external_id(answer_index));
    }

    keys
}

fn unit_score(score: f64) -> f64 {
    if score.is_nan() {
        return DEFAULT_RELEVANCE_SCORE;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{CaseKey, CollisionPolicy, ResolveOptions, resolve, resolve_with};
    use crate::model::ExpectedAnswer;

    fn answer(
        chunk_id: Option<&str>,
        external_id: Option<&str>,
        relevance_score: f64,
    ) -> ExpectedAnswer {
        ExpectedAnswer {
            answer_text: "text".to_string(),
            chunk_id: chunk_id.map(str::to_string),
            external_id: external_id.map(str::to_string),
            relevance_score,
        }
    }

    #[test]
    fn single_answer_occupies_every_identifier_slot() {
        let lookup = resolve(&[answer(Some("Chunk_A"), Some("ext-1"), 0.8)]);

        assert_eq!(lookup.len(), 3);
        assert_eq!(lookup.score("ext-1"), Some(0.8));
        assert_eq!(lookup.score("Chunk_A"), Some(0.8));
        assert_eq!(lookup.score("chunk_a"), Some(0.8));
        assert!(lookup.collisions().is_empty());
    }

    #[test]
    fn lowercase_chunk_id_collapses_to_one_slot() {
        let lookup = resolve(&[answer(Some("c2"), None, 0.5)]);
        assert_eq!(lookup.len(), 1);
        assert!(lookup.collisions().is_empty());
    }

    #[test]
    fn answers_without_identifiers_contribute_nothing() {
        let lookup = resolve(&[
            answer(None, None, 1.0),
            answer(Some("   "), Some(""), 1.0),
        ]);
        assert!(lookup.is_empty());
        assert_eq!(lookup.answer_count(), 2);
    }

    #[test]
    fn later_answer_wins_shared_key_by_default() {
        let lookup = resolve(&[
            answer(Some("shared"), None, 0.3),
            answer(Some("shared"), None, 0.9),
        ]);

        assert_eq!(lookup.score("shared"), Some(0.9));
        assert_eq!(
            lookup.get("shared").map(|entry| entry.answer_index),
            Some(1)
        );
        assert_eq!(lookup.collisions().len(), 1);
        assert_eq!(lookup.collisions()[0].kept_answer, 1);
        assert_eq!(lookup.collisions()[0].dropped_answer, 0);
    }

    #[test]
    fn first_wins_policy_keeps_earliest_answer() {
        let options = ResolveOptions {
            policy: CollisionPolicy::FirstWins,
            case: None,
        };
        let lookup = resolve_with(
            &[
                answer(None, Some("ext"), 0.3),
                answer(None, Some("ext"), 0.9),
            ],
            &options,
        );

        assert_eq!(lookup.score("ext"), Some(0.3));
        assert_eq!(lookup.collisions()[0].kept_answer, 0);
        assert_eq!(lookup.collisions()[0].dropped_answer, 1);
    }

    #[test]
    fn relevance_scores_are_kept_within_unit_interval() {
        let lookup = resolve(&[
            answer(Some("hi"), None, 1.7),
            answer(Some("lo"), None, -0.2),
            answer(Some("nan"), None, f64::NAN),
        ]);

        assert_eq!(lookup.score("hi"), Some(1.0));
        assert_eq!(lookup.score("lo"), Some(0.0));
        assert_eq!(lookup.score("nan"), Some(1.0));
        assert!(
            lookup
                .scores()
                .values()
                .all(|score| (0.0..=1.0).contains(score))
        );
    }

    #[test]
    fn case_context_synthesizes_external_ids_for_text_only_answers() {
        let options = ResolveOptions {
            policy: CollisionPolicy::LastWins,
            case: Some(CaseKey::new("ts1", "case9")),
        };
        let lookup = resolve_with(
            &[answer(Some("c1"), None, 1.0), answer(None, None, 0.6)],
            &options,
        );

        assert_eq!(lookup.score("test_set_ts1_case_case9_answer_1"), Some(0.6));
        assert!(lookup.get("test_set_ts1_case_case9_answer_0").is_none());
    }
}
