use std::collections::BTreeSet;

use serde::Serialize;

use super::resolver::{IdentifierLookup, LookupEntry};
use crate::model::RetrievedItem;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    ExternalId,
    ChunkId,
    ChunkIdLowercase,
}

impl MatchedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExternalId => "external_id",
            Self::ChunkId => "chunk_id",
            Self::ChunkIdLowercase => "chunk_id_lowercase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub item: RetrievedItem,
    pub is_expected: bool,
    pub relevance_score: Option<f64>,
    pub display_rank: usize,
    pub matched_by: Option<MatchedBy>,
    pub answer_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnnotationSummary {
    pub retrieved: usize,
    pub matched: usize,
    pub first_match_rank: Option<usize>,
    pub expected_answers: usize,
    pub matched_answers: Vec<usize>,
    pub unmatched_answers: Vec<usize>,
    pub shadowed_answers: Vec<usize>,
    pub unresolvable_answers: Vec<usize>,
}

pub fn annotate(retrieved: &[RetrievedItem], lookup: &IdentifierLookup) -> Vec<MatchResult> {
    let mut ordered = retrieved.iter().collect::<Vec<&RetrievedItem>>();
    ordered.sort_by(|left, right| right.sort_score().total_cmp(&left.sort_score()));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let hit = match_item(item, lookup);
            MatchResult {
                item: item.clone(),
                is_expected: hit.is_some(),
                relevance_score: hit.map(|(_, entry)| entry.relevance_score),
                display_rank: index + 1,
                matched_by: hit.map(|(matched_by, _)| matched_by),
                answer_index: hit.map(|(_, entry)| entry.answer_index),
            }
        })
        .collect()
}

fn match_item(item: &RetrievedItem, lookup: &IdentifierLookup) -> Option<(MatchedBy, LookupEntry)> {
    let by_external_id = item
        .metadata_external_id()
        .and_then(|key| lookup.get(key))
        .map(|entry| (MatchedBy::ExternalId, *entry));
    if by_external_id.is_some() {
        return by_external_id;
    }

    let chunk_id = item
        .chunk_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())?;

    if let Some(entry) = lookup.get(chunk_id) {
        return Some((MatchedBy::ChunkId, *entry));
    }

    lookup
        .get(&chunk_id.to_lowercase())
        .map(|entry| (MatchedBy::ChunkIdLowercase, *entry))
}

pub fn summarize(results: &[MatchResult], lookup: &IdentifierLookup) -> AnnotationSummary {
    let matched_answers = results
        .iter()
        .filter_map(|result| result.answer_index)
        .collect::<BTreeSet<usize>>();
    let owning_answers = lookup
        .keys()
        .filter_map(|key| lookup.get(key))
        .map(|entry| entry.answer_index)
        .collect::<BTreeSet<usize>>();

    let mut unmatched_answers = Vec::new();
    let mut shadowed_answers = Vec::new();
    let mut unresolvable_answers = Vec::new();
    for answer_index in 0..lookup.answer_count() {
        if matched_answers.contains(&answer_index) {
            continue;
        }
        if owning_answers.contains(&answer_index) {
            unmatched_answers.push(answer_index);
        } else if lookup.is_keyed(answer_index) {
            shadowed_answers.push(answer_index);
        } else {
            unresolvable_answers.push(answer_index);
        }
    }

    AnnotationSummary {
        retrieved: results.len(),
        matched: results.iter().filter(|result| result.is_expected).count(),
        first_match_rank: results
            .iter()
            .find(|result| result.is_expected)
            .map(|result| result.display_rank),
        expected_answers: lookup.answer_count(),
        matched_answers: matched_answers.into_iter().collect(),
        unmatched_answers,
        shadowed_answers,
        unresolvable_answers,
    }
}
