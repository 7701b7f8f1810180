use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use rag_review::matching::{
    AnnotationSummary, CaseKey, IdentifierCollision, MatchResult, ResolveOptions, annotate,
    resolve_with, summarize,
};
use rag_review::model::{CaseResult, ExpectedAnswer};

use crate::cli::AnnotateArgs;
use crate::util::{
    condense_whitespace, now_utc_string, read_json, sha256_file, truncate_chars,
    write_json_pretty, write_json_stdout,
};

#[derive(Debug, Serialize)]
struct AnnotationReport {
    generated_at: String,
    source_path: String,
    source_sha256: String,
    collision_policy: String,
    synthetic_external_ids: bool,
    query: String,
    lookup_keys: usize,
    summary: AnnotationSummary,
    collisions: Vec<IdentifierCollision>,
    expected_answers: Vec<ExpectedAnswer>,
    results: Vec<MatchResult>,
}

pub fn run(args: AnnotateArgs) -> Result<()> {
    let case: CaseResult = read_json(&args.case_path)?;
    let report = build_report(&args, case)?;

    info!(
        path = %args.case_path.display(),
        retrieved = report.summary.retrieved,
        matched = report.summary.matched,
        expected = report.summary.expected_answers,
        lookup_keys = report.lookup_keys,
        collisions = report.collisions.len(),
        "annotated case result"
    );

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote annotation report");
    }

    if args.json {
        return write_json_stdout(&report, "annotation");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_text_report(&mut output, &report, args.snippet_chars)?;
    output.flush()?;
    Ok(())
}

fn build_report(args: &AnnotateArgs, case: CaseResult) -> Result<AnnotationReport> {
    let case_key = if args.synthesize_external_ids {
        resolve_case_key(&case, &args.case_path)
    } else {
        None
    };

    let options = ResolveOptions {
        policy: args.collision_policy.into(),
        case: case_key,
    };
    let lookup = resolve_with(&case.expected_answers, &options);
    let results = annotate(&case.retrieved_chunks, &lookup);
    let summary = summarize(&results, &lookup);

    Ok(AnnotationReport {
        generated_at: now_utc_string(),
        source_path: args.case_path.display().to_string(),
        source_sha256: sha256_file(&args.case_path)?,
        collision_policy: options.policy.as_str().to_string(),
        synthetic_external_ids: options.case.is_some(),
        query: case.query,
        lookup_keys: lookup.len(),
        summary,
        collisions: lookup.collisions().to_vec(),
        expected_answers: case.expected_answers,
        results,
    })
}

fn resolve_case_key(case: &CaseResult, path: &Path) -> Option<CaseKey> {
    let test_set_id = case.test_set_id.as_deref().map(str::trim).unwrap_or("");
    let test_case_id = case.test_case_id.as_deref().map(str::trim).unwrap_or("");

    if test_set_id.is_empty() || test_case_id.is_empty() {
        warn!(
            path = %path.display(),
            "case result lacks test_set_id/test_case_id; synthetic external ids disabled"
        );
        return None;
    }

    Some(CaseKey::new(test_set_id, test_case_id))
}

fn write_text_report<W: Write>(
    output: &mut W,
    report: &AnnotationReport,
    snippet_chars: usize,
) -> Result<()> {
    let summary = &report.summary;

    writeln!(output, "Query: {}", report.query)?;
    writeln!(
        output,
        "Expected answers: {} (lookup_keys={} collisions={} policy={} synthetic_ids={})",
        summary.expected_answers,
        report.lookup_keys,
        report.collisions.len(),
        report.collision_policy,
        report.synthetic_external_ids,
    )?;
    writeln!(
        output,
        "Matched: {}/{} first_match_rank={}",
        summary.matched,
        summary.retrieved,
        summary
            .first_match_rank
            .map(|rank| rank.to_string())
            .unwrap_or_else(|| "-".to_string()),
    )?;

    for result in &report.results {
        let item = &result.item;
        let marker = match (result.relevance_score, result.matched_by) {
            (Some(relevance), Some(matched_by)) => format!(
                "[expected relevance={relevance:.2} via={} answer=#{}]",
                matched_by.as_str(),
                result
                    .answer_index
                    .map(|index| index.to_string())
                    .unwrap_or_default()
            ),
            _ => "[-]".to_string(),
        };

        writeln!(
            output,
            "{}.\tscore={}\t{}\tchunk_id={}\tsource={}\toriginal_rank={}",
            result.display_rank,
            item.score
                .map(|score| format!("{score:.6}"))
                .unwrap_or_else(|| "n/a".to_string()),
            marker,
            item.chunk_id.as_deref().unwrap_or("-"),
            item.source.map(|source| source.as_str()).unwrap_or("-"),
            item.rank
                .map(|rank| rank.to_string())
                .unwrap_or_else(|| "-".to_string()),
        )?;

        let snippet = truncate_chars(&condense_whitespace(&item.content), snippet_chars);
        if !snippet.is_empty() {
            writeln!(output, "\t{snippet}")?;
        }
    }

    if !summary.unmatched_answers.is_empty() {
        writeln!(
            output,
            "Not retrieved: {}",
            describe_answers(&summary.unmatched_answers, &report.expected_answers)
        )?;
    }
    if !summary.shadowed_answers.is_empty() {
        writeln!(
            output,
            "Shadowed by shared identifier: {}",
            describe_answers(&summary.shadowed_answers, &report.expected_answers)
        )?;
    }
    if !summary.unresolvable_answers.is_empty() {
        writeln!(
            output,
            "No identifier: {}",
            describe_answers(&summary.unresolvable_answers, &report.expected_answers)
        )?;
    }

    Ok(())
}

fn describe_answers(indexes: &[usize], answers: &[ExpectedAnswer]) -> String {
    indexes
        .iter()
        .map(|index| {
            let identifier = answers
                .get(*index)
                .and_then(|answer| answer.external_id().or(answer.chunk_id()))
                .unwrap_or("text-only");
            format!("#{index} ({identifier})")
        })
        .collect::<Vec<String>>()
        .join(", ")
}
