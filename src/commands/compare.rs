use std::io::{self, Write};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rag_review::compare::{
    ComparisonMatrix, ComparisonSubject, Intensity, MatrixOptions, SelectionSet, build_matrix,
};
use rag_review::model::MetricGroupKind;

use crate::cli::CompareArgs;
use crate::util::{now_utc_string, read_json, sha256_file, write_json_pretty, write_json_stdout};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectsFile {
    List(Vec<ComparisonSubject>),
    Page { subjects: Vec<ComparisonSubject> },
}

impl SubjectsFile {
    fn into_subjects(self) -> Vec<ComparisonSubject> {
        match self {
            Self::List(subjects) | Self::Page { subjects } => subjects,
        }
    }
}

#[derive(Debug, Serialize)]
struct ComparisonReport {
    generated_at: String,
    source_path: String,
    source_sha256: String,
    selected: SelectionSet,
    pruned: Vec<String>,
    matrix: ComparisonMatrix,
}

pub fn run(args: CompareArgs) -> Result<()> {
    let subjects = read_json::<SubjectsFile>(&args.subjects_path)?.into_subjects();
    let (selection, pruned) = select_subjects(&subjects, &args.selected);

    for id in &pruned {
        warn!(id = %id, "selected evaluation is not on the current page; ignoring");
    }
    if selection.is_empty() {
        bail!(
            "no evaluations selected for comparison from {}",
            args.subjects_path.display()
        );
    }

    let options = matrix_options(&args);
    let matrix = build_matrix(&subjects, &selection, &options);

    info!(
        path = %args.subjects_path.display(),
        page = subjects.len(),
        selected = selection.len(),
        rows = matrix.rows.len(),
        "built comparison heatmap"
    );

    let report = ComparisonReport {
        generated_at: now_utc_string(),
        source_path: args.subjects_path.display().to_string(),
        source_sha256: sha256_file(&args.subjects_path)?,
        selected: selection,
        pruned,
        matrix,
    };

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote comparison report");
    }

    if args.json {
        return write_json_stdout(&report, "comparison");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_text_matrix(&mut output, &report.matrix)?;
    output.flush()?;
    Ok(())
}

fn select_subjects(
    subjects: &[ComparisonSubject],
    requested: &[String],
) -> (SelectionSet, Vec<String>) {
    if requested.is_empty() {
        let all = subjects
            .iter()
            .map(ComparisonSubject::id)
            .collect::<SelectionSet>();
        return (all, Vec::new());
    }

    let mut selection = requested
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect::<SelectionSet>();
    let pruned = selection.prune(subjects.iter().map(ComparisonSubject::id));
    (selection, pruned)
}

fn matrix_options(args: &CompareArgs) -> MatrixOptions {
    let groups = if args.groups.is_empty() {
        MetricGroupKind::ALL.to_vec()
    } else {
        let mut groups = Vec::with_capacity(args.groups.len());
        for group in args.groups.iter().copied().map(MetricGroupKind::from) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    };

    MatrixOptions {
        groups,
        include_overall_score: !args.skip_overall_score,
    }
}

fn write_text_matrix<W: Write>(output: &mut W, matrix: &ComparisonMatrix) -> Result<()> {
    if matrix.is_empty() {
        writeln!(output, "No metrics recorded for the selected evaluations.")?;
        return Ok(());
    }

    let metric_width = matrix
        .rows
        .iter()
        .map(|row| row_label(row.source.short_label(), &row.metric.to_string()).len())
        .max()
        .unwrap_or(0)
        .max("metric".len());
    let column_width = matrix
        .subjects
        .iter()
        .map(|subject| subject.label.chars().count())
        .max()
        .unwrap_or(0)
        .max(8);

    write!(output, "{:<metric_width$}", "metric")?;
    for subject in &matrix.subjects {
        write!(output, "  {:>column_width$}", subject.label)?;
    }
    writeln!(output, "  range")?;

    for row in &matrix.rows {
        let label = row_label(row.source.short_label(), &row.metric.to_string());
        write!(output, "{label:<metric_width$}")?;
        for cell in &row.cells {
            let rendered = match (cell.value, cell.intensity) {
                (Some(value), Some(intensity)) => format!("{value:.4} {}", intensity.glyph()),
                (Some(value), None) => format!("{value:.4}"),
                _ => "-".to_string(),
            };
            write!(output, "  {rendered:>column_width$}")?;
        }
        writeln!(output, "  [{:.4}, {:.4}]", row.range.min, row.range.max)?;
    }

    let legend = Intensity::ALL
        .iter()
        .map(|level| format!("{} {}", level.glyph(), level.label()))
        .collect::<Vec<String>>()
        .join("  ");
    writeln!(output, "legend: {legend}")?;

    Ok(())
}

fn row_label(source: &str, metric: &str) -> String {
    format!("{source}/{metric}")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{SubjectsFile, matrix_options, select_subjects, write_text_matrix};
    use crate::cli::{CompareArgs, MetricGroupArg};
    use rag_review::compare::{MatrixOptions, build_matrix};
    use rag_review::model::MetricGroupKind;

    fn page() -> serde_json::Value {
        serde_json::json!({
            "subjects": [
                {
                    "task": {"id": "t1", "task_name": "dense", "status": "completed"},
                    "summary": {
                        "evaluation_task_id": "t1",
                        "overall_retrieval_metrics": {"recall@10": 0.2},
                        "overall_ragas_score": 0.4
                    }
                },
                {
                    "task": {"id": "t2", "task_name": "hybrid", "status": "completed"},
                    "summary": {
                        "evaluation_task_id": "t2",
                        "overall_retrieval_metrics": {"recall@10": 0.9}
                    }
                }
            ]
        })
    }

    fn args(groups: Vec<MetricGroupArg>, skip_overall_score: bool) -> CompareArgs {
        CompareArgs {
            subjects_path: PathBuf::from("subjects.json"),
            selected: Vec::new(),
            groups,
            skip_overall_score,
            report_path: None,
            json: false,
        }
    }

    #[test]
    fn subjects_file_accepts_list_or_page_object() {
        let paged: SubjectsFile = serde_json::from_value(page()).expect("page should parse");
        assert_eq!(paged.into_subjects().len(), 2);

        let list: SubjectsFile = serde_json::from_value(page()["subjects"].clone())
            .expect("list should parse");
        assert_eq!(list.into_subjects().len(), 2);
    }

    #[test]
    fn empty_request_selects_whole_page() {
        let subjects = serde_json::from_value::<SubjectsFile>(page())
            .expect("page should parse")
            .into_subjects();

        let (selection, pruned) = select_subjects(&subjects, &[]);
        assert_eq!(selection.iter().collect::<Vec<&str>>(), vec!["t1", "t2"]);
        assert!(pruned.is_empty());
    }

    #[test]
    fn stale_requested_ids_are_pruned() {
        let subjects = serde_json::from_value::<SubjectsFile>(page())
            .expect("page should parse")
            .into_subjects();

        let requested = vec!["t2".to_string(), "gone".to_string(), "  ".to_string()];
        let (selection, pruned) = select_subjects(&subjects, &requested);
        assert_eq!(selection.iter().collect::<Vec<&str>>(), vec!["t2"]);
        assert_eq!(pruned, vec!["gone".to_string()]);
    }

    #[test]
    fn options_default_to_all_groups_and_dedupe_requests() {
        let all = matrix_options(&args(Vec::new(), false));
        assert_eq!(all.groups, MetricGroupKind::ALL.to_vec());
        assert!(all.include_overall_score);

        let picked = matrix_options(&args(
            vec![MetricGroupArg::RagasGeneration, MetricGroupArg::RagasGeneration],
            true,
        ));
        assert_eq!(picked.groups, vec![MetricGroupKind::RagasGeneration]);
        assert!(!picked.include_overall_score);
    }

    #[test]
    fn text_matrix_shows_values_glyphs_and_ranges() {
        let subjects = serde_json::from_value::<SubjectsFile>(page())
            .expect("page should parse")
            .into_subjects();
        let (selection, _) = select_subjects(&subjects, &[]);
        let matrix = build_matrix(&subjects, &selection, &MatrixOptions::default());

        let mut buffer = Vec::new();
        write_text_matrix(&mut buffer, &matrix).expect("matrix should render");
        let text = String::from_utf8(buffer).expect("matrix should be utf-8");

        let recall = text
            .lines()
            .find(|line| line.contains("recall@10"))
            .expect("recall row should render");
        assert!(recall.contains("0.2000 ·"));
        assert!(recall.contains("0.9000 █"));
        assert!(recall.ends_with("[0.2000, 0.9000]"));

        let overall = text
            .lines()
            .find(|line| line.contains("overall_ragas_score"))
            .expect("overall score row should render");
        assert!(overall.contains("0.4000"));
        assert!(overall.contains(" -"));

        assert!(text.ends_with("legend: · very-low  ░ low  ▒ medium  ▓ high  █ very-high\n"));
    }
}
