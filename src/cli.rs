use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use rag_review::fusion::{FusionMethod, RetrievalMode};
use rag_review::matching::CollisionPolicy;
use rag_review::model::MetricGroupKind;

#[derive(Parser, Debug)]
#[command(
    name = "rag-review",
    version,
    about = "Retrieval audit and evaluation run comparison tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Annotate(AnnotateArgs),
    Compare(CompareArgs),
    Fusion(FusionArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CollisionPolicyArg {
    LastWins,
    FirstWins,
}

impl From<CollisionPolicyArg> for CollisionPolicy {
    fn from(value: CollisionPolicyArg) -> Self {
        match value {
            CollisionPolicyArg::LastWins => Self::LastWins,
            CollisionPolicyArg::FirstWins => Self::FirstWins,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    #[arg(long)]
    pub case_path: PathBuf,

    #[arg(long, value_enum, default_value_t = CollisionPolicyArg::LastWins)]
    pub collision_policy: CollisionPolicyArg,

    #[arg(long, default_value_t = false)]
    pub synthesize_external_ids: bool,

    #[arg(long, default_value_t = 160)]
    pub snippet_chars: usize,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MetricGroupArg {
    Retrieval,
    RagasRetrieval,
    RagasGeneration,
}

impl From<MetricGroupArg> for MetricGroupKind {
    fn from(value: MetricGroupArg) -> Self {
        match value {
            MetricGroupArg::Retrieval => Self::Retrieval,
            MetricGroupArg::RagasRetrieval => Self::RagasRetrieval,
            MetricGroupArg::RagasGeneration => Self::RagasGeneration,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub subjects_path: PathBuf,

    #[arg(long = "select")]
    pub selected: Vec<String>,

    #[arg(long = "group", value_enum)]
    pub groups: Vec<MetricGroupArg>,

    #[arg(long, default_value_t = false)]
    pub skip_overall_score: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RetrievalModeArg {
    Semantic,
    Keyword,
    Hybrid,
}

impl From<RetrievalModeArg> for RetrievalMode {
    fn from(value: RetrievalModeArg) -> Self {
        match value {
            RetrievalModeArg::Semantic => Self::Semantic,
            RetrievalModeArg::Keyword => Self::Keyword,
            RetrievalModeArg::Hybrid => Self::Hybrid,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FusionMethodArg {
    Rrf,
    Weighted,
}

impl From<FusionMethodArg> for FusionMethod {
    fn from(value: FusionMethodArg) -> Self {
        match value {
            FusionMethodArg::Rrf => Self::Rrf,
            FusionMethodArg::Weighted => Self::Weighted,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FusionArgs {
    #[arg(long)]
    pub from: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub retrieval_mode: Option<RetrievalModeArg>,

    #[arg(long, allow_negative_numbers = true)]
    pub top_k: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    pub score_threshold: Option<f64>,

    #[arg(long, value_enum)]
    pub fusion_method: Option<FusionMethodArg>,

    #[arg(long, allow_negative_numbers = true)]
    pub rrf_k: Option<i64>,

    #[arg(long, allow_negative_numbers = true, conflicts_with = "keyword_weight")]
    pub semantic_weight: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    pub keyword_weight: Option<f64>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub explain: bool,
}
