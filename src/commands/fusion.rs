use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use rag_review::fusion::{FusionConfig, FusionConfigUpdate};

use crate::cli::FusionArgs;
use crate::util::{read_json, write_json_pretty, write_json_stdout};

const PREVIEW_RANKS: [usize; 3] = [1, 5, 10];

pub fn run(args: FusionArgs) -> Result<()> {
    let mut config = match &args.from {
        Some(path) => {
            let config: FusionConfig = read_json(path)?;
            info!(path = %path.display(), "loaded fusion configuration");
            config
        }
        None => FusionConfig::default(),
    };

    let update = update_from_args(&args);
    if !update.is_empty() {
        config.apply(&update);
    }

    info!(
        retrieval_mode = config.retrieval_mode().as_str(),
        top_k = config.top_k(),
        score_threshold = config.score_threshold(),
        fusion_method = config.fusion_method().as_str(),
        rrf_k = config.rrf_k(),
        semantic_weight = config.semantic_weight(),
        keyword_weight = config.keyword_weight(),
        "resolved fusion configuration"
    );

    let payload = config.to_payload();
    if let Some(output_path) = &args.output_path {
        write_json_pretty(output_path, &payload)?;
        info!(path = %output_path.display(), "wrote fusion configuration");
    }

    if !args.explain {
        return write_json_stdout(&payload, "fusion configuration");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_explanation(&mut output, &config)?;
    output.flush()?;
    Ok(())
}

fn update_from_args(args: &FusionArgs) -> FusionConfigUpdate {
    FusionConfigUpdate {
        retrieval_mode: args.retrieval_mode.map(Into::into),
        top_k: args.top_k,
        score_threshold: args.score_threshold,
        fusion_method: args.fusion_method.map(Into::into),
        rrf_k: args.rrf_k,
        semantic_weight: args.semantic_weight,
        keyword_weight: args.keyword_weight,
    }
}

fn write_explanation<W: Write>(output: &mut W, config: &FusionConfig) -> Result<()> {
    writeln!(output, "retrieval_mode: {}", config.retrieval_mode().as_str())?;
    writeln!(output, "top_k: {}", config.top_k())?;
    writeln!(output, "score_threshold: {:.2}", config.score_threshold())?;

    if !config.uses_fusion() {
        writeln!(output, "fusion: inactive (single retriever)")?;
        return Ok(());
    }

    writeln!(output, "fusion_method: {}", config.fusion_method().as_str())?;

    if config.uses_rrf() {
        writeln!(output, "rrf_k: {}", config.rrf_k())?;
        for rank in PREVIEW_RANKS {
            writeln!(
                output,
                "  rank {rank:>2} contributes {:.6}",
                config.rrf_contribution(rank)
            )?;
        }
    }

    if config.uses_weights() {
        writeln!(
            output,
            "weights: semantic={:.2} keyword={:.2}",
            config.semantic_weight(),
            config.keyword_weight()
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{update_from_args, write_explanation};
    use crate::cli::{FusionArgs, FusionMethodArg, RetrievalModeArg};
    use rag_review::fusion::{FusionConfig, FusionMethod, RetrievalMode};

    fn args() -> FusionArgs {
        FusionArgs {
            from: None,
            retrieval_mode: None,
            top_k: None,
            score_threshold: None,
            fusion_method: None,
            rrf_k: None,
            semantic_weight: None,
            keyword_weight: None,
            output_path: None,
            explain: false,
        }
    }

    fn explain(config: &FusionConfig) -> String {
        let mut buffer = Vec::new();
        write_explanation(&mut buffer, config).expect("explanation should render");
        String::from_utf8(buffer).expect("explanation should be utf-8")
    }

    #[test]
    fn no_flags_leave_defaults_untouched() {
        let update = update_from_args(&args());
        assert!(update.is_empty());

        let mut config = FusionConfig::default();
        config.apply(&update);
        assert_eq!(config, FusionConfig::default());
    }

    #[test]
    fn flags_are_coerced_through_the_model() {
        let mut flags = args();
        flags.fusion_method = Some(FusionMethodArg::Weighted);
        flags.top_k = Some(0);
        flags.semantic_weight = Some(0.65);

        let mut config = FusionConfig::default();
        config.apply(&update_from_args(&flags));

        assert_eq!(config.fusion_method(), FusionMethod::Weighted);
        assert_eq!(config.top_k(), 10);
        assert_eq!(config.semantic_weight(), 0.65);
        assert_eq!(config.keyword_weight(), 0.35);
    }

    #[test]
    fn default_explanation_previews_rrf_contributions() {
        let text = explain(&FusionConfig::default());

        assert!(text.contains("retrieval_mode: hybrid"));
        assert!(text.contains("fusion_method: rrf"));
        assert!(text.contains("rrf_k: 60"));
        assert!(text.contains("rank  1 contributes 0.016393"));
        assert!(!text.contains("weights:"));
    }

    #[test]
    fn weighted_explanation_hides_rrf_controls() {
        let mut config = FusionConfig::default();
        config.set_fusion_method(FusionMethod::Weighted);
        config.set_keyword_weight(0.1);

        let text = explain(&config);
        assert!(text.contains("weights: semantic=0.90 keyword=0.10"));
        assert!(!text.contains("rrf_k"));
    }

    #[test]
    fn single_retriever_explanation_omits_fusion_controls() {
        let mut flags = args();
        flags.retrieval_mode = Some(RetrievalModeArg::Keyword);

        let mut config = FusionConfig::default();
        config.apply(&update_from_args(&flags));
        assert_eq!(config.retrieval_mode(), RetrievalMode::Keyword);

        let text = explain(&config);
        assert!(text.contains("fusion: inactive"));
        assert!(!text.contains("fusion_method"));
    }
}
