use std::sync::Arc;

use anyhow::{Context, Result};
use ldes_core::{
    BatchReport, ExtractionEngine, HttpSpanModel, OpenAiCompatibleProvider, RuleExtractor,
    RuleSpec, Sector, SourceDocument,
};

use super::{load_config, load_taxonomy, ExtractArgs};

pub fn run(args: &ExtractArgs) -> Result<()> {
    let sector: Sector = args.sector.parse()?;
    let config = load_config(args.config.as_deref())?;
    let taxonomy = load_taxonomy(&config)?;

    let mut documents = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        documents.push(SourceDocument::new(path.display().to_string(), sector, text));
    }

    let engine = Arc::new(build_engine(args, config, taxonomy)?);

    let runtime = tokio::runtime::Runtime::new()?;
    let batch = runtime.block_on(engine.submit_batch(documents));

    for report in &batch.reports {
        println!("{}", serde_json::to_string(report)?);
    }
    if args.summary {
        print_summary(&batch);
    }
    Ok(())
}

fn build_engine(
    args: &ExtractArgs,
    config: ldes_core::EngineConfig,
    taxonomy: Arc<ldes_core::Taxonomy>,
) -> Result<ExtractionEngine> {
    let recognizer_timeout = config.recognizer.timeout();
    let llm_timeout = config.llm.timeout();
    let rule_confidence = config.rule_confidence;
    let mut engine = ExtractionEngine::new(config, taxonomy)?;

    if let Some(path) = &args.rules {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading rules {}", path.display()))?;
        let mut specs = RuleSpec::defaults();
        specs.extend(RuleSpec::from_json(&raw)?);
        engine = engine.with_rules(Box::new(RuleExtractor::from_specs(&specs, rule_confidence)));
    }

    if let Some(url) = &args.recognizer_url {
        let model = HttpSpanModel::new(url, recognizer_timeout)?;
        engine = engine.with_recognizer(Arc::new(model));
    }

    if let Some(url) = &args.llm_url {
        let mut provider = OpenAiCompatibleProvider::new(url, args.llm_model.clone(), llm_timeout)?
            .with_temperature(args.llm_temperature);
        if let Some(key) = &args.llm_api_key {
            provider = provider.with_api_key(key.clone());
        }
        engine = engine.with_llm(Arc::new(provider));
    }

    Ok(engine)
}

fn print_summary(batch: &BatchReport) {
    let stats = &batch.stats;
    eprintln!("Documents: {}", stats.documents);
    eprintln!("  Accepted: {}", stats.accepted);
    eprintln!("  Flagged:  {}", stats.flagged);
    eprintln!("  Rejected: {}", stats.rejected);
    eprintln!("  Errors:   {}", stats.failed);
    eprintln!("  Issues:   {}", stats.issues);
}
