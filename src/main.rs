use std::{process::exit, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use nutrichat::{
    embedder::OnnxEncoder,
    evaluation::RelevanceEvaluator,
    llm::{GenerationClient, OllamaChat, OpenAiChat},
    search::{ElasticClient, Retriever},
    settings::{Args, Settings},
    NutriChat,
};
use tracing::info;

fn build(settings: &Settings) -> Result<NutriChat> {
    let search = ElasticClient::new(&settings.search.url)?;
    let encoder = OnnxEncoder::load(&settings.encoder.model_dir).with_context(|| {
        format!(
            "Problem while loading encoder from {}",
            settings.encoder.model_dir.display()
        )
    })?;
    let retriever = Retriever::new(Arc::new(search), Arc::new(encoder))
        .with_index(&settings.search.index)
        .with_vector_field(&settings.search.vector_field);

    let generator = GenerationClient::new()
        .with_backend(
            "openai",
            Arc::new(OpenAiChat::new(&settings.openai.url, &settings.openai.api_key)?),
        )
        .with_backend("ollama", Arc::new(OllamaChat::new(&settings.ollama.url)?));
    let evaluator =
        RelevanceEvaluator::new(generator.clone()).with_judge_model(&settings.judge_model);

    Ok(NutriChat::new(retriever, generator, evaluator))
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let nutri = build(&settings)?;
    info!(
        "Answering with {} using {} search in '{}'",
        args.model, args.search, args.category
    );
    let report = nutri
        .answer_query(&args.question, &args.category, &args.model, args.search)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while loading settings. {error}");
            exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(
            settings
                .log_level
                .parse()
                .unwrap_or(tracing::Level::INFO),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(args, settings).await {
        eprintln!("Problem while answering the question. {error:#}");
        exit(1);
    }
}
