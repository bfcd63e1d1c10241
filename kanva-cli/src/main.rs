//! `kanva` - run plan analysis, chat and retrieval from JSON files.
//!
//! Configuration comes from the environment (a `.env` file is loaded first);
//! see `AdvisorConfig::from_env` for the variables.

mod input;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kanva_advisor::{Advisor, AdvisorConfig, ChatMessage};
use kanva_rag::build_rag_index;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "kanva", version, about = "Regulation-grounded floor-plan advisor")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a plan and print the summary and risks as JSON.
    Analyze(AnalyzeArgs),
    /// Answer one chat message and print the response as JSON.
    Chat(ChatArgs),
    /// Print the chunks most similar to a query, with scores.
    Retrieve(RetrieveArgs),
}

#[derive(Debug, Args)]
struct Sources {
    /// JSON array of rule records.
    #[arg(long, value_name = "FILE")]
    rules: PathBuf,

    /// JSON array of law article records.
    #[arg(long, value_name = "FILE")]
    articles: PathBuf,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Plan document, bare or wrapped in a plan version.
    #[arg(long, value_name = "FILE")]
    plan: PathBuf,

    #[command(flatten)]
    sources: Sources,

    /// JSON object with order context.
    #[arg(long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// JSON user profile.
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long)]
    message: String,

    #[command(flatten)]
    sources: Sources,

    #[arg(long, value_name = "FILE")]
    plan: Option<PathBuf>,

    /// JSON array of previous chat messages.
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    context: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RetrieveArgs {
    #[arg(long)]
    query: String,

    #[command(flatten)]
    sources: Sources,

    /// Number of chunks to return; defaults to the configured `RAG_TOP_K`.
    #[arg(long)]
    top_k: Option<usize>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_analyze(advisor: &Advisor, args: AnalyzeArgs) -> Result<()> {
    let plan = input::plan(&args.plan)?;
    let rules = input::rules(&args.sources.rules)?;
    let articles = input::articles(&args.sources.articles)?;
    let context = input::context(args.context.as_deref())?;
    let profile = input::profile(args.profile.as_deref())?;

    let result = advisor.analyze_plan(&plan, &context, &rules, &articles, profile.as_ref()).await;
    info!(risks = result.risks.len(), "analysis finished");
    print_json(&result)
}

async fn run_chat(advisor: &Advisor, args: ChatArgs) -> Result<()> {
    let plan = args.plan.as_deref().map(input::plan).transpose()?;
    let rules = input::rules(&args.sources.rules)?;
    let articles = input::articles(&args.sources.articles)?;
    let history = input::history(args.history.as_deref())?;
    let context = input::context(args.context.as_deref())?;
    let profile = input::profile(args.profile.as_deref())?;

    let response = advisor
        .process_chat_message(
            &ChatMessage::user(args.message),
            plan.as_ref(),
            &context,
            &history,
            &rules,
            &articles,
            profile.as_ref(),
        )
        .await;
    print_json(&response)
}

async fn run_retrieve(advisor: &Advisor, args: RetrieveArgs) -> Result<()> {
    let rules = input::rules(&args.sources.rules)?;
    let articles = input::articles(&args.sources.articles)?;
    let top_k = args.top_k.unwrap_or(advisor.config().rag.top_k);

    let embedder = advisor.embedder().as_ref();
    let index = build_rag_index(&rules, &articles, &advisor.config().rag, embedder).await?;
    let query = embedder.embed(&args.query).await?;
    let results = index.search(&query, top_k);
    info!(chunks = index.len(), returned = results.len(), "retrieval finished");
    print_json(&results)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.json_logs {
        kanva_telemetry::init_json_telemetry("kanva-cli")?;
    } else {
        kanva_telemetry::init_telemetry("kanva-cli")?;
    }

    let config = AdvisorConfig::from_env().context("invalid configuration")?;
    let advisor = Advisor::from_config(config)?;

    match cli.command {
        Command::Analyze(args) => run_analyze(&advisor, args).await,
        Command::Chat(args) => run_chat(&advisor, args).await,
        Command::Retrieve(args) => run_retrieve(&advisor, args).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn retrieve_arguments_parse() {
        let cli = Cli::try_parse_from([
            "kanva", "--json-logs", "retrieve", "--query", "кухня", "--rules", "r.json", "--articles", "a.json",
            "--top-k", "3",
        ])
        .unwrap();
        assert!(cli.json_logs);
        let Command::Retrieve(args) = cli.command else { panic!("expected retrieve") };
        assert_eq!(args.top_k, Some(3));
        assert_eq!(args.sources.rules, PathBuf::from("r.json"));
    }

    #[test]
    fn analyze_requires_a_plan() {
        assert!(Cli::try_parse_from(["kanva", "analyze", "--rules", "r.json", "--articles", "a.json"]).is_err());
    }
}
