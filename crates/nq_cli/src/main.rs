use chrono::NaiveDate;
use clap::Parser;
use nq_core::{parse_date, DateRange, Error, GenerationParams, Query, Result};
use nq_inference::pipeline::{HistoryMode, Pipeline, PipelineConfig};
use nq_inference::prompt::AssemblyMode;
use nq_inference::{create_model, Config, ModelKind};
use nq_storage::{create_store, ElasticConfig, StoreKind, StoreSettings, TableConfig};
use nq_web::AppState;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod render;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ask questions answered from the news archive", long_about = None)]
pub struct Cli {
    #[arg(long, env = "NQ_BACKEND", default_value = "table", help = "Article source: table (spreadsheet or CSV export) or elastic")]
    backend: StoreKind,
    #[arg(long, env = "NQ_DATA_PATH")]
    data: Option<PathBuf>,
    #[arg(long, env = "NQ_ES_URL")]
    es_url: Option<String>,
    #[arg(long, env = "NQ_ES_INDEX")]
    es_index: Option<String>,
    #[arg(long, env = "NQ_MODEL", default_value = "openai", help = "Model used to answer. Available models: openai (default), dummy")]
    model: ModelKind,
    #[arg(long, env = "NQ_MODEL_NAME")]
    model_name: Option<String>,
    #[arg(long, env = "NQ_MODEL_URL")]
    model_url: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, default_value = "flat", help = "Answer layout: flat, chronological or summary")]
    mode: AssemblyMode,
    /// System persona replacing the one of the chosen mode
    #[arg(long, env = "NQ_PERSONA")]
    persona: Option<String>,
    /// Completion length limit (defaults per mode: 500, 1500, 1000)
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    temperature: Option<f32>,
    #[arg(long, default_value_t = 5)]
    limit: usize,
    /// Ask the model for search keywords before searching
    #[arg(long)]
    keywords: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Answer a single question
    Ask {
        #[arg(required = true)]
        text: Vec<String>,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Interactive session keeping the conversation history
    Chat {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct RangeArgs {
    /// Earliest publication date (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long, value_parser = parse_cli_date)]
    from: Option<NaiveDate>,
    /// Latest publication date, inclusive
    #[arg(long, value_parser = parse_cli_date)]
    to: Option<NaiveDate>,
}

impl From<RangeArgs> for DateRange {
    fn from(args: RangeArgs) -> Self {
        DateRange::new(args.from, args.to)
    }
}

fn parse_cli_date(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("invalid date '{}'", s))
}

impl Cli {
    fn store_settings(&self) -> Result<StoreSettings> {
        let table = self.data.as_ref().map(TableConfig::new);
        let mut elastic = ElasticConfig::new();
        if let Some(url) = &self.es_url {
            elastic = elastic.with_url(url)?;
        }
        if let Some(index) = &self.es_index {
            elastic = elastic.with_index(index);
        }
        Ok(StoreSettings {
            kind: self.backend,
            table,
            elastic: Some(elastic),
        })
    }

    fn model_config(&self) -> Config {
        Config {
            kind: self.model,
            api_key: self.api_key.clone(),
            model_name: self.model_name.clone(),
            model_url: self.model_url.clone(),
        }
    }

    fn pipeline_config(&self, history: HistoryMode) -> PipelineConfig {
        PipelineConfig {
            mode: self.mode,
            history,
            limit: self.limit,
            keyword_extraction: self.keywords,
            persona: self.persona.clone(),
            params: self.generation_params(),
        }
    }

    fn generation_params(&self) -> Option<GenerationParams> {
        if self.max_tokens.is_none() && self.temperature.is_none() {
            return None;
        }
        let defaults = self.mode.params();
        Some(GenerationParams {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
        })
    }
}

/// Builds the pipeline. The inner `Err` carries the reason when the article
/// source could not be loaded; any other failure is fatal.
async fn open_pipeline(cli: &Cli, history: HistoryMode) -> Result<std::result::Result<Pipeline, String>> {
    let model = create_model(&cli.model_config())?;
    match create_store(cli.store_settings()?).await {
        Ok(store) => {
            info!("✨ Article store ready (using {})", store.name());
            Ok(Ok(Pipeline::new(store, model, cli.pipeline_config(history))))
        }
        Err(Error::DataLoadFailed(message)) => {
            error!("Article source unavailable: {}", message);
            Ok(Err(message))
        }
        Err(e) => Err(e),
    }
}

async fn run_chat(pipeline: &Pipeline, range: DateRange) -> Result<()> {
    let mut session = pipeline.session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Posez votre question (/quit pour sortir).");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let query = Query::new(text).with_range(range);
        let response = pipeline.answer_in_session(&mut session, &query).await;
        render::print_response(&response);
    }
    info!("👋 Session closed after {} messages", session.history().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Ask { text, range } => {
            let pipeline = match open_pipeline(&cli, HistoryMode::Stateless).await? {
                Ok(pipeline) => pipeline,
                Err(message) => {
                    eprintln!("❌ {}", message);
                    return Ok(());
                }
            };
            let query = Query::new(text.join(" ")).with_range((*range).into());
            let response = pipeline.answer(&query).await;
            render::print_response(&response);
        }
        Commands::Chat { range } => {
            let pipeline = match open_pipeline(&cli, HistoryMode::SessionLog).await? {
                Ok(pipeline) => pipeline,
                Err(message) => {
                    eprintln!("❌ {}", message);
                    return Ok(());
                }
            };
            run_chat(&pipeline, (*range).into()).await?;
        }
        Commands::Serve { addr } => {
            let state = match open_pipeline(&cli, HistoryMode::Stateless).await? {
                Ok(pipeline) => AppState::ready(pipeline),
                Err(message) => AppState::unavailable(message),
            };
            nq_web::serve(state, *addr).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nq").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_summary_mode_flag() {
        let cli = parse(&["--mode", "summary", "ask", "budget"]);
        let config = cli.pipeline_config(HistoryMode::Stateless);
        assert_eq!(config.mode, AssemblyMode::Summary);
        assert_eq!(config.params, None);
        assert_eq!(config.persona, None);
    }

    #[test]
    fn test_generation_overrides_keep_mode_defaults() {
        let cli = parse(&["--mode", "summary", "--max-tokens", "200", "ask", "budget"]);
        let params = cli.pipeline_config(HistoryMode::Stateless).params.unwrap();
        assert_eq!(params.max_tokens, 200);
        assert_eq!(params.temperature, 0.7);

        let cli = parse(&["--temperature", "0.1", "--persona", "Tu es bref.", "chat"]);
        let config = cli.pipeline_config(HistoryMode::SessionLog);
        assert_eq!(config.params, Some(GenerationParams { max_tokens: 500, temperature: 0.1 }));
        assert_eq!(config.persona.as_deref(), Some("Tu es bref."));
    }

    #[test]
    fn test_serve_addr_default() {
        let cli = parse(&["serve"]);
        match cli.command {
            Commands::Serve { addr } => assert_eq!(addr.port(), 8000),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
