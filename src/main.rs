use std::fmt::Write as _;
use std::future::Future;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quarry_core::config::{Config, EmbeddingProviderKind, ProviderKind};
use quarry_core::{ProcessReport, ResearchSession};
use quarry_index::AnswerOutcome;
use quarry_llm::any::AnyProvider;
use quarry_llm::ollama::OllamaProvider;
use quarry_llm::openai::OpenAiProvider;
use tokio::sync::mpsc::UnboundedReceiver;

/// Ask questions about web pages and PDFs.
#[derive(Debug, Parser)]
#[command(name = "quarry", version)]
struct Cli {
    /// Configuration file (default: $QUARRY_CONFIG or config/default.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// URL to ingest; repeat for several
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Plain-text file with one URL per line
    #[arg(long, value_name = "PATH")]
    urls_file: Option<PathBuf>,

    /// Answer a single question and exit
    #[arg(long, short)]
    question: Option<String>,

    /// Dotenv file with secrets such as QUARRY_OPENAI_API_KEY
    #[arg(long, value_name = "PATH", default_value = ".config")]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    load_env_file(&cli.env_file);
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let (status_tx, mut status_rx) = tokio::sync::mpsc::unbounded_channel();

    let mut chat = create_chat_provider(&config)?;
    chat.set_status_tx(status_tx.clone());
    let embedder = create_embedder(&config)?;
    health_check(&chat).await;
    if !matches!(
        (&chat, &embedder),
        (AnyProvider::Ollama(_), AnyProvider::Ollama(_))
    ) {
        health_check(&embedder).await;
    }

    let input = read_url_input(&cli).await?;

    let mut session = ResearchSession::new(
        &config,
        Arc::new(chat),
        embedder.embed_fn(),
        embedding_model_name(&config),
    )
    .with_status_tx(status_tx);

    let report = with_status(&mut status_rx, session.process(&input))
        .await
        .context("processing halted")?;
    print_report(&report);

    if let Some(question) = cli.question {
        let outcome = with_status(&mut status_rx, session.ask(&question)).await?;
        println!("{}", render_outcome(&outcome));
        return Ok(());
    }

    if !std::io::stdin().is_terminal() {
        tracing::info!("stdin is not interactive and no --question was given, exiting");
        return Ok(());
    }

    loop {
        let input = match prompt_command().await? {
            Command::Quit => break,
            Command::Ask(question) => {
                match with_status(&mut status_rx, session.ask(&question)).await {
                    Ok(outcome) => println!("{}", render_outcome(&outcome)),
                    Err(e) => eprintln!("Error: {e}"),
                }
                continue;
            }
            Command::Urls => prompt_urls().await?,
            Command::Load(path) => match read_urls_file(path).await {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    continue;
                }
            },
        };
        // A failed run leaves no active index; the user can load another list.
        match with_status(&mut status_rx, session.process(&input)).await {
            Ok(report) => print_report(&report),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}

fn load_env_file(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("warning: failed to read {}: {e}", path.display()),
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("QUARRY_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn openai_key(config: &Config) -> anyhow::Result<String> {
    config
        .secrets
        .openai_api_key
        .as_ref()
        .map(|s| s.expose().to_owned())
        .context("QUARRY_OPENAI_API_KEY not found (set it in the environment or the .config file)")
}

fn create_chat_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.embedding.model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let openai = config.llm.openai.clone().unwrap_or_default();
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                openai_key(config)?,
                openai.base_url,
                openai.model,
                openai.max_tokens,
                None,
            )))
        }
    }
}

fn create_embedder(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.embedding.provider {
        EmbeddingProviderKind::Ollama => {
            let base_url = config
                .embedding
                .base_url
                .as_deref()
                .unwrap_or(&config.llm.base_url);
            Ok(AnyProvider::Ollama(OllamaProvider::new(
                base_url,
                config.llm.model.clone(),
                config.embedding.model.clone(),
            )))
        }
        EmbeddingProviderKind::OpenAi => {
            let openai = config.llm.openai.clone().unwrap_or_default();
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                openai_key(config)?,
                openai.base_url,
                openai.model,
                openai.max_tokens,
                Some(config.embedding.model.clone()),
            )))
        }
        #[cfg(feature = "candle")]
        EmbeddingProviderKind::Candle => {
            let candle = config.embedding.candle.clone().unwrap_or_default();
            let device = quarry_llm::candle_embed::select_device(&candle.device)?;
            Ok(AnyProvider::Candle(
                quarry_llm::candle_embed::CandleEmbedder::new(candle.repo_id, device),
            ))
        }
        #[cfg(not(feature = "candle"))]
        EmbeddingProviderKind::Candle => {
            anyhow::bail!("embedding provider candle not available (build with --features candle)")
        }
    }
}

/// Name that identifies the embedding model in index cache keys.
fn embedding_model_name(config: &Config) -> String {
    match config.embedding.provider {
        EmbeddingProviderKind::Candle => config
            .embedding
            .candle
            .as_ref()
            .map_or_else(
                || quarry_core::config::CandleEmbeddingConfig::default().repo_id,
                |c| c.repo_id.clone(),
            ),
        EmbeddingProviderKind::Ollama | EmbeddingProviderKind::OpenAi => {
            config.embedding.model.clone()
        }
    }
}

async fn health_check(provider: &AnyProvider) {
    match provider {
        AnyProvider::Ollama(ollama) => match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        },
        #[cfg(feature = "candle")]
        AnyProvider::Candle(candle) => {
            tracing::info!("candle embedder configured for {}", candle.repo_id());
        }
        _ => {}
    }
}

/// URL list from `--url` flags and `--urls-file`, else piped stdin, else an
/// interactive prompt.
async fn read_url_input(cli: &Cli) -> anyhow::Result<String> {
    let mut lines: Vec<String> = cli.urls.clone();
    if let Some(path) = &cli.urls_file {
        lines.push(read_urls_file(path.clone()).await?);
    }
    if !lines.is_empty() {
        return Ok(lines.join("\n"));
    }

    if std::io::stdin().is_terminal() {
        return prompt_urls().await;
    }

    tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map(|_| buf)
            .context("failed to read URLs from stdin")
    })
    .await?
}

async fn read_urls_file(path: PathBuf) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read URL file {}", path.display()))
    })
    .await?
}

async fn prompt_urls() -> anyhow::Result<String> {
    tokio::task::spawn_blocking(|| -> anyhow::Result<String> {
        println!("Enter URLs, one per line. Finish with an empty line.");
        let mut urls = Vec::new();
        loop {
            let line: String = dialoguer::Input::new()
                .with_prompt("URL")
                .allow_empty(true)
                .interact_text()?;
            if line.trim().is_empty() {
                break;
            }
            urls.push(line);
        }
        Ok(urls.join("\n"))
    })
    .await?
}

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask(String),
    /// Prompt for a new URL list and rebuild the index.
    Urls,
    /// Rebuild the index from a file of URLs.
    Load(PathBuf),
    Quit,
}

async fn prompt_command() -> anyhow::Result<Command> {
    let line: String = tokio::task::spawn_blocking(|| {
        dialoguer::Input::<String>::new()
            .with_prompt("Question (:urls or :load <file> for new sources, empty to quit)")
            .allow_empty(true)
            .interact_text()
    })
    .await??;
    Ok(parse_command(&line))
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("exit")
        || trimmed.eq_ignore_ascii_case("quit")
    {
        return Command::Quit;
    }
    if trimmed.eq_ignore_ascii_case(":urls") {
        return Command::Urls;
    }
    if let Some(rest) = trimmed.strip_prefix(":load") {
        let path = rest.trim();
        if rest.starts_with(char::is_whitespace) && !path.is_empty() {
            return Command::Load(PathBuf::from(path));
        }
    }
    Command::Ask(trimmed.to_owned())
}

/// Drive `fut` to completion while printing status lines in the order they
/// were sent.
async fn with_status<F: Future>(rx: &mut UnboundedReceiver<String>, fut: F) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            Some(msg) = rx.recv() => println!("{msg}"),
            out = &mut fut => {
                while let Ok(msg) = rx.try_recv() {
                    println!("{msg}");
                }
                return out;
            }
        }
    }
}

fn print_report(report: &ProcessReport) {
    if report.cached {
        println!("Using the existing index ({} chunks).", report.index_size);
        return;
    }
    for (i, snippet) in report.snippets.iter().enumerate() {
        println!("Document {} snippet: {snippet}...", i + 1);
    }
    if !report.failures.is_empty() {
        println!(
            "{} of {} sources failed to load.",
            report.failures.len(),
            report.sources
        );
    }
}

fn render_outcome(outcome: &AnswerOutcome) -> String {
    let mut out = match outcome.text() {
        Some(text) => format!("Answer:\n{text}\n"),
        None => "No answer found.\n".to_owned(),
    };
    if !outcome.contexts().is_empty() {
        out.push_str("\nSources:\n");
        for (i, ctx) in outcome.contexts().iter().enumerate() {
            let _ = match ctx.page {
                Some(page) => writeln!(out, "  [{}] {} (page {page})", i + 1, ctx.source),
                None => writeln!(out, "  [{}] {}", i + 1, ctx.source),
            };
        }
    }
    let _ = write!(
        out,
        "\nResponse time: {:.2}s",
        outcome.elapsed().as_secs_f64()
    );
    out
}
