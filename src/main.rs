//! Binary entry point — a stdin/stdout conversation loop.

use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use tellybot::bot::Bot;
use tellybot::error::AppError;
use tellybot::llm::providers::dummy::DummyProvider;
use tellybot::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use tellybot::llm::{LanguageModel, LlmBackend};
use tellybot::memory::SessionStore;
use tellybot::metadata::fixture::FixtureProvider;
use tellybot::metadata::tvdb::TvdbClient;
use tellybot::metadata::MetadataProvider;
use tellybot::{config, logger, Config};

#[tokio::main]
async fn main() -> ExitCode {
    // Absent .env is fine; real env vars always win.
    let _ = dotenvy::dotenv();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logger::init(&cfg.log_level) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<(), AppError> {
    info!(bot = %cfg.bot_name, llm = %cfg.llm.provider, metadata = %cfg.metadata.provider, "starting");

    let backend = build_llm_backend(&cfg)?;
    let llm = LanguageModel::new(backend, cfg.llm.narrate_input_budget);
    let provider = build_metadata_provider(&cfg)?;
    let store = SessionStore::new(
        Some(cfg.memory.max_history),
        Some(cfg.memory.session_ttl_hours),
    );
    let bot = Bot::new(store, llm, provider);

    repl(&cfg.bot_name, &bot).await
}

fn build_llm_backend(cfg: &Config) -> Result<LlmBackend, AppError> {
    match cfg.llm.provider.as_str() {
        "dummy" => Ok(LlmBackend::Dummy(DummyProvider::new())),
        "openai" => {
            let provider = OpenAiCompatibleProvider::new(
                cfg.llm.openai.api_base_url.clone(),
                cfg.llm.openai.model.clone(),
                cfg.llm.openai.timeout_seconds,
                cfg.llm_api_key.clone(),
            )
            .map_err(|e| AppError::Config(format!("llm provider: {e}")))?;
            Ok(LlmBackend::OpenAi(provider))
        }
        other => Err(AppError::Config(format!("unknown llm provider '{other}'"))),
    }
}

fn build_metadata_provider(cfg: &Config) -> Result<MetadataProvider, AppError> {
    match cfg.metadata.provider.as_str() {
        "fixture" => Ok(MetadataProvider::Fixture(FixtureProvider::sample())),
        "tvdb" => {
            let api_key = cfg.tvdb_api_key.clone().ok_or_else(|| {
                AppError::Config("TVDB_API_KEY must be set for the tvdb provider".into())
            })?;
            let client = TvdbClient::new(
                cfg.metadata.tvdb_api_url.clone(),
                api_key,
                cfg.tvdb_pin.clone(),
                cfg.metadata.timeout_seconds,
            )
            .map_err(|e| AppError::Config(format!("metadata provider: {e}")))?;
            Ok(MetadataProvider::Tvdb(client))
        }
        other => Err(AppError::Config(format!(
            "unknown metadata provider '{other}'"
        ))),
    }
}

/// Line-oriented conversation loop. One session key is minted on the first
/// turn and reused until EOF.
async fn repl(bot_name: &str, bot: &Bot) -> Result<(), AppError> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session_key: Option<String> = None;

    stdout
        .write_all(format!("{bot_name} ready. Ask about TV series and movies (Ctrl-D to quit).\n").as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let (reply, key) = bot.handle_turn(session_key.as_deref(), text).await;
        session_key = Some(key);
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
    }

    info!("shutting down");
    Ok(())
}
