//! Parley API server binary.
//!
//! Serves the chat API over HTTP, relaying prompts to the OpenAI Responses
//! API and keeping each conversation's continuation token in memory.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parley_api::config::{ApiConfig, DEFAULT_CORS_ORIGIN};
use parley_core::chat::ChatService;
use parley_core::completion::{OpenAiConfig, OpenAiProvider};
use parley_core::conversation::{ConversationStore, StoreConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "parley_api_server", about = "Parley chat API server")]
struct Args {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Browser origin allowed to call the API (`*` for any).
    #[arg(long, env = "CORS_ORIGIN", default_value = DEFAULT_CORS_ORIGIN)]
    cors_origin: String,

    /// Seconds a conversation may sit idle before it is forgotten.
    #[arg(long, env = "CONVERSATION_TTL_SECS", default_value_t = 86_400)]
    conversation_ttl_secs: u64,

    /// Maximum number of conversations kept in memory.
    #[arg(
        long,
        env = "MAX_CONVERSATIONS",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    max_conversations: u64,

    /// Seconds between sweeps for expired conversations.
    #[arg(
        long,
        env = "EVICTION_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    eviction_interval_secs: u64,

    /// Upper bound on a single completion request, in seconds.
    #[arg(
        long,
        env = "COMPLETION_TIMEOUT_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    completion_timeout_secs: u64,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            ttl: Duration::from_secs(self.conversation_ttl_secs),
            max_entries: usize::try_from(self.max_conversations).unwrap_or(usize::MAX),
        }
    }

    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            cors_origin: self.cors_origin.clone(),
        }
    }
}

/// Cancel `shutdown` on Ctrl-C.
async fn watch_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,parley_api=debug,parley_core=debug")
                }),
        )
        .init();

    let args = Args::parse();
    let completion_timeout = Duration::from_secs(args.completion_timeout_secs);

    let mut openai = OpenAiConfig::from_env()?;
    openai.request_timeout = completion_timeout;
    info!(model = %openai.model, base_url = %openai.base_url, "configuring OpenAI provider");
    let provider = Arc::new(OpenAiProvider::new(openai)?);

    let store_config = args.store_config();
    info!(
        ttl_secs = store_config.ttl.as_secs(),
        max_entries = store_config.max_entries,
        "configuring conversation store"
    );
    let store = Arc::new(ConversationStore::with_config(store_config));

    let chat = Arc::new(
        ChatService::new(store.clone(), provider).with_completion_timeout(completion_timeout),
    );
    let config = args.api_config();
    let state = parley_api::AppState {
        chat,
        config: config.clone(),
    };
    let app = parley_api::router(state);

    let shutdown = CancellationToken::new();
    let eviction = store.spawn_eviction_task(
        Duration::from_secs(args.eviction_interval_secs),
        shutdown.clone(),
    );
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, cors_origin = %config.cors_origin, "REST API listening");

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    // When the REST API exits, also stop the eviction sweep.
    shutdown.cancel();
    join_eviction_task(eviction).await;

    api_result?;

    Ok(())
}

/// Wait for the eviction sweep to finish, logging it if the task panicked.
async fn join_eviction_task(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "conversation eviction task failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn explicit_args_build_configs() {
        let args = Args::try_parse_from([
            "parley_api_server",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--cors-origin",
            "*",
            "--conversation-ttl-secs",
            "120",
            "--max-conversations",
            "5",
        ])
        .unwrap();

        let api = args.api_config();
        assert_eq!(api.bind_addr, "0.0.0.0:8080");
        assert_eq!(api.cors_origin, "*");

        let store = args.store_config();
        assert_eq!(store.ttl, Duration::from_secs(120));
        assert_eq!(store.max_entries, 5);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(
            Args::try_parse_from(["parley_api_server", "--eviction-interval-secs", "0"]).is_err()
        );
        assert!(
            Args::try_parse_from(["parley_api_server", "--completion-timeout-secs", "0"]).is_err()
        );
        assert!(Args::try_parse_from(["parley_api_server", "--max-conversations", "0"]).is_err());
    }

    #[tokio::test]
    async fn eviction_task_join_reports_clean_exit() {
        let store = Arc::new(ConversationStore::new());
        let shutdown = CancellationToken::new();
        let handle = store.spawn_eviction_task(Duration::from_secs(60), shutdown.clone());

        shutdown.cancel();
        assert!(join_eviction_task(handle).await);
    }

    #[tokio::test]
    async fn eviction_task_join_reports_panic() {
        let handle = tokio::spawn(async { panic!("sweep failed") });
        assert!(!join_eviction_task(handle).await);
    }
}
