use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use xml_strings_translator::auth::{Credentials, SessionRegistry};
use xml_strings_translator::config::Config;
use xml_strings_translator::github::GitHubStore;
use xml_strings_translator::languages;
use xml_strings_translator::server::{self, AppState};
use xml_strings_translator::session::Orchestrator;
use xml_strings_translator::store::{InMemoryStore, MemoryStore};
use xml_strings_translator::translation::OpenAiTranslator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xml_strings_translator=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("Starting XML strings translator");

    // Load configuration from environment
    let config = Config::from_env()?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let store: Arc<dyn MemoryStore> = match &config.github {
        Some(github) => Arc::new(GitHubStore::new(client.clone(), github.clone())),
        None => {
            warn!("GITHUB_TOKEN not set, translation memory lives only as long as this process");
            Arc::new(InMemoryStore::new())
        }
    };
    info!("Translation memory: {}", store.describe());

    let translator = Arc::new(OpenAiTranslator::new(client, &config));
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        translator,
        languages::target_languages(),
    ));
    let sessions = Arc::new(SessionRegistry::new(
        Credentials::new(&config.username, &config.password),
        chrono::Duration::minutes(config.session_ttl_minutes),
    ));

    let app = server::router(AppState {
        sessions,
        orchestrator,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✓ Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
