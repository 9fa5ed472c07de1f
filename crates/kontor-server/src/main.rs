use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use kontor_api::{AppState, AppStateInner, LiveKitConfig, SignalConfig, StripeConfig};
use kontor_check::{CounterpartyChecker, FixtureRegistry};
use kontor_model::{ContainerClient, GeminiClient, ModelRouter, OpenAiClient, Provider};
use kontor_types::Module;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kontor=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("KONTOR_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("KONTOR_DB_PATH").unwrap_or_else(|_| "kontor.db".into());
    let host = std::env::var("KONTOR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("KONTOR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = kontor_db::Database::open(&PathBuf::from(&db_path))?;

    let router = build_model_router();

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        admin_email: env_opt("ADMIN_EMAIL"),
        router,
        checker: CounterpartyChecker::new(Arc::new(FixtureRegistry)),
        http: reqwest::Client::new(),
        stripe: StripeConfig {
            secret_key: env_opt("STRIPE_SECRET_KEY"),
            webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            price_id: env_opt("STRIPE_PRICE_ID"),
            success_url: std::env::var("STRIPE_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:5173/payment-success".into()),
            cancel_url: std::env::var("STRIPE_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:5173/payment-canceled".into()),
        },
        livekit: livekit_config(),
        signal: SignalConfig {
            cli_path: std::env::var("SIGNAL_CLI_PATH").unwrap_or_else(|_| "signal-cli".into()),
            sender_number: env_opt("SIGNAL_SENDER_NUMBER"),
        },
    });

    let app = kontor_api::api_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Kontor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Per-module provider chains: hosted APIs first, local model containers as
/// the last resort before the canned fallback.
fn build_model_router() -> ModelRouter {
    let gemini_key = env_opt("GEMINI_API_KEY");
    let openai_key = env_opt("OPENAI_API_KEY");
    let gemini_model =
        std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".into());
    let openai_model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    if gemini_key.is_none() && openai_key.is_none() {
        warn!("No model API keys configured, chat will use local containers only");
    }

    let mut router = ModelRouter::new();
    for module in Module::ALL {
        let temperature = kontor_model::prompts::generation_config(module).temperature;
        let mut chain: Vec<Arc<dyn Provider>> = Vec::new();
        if let Some(key) = &gemini_key {
            chain.push(Arc::new(GeminiClient::new(
                key.clone(),
                gemini_model.clone(),
                temperature,
            )));
        }
        if let Some(key) = &openai_key {
            chain.push(Arc::new(OpenAiClient::new(
                key.clone(),
                openai_model.clone(),
                temperature,
            )));
        }
        if let Some(url) = env_opt(&format!("{}_MODEL_URL", module.as_str().to_uppercase())) {
            chain.push(Arc::new(ContainerClient::new(
                url,
                format!("{}-container", module),
            )));
        }
        router = router.with_chain(module, chain);
    }

    if let Some(url) = env_opt("SECRETARY_MODEL_URL") {
        router = router.with_secretary_container(Arc::new(ContainerClient::new(
            url,
            "secretary-container",
        )));
    }

    router
}

fn livekit_config() -> Option<LiveKitConfig> {
    let api_key = env_opt("LIVEKIT_API_KEY")?;
    let api_secret = env_opt("LIVEKIT_API_SECRET")?;
    Some(LiveKitConfig {
        api_key,
        api_secret,
        url: env_opt("LIVEKIT_URL"),
    })
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
