mod agent;
mod coach;
mod config_manager;
mod error;
mod relay;
mod routes;
mod state;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agent::stateless_llm::GeminiLLM;
use config_manager::Config;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "coach-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the Gemini models the configured key can use, then exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coach_relay=debug,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_environment()?;

    if cli.list_models {
        let llm = GeminiLLM::new(&config.llm_config)?;
        for name in llm.list_models().await? {
            println!("{}", name);
        }
        return Ok(());
    }

    info!(
        "Coaches: model={}, seed_prompt_history={}, allowed_origins={:?}",
        config.llm_config.model,
        config.coach_config.seed_prompt_history,
        config.system_config.allowed_origins
    );

    let addr = config.system_config.socket_addr()?;
    let app_state = AppState::new(config)?;
    let app = routes::build_app(app_state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
