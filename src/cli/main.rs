use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use customer_retention_service::{
    auth::{AuthService, RegisterRequest},
    config::{Config, StorageBackend},
    ml::{validate_features, LogisticScorer, RiskClassifier, Scorer},
    models::CustomerSegment,
    state::{create_store, SledStore},
};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "retention-cli")]
#[command(about = "Customer retention service operator CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/default.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open or create the configured database and report its trees
    Init,

    /// Bulk upsert customer segments from a JSON array
    Seed {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Register a user without a running server
    CreateUser {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Validate and classify a feature record with the configured model
    Score {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Call the ping endpoint of a running server
    Ping {
        #[arg(short, long, default_value = "http://localhost:8080")]
        endpoint: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ping { endpoint } => {
            let response = Client::new()
                .get(format!("{}/api/ping", endpoint.trim_end_matches('/')))
                .send()
                .await
                .with_context(|| format!("Failed to reach {}", endpoint))?;

            let status = response.status();
            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !status.is_success() {
                bail!("Server answered with status {}", status);
            }
        }

        Commands::Init => {
            let config = load_config(&cli.config)?;
            if config.storage.backend == StorageBackend::Memory {
                println!("Storage backend is in-memory; nothing to initialize");
                return Ok(());
            }

            let path = config
                .storage
                .path
                .as_ref()
                .context("storage.path is not configured")?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let store = SledStore::new(path)?;
            let purged = store.purge_expired_sessions()?;
            store.flush().await?;

            println!("Database ready at {}", path.display());
            for (tree, entries) in store.tree_stats() {
                println!("  {:<20} {} entries", tree, entries);
            }
            println!("  Expired sessions purged: {}", purged);
            println!("  Size on disk: {} bytes", store.size_on_disk()?);
        }

        Commands::Seed { file } => {
            let config = load_config(&cli.config)?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let segments: Vec<CustomerSegment> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of segments", file.display()))?;

            let store = create_store(&config.storage).await?;
            let written = store.upsert_segments(&segments).await?;
            println!("Seeded {} customer segments", written);
        }

        Commands::CreateUser {
            username,
            email,
            password,
        } => {
            let config = load_config(&cli.config)?;
            let store = create_store(&config.storage).await?;
            let auth = AuthService::new(store, config.auth.clone());
            let user = auth
                .register(RegisterRequest {
                    username,
                    email,
                    password,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&user.profile())?);
        }

        Commands::Score { file } => {
            let config = load_config(&cli.config)?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let payload: Value = serde_json::from_str(&raw)?;

            let scorer = LogisticScorer::load(&config.model.path).with_context(|| {
                format!("Failed to load model from {}", config.model.path.display())
            })?;
            let model_name = scorer.name();
            let scorer: Arc<dyn Scorer> = Arc::new(scorer);
            let classifier = RiskClassifier::new(Some(scorer), config.risk)?;

            let record = validate_features(&payload)?;
            let classification = classifier.classify(&record)?;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "model": model_name,
                    "churn_probability": classification.probability,
                    "risk_level": classification.tier,
                    "explanation": classification.explanation,
                    "recommended_actions": classification.recommended_actions,
                    "input": record,
                }))?
            );
        }
    }

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    Config::load_from(path).with_context(|| format!("Failed to load configuration from {}", path))
}
