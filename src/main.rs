use std::path::PathBuf;
use std::process::ExitCode;

use authrelay::api::{ImageApi, PresetApi};
use authrelay::client::{AuthClient, ClientError};
use authrelay::config::{config_schema, load_config};
use authrelay::metrics::Metrics;
use authrelay::store::create_store;
use authrelay::utils::logger::init_logging;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::error;

#[derive(Parser)]
#[command(name = "authrelay", version, about = "Authenticated API client with transparent token renewal")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, env = "AUTHRELAY_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Dump the Prometheus metrics of this run to stderr on exit.
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show whether a token is held and whose it is.
    Status,
    /// Store an access token obtained elsewhere.
    Login { token: String },
    /// Exchange the current token for a new one.
    Renew,
    /// End the session locally and on the server.
    Logout,
    /// GET a path and print the JSON response.
    Get { path: String },
    #[command(subcommand)]
    Presets(PresetCommand),
    /// Extract character stats from a screenshot, then archive it.
    Extract { image: PathBuf },
    /// Print the configuration JSON schema.
    Schema,
}

#[derive(Subcommand)]
enum PresetCommand {
    List,
    Items { preset_id: i64 },
    Delete { preset_id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::Schema = cli.command {
        println!("{}", config_schema());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let store = create_store(&config.store);
    let client = match AuthClient::new(&config, store, Metrics::new()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = client.auth().initialize().await {
        error!("Failed to read persisted token: {}", e);
        return ExitCode::FAILURE;
    }

    let result = run(&client, cli.command).await;
    if cli.metrics {
        eprint!("{}", client.auth().metrics().render());
    }

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let detail = e
                .downcast_ref::<ClientError>()
                .and_then(ClientError::failure)
                .map(|f| json!({"status": f.status.as_u16(), "code": f.code, "body": f.body}));
            println!(
                "{}",
                json!({"error": e.to_string(), "response": detail})
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &AuthClient, command: Command) -> Result<Value, Box<dyn std::error::Error>> {
    let auth = client.auth();
    match command {
        Command::Status => Ok(json!({
            "authenticated": auth.is_authenticated().await,
            "subject": auth.subject().await,
            "expires_at": auth.claims().await.and_then(|c| c.exp),
        })),
        Command::Login { token } => {
            auth.set_tokens(token).await?;
            Ok(json!({"authenticated": auth.is_authenticated().await, "subject": auth.subject().await}))
        }
        Command::Renew => match auth.renew_token().await {
            Ok(()) => Ok(json!({"renewed": true, "subject": auth.subject().await})),
            Err(e) => Ok(json!({"renewed": false, "reason": e.to_string()})),
        },
        Command::Logout => {
            auth.logout().await;
            Ok(json!({"authenticated": false}))
        }
        Command::Get { path } => Ok(client.get_json::<Value>(&path).await?),
        Command::Presets(PresetCommand::List) => {
            let presets = PresetApi::new(client).list().await?;
            Ok(json!(presets))
        }
        Command::Presets(PresetCommand::Items { preset_id }) => {
            let items = PresetApi::new(client).items(preset_id).await?;
            Ok(json!(items))
        }
        Command::Presets(PresetCommand::Delete { preset_id }) => {
            PresetApi::new(client).delete(preset_id).await?;
            Ok(json!({"deleted": preset_id}))
        }
        Command::Extract { image } => {
            let bytes = tokio::fs::read(&image).await?;
            let file_name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let stats = ImageApi::new(client).process(&file_name, bytes).await?;
            Ok(json!(stats))
        }
        Command::Schema => Ok(Value::String(config_schema())),
    }
}
