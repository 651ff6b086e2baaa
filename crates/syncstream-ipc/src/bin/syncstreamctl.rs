//! syncstreamctl - command-line control client for syncstreamd

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syncstream_api::{Command, StrategyConfig, StrategyParameters};
use syncstream_ipc::IpcClient;
use syncstream_util::{StrategyId, default_socket_path};

#[derive(Parser, Debug)]
#[command(name = "syncstreamctl")]
#[command(about = "Control and inspect a running syncstreamd", long_about = None)]
struct Args {
    /// Socket path (or set SYNCSTREAM_SOCKET env var)
    #[arg(short, long, env = "SYNCSTREAM_SOCKET", default_value_os_t = default_socket_path())]
    socket: PathBuf,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Show engine status
    Status,
    /// Run one evaluation cycle now
    Evaluate,
    /// List catalog strategies
    List {
        /// Only enabled strategies
        #[arg(long)]
        active: bool,
    },
    /// Show the active strategy
    Active,
    /// Make a strategy the active one
    Activate { id: String },
    /// Insert or replace a strategy
    Upsert {
        /// Read the full strategy config as JSON from this file
        #[arg(long, conflicts_with_all = ["id", "name"])]
        file: Option<PathBuf>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Parameter as key=value (numbers are stored as numbers)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Store the strategy disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Show service health
    Health,
    /// Check the service is reachable
    Ping,
    /// Stream events until interrupted
    Watch,
}

fn parse_params(raw: &[String]) -> Result<StrategyParameters> {
    let mut params = StrategyParameters::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .with_context(|| format!("Parameter '{}' is not KEY=VALUE", item))?;
        let value = match value.parse::<f64>() {
            Ok(n) => serde_json::json!(n),
            Err(_) => serde_json::json!(value),
        };
        params.insert(key.trim().to_string(), value);
    }
    Ok(params)
}

fn upsert_config(
    file: Option<PathBuf>,
    id: Option<String>,
    name: Option<String>,
    description: String,
    params: &[String],
    disabled: bool,
) -> Result<StrategyConfig> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Invalid strategy config in {}", path.display()));
    }

    let (Some(id), Some(name)) = (id, name) else {
        bail!("--id and --name are required unless --file is given");
    };

    Ok(StrategyConfig {
        id: StrategyId::new(id),
        name,
        description,
        is_active: !disabled,
        parameters: parse_params(params)?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut client = IpcClient::connect(&args.socket)
        .await
        .with_context(|| format!("Failed to connect to {}", args.socket.display()))?;

    let command = match args.command {
        Action::Watch => {
            let mut events = client.subscribe().await?;
            loop {
                let event = events.next().await?;
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Action::Status => Command::GetStatus,
        Action::Evaluate => Command::Evaluate,
        Action::List { active } => Command::ListStrategies { only_active: active },
        Action::Active => Command::GetActiveStrategy,
        Action::Activate { id } => Command::SetActiveStrategy {
            id: StrategyId::new(id),
        },
        Action::Upsert {
            file,
            id,
            name,
            description,
            params,
            disabled,
        } => Command::UpsertStrategy {
            config: upsert_config(file, id, name, description, &params, disabled)?,
        },
        Action::Health => Command::GetHealth,
        Action::Ping => Command::Ping,
    };

    let payload = client.call(command).await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
