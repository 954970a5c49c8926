use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use threeds_gateway::config::Settings;
use threeds_gateway::{CallbackForm, GatewayRequest, VerifyRequest};

#[derive(Parser, Debug)]
#[command(name = "threeds-gateway")]
#[command(about = "Sign 3-D Secure gateway requests and verify bank callbacks", long_about = None)]
struct Cli {
    /// Settings file; GATEWAY_* environment variables override it
    #[arg(long, env = "GATEWAY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Write logs to stderr as JSON lines
    #[arg(long, default_value_t = false, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the signed redirect form for a gateway request
    Sign {
        /// Gateway request as JSON
        request: PathBuf,
    },
    /// Verify a callback form posted by the bank
    Verify {
        /// Gateway request the callback belongs to, as JSON
        request: PathBuf,
        /// Posted callback fields as JSON
        form: PathBuf,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Request from disk, falling back to the configured bank parameters
fn read_request(path: &Path, settings: &Settings) -> Result<GatewayRequest> {
    let mut request: GatewayRequest = read_json(path)?;
    if request.bank_parameters.is_empty() {
        request.bank_parameters = settings.bank.clone();
    }
    Ok(request)
}

fn init_logging(json: bool) {
    // Logs go to stderr so stdout stays machine readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let settings = Settings::load(cli.config.as_deref())?;
    let provider = settings.provider.provider();

    tracing::info!("Provider: {}", settings.provider);

    match cli.command {
        Command::Sign { request } => {
            let request = read_request(&request, &settings)?;
            let signed = provider.build_gateway_request(&request)?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
        Command::Verify { request, form } => {
            let request = read_request(&request, &settings)?;
            let form: CallbackForm = read_json(&form)?;
            let verify_request = VerifyRequest {
                bank_parameters: request.bank_parameters.clone(),
            };
            let result = provider.verify_callback(&verify_request, &request, Some(&form));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
