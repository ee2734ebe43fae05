mod config;
mod logging;
mod serve;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use careescrow_booking::BookingLifecycle;
use careescrow_chain::{wei_to_ether, ChainGateway, EscrowKey, JsonRpcGateway, SimulatedChain};
use careescrow_storage::MemoryStore;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::CareConfig;
use crate::logging::LogFormat;

const DEFAULT_PORT: u16 = 8080;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Care service bookings backed by an on-chain escrow.
#[derive(Parser)]
#[command(
    name = "careescrow",
    version,
    about = "Care service bookings backed by an on-chain escrow"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the booking HTTP API server
    Serve {
        /// Port to listen on [default: 8080, or [server] port]
        #[arg(long)]
        port: Option<u16>,
        /// Path to careescrow.toml
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use an in-process escrow contract instead of an RPC node
        #[arg(long)]
        simulate_chain: bool,
        /// Log format [default: pretty, or [server] log_format]
        #[arg(long, value_enum)]
        log_format: Option<LogFormat>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Print the on-chain escrow key derived from a booking id
    EscrowKey {
        /// Booking identifier as stored in the database
        booking_id: String,
    },

    /// Print the relayer account's balance
    Balance {
        /// Path to careescrow.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            config,
            simulate_chain,
            log_format,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            let config = load_config(config.as_deref());
            logging::init(log_format.or(config.server.log_format).unwrap_or_default());

            let lifecycle = match build_lifecycle(&config, simulate_chain) {
                Ok(lifecycle) => lifecycle,
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            };
            let options = serve::ServeOptions {
                port: port.or(config.server.port).unwrap_or(DEFAULT_PORT),
                rate_limit: config.rate_limit(),
                api_key: config.api_key(),
                sessions: config.auth.sessions.clone(),
                tls_cert,
                tls_key,
            };

            let rt = runtime();
            if let Err(e) = rt.block_on(serve::start_server(lifecycle, options)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::EscrowKey { booking_id } => {
            cmd_escrow_key(&booking_id, cli.output);
        }
        Commands::Balance { config } => {
            let config = load_config(config.as_deref());
            logging::init(config.server.log_format.unwrap_or_default());
            cmd_balance(&config, cli.output);
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> CareConfig {
    match CareConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn build_lifecycle(
    config: &CareConfig,
    simulate_chain: bool,
) -> Result<BookingLifecycle<MemoryStore>, Box<dyn std::error::Error>> {
    let policy = config.escrow_policy()?;
    let chain: Arc<dyn ChainGateway> = if simulate_chain {
        tracing::warn!("using the simulated escrow contract; no funds move on chain");
        Arc::new(SimulatedChain::new())
    } else {
        Arc::new(JsonRpcGateway::new(config.rpc_config()?)?)
    };
    Ok(BookingLifecycle::new(
        Arc::new(MemoryStore::new()),
        chain,
        policy,
    ))
}

fn cmd_escrow_key(booking_id: &str, output: OutputFormat) {
    if booking_id.trim().is_empty() {
        eprintln!("error: booking id must not be empty");
        process::exit(1);
    }
    let key = EscrowKey::derive(booking_id);
    match output {
        OutputFormat::Text => println!("{}", key),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "bookingId": booking_id, "escrowKey": key.to_hex() })
        ),
    }
}

fn cmd_balance(config: &CareConfig, output: OutputFormat) {
    let gateway = match config
        .rpc_config()
        .map_err(|e| e.to_string())
        .and_then(|rpc| JsonRpcGateway::new(rpc).map_err(|e| e.to_string()))
    {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let rt = runtime();
    let wei = match rt.block_on(gateway.relayer_balance()) {
        Ok(wei) => wei,
        Err(e) => {
            eprintln!("error: could not read relayer balance: {}", e);
            process::exit(1);
        }
    };
    let ether = wei_to_ether(wei)
        .map(|eth| eth.to_string())
        .unwrap_or_else(|| "out of range".to_string());
    let address = gateway.config().relayer_address;

    match output {
        OutputFormat::Text => {
            println!("Relayer: {}", address);
            println!("Balance: {} ETH", ether);
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "address": address.to_string(),
                "wei": wei.to_string(),
                "ether": ether,
            })
        ),
    }
}
