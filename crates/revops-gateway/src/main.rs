//! RevOps Gateway CLI: HTTP ingress, queue consumers, and configuration
//! management (mirrors `machi-bot`'s CLI shape).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod agent_runtime;
mod chat_client;
mod config;
mod consumers;
mod delivery_transport;
mod http;
mod objectstore;
mod queues;

use agent_runtime::HttpAgentRuntime;
use chat_client::HttpChatClient;
use config::GatewayConfig;
use consumers::{DeliveryConsumer, InvokerConsumer};
use delivery_transport::HttpDeliveryTransport;
use http::AppState;
use objectstore::S3ObjectStore;
use queues::{QueueSet, SqsQueue};
use revops_core::agent::ProgressThrottle;
use revops_core::ingress::IdempotencyStore;

#[derive(Parser)]
#[command(name = "revops-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "REVOPS_GATEWAY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init(InitArgs),
    /// Start the HTTP ingress server and queue consumers
    Serve,
    /// Show gateway status and configuration
    Status,
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Error type for the CLI's own control flow; component errors already
/// carry their own `std::error::Error` impls via `thiserror`.
type CliError = Box<dyn std::error::Error + Send + Sync>;
type CliResult<T> = Result<T, CliError>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "revops_gateway={level},revops_core={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Init(args) => cmd_init(args),
        Commands::Serve => cmd_serve(cli.config).await,
        Commands::Status => cmd_status(cli.config),
        Commands::Config(args) => cmd_config(args, cli.config),
    }
}

fn cmd_init(args: InitArgs) -> CliResult<()> {
    let path = config::config_path()?;
    if path.exists() && !args.force {
        println!("Configuration already exists at: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }
    let written = config::init_config()?;
    println!("Configuration created: {}", written.display());
    println!();
    println!("Next steps:");
    println!("  1. edit {}", written.display());
    println!("  2. export REVOPS_SIGNING_SECRET=<secret>");
    println!("  3. revops-gateway serve");
    Ok(())
}

fn load_config_for(config_path: Option<PathBuf>) -> CliResult<GatewayConfig> {
    let config = match config_path {
        Some(path) => config::load_config_from(&path)?,
        None => config::load_config()?,
    };
    Ok(config)
}

fn cmd_status(config_path: Option<PathBuf>) -> CliResult<()> {
    let path = config_path
        .clone()
        .map_or_else(config::config_path, Ok)?;

    println!("RevOps Gateway Status\n");
    println!("Configuration:");
    println!("  Path:   {}", path.display());
    println!("  Exists: {}", if path.exists() { "yes" } else { "no" });

    if path.exists() {
        match load_config_for(config_path) {
            Ok(config) => {
                let issues = config.validate();
                println!("  Valid:  {}", if config.is_valid() { "yes" } else { "no" });
                for issue in &issues {
                    println!("    {issue}");
                }
                println!();
                println!("Queues:");
                println!("  primary:    {}", config.queues.url_primary.as_deref().unwrap_or("-"));
                println!("  delivery:   {}", config.queues.url_delivery.as_deref().unwrap_or("-"));
                println!("  deadletter: {}", config.queues.url_deadletter.as_deref().unwrap_or("-"));
                println!();
                println!("Server:");
                println!("  bind_addr: {}", config.server.bind_addr);
            }
            Err(error) => println!("  Valid:  no ({error})"),
        }
    }

    Ok(())
}

fn cmd_config(args: ConfigArgs, config_path: Option<PathBuf>) -> CliResult<()> {
    let path = config_path.clone().map_or_else(config::config_path, Ok)?;

    match args.command {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Show => {
            if path.exists() {
                println!("{}", std::fs::read_to_string(&path)?);
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'revops-gateway init' to create one.");
            }
        }
        ConfigCommands::Validate => {
            if !path.exists() {
                println!("error: configuration file does not exist");
                return Ok(());
            }
            match load_config_for(config_path) {
                Ok(config) => {
                    let issues = config.validate();
                    if issues.is_empty() {
                        println!("Configuration is valid");
                    } else {
                        for issue in &issues {
                            println!("{issue}");
                        }
                    }
                }
                Err(error) => println!("error: {error}"),
            }
        }
    }

    Ok(())
}

async fn cmd_serve(config_path: Option<PathBuf>) -> CliResult<()> {
    let config = load_config_for(config_path)?;
    let issues = config.validate();
    for issue in &issues {
        match issue.level {
            config::IssueLevel::Error => tracing::error!("{issue}"),
            config::IssueLevel::Warning => tracing::warn!("{issue}"),
        }
    }
    if !config.is_valid() {
        return Err("configuration is invalid; run `revops-gateway config validate` for details".into());
    }

    tracing::info!("starting RevOps gateway");

    let http_client = reqwest::Client::new();
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let s3_client = aws_sdk_s3::Client::new(&aws_config);

    let queues = QueueSet {
        primary: Arc::new(SqsQueue::new(
            sqs_client.clone(),
            config.queues.url_primary.clone().expect("validated above"),
        )),
        delivery: Arc::new(SqsQueue::new(
            sqs_client.clone(),
            config.queues.url_delivery.clone().expect("validated above"),
        )),
        deadletter: Arc::new(SqsQueue::new(
            sqs_client,
            config.queues.url_deadletter.clone().expect("validated above"),
        )),
    };

    let object_store: Arc<dyn revops_core::object_store::ObjectStore> = Arc::new(S3ObjectStore::new(
        s3_client,
        config.object_store.bucket.clone().expect("validated above"),
    ));

    let chat_client: Arc<dyn revops_core::ingress::ChatClient> = Arc::new(HttpChatClient::new(
        http_client.clone(),
        config.chat.api_base.clone(),
        config.chat.bot_token.clone().unwrap_or_default(),
    ));

    let runtime: Arc<dyn revops_core::agent::runtime::AgentRuntime> = Arc::new(HttpAgentRuntime::new(
        http_client.clone(),
        config.agent.runtime_base_url.clone().unwrap_or_default(),
        config.agent.agent_id.clone().unwrap_or_default(),
        config.agent.agent_alias_id.clone().unwrap_or_default(),
    ));

    let transport: Arc<dyn revops_core::delivery::DeliveryTransport> =
        Arc::new(HttpDeliveryTransport::new(http_client));

    let signing_secret = config
        .chat
        .signing_secret
        .clone()
        .unwrap_or_default()
        .into_bytes();

    let app_state = Arc::new(AppState {
        queues: queues.clone(),
        chat_client: chat_client.clone(),
        idempotency: IdempotencyStore::default(),
        signing_secret,
    });

    let progress_throttle = ProgressThrottle::new(std::time::Duration::from_millis(config.delivery.progress_throttle_ms));

    let invoker_consumer = InvokerConsumer {
        queues: queues.clone(),
        object_store,
        runtime,
        chat_client,
        delivery_config: config.delivery.clone(),
        progress_throttle,
    };

    let delivery_consumer = DeliveryConsumer {
        queues,
        transport,
        retry_policy: config.delivery.retry.into(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(bind_addr = %config.server.bind_addr, "HTTP ingress listening");
    let server = axum::serve(listener, http::router(app_state));

    println!("Gateway running. Press Ctrl+C to stop.\n");

    tokio::select! {
        result = server => {
            result?;
        }
        () = invoker_consumer.run(shutdown_rx.clone()) => {}
        () = delivery_consumer.run(shutdown_rx.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}
