#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mcp_gateway_lib::binding::{Binding, MESSAGE_PATH};
use mcp_gateway_lib::config::{read_from_path, validate_config, GatewayConfig, Transport};
use mcp_gateway_lib::{
    init_tracing, shutdown_signal, BasicEngine, DirectBinding, EngineOptions, Gateway,
    LoopbackEngine, ProxiedBinding,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Authenticating gateway for MCP monitoring query servers")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/gateway.toml")]
    config: PathBuf,

    /// Bearer secret; overrides `auth.secret` from the file
    #[arg(long, env = "MCP_GATEWAY_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut cfg = match read_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Some(secret) = cli.secret {
        cfg.auth.secret = secret;
    }

    if let Err(err) = init_tracing(&cfg.logging) {
        eprintln!("failed to initialise logging: {err}");
        std::process::exit(1);
    }
    if let Err(err) = validate_config(&cfg) {
        error!(%err, "invalid configuration");
        std::process::exit(1);
    }
    info!(listen = %cfg.listen, transport = %cfg.transport, "configuration loaded");

    if let Err(err) = run(cfg).await {
        error!(%err, "gateway exited with error");
        std::process::exit(1);
    }
}

async fn run(cfg: GatewayConfig) -> mcp_gateway_lib::Result<()> {
    let shutdown_timeout = cfg.timeout.shutdown();
    let gateway = Gateway::new(cfg.clone(), build_binding(&cfg));

    gateway.start().await?;
    shutdown_signal().await?;
    gateway.shutdown(shutdown_timeout).await
}

fn build_binding(cfg: &GatewayConfig) -> Arc<dyn Binding> {
    let message_path = match cfg.transport {
        Transport::Sse => Some(MESSAGE_PATH.to_string()),
        Transport::StreamableHttp => None,
    };
    let engine = Arc::new(BasicEngine::new(EngineOptions {
        message_path,
        heartbeat: cfg.heartbeat_interval(),
        ..EngineOptions::default()
    }));

    match cfg.transport {
        Transport::Sse => {
            let listening = Arc::new(LoopbackEngine::new(engine));
            Arc::new(ProxiedBinding::new(listening, cfg.internal_listen))
        }
        Transport::StreamableHttp => Arc::new(DirectBinding::new(engine)),
    }
}
