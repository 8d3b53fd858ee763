use anyhow::Context;

use event_hub::config::AppConfig;
use event_hub::core_types::Identity;
use event_hub::node::ServiceNode;
use event_hub::services::ServiceRole;

const USAGE: &str =
    "usage: event_hub --role <role> [--env dev] [--port N] [--emitter-url URL] [--public-url URL]";

/// Value following `flag` on the command line.
fn get_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn load_identity(config: &AppConfig) -> anyhow::Result<Identity> {
    match &config.service.identity_seed {
        Some(seed) => Identity::from_seed_hex(seed).context("invalid service.identity_seed"),
        None => Ok(Identity::generate()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let env = get_arg(&args, "--env")
        .or_else(|| get_arg(&args, "-e"))
        .unwrap_or_else(|| "dev".to_string());
    let role: ServiceRole = get_arg(&args, "--role")
        .context(USAGE)?
        .parse()
        .map_err(anyhow::Error::msg)?;

    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_arg(&args, "--port") {
        config.gateway.port = port.parse().context("--port must be a number")?;
    }
    if let Some(url) = get_arg(&args, "--emitter-url") {
        config.service.emitter_url = Some(url);
    }
    if let Some(url) = get_arg(&args, "--public-url") {
        config.service.public_url = Some(url);
    }

    let _log_guard = event_hub::logging::init_logging(&config);
    tracing::info!(%env, %role, "Starting event_hub node");

    let identity = load_identity(&config)?;
    if config.service.identity_seed.is_none() {
        tracing::warn!(
            principal = %identity.principal(),
            "no identity_seed configured, using a fresh identity"
        );
    }

    let node = ServiceNode::start(role, &config, identity).await?;
    println!("{} listening on {} as {}", role, node.url(), node.principal());

    let shutdown = node.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.request_shutdown();
        }
    });

    node.wait().await;
    Ok(())
}
