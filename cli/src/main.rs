// onionnet — command-line front end for the onion relay overlay
//
// Starts registry, router and user nodes on the configured ports, drives
// sends between users and reads back every node's introspection routes.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use onionnet_core::net::{
    launch_network, launch_registry, launch_router, launch_routers, launch_user, Running,
};
use onionnet_core::{HttpClient, Key, KeyPair, NodeId, SymmetricKey};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "onionnet")]
#[command(about = "Onion-routed message relay overlay", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this config file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node registry
    Registry,
    /// Run one onion router
    Router {
        #[arg(long)]
        id: NodeId,
    },
    /// Run routers 0..count
    Routers {
        #[arg(short, long, default_value = "3")]
        count: u16,
    },
    /// Run one user node
    User {
        #[arg(long)]
        id: NodeId,
    },
    /// Run a whole network: registry, routers and users
    Up {
        #[arg(long, default_value = "3")]
        routers: u16,
        #[arg(long, default_value = "2")]
        users: u16,
    },
    /// Ask a running user to send a message
    Send {
        #[arg(long)]
        from: NodeId,
        #[arg(long)]
        to: NodeId,
        message: String,
    },
    /// Show a running node's state
    Inspect {
        #[command(subcommand)]
        target: InspectTarget,
    },
    /// Generate key material
    Keygen {
        /// Symmetric layer key instead of a relay keypair
        #[arg(long)]
        symmetric: bool,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum InspectTarget {
    Registry,
    Router { id: NodeId },
    User { id: NodeId },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();
    tracing::debug!("Using config {:?}", config.path());

    match cli.command {
        Commands::Registry => cmd_registry(&config).await,
        Commands::Router { id } => cmd_router(&config, id).await,
        Commands::Routers { count } => cmd_routers(&config, count).await,
        Commands::User { id } => cmd_user(&config, id).await,
        Commands::Up { routers, users } => cmd_up(&config, routers, users).await,
        Commands::Send { from, to, message } => cmd_send(&config, from, to, &message).await,
        Commands::Inspect { target } => cmd_inspect(&config, target).await,
        Commands::Keygen { symmetric } => cmd_keygen(symmetric),
        Commands::Config { action } => cmd_config(config, action),
    }
}

async fn wait_for_ctrl_c() -> Result<()> {
    println!("{}", "Press Ctrl-C to stop".dimmed());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!();
    Ok(())
}

async fn stop_all<T>(nodes: Vec<Running<T>>) {
    for node in nodes {
        node.shutdown().await;
    }
}

async fn cmd_registry(config: &config::Config) -> Result<()> {
    let registry = launch_registry(&config.network)
        .await
        .context("Failed to start registry")?;
    println!(
        "{} Registry listening on {}",
        "✓".green(),
        registry.server.local_addr().to_string().bright_cyan()
    );

    wait_for_ctrl_c().await?;
    registry.shutdown().await;
    Ok(())
}

async fn cmd_router(config: &config::Config, id: NodeId) -> Result<()> {
    let router = launch_router(&config.network, id)
        .await
        .with_context(|| format!("Failed to start router {}", id))?;
    println!(
        "{} Router {} listening on {}",
        "✓".green(),
        id,
        router.server.local_addr().to_string().bright_cyan()
    );
    println!("  Public Key: {}", router.node.public_key().encode().bright_yellow());

    wait_for_ctrl_c().await?;
    router.shutdown().await;
    Ok(())
}

async fn cmd_routers(config: &config::Config, count: u16) -> Result<()> {
    let routers = launch_routers(&config.network, count)
        .await
        .context("Failed to start routers")?;
    for router in &routers {
        println!(
            "{} Router {} on {}",
            "✓".green(),
            router.node.node_id(),
            router.server.local_addr().to_string().bright_cyan()
        );
    }

    wait_for_ctrl_c().await?;
    stop_all(routers).await;
    Ok(())
}

async fn cmd_user(config: &config::Config, id: NodeId) -> Result<()> {
    let user = launch_user(&config.network, id)
        .await
        .with_context(|| format!("Failed to start user {}", id))?;
    println!(
        "{} User {} listening on {}",
        "✓".green(),
        id,
        user.server.local_addr().to_string().bright_cyan()
    );

    wait_for_ctrl_c().await?;
    user.shutdown().await;
    Ok(())
}

async fn cmd_up(config: &config::Config, routers: u16, users: u16) -> Result<()> {
    let network = launch_network(config.network.clone(), routers, users)
        .await
        .context("Failed to start network")?;

    let net = network.config();
    println!("{}", "Network up".bold());
    println!("  Registry: {}", net.registry_url("").bright_cyan());
    if routers > 0 {
        println!(
            "  Routers:  {} ports {}-{}",
            routers,
            net.base_router_port,
            u32::from(net.base_router_port) + u32::from(routers) - 1
        );
    }
    if users > 0 {
        println!(
            "  Users:    {} ports {}-{}",
            users,
            net.base_user_port,
            u32::from(net.base_user_port) + u32::from(users) - 1
        );
        if users > 1 {
            println!();
            println!(
                "  Try: {}",
                "onionnet send --from 0 --to 1 hello".bright_green()
            );
        }
    }

    wait_for_ctrl_c().await?;
    network.shutdown().await;
    Ok(())
}

async fn cmd_send(config: &config::Config, from: NodeId, to: NodeId, message: &str) -> Result<()> {
    let client = HttpClient::new(config.network.clone());
    let circuit = client
        .send_message(from, to, message)
        .await
        .with_context(|| format!("User {} could not send", from))?;

    let hops: Vec<String> = circuit.iter().map(|id| id.to_string()).collect();
    println!(
        "{} Handed off to router {} (circuit {})",
        "✓".green(),
        hops.first().map(String::as_str).unwrap_or("?"),
        hops.join(" → ").bright_cyan()
    );
    Ok(())
}

fn show<T: std::fmt::Display>(value: Option<T>) -> ColoredString {
    match value {
        Some(v) => v.to_string().normal(),
        None => "(none)".dimmed(),
    }
}

async fn cmd_inspect(config: &config::Config, target: InspectTarget) -> Result<()> {
    let client = HttpClient::new(config.network.clone());

    match target {
        InspectTarget::Registry => {
            let nodes = client
                .node_registry()
                .await
                .context("Registry unreachable")?;
            println!("{} ({})", "Registered Nodes".bold(), nodes.len());
            if nodes.is_empty() {
                println!("  {}", "(none registered)".dimmed());
            }
            for node in nodes {
                println!(
                    "  {:<6} {}",
                    node.node_id.to_string().bright_cyan(),
                    node.public_key.encode()
                );
            }
        }

        InspectTarget::Router { id } => {
            let frame = client.last_received_frame(id).await?;
            let payload = client.last_decrypted_payload(id).await?;
            let destination = client.last_destination(id).await?;

            println!("{}", format!("Router {}", id).bold());
            println!("  Last frame:       {}", show(frame));
            println!("  Last decrypted:   {}", show(payload));
            println!("  Last destination: {}", show(destination));
        }

        InspectTarget::User { id } => {
            let sent = client.last_sent_message(id).await?;
            let received = client.last_received_message(id).await?;
            let circuit = client.last_circuit(id).await?.map(|ids| {
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" → ")
            });

            println!("{}", format!("User {}", id).bold());
            println!("  Last sent:     {}", show(sent));
            println!("  Last received: {}", show(received));
            println!("  Last circuit:  {}", show(circuit));
        }
    }

    Ok(())
}

fn cmd_keygen(symmetric: bool) -> Result<()> {
    let keys: Vec<Key> = if symmetric {
        vec![SymmetricKey::generate().into()]
    } else {
        let pair = KeyPair::generate();
        vec![(*pair.public()).into(), pair.private().clone().into()]
    };

    for key in keys {
        println!("{:<10} {}", key.kind().to_string().bright_cyan(), key.encode());
    }
    if !symmetric {
        println!();
        println!("{}", "⚠️  Keep the private key secret".bright_red().bold());
    }
    Ok(())
}

fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            if let Some(path) = config.path() {
                println!("  {}", path.display().to_string().dimmed());
            }
            println!();
            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }
        }
    }

    Ok(())
}
