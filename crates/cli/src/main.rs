use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter},
};

use {hikari_gateway::state::mcp_config_from, hikari_mcp::McpManager};

#[derive(Parser)]
#[command(name = "hikari", about = "hikari — desktop chat backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Port to listen on (overrides the settings value).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Custom config directory (overrides default ~/.config/hikari/).
    #[arg(long, global = true, env = "HIKARI_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the loopback server (default when no subcommand is provided).
    Serve,
    /// Validate the settings file and the configured MCP servers.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

async fn serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let settings = hikari_config::discover_and_load();
    let settings_path = hikari_config::find_or_default_settings_path();
    let port = port_override.unwrap_or(settings.server.port);

    let timeout = std::time::Duration::from_secs(settings.mcp_call_timeout_secs());
    let manager = Arc::new(McpManager::new(timeout));

    // Bring up configured tool servers before accepting requests.
    manager.reconcile(&mcp_config_from(&settings)).await;
    let status = manager.status().await;
    info!(
        enabled = status.enabled,
        active = status.active,
        total = status.total,
        config = %settings_path.display(),
        "MCP subsystem ready"
    );

    let state = hikari_gateway::AppState::new(manager, settings, settings_path);
    hikari_gateway::start_server(state, port).await
}

/// Settings sanity check: reports problems, exits non-zero when any are found.
fn doctor() -> anyhow::Result<()> {
    let path = hikari_config::find_or_default_settings_path();
    println!("settings file: {}", path.display());

    let settings = match hikari_config::load_settings(&path) {
        Ok(s) => s,
        Err(e) => {
            println!("  ✗ cannot load: {e}");
            std::process::exit(1);
        }
    };

    let mut problems = 0usize;
    println!(
        "mcp: {} ({} server(s) configured)",
        if settings.mcp_enabled {
            "enabled"
        } else {
            "disabled"
        },
        settings.mcp_servers.len()
    );

    for (name, entry) in &settings.mcp_servers {
        if entry.command.trim().is_empty() {
            println!("  ✗ {name}: command is empty");
            problems += 1;
            continue;
        }
        if entry.transport == hikari_config::TransportKind::Sse {
            println!("  ✗ {name}: 'sse' transport is not supported");
            problems += 1;
            continue;
        }
        let command = hikari_config::env_subst::substitute_env(&entry.command);
        if command.contains("${") {
            println!("  ✗ {name}: unresolved variable in command '{command}'");
            problems += 1;
            continue;
        }
        for value in entry.args.iter().chain(entry.env.values()) {
            let substituted = hikari_config::env_subst::substitute_env(value);
            if substituted.contains("${") {
                println!("  ⚠ {name}: unresolved variable in '{value}'");
            }
        }
        println!("  ✓ {name}: {command}");
    }

    if problems > 0 {
        println!("{problems} problem(s) found");
        std::process::exit(1);
    }
    println!("no problems found");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        hikari_config::set_config_dir(dir.clone());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "hikari starting");

    match cli.command {
        None | Some(Commands::Serve) => serve(cli.port).await,
        Some(Commands::Doctor) => doctor(),
    }
}
