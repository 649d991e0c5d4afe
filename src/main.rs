//! show_admin - Show Controller Admin API binary
//!
//! Serves the admin API, or runs one of its reports from the command line.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use show_admin::{
    gpio_config, start_web_server, AdminConfig, AppState, HttpInventory, OptionsProvider,
    PinInventory, ProxyStore, StaticInventory, StorageInspector, WebConfig, DEFAULT_WEB_PORT,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "show_admin")]
#[command(about = "Show controller admin API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Admin API for a show controller: GPIO usage, setting options, proxies and storage")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the hardware platform
    #[arg(long)]
    platform: Option<String>,

    /// Override the media directory
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Override the pin inventory URL
    #[arg(long)]
    inventory_url: Option<String>,

    /// Read the pin inventory from a JSON file instead of the player
    #[arg(long)]
    inventory_file: Option<PathBuf>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve(ServeArgs),

    /// Print the annotated GPIO pin list
    Gpio(GpioArgs),

    /// Print the choices for one setting
    Options {
        /// Setting name, e.g. AudioOutput or TimeZone
        setting: String,
    },

    /// Show or edit the proxy list
    Proxies {
        #[command(subcommand)]
        action: Option<ProxyAction>,
    },

    /// Show storage devices and available actions
    Storage,
}

#[derive(Args)]
struct ServeArgs {
    /// Static files directory (optional)
    #[arg(long)]
    static_dir: Option<String>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args)]
struct GpioArgs {
    /// Only print pins with conflicting claims
    #[arg(long)]
    conflicts: bool,

    /// Print the inventory without annotations
    #[arg(long)]
    raw: bool,
}

#[derive(Subcommand)]
enum ProxyAction {
    /// List saved and DHCP-discovered proxies
    List,
    /// Add a proxy
    Add {
        host: String,
        #[arg(default_value = "")]
        description: String,
    },
    /// Remove a proxy
    Remove { host: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = load_config(&cli)?;
    let inventory = build_inventory(&cli, &config)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args, config, inventory).await?,
        Some(Commands::Gpio(args)) => gpio_command(args, &config, inventory.as_ref()).await?,
        Some(Commands::Options { setting }) => options_command(setting, config, inventory).await?,
        Some(Commands::Proxies { action }) => proxies_command(action.as_ref(), &config)?,
        Some(Commands::Storage) => storage_command(&config)?,
        None => {
            let serve_args = ServeArgs {
                static_dir: None,
                no_cors: false,
            };
            serve_command(&cli, &serve_args, config, inventory).await?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Settings file values, then command line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<AdminConfig> {
    let mut config = AdminConfig::load(cli.config.as_deref())
        .with_context(|| format!("Failed to load settings from {:?}", cli.config))?;

    if let Some(platform) = &cli.platform {
        config.platform = platform.clone();
    }
    if let Some(media_dir) = &cli.media_dir {
        config.media_dir = media_dir.clone();
    }
    if let Some(url) = &cli.inventory_url {
        config.inventory_url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_inventory(cli: &Cli, config: &AdminConfig) -> anyhow::Result<Arc<dyn PinInventory>> {
    Ok(match &cli.inventory_file {
        Some(path) => {
            info!("Using pin inventory from {:?}", path);
            Arc::new(
                StaticInventory::from_file(path)
                    .with_context(|| format!("Failed to read inventory {:?}", path))?,
            )
        }
        None => Arc::new(HttpInventory::new(config.inventory_url.clone())?),
    })
}

async fn serve_command(
    cli: &Cli,
    args: &ServeArgs,
    config: AdminConfig,
    inventory: Arc<dyn PinInventory>,
) -> anyhow::Result<()> {
    let mut web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);
    if let Some(static_dir) = &args.static_dir {
        web_config = web_config.with_static_path(Some(static_dir.clone()));
        info!("Using static files from: {}", static_dir);
    }

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Platform: {}", config.platform);
    info!("  - Media directory: {:?}", config.media_dir);

    let state = AppState::with_inventory(config, inventory)?;
    start_web_server(web_config, state).await?;

    Ok(())
}

async fn gpio_command(
    args: &GpioArgs,
    config: &AdminConfig,
    inventory: &dyn PinInventory,
) -> anyhow::Result<()> {
    if args.raw {
        let records = inventory.fetch_raw().await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let mut pins = gpio_config(inventory, config.aggregator_config()).await?;
    if args.conflicts {
        pins.retain(|pin| pin.config_error);
    }
    println!("{}", serde_json::to_string_pretty(&pins)?);
    Ok(())
}

async fn options_command(
    setting: &str,
    config: AdminConfig,
    inventory: Arc<dyn PinInventory>,
) -> anyhow::Result<()> {
    let provider = OptionsProvider::new(Arc::new(config), inventory)?;
    let options = provider.get(setting).await;
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}

fn proxies_command(action: Option<&ProxyAction>, config: &AdminConfig) -> anyhow::Result<()> {
    let store = ProxyStore::new(config.proxies_file(), config.dhcp_leases.clone());

    let records = match action {
        None | Some(ProxyAction::List) => store.list()?,
        Some(ProxyAction::Add { host, description }) => store.add(host, description)?,
        Some(ProxyAction::Remove { host }) => store.remove(host)?,
    };

    for record in &records {
        let mut flags = String::new();
        if record.dhcp {
            flags.push_str(" [dhcp]");
        }
        if record.pending {
            flags.push_str(" [not saved]");
        }
        println!("{:<40} {}{}", record.host, record.description, flags);
    }
    Ok(())
}

fn storage_command(config: &AdminConfig) -> anyhow::Result<()> {
    let report = StorageInspector::new(config).report()?;

    println!("Storage devices:");
    if report.devices.is_empty() {
        println!("  (none found under {:?})", config.block_dir);
    }
    for device in &report.devices {
        let marker = if device.name == report.selected { "*" } else { " " };
        println!(" {} {}", marker, device.label);
    }

    println!();
    println!("Available actions:");
    let actions = report.actions;
    println!("  Grow filesystem: {}", yes_no(actions.grow_filesystem));
    println!("  New partition:   {}", yes_no(actions.new_partition));
    println!("  Flash to eMMC:   {}", yes_no(actions.flash_emmc));
    println!("  Flash to USB:    {}", yes_no(actions.flash_usb));
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["show_admin", "--port", "9090", "gpio", "--conflicts"]).unwrap();
        assert_eq!(cli.port, 9090);
        assert!(matches!(cli.command, Some(Commands::Gpio(GpioArgs { conflicts: true, .. }))));
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["show_admin"]).unwrap();
        assert_eq!(cli.port, DEFAULT_WEB_PORT);
        assert_eq!(cli.host, "0.0.0.0");
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "show_admin",
            "--platform",
            "BeagleBone Black",
            "--media-dir",
            "/srv/media",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.platform, "BeagleBone Black");
        assert_eq!(config.media_dir, PathBuf::from("/srv/media"));
    }

    #[test]
    fn test_proxy_subcommand() {
        let cli = Cli::try_parse_from(["show_admin", "proxies", "add", "10.0.0.9", "Porch"]).unwrap();
        match cli.command {
            Some(Commands::Proxies {
                action: Some(ProxyAction::Add { host, description }),
            }) => {
                assert_eq!(host, "10.0.0.9");
                assert_eq!(description, "Porch");
            }
            _ => panic!("expected proxies add"),
        }
    }
}
