//! Zenoh bridge for Adlar heat pumps.
//!
//! Sets up every configured unit, publishes what each one supports and
//! keeps retrying units that are not reachable yet.

use adlar_common::KeyExprBuilder;
use adlar_heatpump::catalog::Catalog;
use adlar_heatpump::config::AdlarBridgeConfig;
use adlar_heatpump::device::Device;
use adlar_heatpump::entry::DeviceSettings;
use adlar_heatpump::identity::{DeviceIdentity, FeaturePresence, HardwareType, VariantFlag};
use adlar_heatpump::publish::{BridgeStatus, DevicePublisher, DeviceSnapshot};
use adlar_heatpump::registry::DeviceRegistry;
use adlar_heatpump::resolver::resolve;
use adlar_heatpump::transport::{ModbusTransport, TransportOptions};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Zenoh bridge for Adlar/Nilan CTS602 heat pumps.
#[derive(Parser, Debug)]
#[command(name = "adlar-heatpump")]
#[command(about = "Probes Adlar heat pumps and publishes their capabilities to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "adlar.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the attributes a unit would expose, without connecting to it
    Resolve {
        /// Controller model code
        #[arg(long)]
        hardware_type: u16,

        /// Bus protocol version
        #[arg(long)]
        bus_version: u16,

        #[arg(long, value_enum, default_value_t = VariantArg::None)]
        variant: VariantArg,

        /// The unit has a CO2 sensor fitted
        #[arg(long)]
        co2: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    None,
    Air,
    Geo,
}

impl From<VariantArg> for VariantFlag {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::None => VariantFlag::None,
            VariantArg::Air => VariantFlag::Air,
            VariantArg::Geo => VariantFlag::Geo,
        }
    }
}

type SharedRegistry = Arc<Mutex<DeviceRegistry<ModbusTransport>>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(Command::Resolve {
        hardware_type,
        bus_version,
        variant,
        co2,
    }) = args.command
    {
        return print_resolved(hardware_type, bus_version, variant.into(), co2);
    }

    // Load configuration
    let mut config = AdlarBridgeConfig::read_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = config.logging.with_level_override(args.log_level.as_deref());
    adlar_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting adlar-heatpump");
    info!("Loaded configuration from {:?}", args.config);

    for entry_id in config
        .prepare()
        .with_context(|| format!("Invalid configuration in {:?}", args.config))?
    {
        info!("Migrated entry '{}' to the current format", entry_id);
    }

    let catalog = Arc::new(Catalog::builtin().context("Built-in capability catalog is invalid")?);
    info!("Loaded {} capability rules", catalog.len());

    // Connect to Zenoh
    info!("Connecting to Zenoh...");
    let session = adlar_common::connect(&config.zenoh)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Zenoh: {}", e))?;
    info!("Connected to Zenoh");

    let publisher = DevicePublisher::new(
        session.clone(),
        KeyExprBuilder::new(config.adlar.key_prefix.clone()),
    );
    let registry: SharedRegistry = Arc::new(Mutex::new(DeviceRegistry::new()));
    let options = config.adlar.transport_options();
    let retry_interval = config.adlar.retry_interval();

    // Set up each entry in its own task
    let mut tasks = Vec::new();
    let mut entry_ids = Vec::new();

    for (entry_id, settings) in config.adlar.device_settings()? {
        info!(
            "Setting up entry '{}' ({:?})",
            entry_id, settings.connection
        );
        entry_ids.push(entry_id.clone());

        tasks.push(tokio::spawn(setup_entry(
            entry_id,
            settings,
            options,
            retry_interval,
            Arc::clone(&catalog),
            publisher.clone(),
            Arc::clone(&registry),
        )));
    }

    info!("Adlar bridge running with {} entry(s)", entry_ids.len());

    // Publish bridge status
    if let Err(e) = publisher
        .publish_bridge_status(&BridgeStatus::running(entry_ids))
        .await
    {
        error!("Failed to publish bridge status: {}", e);
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    for task in tasks {
        task.abort();
    }

    let mut registry = registry.lock().await;
    info!(
        "Unloading device(s): {}",
        registry.entry_ids().collect::<Vec<_>>().join(", ")
    );
    registry.unload_all().await;
    drop(registry);

    let _ = publisher
        .publish_bridge_status(&BridgeStatus::offline())
        .await;

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close Zenoh session: {}", e))?;
    info!("Adlar bridge stopped");

    Ok(())
}

/// Retry setup of one entry until the unit answers, then register it.
async fn setup_entry(
    entry_id: String,
    settings: DeviceSettings,
    options: TransportOptions,
    retry_interval: Duration,
    catalog: Arc<Catalog>,
    publisher: DevicePublisher,
    registry: SharedRegistry,
) {
    loop {
        let transport = ModbusTransport::new(&settings, options);

        match Device::initialize(settings.name.clone(), transport, &catalog).await {
            Ok(device) => {
                let snapshot = DeviceSnapshot::from_device(&device);
                if let Err(e) = publisher.publish_snapshot(&entry_id, snapshot).await {
                    warn!("Failed to publish device '{}': {}", entry_id, e);
                }
                let previous = registry.lock().await.insert(entry_id.clone(), device);
                if let Some(previous) = previous {
                    previous.unload().await;
                }
                return;
            }
            Err(err) => {
                if let Some(unsupported) = err.unsupported() {
                    warn!("Entry '{}': {}", entry_id, unsupported);
                }
                if let Err(e) = publisher.publish_not_ready(&entry_id, &err).await {
                    warn!("Failed to publish status of '{}': {}", entry_id, e);
                }
                info!(
                    "Entry '{}' not ready, retrying in {:?}",
                    entry_id, retry_interval
                );
                tokio::time::sleep(retry_interval).await;
            }
        }
    }
}

fn print_resolved(
    hardware_type: u16,
    bus_version: u16,
    variant: VariantFlag,
    co2: bool,
) -> Result<()> {
    let catalog = Catalog::builtin().context("Built-in capability catalog is invalid")?;
    let hardware_type = HardwareType::new(hardware_type);
    let identity = DeviceIdentity::new(hardware_type, bus_version)
        .with_variant(variant)
        .with_features(FeaturePresence { co2 });

    let output = serde_json::json!({
        "device_type": identity.display_type(),
        "supported": hardware_type.is_supported(),
        "identity": identity,
        "attributes": resolve(&catalog, &identity),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
