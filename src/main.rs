use std::process::ExitCode;

use anyhow::{Context as _, Result, anyhow};
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use clap::Parser as _;
use log::{debug, error};

use budwatch::config::AppConfig;
use budwatch::{manager, mqtt};

mod args;

use crate::args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::init();

    if let Err(e) = run().await {
        error!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    debug!("Config: {:?}", config);

    let mqtt = config.mqtt.as_ref().map(mqtt::MqttClient::new);

    let bt_manager = Manager::new()
        .await
        .context("failed to initialize Bluetooth manager")?;

    // get the first bluetooth adapter
    let adapter = bt_manager
        .adapters()
        .await
        .context("failed to get Bluetooth adapters")?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no Bluetooth adapters found"))?;

    let core = manager::Manager::new(adapter, mqtt, config);
    core.run_loop().await
}
