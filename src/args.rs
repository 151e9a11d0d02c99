use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(about = "Reports earbuds battery status from BLE beacons")]
pub struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
