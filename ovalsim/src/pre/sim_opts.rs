use clap::{AppSettings, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "OVALSIM",
    about = "A turn-based stock-car race-strategy simulator written in Rust"
)]
#[clap(setting = AppSettings::ColoredHelp)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing (simulation progress and timing)
    #[clap(short, long)]
    pub debug: bool,

    /// Stream line-delimited JSON race messages to stdout for external renderers
    #[clap(short, long, conflicts_with = "debug")]
    pub stream_json: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (must be one in case JSON streaming is activated)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file
    #[clap(parse(from_os_str), short, long)]
    pub parfile_path: PathBuf,

    /// Override the RNG seed of the parameter file
    #[clap(long)]
    pub seed: Option<u64>,

    /// Set simulation tick size in milliseconds, should be in the range [10, 1000]
    #[clap(short, long, default_value = "100")]
    pub tick_ms: i64,

    /// Set real-time factor (0.0 simulates as fast as possible)
    #[clap(short, long, default_value = "0.0")]
    pub realtime_factor: f64,
}
