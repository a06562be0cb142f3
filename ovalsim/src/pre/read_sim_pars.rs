use crate::core::ai::AiDriverPars;
use crate::core::driver::{DriverId, DriverPars};
use crate::core::engine::RacePars;
use crate::core::track::TrackPars;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    pub track_pars: TrackPars,
    pub player_pars: DriverPars,
    pub ai_pars_all: Vec<AiDriverPars>,
    /// Starting grid as an ordered list of driver ids (front to back); the player starts ahead
    /// of the AI drivers if omitted
    #[serde(default)]
    pub starting_positions: Option<Vec<DriverId>>,
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    // open file
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;

    // read and parse parameter file content
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(pars)
}
