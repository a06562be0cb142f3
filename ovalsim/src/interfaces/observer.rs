use crate::core::car::CarState;
use crate::core::decision::{Decision, DecisionResult};
use crate::core::driver::{Driver, DriverId};
use serde::{Deserialize, Serialize};

/// Upper bound of the recent-events ring carried in each snapshot.
pub const RECENT_EVENTS_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    Green,
    Yellow,
    Checkered,
}

impl Default for FlagState {
    fn default() -> Self {
        FlagState::Green
    }
}

/// A discrete race happening, published on the bus and kept in the snapshot's recent-events
/// ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceNoteKind {
    PitStop,
    Caution,
    GreenFlag,
    PositionChange,
    Mistake,
    Incident,
    OutOfFuel,
    AiFault,
    Milestone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceNote {
    pub lap: u32,
    pub kind: RaceNoteKind,
    pub driver_id: DriverId,
    pub detail: String,
}

/// One leaderboard row of the public snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEntry {
    pub driver_id: DriverId,
    pub position: u32,
    pub last_lap_time: f64,
    pub gap_leader: f64,
    pub gap_next: f64,
    pub laps_led: u32,
}

/// Spatial and telemetry state of one car: where it is along the loop, how fast it is moving,
/// and what is left of its tires and fuel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub driver_id: DriverId,
    pub progress: f64,
    pub lane_offset_ft: f64,
    pub speed_mph: f64,
    pub drafting: bool,
    pub tire_pct: f64,
    pub fuel_pct: f64,
}

/// The player's own slice of the state, value-copied for observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub driver: Driver,
    pub car: CarState,
    pub position: u32,
}

/// The aggregate snapshot published to observers: leaderboard, spatial state, the player view,
/// the active prompt if any, and the recent events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceState {
    pub tick: u64,
    pub race_time_s: f64,
    pub current_lap: u32,
    pub total_laps: u32,
    pub flag: FlagState,
    pub track_name: String,
    pub positions: Vec<PositionEntry>,
    pub lap_progress: Vec<ProgressEntry>,
    pub leader_last_lap: f64,
    pub player: PlayerView,
    pub active_decision: Option<Decision>,
    pub recent_events: Vec<RaceNote>,
}

/// Everything the engine broadcasts. Observers receive value copies and must not feed anything
/// back except through the engine API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    RaceStateUpdate(RaceState),
    DecisionPrompt(Decision),
    DecisionResolved(DecisionResult),
    LapComplete {
        driver_id: DriverId,
        lap: u32,
        lap_time_s: f64,
        position: u32,
    },
    RaceEvent(RaceNote),
    RaceEnd {
        winner_id: DriverId,
    },
    RaceAborted,
}
