use crate::core::ai::{AiAction, AiContext, AiController, AiDriverPars};
use crate::core::decision::{
    self, Decision, DecisionEngine, DecisionResult, IncidentAhead, TriggerContext,
};
use crate::core::driver::{Driver, DriverId, DriverPars};
use crate::core::mental::MicroEvent;
use crate::core::physics::{self, PaceInputs, CAR_LENGTH_FT};
use crate::core::skills::SkillKind;
use crate::core::track::{Track, TrackPars};
use crate::core::car::CarState;
use crate::interfaces::observer::{
    EngineEvent, FlagState, PlayerView, PositionEntry, ProgressEntry, RaceNote, RaceNoteKind,
    RaceState, RECENT_EVENTS_CAP,
};
use anyhow::Context;
use helpers::buffer::RingBuffer;
use helpers::general::{argsort_stable, InputValueError, SortOrder};
use helpers::rng::SimRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

/// Grid stagger between two starting spots.
const GRID_SPACING_FT: f64 = 36.0;

/// Rolling window of lap times that forms a driver's current pace.
const PACE_WINDOW_LAPS: usize = 5;

/// Minimum lap time under caution, as a multiple of the green-flag reference pace.
const CAUTION_PACE_FACTOR: f64 = 1.4;

/// An incident stops being an emergency after this much simulated time.
const INCIDENT_FRESH_WINDOW_S: f64 = 3.0;

/// Temporal gap below which a driver counts as held up by the car ahead.
const STUCK_GAP_S: f64 = 1.2;

/// A single damage event at or above this raises a caution.
const CAUTION_DAMAGE_PCT: f64 = 5.0;

/// Crawling to the pits on an empty tank costs this much per lap.
const OUT_OF_FUEL_PENALTY_S: f64 = 5.0;

fn default_caution_laps() -> u32 {
    3
}

/// * `total_laps` - Scheduled race distance
/// * `rng_seed` - Seed of the engine PRNG; equal seeds and inputs reproduce the race exactly
/// * `snapshot_interval_ticks` - Optional fixed snapshot cadence on top of the lap-crossing
/// snapshots
/// * `caution_laps` - Leader laps a caution stays out
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    pub total_laps: u32,
    pub rng_seed: u64,
    #[serde(default)]
    pub snapshot_interval_ticks: Option<u64>,
    #[serde(default = "default_caution_laps")]
    pub caution_laps: u32,
}

/// Engine life-cycle. Constructing the engine is the initialization step, so there is no
/// uninitialized phase to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Ready,
    Running,
    AwaitingDecision,
    Finished,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// simulate_tick with a non-positive dt
    InvalidTick,
    /// Operation not valid in the current phase; state unchanged
    InvalidOperation(&'static str),
    /// submit_decision with an option id not on the active prompt; the prompt stays active
    InvalidDecisionChoice,
    /// A post-step assertion failed; the race is aborted
    InconsistentState(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::InvalidTick => write!(f, "Tick duration must be positive"),
            EngineError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            EngineError::InvalidDecisionChoice => {
                write!(f, "Option id is not part of the active prompt")
            }
            EngineError::InconsistentState(msg) => write!(f, "Inconsistent race state: {}", msg),
        }
    }
}

impl Error for EngineError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActiveDecision {
    decision: Decision,
    remaining_ms: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct IncidentRecord {
    entrant_idx: usize,
    /// Track location of the incident as a lap fraction
    progress: f64,
    severity_pct: f64,
    race_time_s: f64,
}

/// One car-driver combo in the running order, together with all per-race bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entrant {
    driver: Driver,
    car: CarState,
    ai: Option<AiController>,
    progress: f64,
    laps_completed: u32,
    lap_start_time_s: f64,
    last_lap_time: f64,
    /// Cached pace of the running lap, jitter and penalties included
    cur_lap_time: f64,
    jitter_s: f64,
    lap_penalty_s: f64,
    pace_dirty: bool,
    tire_bucket: u8,
    drafting: bool,
    position: u32,
    laps_led: u32,
    gap_leader_s: f64,
    gap_next_s: f64,
    stuck_behind: Option<DriverId>,
    stuck_candidate: Option<DriverId>,
    stuck_laps: u32,
    clean_laps: u32,
    pace_window: RingBuffer<f64>,
    pos_event_muted: bool,
    finished: bool,
    finish_seq: u32,
}

impl Entrant {
    fn new(driver: Driver, ai: Option<AiController>, grid_pos: u32, grid_frac: f64) -> Entrant {
        Entrant {
            driver,
            car: CarState::fresh(),
            ai,
            progress: grid_frac,
            laps_completed: 0,
            lap_start_time_s: 0.0,
            last_lap_time: 0.0,
            cur_lap_time: 0.0,
            jitter_s: 0.0,
            lap_penalty_s: 0.0,
            pace_dirty: true,
            tire_bucket: 20,
            drafting: false,
            position: grid_pos,
            laps_led: 0,
            gap_leader_s: 0.0,
            gap_next_s: 0.0,
            stuck_behind: None,
            stuck_candidate: None,
            stuck_laps: 0,
            clean_laps: 0,
            pace_window: RingBuffer::new(PACE_WINDOW_LAPS),
            pos_event_muted: false,
            finished: false,
            finish_seq: 0,
        }
    }

    /// total_key orders the field: completed laps plus lap fraction, with finished cars frozen
    /// ahead of anything still running on their lap.
    fn total_key(&self) -> f64 {
        if self.finished {
            self.laps_completed as f64 + 1.0 - self.finish_seq as f64 * 1e-9
        } else {
            self.laps_completed as f64 + self.progress
        }
    }

    fn pace_inputs(&self) -> PaceInputs {
        PaceInputs {
            racecraft: self.driver.skill(SkillKind::Racecraft),
            confidence: self.driver.mental.confidence,
            frustration: self.driver.mental.frustration,
            distraction: self.driver.mental.distraction,
            tire_pct: self.car.tire_pct,
            fuel_pct: self.car.fuel_pct,
            damage_pct: self.car.damage_pct,
            draft_sense: self.driver.skill(SkillKind::DraftSense),
            drafting: self.drafting,
        }
    }
}

/// The race engine: one authoritative mutable race state, advanced by a discrete-time tick
/// loop. A tick is an atomic run-to-completion step; the only suspension point is the
/// awaiting-decision phase, during which simulated time stands still.
#[derive(Debug, Serialize, Deserialize)]
pub struct RaceEngine {
    phase: EnginePhase,
    flag: FlagState,
    tick: u64,
    race_time_s: f64,
    total_laps: u32,
    caution_laps: u32,
    leader_lap: u32,
    caution_until_lap: Option<u32>,
    caution_pit_window: bool,
    track: Track,
    reference_lap_s: f64,
    entrants: Vec<Entrant>,
    player_idx: usize,
    rng: SimRng,
    decisions: DecisionEngine,
    active_decision: Option<ActiveDecision>,
    snapshot_interval_ticks: Option<u64>,
    last_incident: Option<IncidentRecord>,
    laptimes: Vec<Vec<f64>>,
    racetimes: Vec<Vec<f64>>,
    recent_events: VecDeque<RaceNote>,
    finish_counter: u32,
    #[serde(skip)]
    observers: Vec<flume::Sender<EngineEvent>>,
}

impl RaceEngine {
    /// new validates the configuration and builds a ready engine. Any violation (bad geometry,
    /// out-of-range skills, duplicate ids, degenerate field) is a configuration error surfaced
    /// to the caller; nothing is partially constructed.
    pub fn new(
        race_pars: &RacePars,
        track_pars: &TrackPars,
        player_pars: &DriverPars,
        ai_pars_all: &[AiDriverPars],
        starting_positions: Option<&[DriverId]>,
    ) -> anyhow::Result<RaceEngine> {
        if race_pars.total_laps < 1 {
            return Err(InputValueError).context("total_laps must be at least one!");
        }

        let field_size = ai_pars_all.len() + 1;
        if !(2..=43).contains(&field_size) {
            return Err(InputValueError).context(format!(
                "Field size is {}, which is not within the allowed range [2, 43]!",
                field_size
            ));
        }

        let mut all_pars: Vec<(&DriverPars, Option<&AiDriverPars>)> = vec![(player_pars, None)];
        for ai_pars in ai_pars_all.iter() {
            all_pars.push((&ai_pars.driver, Some(ai_pars)));
        }

        for (driver_pars, _) in all_pars.iter() {
            if driver_pars.skills.as_array().iter().any(|&level| level > 100) {
                return Err(InputValueError).context(format!(
                    "Driver {} has a skill level above 100!",
                    driver_pars.id
                ));
            }

            if !driver_pars.mental_baseline.in_range() {
                return Err(InputValueError).context(format!(
                    "Driver {} has a mental baseline outside [0, 100]!",
                    driver_pars.id
                ));
            }
        }

        let mut ids: Vec<DriverId> = all_pars.iter().map(|(pars, _)| pars.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != all_pars.len() {
            return Err(InputValueError).context("Duplicate driver ids in the field!");
        }

        let track = Track::new(track_pars).context("Failed to build the track!")?;
        let reference_lap_s = physics::base_lap_time_s(&track, false, 50.0)
            .map_err(|_| InputValueError)
            .context("Track parameters produce no usable reference lap time!")?;

        // determine the starting grid: the explicit order if given, otherwise the player ahead
        // of the AI drivers as listed
        let grid: Vec<DriverId> = match starting_positions {
            Some(order) => {
                let mut sorted: Vec<DriverId> = order.to_vec();
                sorted.sort_unstable();
                if sorted != ids {
                    return Err(InputValueError)
                        .context("starting_positions is not a permutation of the driver ids!");
                }
                order.to_vec()
            }
            None => all_pars.iter().map(|(pars, _)| pars.id).collect(),
        };

        // entrants are stored sorted by driver id so that every per-tick iteration (and with it
        // every PRNG draw sequence and tie-break) has one canonical order
        let spacing_frac = GRID_SPACING_FT / track.length_ft;
        let mut entrants: Vec<Entrant> = all_pars
            .iter()
            .map(|(driver_pars, ai_pars)| {
                let grid_idx = grid
                    .iter()
                    .position(|&id| id == driver_pars.id)
                    .expect("Grid order was checked to contain every driver id!");
                let grid_pos = grid_idx as u32 + 1;
                let grid_frac = (field_size - 1 - grid_idx) as f64 * spacing_frac;

                Entrant::new(
                    Driver::new(driver_pars, ai_pars.is_none()),
                    ai_pars.map(|pars| AiController::new(pars.personality)),
                    grid_pos,
                    grid_frac,
                )
            })
            .collect();
        entrants.sort_by_key(|e| e.driver.id);

        let player_idx = entrants
            .iter()
            .position(|e| e.driver.is_player)
            .expect("The player entrant was just inserted!");

        let mut engine = RaceEngine {
            phase: EnginePhase::Ready,
            flag: FlagState::Green,
            tick: 0,
            race_time_s: 0.0,
            total_laps: race_pars.total_laps,
            caution_laps: race_pars.caution_laps,
            leader_lap: 1,
            caution_until_lap: None,
            caution_pit_window: false,
            track,
            reference_lap_s,
            laptimes: vec![Vec::new(); entrants.len()],
            racetimes: vec![vec![0.0]; entrants.len()],
            entrants,
            player_idx,
            rng: SimRng::from_seed(race_pars.rng_seed),
            decisions: DecisionEngine::new(),
            active_decision: None,
            snapshot_interval_ticks: race_pars.snapshot_interval_ticks,
            last_incident: None,
            recent_events: VecDeque::new(),
            finish_counter: 0,
            observers: Vec::new(),
        };

        // initial pace, jitter drawn in canonical order
        for idx in 0..engine.entrants.len() {
            let halfwidth = physics::lap_variance_halfwidth_s(
                engine.entrants[idx].driver.skill(SkillKind::Consistency),
            );
            let jitter = engine.rng.jitter(halfwidth);
            engine.entrants[idx].jitter_s = jitter;
        }
        engine
            .refresh_pace()
            .map_err(|_| InputValueError)
            .context("Initial lap-time computation failed!")?;

        Ok(engine)
    }

    // ---------------------------------------------------------------------------------------------
    // PUBLIC API ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn flag(&self) -> FlagState {
        self.flag
    }

    pub fn race_time_s(&self) -> f64 {
        self.race_time_s
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// current_lap is the leader's running lap, capped at the race distance.
    pub fn current_lap(&self) -> u32 {
        self.leader_lap.min(self.total_laps)
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, EnginePhase::Finished | EnginePhase::Aborted)
    }

    /// subscribe registers an observer and returns its receiving end. Observers get value
    /// copies; dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> flume::Receiver<EngineEvent> {
        let (tx, rx) = flume::unbounded();
        self.observers.push(tx);
        rx
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.phase != EnginePhase::Ready {
            return Err(EngineError::InvalidOperation("start requires a ready engine"));
        }

        self.phase = EnginePhase::Running;
        self.publish_snapshot();
        Ok(())
    }

    /// abort is safe from any phase and idempotent: the active prompt is dropped, the race ends
    /// in the aborted phase, and observers get a single aborted event.
    pub fn abort(&mut self) {
        if self.phase == EnginePhase::Aborted {
            return;
        }

        self.active_decision = None;
        self.phase = EnginePhase::Aborted;
        self.publish(EngineEvent::RaceAborted);
    }

    /// simulate_tick advances the race by dt_ms of simulated time. While a decision is pending
    /// only the decision timer advances; a timer that reaches zero resolves the prompt with its
    /// default option as a neutral outcome.
    pub fn simulate_tick(&mut self, dt_ms: i64) -> Result<(), EngineError> {
        if dt_ms <= 0 {
            return Err(EngineError::InvalidTick);
        }

        match self.phase {
            EnginePhase::Running | EnginePhase::AwaitingDecision => {}
            EnginePhase::Ready => {
                return Err(EngineError::InvalidOperation("engine has not been started"))
            }
            _ => return Err(EngineError::InvalidOperation("race is complete")),
        }

        self.tick += 1;

        // decision pending: simulated time stands still, only the shot clock runs
        if self.phase == EnginePhase::AwaitingDecision {
            let timed_out = {
                let active = self
                    .active_decision
                    .as_mut()
                    .expect("Awaiting-decision phase requires an active prompt!");
                active.remaining_ms -= dt_ms;
                active.remaining_ms <= 0
            };

            if timed_out {
                let decision = self
                    .active_decision
                    .take()
                    .expect("Awaiting-decision phase requires an active prompt!")
                    .decision;
                let result = self.decisions.resolve_timeout(&decision);
                self.apply_decision_result(self.player_idx, &result);
                self.phase = EnginePhase::Running;
                self.publish(EngineEvent::DecisionResolved(result));
                self.publish_snapshot();
            }

            return Ok(());
        }

        let dt_s = dt_ms as f64 / 1000.0;
        self.race_time_s += dt_s;

        self.refresh_pace()
            .map_err(|_| EngineError::InconsistentState("lap-time inputs left range".into()))?;

        // advance race progress and collect the line crossings of this tick in crossing order
        let mut crossings: Vec<(usize, f64)> = Vec::new();
        let mut blown_tick: Option<usize> = None;

        for (idx, entrant) in self.entrants.iter_mut().enumerate() {
            if entrant.finished {
                continue;
            }

            let prev_progress = entrant.progress;
            entrant.progress += dt_s / entrant.cur_lap_time;

            if entrant.progress >= 2.0 {
                blown_tick = Some(idx);
                break;
            }

            if entrant.progress >= 1.0 {
                let t_cross = (1.0 - prev_progress) * entrant.cur_lap_time;
                crossings.push((idx, t_cross));
            }
        }

        if let Some(idx) = blown_tick {
            return self.fail(format!("car {} jumped more than a full lap in one tick", idx));
        }

        crossings.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap()
                .then_with(|| self.entrants[a.0].driver.id.cmp(&self.entrants[b.0].driver.id))
        });

        let crossed_this_tick = !crossings.is_empty();

        for (idx, t_cross) in crossings {
            self.handle_lap_complete(idx, t_cross, dt_s);
        }

        self.update_flag();
        self.update_positions_and_gaps();

        // race over once every car has taken the checkered flag
        if self.entrants.iter().all(|e| e.finished) {
            self.phase = EnginePhase::Finished;
            let winner_id = self
                .entrants
                .iter()
                .find(|e| e.finish_seq == 1)
                .map(|e| e.driver.id)
                .unwrap_or(0);
            self.publish(EngineEvent::RaceEnd { winner_id });
            self.publish_snapshot();
            return Ok(());
        }

        // consult the decision engine for the player only; AI strategy is resolved internally
        // at the lap boundaries
        if !self.entrants[self.player_idx].finished {
            if let Some(decision) = self.consult_player_triggers() {
                self.active_decision = Some(ActiveDecision {
                    remaining_ms: (decision.time_limit_s * 1000.0) as i64,
                    decision: decision.clone(),
                });
                self.phase = EnginePhase::AwaitingDecision;
                self.publish(EngineEvent::DecisionPrompt(decision));
                self.publish_snapshot();
                return Ok(());
            }
        }

        self.verify_invariants()?;

        let interval_hit = self
            .snapshot_interval_ticks
            .map_or(false, |n| n > 0 && self.tick % n == 0);

        if crossed_this_tick || interval_hit {
            self.publish_snapshot();
        }

        Ok(())
    }

    /// submit_decision resolves the pending prompt with the chosen option. Unknown option ids
    /// are rejected without touching the prompt.
    pub fn submit_decision(&mut self, option_id: &str) -> Result<DecisionResult, EngineError> {
        if self.phase != EnginePhase::AwaitingDecision {
            return Err(EngineError::InvalidOperation("no decision is pending"));
        }

        let decision = self
            .active_decision
            .as_ref()
            .map(|a| a.decision.clone())
            .expect("Awaiting-decision phase requires an active decision!");

        if decision.option(option_id).is_none() {
            return Err(EngineError::InvalidDecisionChoice);
        }

        let player = &self.entrants[self.player_idx];
        let result = self
            .decisions
            .evaluate(
                &decision,
                option_id,
                &player.driver.skills,
                &player.driver.mental,
                &mut self.rng,
            )
            .expect("Option id was validated against the prompt!");

        self.apply_decision_result(self.player_idx, &result);
        self.active_decision = None;
        self.phase = EnginePhase::Running;
        self.publish(EngineEvent::DecisionResolved(result.clone()));
        self.publish_snapshot();

        Ok(result)
    }

    /// current_state builds the public aggregate snapshot of the race.
    pub fn current_state(&self) -> RaceState {
        let order = self.ranking();

        let positions = order
            .iter()
            .map(|&idx| {
                let e = &self.entrants[idx];
                PositionEntry {
                    driver_id: e.driver.id,
                    position: e.position,
                    last_lap_time: e.last_lap_time,
                    gap_leader: e.gap_leader_s,
                    gap_next: e.gap_next_s,
                    laps_led: e.laps_led,
                }
            })
            .collect();

        let lap_progress = self
            .entrants
            .iter()
            .map(|e| ProgressEntry {
                driver_id: e.driver.id,
                progress: e.progress,
                lane_offset_ft: if e.car.in_pit_this_lap {
                    -(self.track.width_ft / 2.0 + 10.0)
                } else {
                    0.0
                },
                speed_mph: if e.cur_lap_time > 0.0 {
                    self.track.length_miles / e.cur_lap_time * 3600.0
                } else {
                    0.0
                },
                drafting: e.drafting,
                tire_pct: e.car.tire_pct,
                fuel_pct: e.car.fuel_pct,
            })
            .collect();

        let leader_idx = order[0];
        let player = &self.entrants[self.player_idx];

        RaceState {
            tick: self.tick,
            race_time_s: self.race_time_s,
            current_lap: self.leader_lap.min(self.total_laps),
            total_laps: self.total_laps,
            flag: self.flag,
            track_name: self.track.name.to_owned(),
            positions,
            lap_progress,
            leader_last_lap: self.entrants[leader_idx].last_lap_time,
            player: PlayerView {
                driver: player.driver.to_owned(),
                car: player.car,
                position: player.position,
            },
            active_decision: self.active_decision.as_ref().map(|a| a.decision.to_owned()),
            recent_events: self.recent_events.iter().cloned().collect(),
        }
    }

    /// snapshot_json serializes the complete engine state, PRNG included. Feeding the restored
    /// engine the same remaining ticks and inputs reproduces the same final state.
    pub fn snapshot_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("Failed to serialize the engine state!")
    }

    pub fn from_snapshot_json(snapshot: &str) -> anyhow::Result<RaceEngine> {
        serde_json::from_str(snapshot).context("Failed to restore the engine state!")
    }

    // ---------------------------------------------------------------------------------------------
    // TICK PARTS ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// refresh_pace recomputes the cached lap time of every car whose inputs changed materially:
    /// new lap, draft entered or left, tire bucket transition, pit, decision effects, flag
    /// changes.
    fn refresh_pace(&mut self) -> Result<(), physics::InvalidInput> {
        // draft detection first; a change marks the pace dirty
        let spatial: Vec<(f64, u32, bool)> = self
            .entrants
            .iter()
            .map(|e| (e.progress, e.laps_completed, e.finished))
            .collect();

        for (idx, entrant) in self.entrants.iter_mut().enumerate() {
            if entrant.finished {
                continue;
            }

            let mut best_gap_ft = f64::INFINITY;

            for (jdx, &(progress, laps, finished)) in spatial.iter().enumerate() {
                if jdx == idx || finished || laps < entrant.laps_completed {
                    continue;
                }

                let delta = (progress - entrant.progress).rem_euclid(1.0);
                if delta > 0.0 {
                    best_gap_ft = best_gap_ft.min(delta * self.track.length_ft);
                }
            }

            let drafting = physics::draft_available(best_gap_ft);
            if drafting != entrant.drafting {
                entrant.drafting = drafting;
                entrant.pace_dirty = true;
            }

            let bucket = (entrant.car.tire_pct / 5.0).floor() as u8;
            if bucket != entrant.tire_bucket {
                entrant.tire_bucket = bucket;
                entrant.pace_dirty = true;
            }
        }

        let caution_floor = self.reference_lap_s * CAUTION_PACE_FACTOR;

        for entrant in self.entrants.iter_mut() {
            if entrant.finished || !entrant.pace_dirty {
                continue;
            }

            let mut lap_time = physics::lap_time_s(&self.track, &entrant.pace_inputs())?
                + entrant.jitter_s
                + entrant.lap_penalty_s;

            if self.flag == FlagState::Yellow {
                lap_time = lap_time.max(caution_floor);
            }

            entrant.cur_lap_time = lap_time;
            entrant.pace_dirty = false;
        }

        Ok(())
    }

    /// handle_lap_complete performs all lap-boundary bookkeeping of one car: timing, wear,
    /// mental drift, mistakes, the checkered flag, and the AI strategy consultation.
    fn handle_lap_complete(&mut self, idx: usize, t_cross: f64, dt_s: f64) {
        let crossing_time = self.race_time_s - dt_s + t_cross;

        let entrant = &mut self.entrants[idx];
        entrant.laps_completed += 1;
        entrant.progress -= 1.0;

        let lap_time = crossing_time - entrant.lap_start_time_s;
        entrant.last_lap_time = lap_time;
        entrant.lap_start_time_s = crossing_time;
        entrant.pace_window.push(lap_time);

        self.laptimes[idx].push(lap_time);
        self.racetimes[idx].push(crossing_time);

        let driver_id = self.entrants[idx].driver.id;
        let lap = self.entrants[idx].laps_completed;
        let position = self.entrants[idx].position;
        self.publish(EngineEvent::LapComplete {
            driver_id,
            lap,
            lap_time_s: lap_time,
            position,
        });

        // checkered flag: the first car to complete the distance throws it, everyone else is
        // classified at their next crossing
        if self.flag == FlagState::Checkered || lap >= self.total_laps {
            if self.flag != FlagState::Checkered {
                self.flag = FlagState::Checkered;
                self.push_note(RaceNoteKind::Milestone, driver_id, lap, "Checkered flag");
            }

            self.finish_counter += 1;
            let entrant = &mut self.entrants[idx];
            entrant.finished = true;
            entrant.finish_seq = self.finish_counter;
            return;
        }

        let entrant = &mut self.entrants[idx];

        // wear, burn, fuel emergencies
        let tire_wear = physics::tire_wear_per_lap_pct(
            self.track.class,
            entrant.driver.skill(SkillKind::Aggression),
            entrant.driver.skill(SkillKind::TireManagement),
        );
        let fuel_burn = physics::fuel_burn_per_lap_pct(
            self.track.class,
            entrant.drafting,
            entrant.driver.skill(SkillKind::FuelManagement),
        );
        entrant.car.apply_lap_wear(tire_wear, fuel_burn);
        entrant.car.in_pit_this_lap = false;
        entrant.lap_penalty_s = 0.0;

        if entrant.car.fuel_pct <= 0.0 {
            entrant.lap_penalty_s += OUT_OF_FUEL_PENALTY_S;
            self.push_note(RaceNoteKind::OutOfFuel, driver_id, lap, "Running on fumes");
        }

        // mental drift of the lap
        let stamina = self.entrants[idx].driver.skill(SkillKind::Stamina);
        let composure = self.entrants[idx].driver.skill(SkillKind::Composure);
        let baseline = self.entrants[idx].driver.mental_baseline;
        let entrant = &mut self.entrants[idx];
        entrant.driver.mental.drain_focus(stamina);
        entrant.driver.mental.recover(&baseline, composure);

        if entrant.position == 1 {
            entrant.laps_led += 1;
            entrant.driver.mental.apply_micro_event(MicroEvent::LedLap);
        }

        // traffic streak
        if entrant.stuck_candidate.is_some() && entrant.stuck_candidate == entrant.stuck_behind {
            entrant.stuck_laps += 1;
            if entrant.stuck_laps >= 3 && entrant.stuck_laps % 3 == 0 {
                entrant
                    .driver
                    .mental
                    .apply_micro_event(MicroEvent::StuckInTraffic);
            }
        } else {
            entrant.stuck_behind = entrant.stuck_candidate;
            entrant.stuck_laps = if entrant.stuck_behind.is_some() { 1 } else { 0 };
        }

        // mistake draw; the pace car protects the field under yellow
        if self.flag == FlagState::Green {
            let p = physics::mistake_probability(
                self.entrants[idx].driver.mental.focus,
                self.entrants[idx].driver.mental.frustration,
                self.entrants[idx].driver.mental.distraction,
            );

            if self.rng.chance(p) {
                let penalty = self.rng.range(0.5, 2.0);
                let severe = penalty > 1.4;
                let damage = if severe { self.rng.range(2.0, 10.0) } else { 0.0 };

                let entrant = &mut self.entrants[idx];
                entrant.lap_penalty_s += penalty;
                entrant.driver.mental.apply_micro_event(MicroEvent::Mistake);
                entrant.clean_laps = 0;

                if damage > 0.0 {
                    entrant.car.add_damage(damage);
                }

                self.push_note(RaceNoteKind::Mistake, driver_id, lap, "Slipped up in traffic");

                if damage >= CAUTION_DAMAGE_PCT {
                    self.record_incident(idx, damage);
                }
            } else {
                let entrant = &mut self.entrants[idx];
                entrant.clean_laps += 1;
                if entrant.clean_laps % 5 == 0 {
                    entrant
                        .driver
                        .mental
                        .apply_micro_event(MicroEvent::CleanLapsStreak);
                }
            }
        }

        // AI strategy at the lap boundary, resolved through the shared evaluator
        if self.entrants[idx].ai.is_some() {
            self.run_ai_strategy(idx);
        }

        // fresh jitter for the lap ahead
        let halfwidth =
            physics::lap_variance_halfwidth_s(self.entrants[idx].driver.skill(SkillKind::Consistency));
        let jitter = self.rng.jitter(halfwidth);
        let entrant = &mut self.entrants[idx];
        entrant.jitter_s = jitter;
        entrant.pace_dirty = true;
    }

    /// run_ai_strategy lets the controller of an AI car act on its finished lap. An invalid
    /// internal choice is recovered by substituting the low-risk default and noting the fault.
    fn run_ai_strategy(&mut self, idx: usize) {
        let entrant = &self.entrants[idx];
        let controller = entrant.ai.as_ref().expect("Caller checked the controller!").to_owned();

        let ctx = AiContext {
            tire_pct: entrant.car.tire_pct,
            fuel_pct: entrant.car.fuel_pct,
            fuel_burn_per_lap_pct: physics::fuel_burn_per_lap_pct(
                self.track.class,
                entrant.drafting,
                entrant.driver.skill(SkillKind::FuelManagement),
            ),
            laps_to_go: self.total_laps.saturating_sub(entrant.laps_completed),
            position: entrant.position,
            gap_next_s: entrant.gap_next_s,
            caution: self.flag == FlagState::Yellow,
            aggression_skill: entrant.driver.skill(SkillKind::Aggression),
            pit_strategy_skill: entrant.driver.skill(SkillKind::PitStrategy),
        };

        let action = controller.on_lap_complete(&ctx, &mut self.rng);

        match action {
            AiAction::None => {}
            AiAction::Pit(service) => {
                let options = decision::options_for(
                    decision::DecisionKind::PitStrategy,
                    ctx.pit_strategy_skill,
                );
                let wanted = match service {
                    crate::core::car::PitService::FuelOnly => "pit-fuel-only",
                    crate::core::car::PitService::TiresOnly => "pit-tires-only",
                    crate::core::car::PitService::Full => "pit-full",
                };
                let option = match options.iter().find(|o| o.id == wanted) {
                    Some(option) => option.to_owned(),
                    None => {
                        let driver_id = self.entrants[idx].driver.id;
                        let lap = self.entrants[idx].laps_completed;
                        self.push_note(
                            RaceNoteKind::AiFault,
                            driver_id,
                            lap,
                            "Crew chief called an unavailable service",
                        );
                        options
                            .iter()
                            .find(|o| o.id == "pit-full")
                            .expect("The full service is always offered!")
                            .to_owned()
                    }
                };
                self.resolve_internal_choice(idx, decision::DecisionKind::PitStrategy, &option);
            }
            AiAction::AttemptPass => {
                let options = decision::options_for(decision::DecisionKind::Passing, 50.0);
                let wanted = controller.choose_pass_option();
                let option = match options.iter().find(|o| o.id == wanted) {
                    Some(option) => option.to_owned(),
                    None => {
                        let driver_id = self.entrants[idx].driver.id;
                        let lap = self.entrants[idx].laps_completed;
                        self.push_note(
                            RaceNoteKind::AiFault,
                            driver_id,
                            lap,
                            "Spotter called an unknown move",
                        );
                        options[0].to_owned()
                    }
                };
                self.resolve_internal_choice(idx, decision::DecisionKind::Passing, &option);
            }
        }
    }

    /// resolve_internal_choice rolls an option for an AI driver and applies the outcome, the
    /// exact path a player decision takes minus the prompt round-trip.
    fn resolve_internal_choice(
        &mut self,
        idx: usize,
        kind: decision::DecisionKind,
        option: &decision::DecisionOption,
    ) {
        let entrant = &self.entrants[idx];
        let (outcome, effects, xp, message) = decision::evaluate_option(
            kind,
            option,
            &entrant.driver.skills,
            &entrant.driver.mental,
            &mut self.rng,
        );

        let result = DecisionResult {
            decision_id: 0,
            option_id: option.id.to_owned(),
            outcome,
            effects,
            xp_gained: xp,
            message,
        };
        self.apply_decision_result(idx, &result);
    }

    /// apply_decision_result folds a decision outcome into the race: mental and car deltas, pit
    /// service, position shifts, and XP. Shared by the player path, the timeout path, and the
    /// AI path.
    fn apply_decision_result(&mut self, idx: usize, result: &DecisionResult) {
        let driver_id = self.entrants[idx].driver.id;
        let lap = self.entrants[idx].laps_completed + 1;

        {
            let entrant = &mut self.entrants[idx];
            entrant.driver.mental.apply_delta(&result.effects.mental);
            entrant.car.apply_decision_effects(
                result.effects.tire_delta,
                result.effects.fuel_delta,
                result.effects.damage_delta,
            );

            for (skill, amount) in result.xp_gained.iter() {
                entrant.driver.skills.gain(*skill, *amount);
            }
        }

        if let Some(service) = result.effects.pit {
            self.entrants[idx].car.apply_pit(service);
            self.push_note(RaceNoteKind::PitStop, driver_id, lap, "Pit stop complete");
        }

        if result.effects.position_delta != 0 {
            self.apply_position_delta(idx, result.effects.position_delta);
        }

        if result.effects.damage_delta >= CAUTION_DAMAGE_PCT {
            self.record_incident(idx, result.effects.damage_delta);
        }

        self.entrants[idx].pace_dirty = true;
    }

    /// apply_position_delta moves a car up or down the running order by adjusting its lap
    /// fraction relative to the car currently holding the target spot. The car never leaves its
    /// current lap; a pit cycle's positions lost therefore translate into real track distance.
    fn apply_position_delta(&mut self, idx: usize, delta: i32) {
        let order = self.ranking();
        let my_rank = order
            .iter()
            .position(|&i| i == idx)
            .expect("Every entrant has a rank!") as i32;

        let target_rank = (my_rank - delta).max(0).min(order.len() as i32 - 1);
        if target_rank == my_rank {
            return;
        }

        let target_idx = order[target_rank as usize];
        let target_key = self.entrants[target_idx].total_key();
        let eps = 2.0 * CAR_LENGTH_FT / self.track.length_ft;

        let my_laps = self.entrants[idx].laps_completed as f64;
        let new_key = if delta > 0 {
            target_key + eps
        } else {
            target_key - eps
        };

        // stay within the current lap; [0, 1) must hold afterwards
        let new_progress = (new_key - my_laps).max(0.0).min(0.999_999);
        let entrant = &mut self.entrants[idx];
        entrant.progress = new_progress;
        entrant.pos_event_muted = true;
        entrant.pace_dirty = true;
    }

    fn record_incident(&mut self, idx: usize, severity_pct: f64) {
        let driver_id = self.entrants[idx].driver.id;
        let lap = self.entrants[idx].laps_completed;
        let progress = self.entrants[idx].progress;

        self.last_incident = Some(IncidentRecord {
            entrant_idx: idx,
            progress,
            severity_pct,
            race_time_s: self.race_time_s,
        });
        self.push_note(RaceNoteKind::Incident, driver_id, lap, "Trouble on the track");

        if self.flag == FlagState::Green {
            self.flag = FlagState::Yellow;
            self.caution_until_lap = Some(self.leader_lap + self.caution_laps);
            self.caution_pit_window = true;
            self.push_note(RaceNoteKind::Caution, driver_id, lap, "Caution is out");

            for entrant in self.entrants.iter_mut() {
                if !entrant.finished {
                    entrant
                        .driver
                        .mental
                        .apply_micro_event(MicroEvent::CautionBreather);
                    entrant.pace_dirty = true;
                }
            }
        }
    }

    fn update_flag(&mut self) {
        let leader_lap = self
            .entrants
            .iter()
            .map(|e| e.laps_completed)
            .max()
            .unwrap_or(0)
            + 1;
        self.leader_lap = leader_lap;

        if self.flag == FlagState::Yellow {
            if let Some(until) = self.caution_until_lap {
                if leader_lap > until {
                    self.flag = FlagState::Green;
                    self.caution_until_lap = None;
                    self.caution_pit_window = false;
                    self.push_note(RaceNoteKind::GreenFlag, 0, leader_lap, "Back to green");

                    for entrant in self.entrants.iter_mut() {
                        entrant.pace_dirty = true;
                    }
                }
            }
        }
    }

    fn ranking(&self) -> Vec<usize> {
        let keys: Vec<f64> = self.entrants.iter().map(|e| e.total_key()).collect();
        argsort_stable(&keys, SortOrder::Descending)
    }

    /// update_positions_and_gaps recomputes the leaderboard and the integrated time gaps, and
    /// feeds position changes back into the mental model.
    fn update_positions_and_gaps(&mut self) {
        let order = self.ranking();
        let keys: Vec<f64> = self.entrants.iter().map(|e| e.total_key()).collect();
        let leader_key = keys[order[0]];

        // driver id directly ahead of each rank, resolved before any mutation
        let ahead_ids: Vec<Option<DriverId>> = (0..order.len())
            .map(|rank| {
                if rank == 0 {
                    None
                } else {
                    Some(self.entrants[order[rank - 1]].driver.id)
                }
            })
            .collect();

        let mut pass_events: Vec<(usize, bool)> = Vec::new();

        for (rank, &idx) in order.iter().enumerate() {
            let new_pos = rank as u32 + 1;
            let entrant = &self.entrants[idx];

            if new_pos != entrant.position
                && !entrant.finished
                && !entrant.pos_event_muted
                && !entrant.car.in_pit_this_lap
                && self.flag == FlagState::Green
            {
                pass_events.push((idx, new_pos < entrant.position));
            }

            let gap_next = if rank == 0 {
                0.0
            } else {
                (keys[order[rank - 1]] - keys[idx]).max(0.0)
            };

            let entrant = &mut self.entrants[idx];
            entrant.position = new_pos;

            // integrated time gaps at the trailing car's pace
            entrant.gap_leader_s = (leader_key - keys[idx]).max(0.0) * entrant.cur_lap_time;
            entrant.gap_next_s = gap_next * entrant.cur_lap_time;

            // remember who is directly ahead for the traffic bookkeeping
            entrant.stuck_candidate =
                if entrant.gap_next_s < STUCK_GAP_S && rank > 0 && !entrant.finished {
                    ahead_ids[rank]
                } else {
                    None
                };
        }

        for (idx, gained) in pass_events {
            let driver_id = self.entrants[idx].driver.id;
            let lap = self.entrants[idx].laps_completed + 1;
            let entrant = &mut self.entrants[idx];

            if gained {
                entrant.driver.mental.apply_micro_event(MicroEvent::PassCompleted);
            } else {
                entrant.driver.mental.apply_micro_event(MicroEvent::WasPassed);
            }

            if idx == self.player_idx {
                let detail = if gained { "Gained a spot" } else { "Lost a spot" };
                self.push_note(RaceNoteKind::PositionChange, driver_id, lap, detail);
            }
        }

        for entrant in self.entrants.iter_mut() {
            entrant.pos_event_muted = false;
        }
    }

    /// consult_player_triggers assembles the player's trigger context and asks the decision
    /// engine for a prompt.
    fn consult_player_triggers(&mut self) -> Option<Decision> {
        let player = &self.entrants[self.player_idx];

        let incident_ahead = self.last_incident.and_then(|incident| {
            if incident.entrant_idx == self.player_idx {
                return None;
            }

            if self.race_time_s - incident.race_time_s > INCIDENT_FRESH_WINDOW_S {
                return None;
            }

            let gap_frac = (incident.progress - player.progress).rem_euclid(1.0);
            Some(IncidentAhead {
                gap_car_lengths: gap_frac * self.track.length_ft / CAR_LENGTH_FT,
                severity_pct: incident.severity_pct,
            })
        });

        // rolling pace advantage over the car we are stuck behind
        let pace_delta_vs_ahead_s = match player.stuck_behind {
            Some(ahead_id) => {
                let ahead = self.entrants.iter().find(|e| e.driver.id == ahead_id);
                match (player.pace_window.get_avg(), ahead.and_then(|a| a.pace_window.get_avg())) {
                    (Some(mine), Some(theirs)) if player.pace_window.is_full() => theirs - mine,
                    _ => 0.0,
                }
            }
            None => 0.0,
        };

        let lapped_traffic_ahead = self.entrants.iter().any(|other| {
            if other.driver.id == player.driver.id || other.finished {
                return false;
            }

            if other.laps_completed >= player.laps_completed {
                return false;
            }

            let gap_frac = (other.progress - player.progress).rem_euclid(1.0);
            gap_frac * self.track.length_ft <= physics::DRAFT_RANGE_CAR_LENGTHS * CAR_LENGTH_FT
        });

        let fuel_burn = physics::fuel_burn_per_lap_pct(
            self.track.class,
            player.drafting,
            player.driver.skill(SkillKind::FuelManagement),
        );
        let laps_to_next_pit_window = if fuel_burn > 0.0 {
            (player.car.fuel_pct / fuel_burn).floor() as u32
        } else {
            u32::MAX
        };

        let (section, _) = self.track.section_at(player.progress);
        let in_passing_zone = !section.is_turn();

        let ctx = TriggerContext {
            lap: player.laps_completed + 1,
            total_laps: self.total_laps,
            position: player.position,
            laps_to_go: self.total_laps.saturating_sub(player.laps_completed),
            mental: &player.driver.mental,
            car: &player.car,
            skills: &player.driver.skills,
            caution: self.flag == FlagState::Yellow,
            caution_pit_window: self.caution_pit_window && self.flag == FlagState::Yellow,
            incident_ahead,
            stuck_behind_laps: player.stuck_laps,
            pace_delta_vs_ahead_s,
            in_passing_zone,
            lapped_traffic_ahead,
            laps_to_next_pit_window,
        };

        let decision = self.decisions.should_trigger(&ctx)?;

        // a consumed trigger does not re-fire: the incident is spent, the caution window closes
        if decision.kind == decision::DecisionKind::Incident {
            self.last_incident = None;
        }
        if decision.kind == decision::DecisionKind::PitStrategy {
            self.caution_pit_window = false;
        }

        Some(decision)
    }

    fn verify_invariants(&mut self) -> Result<(), EngineError> {
        let field_size = self.entrants.len() as u32;
        let mut violation: Option<String> = None;

        for entrant in self.entrants.iter() {
            if !entrant.finished && !(0.0..1.0).contains(&entrant.progress) {
                violation = Some(format!(
                    "progress {} of car {} left [0, 1)",
                    entrant.progress, entrant.driver.id
                ));
            } else if !entrant.cur_lap_time.is_finite() || entrant.cur_lap_time <= 0.0 {
                violation = Some(format!("lap time of car {} is degenerate", entrant.driver.id));
            } else if entrant.position == 0 || entrant.position > field_size {
                violation = Some(format!(
                    "position of car {} exceeds the field",
                    entrant.driver.id
                ));
            } else if !entrant.car.in_range() {
                violation = Some(format!("car state of {} left [0, 100]", entrant.driver.id));
            } else if !entrant.driver.mental.in_range() {
                violation = Some(format!("mental state of {} left [0, 100]", entrant.driver.id));
            }

            if violation.is_some() {
                break;
            }
        }

        match violation {
            Some(msg) => self.fail(msg),
            None => Ok(()),
        }
    }

    /// fail aborts the race on a broken invariant. Not recoverable.
    fn fail<T>(&mut self, msg: String) -> Result<T, EngineError> {
        self.active_decision = None;
        self.phase = EnginePhase::Aborted;
        self.publish(EngineEvent::RaceAborted);
        Err(EngineError::InconsistentState(msg))
    }

    // ---------------------------------------------------------------------------------------------
    // PUBLISHING ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn push_note(&mut self, kind: RaceNoteKind, driver_id: DriverId, lap: u32, detail: &str) {
        let note = RaceNote {
            lap,
            kind,
            driver_id,
            detail: detail.to_owned(),
        };

        self.recent_events.push_back(note.clone());
        while self.recent_events.len() > RECENT_EVENTS_CAP {
            self.recent_events.pop_front();
        }

        self.publish(EngineEvent::RaceEvent(note));
    }

    fn publish(&mut self, event: EngineEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn publish_snapshot(&mut self) {
        let state = self.current_state();
        self.publish(EngineEvent::RaceStateUpdate(state));
    }

    // ---------------------------------------------------------------------------------------------
    // RESULTS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// race_result builds the final classification once every car is home.
    pub fn race_result(&self) -> Option<crate::post::race_result::RaceResult> {
        if self.phase != EnginePhase::Finished {
            return None;
        }

        let order = self.ranking();

        let classification = order
            .iter()
            .enumerate()
            .map(|(rank, &idx)| {
                let e = &self.entrants[idx];
                crate::post::race_result::FinishEntry {
                    driver_id: e.driver.id,
                    name: e.driver.name.to_owned(),
                    number: e.driver.number,
                    position: rank as u32 + 1,
                    laps_completed: e.laps_completed,
                    laps_led: e.laps_led,
                    is_player: e.driver.is_player,
                }
            })
            .collect();

        Some(crate::post::race_result::RaceResult {
            track_name: self.track.name.to_owned(),
            total_laps: self.total_laps,
            classification,
            drivers: self.entrants.iter().map(|e| e.driver.to_owned()).collect(),
            laptimes: self.laptimes.to_owned(),
            racetimes: self.racetimes.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::Personality;
    use crate::core::mental::MentalState;
    use crate::core::skills::SkillLevels;

    fn flat_skills(level: u32) -> SkillLevels {
        SkillLevels {
            racecraft: level,
            consistency: level,
            aggression: level,
            focus: level,
            stamina: level,
            composure: level,
            draft_sense: level,
            tire_management: level,
            fuel_management: level,
            pit_strategy: level,
        }
    }

    fn driver(id: DriverId, number: u32) -> DriverPars {
        DriverPars {
            id,
            name: format!("Driver {}", id),
            number,
            color: "#808080".to_owned(),
            skills: flat_skills(60),
            mental_baseline: MentalState::default(),
            career: Default::default(),
        }
    }

    fn build_engine(seed: u64) -> RaceEngine {
        let player = driver(1, 43);
        let ais = vec![
            AiDriverPars {
                driver: driver(2, 24),
                personality: Personality::Patient,
            },
            AiDriverPars {
                driver: driver(3, 48),
                personality: Personality::Adaptive,
            },
            AiDriverPars {
                driver: driver(4, 9),
                personality: Personality::Patient,
            },
        ];
        let race_pars = RacePars {
            total_laps: 50,
            rng_seed: seed,
            snapshot_interval_ticks: None,
            caution_laps: 3,
        };

        RaceEngine::new(&race_pars, &TrackPars::bristol(), &player, &ais, None).unwrap()
    }

    #[test]
    fn test_entrants_are_canonically_ordered_with_grid_offsets() {
        let engine = build_engine(1);

        let ids: Vec<DriverId> = engine.entrants.iter().map(|e| e.driver.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        // the player leads the default grid, so it holds the largest starting fraction
        let player = &engine.entrants[engine.player_idx];
        assert_eq!(player.position, 1);
        assert!(engine
            .entrants
            .iter()
            .all(|e| e.progress <= player.progress));
    }

    #[test]
    fn test_position_delta_drops_the_leader_into_the_pack() {
        let mut engine = build_engine(5);
        engine.start().unwrap();

        for _ in 0..50 {
            engine.simulate_tick(100).unwrap();
        }

        let leader = engine.ranking()[0];
        engine.apply_position_delta(leader, -2);
        engine.update_positions_and_gaps();

        assert!(engine.entrants[leader].position >= 3);
        assert!((0.0..1.0).contains(&engine.entrants[leader].progress));
    }

    #[test]
    fn test_caution_floors_the_field_pace() {
        let mut engine = build_engine(9);
        engine.start().unwrap();
        engine.simulate_tick(100).unwrap();

        engine.record_incident(1, 9.0);
        assert_eq!(engine.flag, FlagState::Yellow);

        engine.refresh_pace().unwrap();
        let floor = engine.reference_lap_s * CAUTION_PACE_FACTOR;

        for entrant in engine.entrants.iter() {
            assert!(entrant.cur_lap_time >= floor - 1e-9);
        }
    }

    #[test]
    fn test_caution_ends_after_its_laps() {
        let mut engine = build_engine(13);
        engine.start().unwrap();
        engine.simulate_tick(100).unwrap();
        engine.record_incident(1, 9.0);

        let mut steps = 0;
        while engine.flag == FlagState::Yellow && steps < 10_000 {
            if engine.phase == EnginePhase::AwaitingDecision {
                let id = engine
                    .current_state()
                    .active_decision
                    .unwrap()
                    .default_option_id;
                engine.submit_decision(&id).unwrap();
            } else {
                engine.simulate_tick(100).unwrap();
            }
            steps += 1;
        }

        assert_eq!(engine.flag, FlagState::Green);
        assert!(engine.caution_until_lap.is_none());
    }
}

