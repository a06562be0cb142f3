use crate::core::decision::Decision;
use crate::core::driver::DriverId;
use crate::core::track::{SectionPars, Track};
use crate::interfaces::observer::{EngineEvent, RaceState};
use anyhow::Context;
use helpers::general::lin_interp;
use helpers::geometry::{Point2d, Point3d, Vector2d};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Centerline sampling distance.
const SAMPLE_STEP_FT: f64 = 25.0;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// TrackLayout samples the section loop into a 2D centerline so that the 1D lap progress the
/// engine emits can be mapped to renderer coordinates. The mapping lives entirely on the bridge
/// side; the engine stays oblivious to Cartesian geometry.
#[derive(Debug)]
pub struct TrackLayout {
    s_vals: Vec<f64>,
    xs: Vec<f64>,
    ys: Vec<f64>,
    length_ft: f64,
}

impl TrackLayout {
    pub fn new(track: &Track) -> TrackLayout {
        let mut s_vals = vec![0.0];
        let mut points = vec![Point2d { x: 0.0, y: 0.0 }];
        let mut heading = Vector2d { dx: 1.0, dy: 0.0 };
        let mut s = 0.0;

        for section in track.sections.iter() {
            let steps = (section.length_ft / SAMPLE_STEP_FT).ceil().max(1.0) as usize;
            let step_len = section.length_ft / steps as f64;

            // ovals run counter-clockwise, so every turn bends left
            let step_angle = match section.pars {
                SectionPars::Turn { arc_deg, .. } => arc_deg.to_radians() / steps as f64,
                SectionPars::Straight { .. } => 0.0,
            };

            for _ in 0..steps {
                if step_angle != 0.0 {
                    heading = heading.rotated(step_angle);
                }

                let pos = points
                    .last()
                    .expect("The centerline starts with one point!")
                    .shift(&heading.mult(step_len));
                s += step_len;
                s_vals.push(s);
                points.push(pos);
            }
        }

        TrackLayout {
            s_vals,
            xs: points.iter().map(|p| p.x).collect(),
            ys: points.iter().map(|p| p.y).collect(),
            length_ft: track.length_ft,
        }
    }

    /// centerline_at returns the 2D centerline point at the given lap progress.
    pub fn centerline_at(&self, progress: f64) -> Point2d {
        let s = progress.rem_euclid(1.0) * self.length_ft;
        Point2d {
            x: lin_interp(s, &self.s_vals, &self.xs),
            y: lin_interp(s, &self.s_vals, &self.ys),
        }
    }

    /// heading_at returns the unit direction of travel at the given lap progress.
    pub fn heading_at(&self, progress: f64) -> Vector2d {
        let ahead = self.centerline_at(progress + 10.0 / self.length_ft);
        let here = self.centerline_at(progress);
        let direction = ahead.as_vector2d().sub(&here.as_vector2d());

        if direction.abs() < 1e-9 {
            Vector2d { dx: 1.0, dy: 0.0 }
        } else {
            direction.normalized()
        }
    }

    /// coordinates_at maps progress, lateral lane offset, and surface banking to a renderer
    /// coordinate: lateral offsets slide toward the (banked) outside, height follows the
    /// banking angle.
    pub fn coordinates_at(&self, progress: f64, lane_offset_ft: f64, banking_deg: f64) -> Point3d {
        let center = self.centerline_at(progress);
        let normal = self.heading_at(progress).normal_vector();
        let flat = center.shift(&normal.mult(lane_offset_ft * banking_deg.to_radians().cos()));
        let z = lane_offset_ft.abs() * banking_deg.to_radians().sin();

        flat.with_height(z)
    }
}

// OUTBOUND MESSAGES -------------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CoordinatesMsg {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RotationMsg {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CarMsg {
    id: DriverId,
    position: u32,
    lap_progress: f64,
    lane_offset: f64,
    coordinates: CoordinatesMsg,
    rotation: RotationMsg,
    speed: f64,
    tire_wear: f64,
    fuel_remaining: f64,
    drafting: bool,
    color: RgbColor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardEntryMsg {
    id: DriverId,
    position: u32,
    last_lap_time: f64,
    gap_leader: f64,
    gap_next: f64,
    laps_led: u32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum BridgeMessage {
    #[serde(rename_all = "camelCase")]
    RaceStateUpdate {
        tick: u64,
        race_time: f64,
        current_lap: u32,
        total_laps: u32,
        flag: String,
        cars: Vec<CarMsg>,
        player_car: CarMsg,
        leaderboard: Vec<LeaderboardEntryMsg>,
    },
    #[serde(rename_all = "camelCase")]
    DecisionPrompt {
        id: u64,
        kind: String,
        prompt: String,
        options: Vec<OptionMsg>,
        time_limit_ms: u64,
        default_option_id: String,
        context: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    RaceEvent {
        event: String,
        lap: u32,
        payload: serde_json::Value,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptionMsg {
    id: String,
    label: String,
    description: String,
    risk: String,
    skills_weighted: HashMap<String, f64>,
}

// INBOUND MESSAGES --------------------------------------------------------------------------------

/// The one message an observer may send back: the player's answer to a prompt.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDecisionMsg {
    pub prompt_id: u64,
    pub option_id: String,
}

pub fn parse_player_decision(line: &str) -> anyhow::Result<PlayerDecisionMsg> {
    serde_json::from_str(line.trim()).context("Failed to parse player decision message!")
}

// ENCODER -----------------------------------------------------------------------------------------

/// BridgeEncoder turns engine events into line-delimited JSON messages for external renderers.
pub struct BridgeEncoder {
    track: Track,
    layout: TrackLayout,
    colors: HashMap<DriverId, RgbColor>,
}

impl BridgeEncoder {
    /// new prepares the layout and parses the hex car colors once up front.
    pub fn new(track: &Track, driver_colors: &[(DriverId, String)]) -> anyhow::Result<BridgeEncoder> {
        let mut colors = HashMap::with_capacity(driver_colors.len());

        for (driver_id, hex) in driver_colors.iter() {
            let parsed = hex
                .parse::<css_color_parser::Color>()
                .context(format!("Could not parse hex color {}!", hex))?;
            colors.insert(
                *driver_id,
                RgbColor {
                    r: parsed.r,
                    g: parsed.g,
                    b: parsed.b,
                },
            );
        }

        Ok(BridgeEncoder {
            track: track.to_owned(),
            layout: TrackLayout::new(track),
            colors,
        })
    }

    /// encode turns one engine event into a JSON line. Events without a wire representation
    /// yield None.
    pub fn encode(&self, event: &EngineEvent) -> anyhow::Result<Option<String>> {
        let message = match event {
            EngineEvent::RaceStateUpdate(state) => Some(self.encode_state(state)),
            EngineEvent::DecisionPrompt(decision) => Some(self.encode_prompt(decision)),
            EngineEvent::DecisionResolved(result) => Some(BridgeMessage::RaceEvent {
                event: "decision-resolved".to_owned(),
                lap: 0,
                payload: json!({
                    "optionId": result.option_id,
                    "outcome": result.outcome,
                    "message": result.message,
                }),
            }),
            EngineEvent::LapComplete {
                driver_id,
                lap,
                lap_time_s,
                position,
            } => Some(BridgeMessage::RaceEvent {
                event: "lap-complete".to_owned(),
                lap: *lap,
                payload: json!({
                    "driverId": driver_id,
                    "lapTime": lap_time_s,
                    "position": position,
                }),
            }),
            EngineEvent::RaceEvent(note) => Some(BridgeMessage::RaceEvent {
                event: "race-note".to_owned(),
                lap: note.lap,
                payload: json!({
                    "kind": note.kind,
                    "driverId": note.driver_id,
                    "detail": note.detail,
                }),
            }),
            EngineEvent::RaceEnd { winner_id } => Some(BridgeMessage::RaceEvent {
                event: "race-end".to_owned(),
                lap: 0,
                payload: json!({ "winnerId": winner_id }),
            }),
            EngineEvent::RaceAborted => Some(BridgeMessage::RaceEvent {
                event: "race-aborted".to_owned(),
                lap: 0,
                payload: json!({}),
            }),
        };

        match message {
            Some(message) => {
                let line =
                    serde_json::to_string(&message).context("Failed to encode bridge message!")?;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    fn car_msg(&self, state: &RaceState, driver_id: DriverId) -> CarMsg {
        let progress_entry = state
            .lap_progress
            .iter()
            .find(|entry| entry.driver_id == driver_id)
            .expect("Every driver has a progress entry!");
        let position_entry = state
            .positions
            .iter()
            .find(|entry| entry.driver_id == driver_id)
            .expect("Every driver has a leaderboard entry!");

        let banking = self
            .track
            .banking_at(progress_entry.progress, 0.5);
        let coordinates = self.layout.coordinates_at(
            progress_entry.progress,
            progress_entry.lane_offset_ft,
            banking,
        );

        // yaw-only quaternion from the direction of travel
        let heading = self.layout.heading_at(progress_entry.progress);
        let yaw = heading.dy.atan2(heading.dx);

        CarMsg {
            id: driver_id,
            position: position_entry.position,
            lap_progress: progress_entry.progress,
            lane_offset: progress_entry.lane_offset_ft,
            coordinates: CoordinatesMsg {
                x: coordinates.x,
                y: coordinates.y,
                z: coordinates.z,
            },
            rotation: RotationMsg {
                x: 0.0,
                y: 0.0,
                z: (yaw / 2.0).sin(),
                w: (yaw / 2.0).cos(),
            },
            speed: progress_entry.speed_mph,
            tire_wear: progress_entry.tire_pct,
            fuel_remaining: progress_entry.fuel_pct,
            drafting: progress_entry.drafting,
            color: self.colors.get(&driver_id).copied().unwrap_or_default(),
        }
    }

    fn encode_state(&self, state: &RaceState) -> BridgeMessage {
        let cars: Vec<CarMsg> = state
            .lap_progress
            .iter()
            .map(|entry| self.car_msg(state, entry.driver_id))
            .collect();

        let leaderboard = state
            .positions
            .iter()
            .map(|entry| LeaderboardEntryMsg {
                id: entry.driver_id,
                position: entry.position,
                last_lap_time: entry.last_lap_time,
                gap_leader: entry.gap_leader,
                gap_next: entry.gap_next,
                laps_led: entry.laps_led,
            })
            .collect();

        BridgeMessage::RaceStateUpdate {
            tick: state.tick,
            race_time: state.race_time_s,
            current_lap: state.current_lap,
            total_laps: state.total_laps,
            flag: format!("{:?}", state.flag).to_lowercase(),
            player_car: self.car_msg(state, state.player.driver.id),
            cars,
            leaderboard,
        }
    }

    fn encode_prompt(&self, decision: &Decision) -> BridgeMessage {
        let options = decision
            .options
            .iter()
            .map(|option| OptionMsg {
                id: option.id.to_owned(),
                label: option.label.to_owned(),
                description: option.description.to_owned(),
                risk: format!("{:?}", option.risk).to_lowercase(),
                skills_weighted: option
                    .skill_weights
                    .iter()
                    .map(|(skill, weight)| (format!("{:?}", skill), *weight))
                    .collect(),
            })
            .collect();

        BridgeMessage::DecisionPrompt {
            id: decision.id,
            kind: format!("{:?}", decision.kind).to_lowercase(),
            prompt: decision.prompt.to_owned(),
            options,
            time_limit_ms: (decision.time_limit_s * 1000.0) as u64,
            default_option_id: decision.default_option_id.to_owned(),
            context: serde_json::to_value(&decision.context).unwrap_or(serde_json::Value::Null),
        }
    }
}
