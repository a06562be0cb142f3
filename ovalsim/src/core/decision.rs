use crate::core::car::{CarState, PitService};
use crate::core::mental::{MentalDelta, MentalState};
use crate::core::skills::{SkillKind, SkillSet};
use helpers::rng::SimRng;
use serde::{Deserialize, Serialize};

/// Minimum number of player laps between two prompts. Emergencies bypass the cooldown.
pub const DECISION_COOLDOWN_LAPS: u32 = 10;

/// A stressed driver gets less time, but never less than this.
pub const MIN_DECISION_TIME_S: f64 = 1.0;

/// Pace advantage over the car ahead required before a passing opportunity is worth a prompt.
pub const PASS_PACE_DELTA_THRESHOLD_S: f64 = 0.15;

/// An incident further ahead than this is not an emergency.
pub const EMERGENCY_RANGE_CAR_LENGTHS: f64 = 25.0;

/// Laps stuck behind the same car before the passing prompt fires.
pub const PASS_STUCK_LAPS: u32 = 10;

/// Advanced pit services (fuel-only, tires-only) unlock at this pit-strategy level.
pub const ADVANCED_PIT_SKILL: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    PitStrategy,
    Passing,
    Traffic,
    Incident,
    Tire,
    Mental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub fn probability_penalty(&self) -> f64 {
        match self {
            Risk::Low => 0.0,
            Risk::Medium => -0.05,
            Risk::High => -0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Neutral,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: String,
    pub label: String,
    pub description: String,
    pub risk: Risk,
    /// Partial map over the skill axes; drives the XP split of the outcome.
    pub skill_weights: Vec<(SkillKind, f64)>,
}

/// Compact context snapshot attached to a prompt so a client can render it without a second
/// state lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionContextInfo {
    pub lap: u32,
    pub position: u32,
    pub tire_pct: f64,
    pub fuel_pct: f64,
    pub caution: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: u64,
    pub kind: DecisionKind,
    pub prompt: String,
    pub options: Vec<DecisionOption>,
    pub time_limit_s: f64,
    pub default_option_id: String,
    pub context: DecisionContextInfo,
}

impl Decision {
    pub fn option(&self, option_id: &str) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn default_option(&self) -> &DecisionOption {
        self.option(&self.default_option_id)
            .expect("Default option id must be present in the option list!")
    }
}

/// The full effect package of a resolved decision, applied by the engine in one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    pub position_delta: i32,
    pub mental: MentalDelta,
    pub tire_delta: f64,
    pub fuel_delta: f64,
    pub damage_delta: f64,
    pub pit: Option<PitService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision_id: u64,
    pub option_id: String,
    pub outcome: Outcome,
    pub effects: Effects,
    pub xp_gained: Vec<(SkillKind, i64)>,
    pub message: String,
}

/// An incident on track ahead of the driver, candidate for an emergency prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncidentAhead {
    pub gap_car_lengths: f64,
    pub severity_pct: f64,
}

/// Everything the trigger rules look at, assembled by the engine per tick for the player.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub lap: u32,
    pub total_laps: u32,
    pub position: u32,
    pub laps_to_go: u32,
    pub mental: &'a MentalState,
    pub car: &'a CarState,
    pub skills: &'a SkillSet,
    pub caution: bool,
    /// True while a fresh caution keeps the pit window open
    pub caution_pit_window: bool,
    pub incident_ahead: Option<IncidentAhead>,
    pub stuck_behind_laps: u32,
    /// Rolling pace advantage over the car ahead (positive = faster)
    pub pace_delta_vs_ahead_s: f64,
    pub in_passing_zone: bool,
    pub lapped_traffic_ahead: bool,
    /// Estimated laps until the fuel window forces a stop
    pub laps_to_next_pit_window: u32,
}

/// primary_skill names the single axis that dominates the outcome probability of a decision
/// type.
pub fn primary_skill(kind: DecisionKind) -> SkillKind {
    match kind {
        DecisionKind::PitStrategy => SkillKind::PitStrategy,
        DecisionKind::Passing => SkillKind::Racecraft,
        DecisionKind::Traffic => SkillKind::Racecraft,
        DecisionKind::Incident => SkillKind::Focus,
        DecisionKind::Tire => SkillKind::TireManagement,
        DecisionKind::Mental => SkillKind::Composure,
    }
}

/// success_probability computes the chance of a favourable outcome: an even baseline, shifted
/// by the primary skill, the confidence/frustration balance, and the option's risk, clamped to
/// [0.05, 0.95].
pub fn success_probability(primary_skill_value: f64, mental: &MentalState, risk: Risk) -> f64 {
    let base = 0.50;
    let skill_bonus = (primary_skill_value - 50.0) * 0.005;
    let mental_mod = ((mental.confidence - mental.frustration) / 100.0) * 0.10;

    (base + skill_bonus + mental_mod + risk.probability_penalty())
        .max(0.05)
        .min(0.95)
}

/// effective_time_limit_s shrinks the base window under stress, multiplicatively composed and
/// floored at one second.
pub fn effective_time_limit_s(base_s: f64, mental: &MentalState) -> f64 {
    let mut t = base_s;

    if mental.focus < 40.0 {
        t *= 0.70
    }

    if mental.frustration > 60.0 {
        t *= 0.80
    }

    if mental.distraction > 60.0 {
        t *= 0.75
    }

    t.max(MIN_DECISION_TIME_S)
}

fn base_time_limit_s(kind: DecisionKind) -> f64 {
    match kind {
        DecisionKind::Incident => 3.0,
        DecisionKind::Mental => 10.0,
        DecisionKind::PitStrategy => 12.0,
        DecisionKind::Passing => 6.0,
        DecisionKind::Traffic => 6.0,
        DecisionKind::Tire => 12.0,
    }
}

fn base_xp(kind: DecisionKind, outcome: Outcome) -> f64 {
    match outcome {
        Outcome::Success => match kind {
            DecisionKind::Passing => 15.0,
            DecisionKind::Traffic => 10.0,
            DecisionKind::Incident => 12.0,
            DecisionKind::PitStrategy => 15.0,
            DecisionKind::Tire => 10.0,
            DecisionKind::Mental => 20.0,
        },
        Outcome::Neutral => 5.0,
        Outcome::Failure => 2.0,
    }
}

fn option(
    id: &str,
    label: &str,
    description: &str,
    risk: Risk,
    skill_weights: Vec<(SkillKind, f64)>,
) -> DecisionOption {
    DecisionOption {
        id: id.to_owned(),
        label: label.to_owned(),
        description: description.to_owned(),
        risk,
        skill_weights,
    }
}

/// options_for returns the option templates of a decision type. The low-risk option always
/// comes first and doubles as the timeout default. Advanced pit services are offered only to
/// drivers with a developed pit-strategy skill.
pub fn options_for(kind: DecisionKind, pit_strategy_value: f64) -> Vec<DecisionOption> {
    match kind {
        DecisionKind::PitStrategy => {
            let mut options = vec![
                option(
                    "stay-out",
                    "Stay out",
                    "Hold track position and stretch the stint",
                    Risk::Low,
                    vec![(SkillKind::PitStrategy, 1.0)],
                ),
                option(
                    "pit-full",
                    "Pit: four tires and fuel",
                    "Full service, roughly twelve seconds stationary",
                    Risk::Medium,
                    vec![(SkillKind::PitStrategy, 1.0)],
                ),
            ];

            if pit_strategy_value >= ADVANCED_PIT_SKILL {
                options.push(option(
                    "pit-fuel-only",
                    "Pit: fuel only",
                    "Splash of fuel, half the stationary time",
                    Risk::Medium,
                    vec![(SkillKind::PitStrategy, 1.0), (SkillKind::FuelManagement, 0.4)],
                ));
                options.push(option(
                    "pit-tires-only",
                    "Pit: tires only",
                    "Fresh rubber without topping up",
                    Risk::Medium,
                    vec![(SkillKind::PitStrategy, 1.0), (SkillKind::TireManagement, 0.4)],
                ));
            }

            options
        }
        DecisionKind::Passing => vec![
            option(
                "hold-line",
                "Hold your line",
                "Keep following and wait for a mistake",
                Risk::Low,
                vec![(SkillKind::Racecraft, 1.0), (SkillKind::Consistency, 0.4)],
            ),
            option(
                "pressure",
                "Pressure him into a mistake",
                "Fill his mirrors lap after lap",
                Risk::Medium,
                vec![(SkillKind::Racecraft, 1.0)],
            ),
            option(
                "send-it",
                "Send it underneath",
                "Dive into the corner and make it stick",
                Risk::High,
                vec![(SkillKind::Racecraft, 1.0), (SkillKind::Aggression, 1.0 / 3.0)],
            ),
        ],
        DecisionKind::Traffic => vec![
            option(
                "wait-for-exit",
                "Wait for the exit",
                "Follow the lapped car until the straight",
                Risk::Low,
                vec![(SkillKind::Racecraft, 1.0), (SkillKind::Consistency, 0.4)],
            ),
            option(
                "dive-under",
                "Dive under him",
                "Force the issue before the corner",
                Risk::Medium,
                vec![(SkillKind::Racecraft, 1.0), (SkillKind::Aggression, 0.3)],
            ),
        ],
        DecisionKind::Incident => vec![
            option(
                "check-up-high",
                "Check up high",
                "Lift and aim above the spin",
                Risk::Low,
                vec![(SkillKind::Focus, 1.0)],
            ),
            option(
                "brake-hard-low",
                "Brake hard low",
                "Scrub speed and hug the apron",
                Risk::Medium,
                vec![(SkillKind::Focus, 1.0), (SkillKind::Consistency, 0.3)],
            ),
            option(
                "thread-the-gap",
                "Thread the gap",
                "Keep the throttle in and shoot the hole",
                Risk::High,
                vec![(SkillKind::Focus, 1.0), (SkillKind::Racecraft, 0.4)],
            ),
        ],
        DecisionKind::Tire => vec![
            option(
                "conserve-pace",
                "Conserve the tires",
                "Back off a tenth and save the rubber",
                Risk::Low,
                vec![(SkillKind::TireManagement, 1.0)],
            ),
            option(
                "push-anyway",
                "Push anyway",
                "Track position is worth more than rubber",
                Risk::Medium,
                vec![(SkillKind::TireManagement, 1.0), (SkillKind::Aggression, 0.3)],
            ),
        ],
        DecisionKind::Mental => vec![
            option(
                "take-a-breath",
                "Take a breath",
                "Settle down, hit your marks, reset",
                Risk::Low,
                vec![(SkillKind::Composure, 1.0)],
            ),
            option(
                "channel-anger",
                "Channel the anger",
                "Turn the frustration into pace",
                Risk::High,
                vec![(SkillKind::Composure, 1.0), (SkillKind::Aggression, 0.25)],
            ),
        ],
    }
}

fn mental_delta(confidence: f64, frustration: f64, focus: f64, distraction: f64) -> MentalDelta {
    MentalDelta {
        confidence,
        frustration,
        focus,
        distraction,
    }
}

/// neutral_effects builds the deterministic effect package of a marginal outcome. Kept free of
/// PRNG draws so that a timed-out prompt resolves without consuming one.
fn neutral_effects(kind: DecisionKind, option: &DecisionOption) -> (Effects, String) {
    let mut effects = Effects::default();
    let message;

    match (kind, option.id.as_str()) {
        (DecisionKind::PitStrategy, "stay-out") => {
            message = "Staying out changes nothing for now.".to_owned();
        }
        (DecisionKind::PitStrategy, id) => {
            effects.pit = Some(match id {
                "pit-fuel-only" => PitService::FuelOnly,
                "pit-tires-only" => PitService::TiresOnly,
                _ => PitService::Full,
            });
            effects.position_delta = -4;
            message = "Service done, nothing gained on the field.".to_owned();
        }
        (DecisionKind::Passing, "hold-line") => {
            message = "Still stuck, still waiting.".to_owned();
        }
        (DecisionKind::Passing, _) => {
            effects.mental = mental_delta(0.0, 2.0, 0.0, 0.0);
            message = "Side by side, then back in line.".to_owned();
        }
        (DecisionKind::Traffic, "wait-for-exit") => {
            message = "Another lap in dirty air.".to_owned();
        }
        (DecisionKind::Traffic, _) => {
            effects.mental = mental_delta(0.0, 2.0, 0.0, 0.0);
            message = "No room, back off again.".to_owned();
        }
        (DecisionKind::Incident, "brake-hard-low") => {
            effects.position_delta = -1;
            message = "Safe, but a spot slips away under braking.".to_owned();
        }
        (DecisionKind::Incident, _) => {
            message = "A near miss, nothing more.".to_owned();
        }
        (DecisionKind::Tire, "conserve-pace") => {
            effects.tire_delta = 2.0;
            message = "Managing, barely holding the line.".to_owned();
        }
        (DecisionKind::Tire, _) => {
            effects.tire_delta = -2.0;
            message = "Pushing without getting anywhere.".to_owned();
        }
        (DecisionKind::Mental, "take-a-breath") => {
            effects.mental = mental_delta(0.0, -8.0, 4.0, -4.0);
            message = "A little calmer, not quite settled.".to_owned();
        }
        (DecisionKind::Mental, _) => {
            effects.mental = mental_delta(0.0, -5.0, 0.0, 0.0);
            message = "Channeled, mostly.".to_owned();
        }
    }

    (effects, message)
}

/// outcome_effects builds the effect package of a resolved option. Success and failure may draw
/// magnitudes from the PRNG; neutral outcomes delegate to the deterministic table.
fn outcome_effects(
    kind: DecisionKind,
    option: &DecisionOption,
    outcome: Outcome,
    rng: &mut SimRng,
) -> (Effects, String) {
    if outcome == Outcome::Neutral {
        return neutral_effects(kind, option);
    }

    let mut effects = Effects::default();
    let message;

    match (kind, option.id.as_str(), outcome) {
        // PIT STRATEGY ----------------------------------------------------------------------------
        (DecisionKind::PitStrategy, "stay-out", Outcome::Success) => {
            effects.mental = mental_delta(3.0, 0.0, 0.0, 0.0);
            message = "Track position held, the stint stretches.".to_owned();
        }
        (DecisionKind::PitStrategy, "stay-out", Outcome::Failure) => {
            effects.mental = mental_delta(0.0, 5.0, 0.0, 0.0);
            effects.tire_delta = -2.0;
            message = "The old tires fall off a cliff.".to_owned();
        }
        (DecisionKind::PitStrategy, id, outcome) => {
            let service = match id {
                "pit-fuel-only" => PitService::FuelOnly,
                "pit-tires-only" => PitService::TiresOnly,
                _ => PitService::Full,
            };
            effects.pit = Some(service);

            if outcome == Outcome::Success {
                effects.position_delta = -(rng.range_u32(2, 4) as i32);
                effects.mental = mental_delta(5.0, 0.0, 0.0, 0.0);
                message = "Clean stop, right call at the right time.".to_owned();
            } else {
                effects.position_delta = -(rng.range_u32(5, 7) as i32);
                effects.mental = mental_delta(-3.0, 10.0, 0.0, 0.0);
                message = "Slow stop, lost a handful of spots.".to_owned();
            }
        }

        // PASSING ---------------------------------------------------------------------------------
        (DecisionKind::Passing, "hold-line", Outcome::Success) => {
            effects.mental = mental_delta(2.0, -3.0, 0.0, 0.0);
            message = "Patience keeps the car in one piece.".to_owned();
        }
        (DecisionKind::Passing, "hold-line", Outcome::Failure) => {
            effects.mental = mental_delta(0.0, 5.0, 0.0, 0.0);
            message = "He pulls away while you hesitate.".to_owned();
        }
        (DecisionKind::Passing, _, Outcome::Success) => {
            effects.position_delta = 1;
            effects.mental = mental_delta(rng.range(10.0, 15.0), -rng.range(5.0, 10.0), 0.0, 0.0);
            message = "The pass sticks.".to_owned();
        }
        (DecisionKind::Passing, id, Outcome::Failure) => {
            effects.position_delta = -1;
            effects.mental = mental_delta(-rng.range(8.0, 10.0), rng.range(15.0, 20.0), 0.0, 0.0);
            effects.damage_delta = if id == "send-it" {
                rng.range(5.0, 10.0)
            } else {
                rng.range(2.0, 5.0)
            };
            message = "The move fails and costs bodywork.".to_owned();
        }

        // TRAFFIC ---------------------------------------------------------------------------------
        (DecisionKind::Traffic, "wait-for-exit", Outcome::Success) => {
            effects.mental = mental_delta(0.0, -3.0, 0.0, 0.0);
            message = "The lapped car waves you by on the straight.".to_owned();
        }
        (DecisionKind::Traffic, "wait-for-exit", Outcome::Failure) => {
            effects.mental = mental_delta(0.0, 5.0, 0.0, 0.0);
            message = "The leaders close in while you wait.".to_owned();
        }
        (DecisionKind::Traffic, _, Outcome::Success) => {
            effects.position_delta = 1;
            effects.mental = mental_delta(8.0, 0.0, 0.0, 0.0);
            message = "Clean move under the lapped car.".to_owned();
        }
        (DecisionKind::Traffic, _, Outcome::Failure) => {
            effects.position_delta = -1;
            effects.damage_delta = rng.range(3.0, 6.0);
            effects.mental = mental_delta(0.0, 10.0, 0.0, 0.0);
            message = "Contact with the lapped car.".to_owned();
        }

        // INCIDENT --------------------------------------------------------------------------------
        (DecisionKind::Incident, "thread-the-gap", Outcome::Success) => {
            effects.position_delta = 1;
            effects.mental = mental_delta(10.0, 0.0, 0.0, 0.0);
            message = "Through the smoke without a scratch.".to_owned();
        }
        (DecisionKind::Incident, "thread-the-gap", Outcome::Failure) => {
            effects.damage_delta = rng.range(10.0, 20.0);
            effects.mental = mental_delta(-15.0, 10.0, 0.0, 0.0);
            message = "The gap closes; heavy contact.".to_owned();
        }
        (DecisionKind::Incident, id, Outcome::Success) => {
            effects.mental = mental_delta(if id == "brake-hard-low" { 4.0 } else { 3.0 }, 0.0, 0.0, 0.0);
            message = "Avoided, no harm done.".to_owned();
        }
        (DecisionKind::Incident, "brake-hard-low", Outcome::Failure) => {
            effects.damage_delta = rng.range(5.0, 10.0);
            effects.mental = mental_delta(-8.0, 8.0, 0.0, 0.0);
            message = "Clipped the spinning car.".to_owned();
        }
        (DecisionKind::Incident, _, Outcome::Failure) => {
            effects.damage_delta = rng.range(2.0, 5.0);
            effects.mental = mental_delta(-5.0, 0.0, 0.0, 0.0);
            message = "Grazed the wall avoiding it.".to_owned();
        }

        // TIRE ------------------------------------------------------------------------------------
        (DecisionKind::Tire, "conserve-pace", Outcome::Success) => {
            effects.tire_delta = 5.0;
            effects.position_delta = -1;
            message = "The rubber comes back to you.".to_owned();
        }
        (DecisionKind::Tire, "conserve-pace", Outcome::Failure) => {
            effects.mental = mental_delta(0.0, 3.0, 0.0, 0.0);
            message = "Backing off gains nothing today.".to_owned();
        }
        (DecisionKind::Tire, _, Outcome::Success) => {
            effects.position_delta = 1;
            effects.tire_delta = -3.0;
            message = "Pace over preservation, and it pays.".to_owned();
        }
        (DecisionKind::Tire, _, Outcome::Failure) => {
            effects.tire_delta = -6.0;
            effects.mental = mental_delta(0.0, 8.0, 0.0, 0.0);
            message = "The fronts give up completely.".to_owned();
        }

        // MENTAL ----------------------------------------------------------------------------------
        (DecisionKind::Mental, "take-a-breath", Outcome::Success) => {
            effects.mental = mental_delta(5.0, -20.0, 10.0, -10.0);
            message = "Heartbeat down, lap times back.".to_owned();
        }
        (DecisionKind::Mental, "take-a-breath", Outcome::Failure) => {
            effects.mental = mental_delta(0.0, 5.0, 0.0, 5.0);
            message = "The red mist will not lift.".to_owned();
        }
        (DecisionKind::Mental, _, Outcome::Success) => {
            effects.mental = mental_delta(10.0, -15.0, 5.0, 0.0);
            message = "Anger sharpened into pace.".to_owned();
        }
        (DecisionKind::Mental, _, Outcome::Failure) => {
            effects.damage_delta = rng.range(2.0, 5.0);
            effects.mental = mental_delta(0.0, 10.0, 0.0, 8.0);
            message = "Overdriving, fender against the wall.".to_owned();
        }

        (_, _, Outcome::Neutral) => unreachable!("Neutral outcomes are built by neutral_effects!"),
    }

    (effects, message)
}

fn xp_for(option: &DecisionOption, kind: DecisionKind, outcome: Outcome) -> Vec<(SkillKind, i64)> {
    let base = base_xp(kind, outcome);

    option
        .skill_weights
        .iter()
        .map(|(skill, weight)| (*skill, (base * weight).round() as i64))
        .filter(|(_, amount)| *amount > 0)
        .collect()
}

/// evaluate_option rolls one option of a decision type and returns the full outcome package.
/// Shared between the player path (through `DecisionEngine::evaluate`) and the AI controllers,
/// which resolve the same choices without a prompt round-trip.
pub fn evaluate_option(
    kind: DecisionKind,
    option: &DecisionOption,
    skills: &SkillSet,
    mental: &MentalState,
    rng: &mut SimRng,
) -> (Outcome, Effects, Vec<(SkillKind, i64)>, String) {
    let p = success_probability(skills.value(primary_skill(kind)), mental, option.risk);
    let roll = rng.uniform();

    let outcome = if roll < p {
        Outcome::Success
    } else if roll < p + 0.20 {
        Outcome::Neutral
    } else {
        Outcome::Failure
    };

    let (effects, message) = outcome_effects(kind, option, outcome, rng);
    let xp = xp_for(option, kind, outcome);

    (outcome, effects, xp, message)
}

/// The stateful part of the decision subsystem: prompt ids, cooldown bookkeeping, trigger
/// detection, and outcome evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEngine {
    next_id: u64,
    last_prompt_lap: Option<u32>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        DecisionEngine {
            next_id: 1,
            last_prompt_lap: None,
        }
    }
}

impl DecisionEngine {
    pub fn new() -> DecisionEngine {
        DecisionEngine::default()
    }

    /// should_trigger runs the trigger rules in priority order and returns a fully built prompt
    /// when one fires. The priority filter runs before the cooldown filter so an emergency is
    /// never suppressed by the cooldown.
    pub fn should_trigger(&mut self, ctx: &TriggerContext) -> Option<Decision> {
        let kind = Self::detect(ctx)?;

        if kind != DecisionKind::Incident && !self.cooldown_elapsed(ctx.lap) {
            return None;
        }

        let decision = self.build_decision(kind, ctx);
        self.last_prompt_lap = Some(ctx.lap);
        self.next_id += 1;

        Some(decision)
    }

    fn cooldown_elapsed(&self, lap: u32) -> bool {
        match self.last_prompt_lap {
            None => true,
            Some(last) => lap >= last + DECISION_COOLDOWN_LAPS,
        }
    }

    fn detect(ctx: &TriggerContext) -> Option<DecisionKind> {
        // 1. emergency: incident close ahead
        if let Some(incident) = ctx.incident_ahead {
            if incident.gap_car_lengths <= EMERGENCY_RANGE_CAR_LENGTHS {
                return Some(DecisionKind::Incident);
            }
        }

        // 2. critical mental state
        let mental = ctx.mental;
        if mental.frustration > 75.0
            || (mental.frustration > 60.0 && mental.distraction > 50.0)
            || mental.distraction > 65.0
        {
            return Some(DecisionKind::Mental);
        }

        // 3. pit strategy
        if (ctx.lap >= 50 && (ctx.car.tire_pct < 60.0 || ctx.car.fuel_pct < 40.0))
            || ctx.caution_pit_window
        {
            return Some(DecisionKind::PitStrategy);
        }

        // 4. passing opportunity
        if ctx.stuck_behind_laps >= PASS_STUCK_LAPS
            && ctx.pace_delta_vs_ahead_s >= PASS_PACE_DELTA_THRESHOLD_S
            && ctx.in_passing_zone
            && !ctx.caution
        {
            return Some(DecisionKind::Passing);
        }

        // 5. lapped traffic
        if ctx.lapped_traffic_ahead && !ctx.caution {
            return Some(DecisionKind::Traffic);
        }

        // 6. tire management
        if ctx.car.tire_pct < 50.0 && ctx.laps_to_next_pit_window > 20 {
            return Some(DecisionKind::Tire);
        }

        None
    }

    fn build_decision(&self, kind: DecisionKind, ctx: &TriggerContext) -> Decision {
        let options = options_for(kind, ctx.skills.value(SkillKind::PitStrategy));
        let default_option_id = options[0].id.to_owned();

        let prompt = match kind {
            DecisionKind::Incident => "Spin ahead! Pick a lane.".to_owned(),
            DecisionKind::Mental => "You're boiling over. Get your head right.".to_owned(),
            DecisionKind::PitStrategy => {
                if ctx.caution {
                    "Caution is out. Pit road is open.".to_owned()
                } else {
                    "The window is open. What's the call?".to_owned()
                }
            }
            DecisionKind::Passing => "You're faster than the car ahead. Make a move?".to_owned(),
            DecisionKind::Traffic => "Lapped traffic is holding you up.".to_owned(),
            DecisionKind::Tire => "The tires are going away with a long run left.".to_owned(),
        };

        Decision {
            id: self.next_id,
            kind,
            prompt,
            options,
            time_limit_s: effective_time_limit_s(base_time_limit_s(kind), ctx.mental),
            default_option_id,
            context: DecisionContextInfo {
                lap: ctx.lap,
                position: ctx.position,
                tire_pct: ctx.car.tire_pct,
                fuel_pct: ctx.car.fuel_pct,
                caution: ctx.caution,
            },
        }
    }

    /// evaluate resolves a chosen option. Returns None for an unknown option id; the engine maps
    /// that to an invalid-choice error while keeping the prompt active.
    pub fn evaluate(
        &self,
        decision: &Decision,
        option_id: &str,
        skills: &SkillSet,
        mental: &MentalState,
        rng: &mut SimRng,
    ) -> Option<DecisionResult> {
        let option = decision.option(option_id)?;
        let (outcome, effects, xp_gained, message) =
            evaluate_option(decision.kind, option, skills, mental, rng);

        Some(DecisionResult {
            decision_id: decision.id,
            option_id: option.id.to_owned(),
            outcome,
            effects,
            xp_gained,
            message,
        })
    }

    /// resolve_timeout applies the timed-out prompt: the default (low-risk) option with a
    /// neutral outcome, its deterministic neutral effects diminished to a small frustration hit
    /// for not deciding at all. No RNG draw is consumed.
    pub fn resolve_timeout(&self, decision: &Decision) -> DecisionResult {
        let option = decision.default_option();

        let (mut effects, _) = neutral_effects(decision.kind, option);
        effects.mental.frustration += 3.0;

        DecisionResult {
            decision_id: decision.id,
            option_id: option.id.to_owned(),
            outcome: Outcome::Neutral,
            effects,
            xp_gained: vec![],
            message: "No decision made.".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::skills::SkillLevels;
    use approx::assert_ulps_eq;

    fn level_50_skills() -> SkillSet {
        SkillSet::from_levels(&SkillLevels {
            racecraft: 50,
            consistency: 50,
            aggression: 50,
            focus: 50,
            stamina: 50,
            composure: 50,
            draft_sense: 50,
            tire_management: 50,
            fuel_management: 50,
            pit_strategy: 50,
        })
    }

    fn balanced_mental() -> MentalState {
        MentalState {
            confidence: 50.0,
            frustration: 50.0,
            focus: 70.0,
            distraction: 10.0,
        }
    }

    fn trigger_ctx<'a>(
        mental: &'a MentalState,
        car: &'a CarState,
        skills: &'a SkillSet,
    ) -> TriggerContext<'a> {
        TriggerContext {
            lap: 60,
            total_laps: 200,
            position: 8,
            laps_to_go: 140,
            mental,
            car,
            skills,
            caution: false,
            caution_pit_window: false,
            incident_ahead: None,
            stuck_behind_laps: 0,
            pace_delta_vs_ahead_s: 0.0,
            in_passing_zone: false,
            lapped_traffic_ahead: false,
            laps_to_next_pit_window: 10,
        }
    }

    #[test]
    fn test_probability_baseline() {
        let mental = balanced_mental();
        assert_ulps_eq!(success_probability(50.0, &mental, Risk::Low), 0.50);
        assert_ulps_eq!(success_probability(50.0, &mental, Risk::Medium), 0.45);
        assert_ulps_eq!(success_probability(50.0, &mental, Risk::High), 0.35);
    }

    #[test]
    fn test_probability_monotonic_in_skill() {
        let mental = balanced_mental();
        let mut prev = 0.0;

        for skill in (0..=100).step_by(5) {
            let p = success_probability(skill as f64, &mental, Risk::Medium);
            assert!(p >= prev);
            assert!((0.05..=0.95).contains(&p));
            prev = p;
        }
    }

    #[test]
    fn test_probability_monotonic_in_risk() {
        let mental = balanced_mental();

        for skill in (0..=100).step_by(10) {
            let low = success_probability(skill as f64, &mental, Risk::Low);
            let medium = success_probability(skill as f64, &mental, Risk::Medium);
            let high = success_probability(skill as f64, &mental, Risk::High);
            assert!(low >= medium && medium >= high);
        }
    }

    #[test]
    fn test_probability_clamped() {
        let euphoric = MentalState {
            confidence: 100.0,
            frustration: 0.0,
            focus: 100.0,
            distraction: 0.0,
        };
        let broken = MentalState {
            confidence: 0.0,
            frustration: 100.0,
            focus: 0.0,
            distraction: 100.0,
        };

        assert_ulps_eq!(success_probability(100.0, &euphoric, Risk::Low), 0.85);
        assert!(success_probability(0.0, &broken, Risk::High) >= 0.05);
        assert_ulps_eq!(success_probability(0.0, &broken, Risk::High), 0.05);
    }

    #[test]
    fn test_time_limit_reductions() {
        let calm = MentalState {
            confidence: 50.0,
            frustration: 20.0,
            focus: 80.0,
            distraction: 10.0,
        };
        assert_ulps_eq!(effective_time_limit_s(10.0, &calm), 10.0);

        let stressed = MentalState {
            confidence: 30.0,
            frustration: 70.0,
            focus: 30.0,
            distraction: 70.0,
        };
        // 10 * 0.70 * 0.80 * 0.75
        assert_ulps_eq!(effective_time_limit_s(10.0, &stressed), 4.2, epsilon = 1e-12);

        // never below one second
        assert_ulps_eq!(effective_time_limit_s(1.2, &stressed), 1.0);
    }

    #[test]
    fn test_emergency_bypasses_cooldown() {
        let mental = balanced_mental();
        let car = CarState::fresh();
        let skills = level_50_skills();
        let mut engine = DecisionEngine::new();

        // a prompt on lap 60 arms the cooldown
        let mut ctx = trigger_ctx(&mental, &car, &skills);
        ctx.lap = 60;
        ctx.lapped_traffic_ahead = true;
        assert!(engine.should_trigger(&ctx).is_some());

        // two laps later a normal trigger is suppressed...
        ctx.lap = 62;
        assert!(engine.should_trigger(&ctx).is_none());

        // ...but an emergency is not
        ctx.incident_ahead = Some(IncidentAhead {
            gap_car_lengths: 10.0,
            severity_pct: 8.0,
        });
        let prompt = engine.should_trigger(&ctx).unwrap();
        assert_eq!(prompt.kind, DecisionKind::Incident);
    }

    #[test]
    fn test_cooldown_spacing() {
        let mental = balanced_mental();
        let car = CarState::fresh();
        let skills = level_50_skills();
        let mut engine = DecisionEngine::new();

        let mut ctx = trigger_ctx(&mental, &car, &skills);
        ctx.lapped_traffic_ahead = true;

        ctx.lap = 60;
        assert!(engine.should_trigger(&ctx).is_some());

        for lap in 61..70 {
            ctx.lap = lap;
            assert!(engine.should_trigger(&ctx).is_none());
        }

        ctx.lap = 70;
        assert!(engine.should_trigger(&ctx).is_some());
    }

    #[test]
    fn test_priority_order_mental_over_pit() {
        let mental = MentalState {
            confidence: 30.0,
            frustration: 80.0,
            focus: 50.0,
            distraction: 20.0,
        };
        let mut car = CarState::fresh();
        car.tire_pct = 40.0;
        let skills = level_50_skills();
        let mut engine = DecisionEngine::new();

        let ctx = trigger_ctx(&mental, &car, &skills);
        let prompt = engine.should_trigger(&ctx).unwrap();
        assert_eq!(prompt.kind, DecisionKind::Mental);
    }

    #[test]
    fn test_pit_prompt_on_worn_tires_past_halfway() {
        let mental = balanced_mental();
        let mut car = CarState::fresh();
        car.tire_pct = 55.0;
        let skills = level_50_skills();
        let mut engine = DecisionEngine::new();

        let ctx = trigger_ctx(&mental, &car, &skills);
        let prompt = engine.should_trigger(&ctx).unwrap();
        assert_eq!(prompt.kind, DecisionKind::PitStrategy);
        assert_eq!(prompt.default_option_id, "stay-out");
    }

    #[test]
    fn test_advanced_pit_options_gated_by_skill() {
        let basic = options_for(DecisionKind::PitStrategy, 50.0);
        assert_eq!(basic.len(), 2);

        let advanced = options_for(DecisionKind::PitStrategy, 60.0);
        assert_eq!(advanced.len(), 4);
        assert!(advanced.iter().any(|o| o.id == "pit-fuel-only"));
        assert!(advanced.iter().any(|o| o.id == "pit-tires-only"));
    }

    #[test]
    fn test_every_kind_defaults_to_low_risk() {
        for kind in [
            DecisionKind::PitStrategy,
            DecisionKind::Passing,
            DecisionKind::Traffic,
            DecisionKind::Incident,
            DecisionKind::Tire,
            DecisionKind::Mental,
        ]
        .iter()
        {
            let options = options_for(*kind, 80.0);
            assert!(options.len() >= 2 && options.len() <= 4);
            assert_eq!(options[0].risk, Risk::Low);
        }
    }

    #[test]
    fn test_refocus_success_effects() {
        let mut rng = SimRng::from_seed(3);
        let options = options_for(DecisionKind::Mental, 50.0);
        let breath = options.iter().find(|o| o.id == "take-a-breath").unwrap();

        let (effects, _) = outcome_effects(DecisionKind::Mental, breath, Outcome::Success, &mut rng);
        assert!(effects.mental.frustration <= -15.0);
        assert!(effects.mental.focus >= 5.0);

        let xp = xp_for(breath, DecisionKind::Mental, Outcome::Success);
        let composure_xp = xp
            .iter()
            .find(|(kind, _)| *kind == SkillKind::Composure)
            .unwrap()
            .1;
        assert!(composure_xp >= 15);
    }

    #[test]
    fn test_full_pit_success_effects() {
        let mut rng = SimRng::from_seed(5);
        let options = options_for(DecisionKind::PitStrategy, 75.0);
        let full = options.iter().find(|o| o.id == "pit-full").unwrap();

        let (effects, _) =
            outcome_effects(DecisionKind::PitStrategy, full, Outcome::Success, &mut rng);
        assert_eq!(effects.pit, Some(PitService::Full));
        assert!((-4..=-2).contains(&effects.position_delta));

        let xp = xp_for(full, DecisionKind::PitStrategy, Outcome::Success);
        let pit_xp = xp
            .iter()
            .find(|(kind, _)| *kind == SkillKind::PitStrategy)
            .unwrap()
            .1;
        assert!(pit_xp >= 10);
    }

    #[test]
    fn test_timeout_resolution_is_neutral_and_deterministic() {
        let mental = balanced_mental();
        let car = CarState::fresh();
        let skills = level_50_skills();
        let mut engine = DecisionEngine::new();

        let mut ctx = trigger_ctx(&mental, &car, &skills);
        ctx.lapped_traffic_ahead = true;
        let decision = engine.should_trigger(&ctx).unwrap();

        let first = engine.resolve_timeout(&decision);
        let second = engine.resolve_timeout(&decision);

        assert_eq!(first.outcome, Outcome::Neutral);
        assert_eq!(first.option_id, decision.default_option_id);
        assert_eq!(first.effects, second.effects);
        assert!(first.xp_gained.is_empty());
        assert_ulps_eq!(first.effects.mental.frustration, 3.0);
    }

    #[test]
    fn test_evaluate_rejects_unknown_option() {
        let mental = balanced_mental();
        let car = CarState::fresh();
        let skills = level_50_skills();
        let mut engine = DecisionEngine::new();
        let mut rng = SimRng::from_seed(1);

        let mut ctx = trigger_ctx(&mental, &car, &skills);
        ctx.lapped_traffic_ahead = true;
        let decision = engine.should_trigger(&ctx).unwrap();

        assert!(engine
            .evaluate(&decision, "warp-speed", &skills, &mental, &mut rng)
            .is_none());
    }

    #[test]
    fn test_high_skill_wins_more_often() {
        let mental = balanced_mental();
        let options = options_for(DecisionKind::Passing, 50.0);
        let pressure = options.iter().find(|o| o.id == "pressure").unwrap();

        let low_skills = level_50_skills();
        let mut high_levels = SkillLevels {
            racecraft: 95,
            consistency: 50,
            aggression: 50,
            focus: 50,
            stamina: 50,
            composure: 50,
            draft_sense: 50,
            tire_management: 50,
            fuel_management: 50,
            pit_strategy: 50,
        };
        high_levels.racecraft = 95;
        let high_skills = SkillSet::from_levels(&high_levels);

        let mut count = |skills: &SkillSet| {
            let mut rng = SimRng::from_seed(2024);
            let mut successes = 0;
            for _ in 0..400 {
                let (outcome, _, _, _) =
                    evaluate_option(DecisionKind::Passing, pressure, skills, &mental, &mut rng);
                if outcome == Outcome::Success {
                    successes += 1
                }
            }
            successes
        };

        assert!(count(&high_skills) > count(&low_skills));
    }
}
