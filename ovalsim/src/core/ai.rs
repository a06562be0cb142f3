use crate::core::car::PitService;
use crate::core::driver::DriverPars;
use helpers::rng::SimRng;
use serde::{Deserialize, Serialize};

/// Personality of a computer driver, modeled as scalar biases over the shared strategy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Aggressive,
    Patient,
    Adaptive,
}

impl Personality {
    /// Tire level below which the controller wants fresh rubber.
    pub fn pit_tire_threshold(&self) -> f64 {
        match self {
            Personality::Aggressive => 40.0,
            Personality::Patient => 55.0,
            Personality::Adaptive => 50.0,
        }
    }

    /// Chance per lap to attempt a pass when close enough to the car ahead.
    pub fn pass_appetite(&self) -> f64 {
        match self {
            Personality::Aggressive => 0.45,
            Personality::Patient => 0.15,
            Personality::Adaptive => 0.30,
        }
    }

    /// The pass option this personality reaches for.
    pub fn preferred_pass_option(&self) -> &'static str {
        match self {
            Personality::Aggressive => "send-it",
            Personality::Patient => "hold-line",
            Personality::Adaptive => "pressure",
        }
    }
}

/// * `driver` - The underlying driver parameters
/// * `personality` - Strategy bias of the controller
#[derive(Debug, Deserialize, Clone)]
pub struct AiDriverPars {
    #[serde(flatten)]
    pub driver: DriverPars,
    pub personality: Personality,
}

/// The strategic intent of a computer driver at a lap boundary. The engine carries it out
/// through the same evaluator the player's prompts go through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AiAction {
    None,
    Pit(PitService),
    AttemptPass,
}

/// Everything the controller looks at when its car crosses the line.
#[derive(Debug, Clone, Copy)]
pub struct AiContext {
    pub tire_pct: f64,
    pub fuel_pct: f64,
    pub fuel_burn_per_lap_pct: f64,
    pub laps_to_go: u32,
    pub position: u32,
    pub gap_next_s: f64,
    pub caution: bool,
    pub aggression_skill: f64,
    pub pit_strategy_skill: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiController {
    pub personality: Personality,
}

impl AiController {
    pub fn new(personality: Personality) -> AiController {
        AiController { personality }
    }

    /// on_lap_complete decides the internal strategy of the lap ahead: pit, attempt a pass, or
    /// run the lap as it comes. The same thresholds the player sees as prompts, resolved without
    /// a UI round-trip.
    pub fn on_lap_complete(&self, ctx: &AiContext, rng: &mut SimRng) -> AiAction {
        // fuel is the hard constraint: running dry loses far more than a stop
        let laps_of_fuel = if ctx.fuel_burn_per_lap_pct > 0.0 {
            ctx.fuel_pct / ctx.fuel_burn_per_lap_pct
        } else {
            f64::INFINITY
        };

        let race_needs_fuel = (ctx.laps_to_go as f64) > laps_of_fuel;
        let need_fuel = race_needs_fuel && laps_of_fuel <= 3.0;
        let need_tires =
            ctx.tire_pct < self.personality.pit_tire_threshold() && ctx.laps_to_go > 10;

        // a caution is a cheap chance to top up before the stint would force it anyway
        let caution_opportunity = ctx.caution
            && ctx.laps_to_go > 15
            && (ctx.tire_pct < 70.0 || laps_of_fuel < 20.0);

        if need_fuel || need_tires || caution_opportunity {
            return AiAction::Pit(self.choose_service(need_fuel, need_tires, ctx));
        }

        // close behind the next car and feeling bold; the aggression skill scales the appetite
        // by 20% per ten points away from the mid level
        let pass_chance = self.personality.pass_appetite()
            * (1.0 + (ctx.aggression_skill - 50.0) * 0.02).max(0.0);

        if !ctx.caution && ctx.position > 1 && ctx.gap_next_s < 1.0 && rng.chance(pass_chance) {
            return AiAction::AttemptPass;
        }

        AiAction::None
    }

    /// choose_service picks the pit service. Partial services need a developed pit-strategy
    /// skill, the same gate the player's option list has.
    fn choose_service(&self, need_fuel: bool, need_tires: bool, ctx: &AiContext) -> PitService {
        let advanced = ctx.pit_strategy_skill >= crate::core::decision::ADVANCED_PIT_SKILL;

        if advanced && need_fuel && !need_tires && ctx.tire_pct > 70.0 {
            PitService::FuelOnly
        } else if advanced && need_tires && !need_fuel && ctx.fuel_pct > 60.0 {
            PitService::TiresOnly
        } else {
            PitService::Full
        }
    }

    /// choose_pass_option names the option id the controller wants. The engine validates the id
    /// against the shared option templates and substitutes the low-risk default if the
    /// controller produced something unknown.
    pub fn choose_pass_option(&self) -> String {
        self.personality.preferred_pass_option().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AiContext {
        AiContext {
            tire_pct: 90.0,
            fuel_pct: 90.0,
            fuel_burn_per_lap_pct: 2.0,
            laps_to_go: 100,
            position: 5,
            gap_next_s: 3.0,
            caution: false,
            aggression_skill: 50.0,
            pit_strategy_skill: 50.0,
        }
    }

    #[test]
    fn test_no_action_on_healthy_car() {
        let controller = AiController::new(Personality::Patient);
        let mut rng = SimRng::from_seed(1);
        assert_eq!(controller.on_lap_complete(&ctx(), &mut rng), AiAction::None);
    }

    #[test]
    fn test_pits_when_fuel_window_closes() {
        let controller = AiController::new(Personality::Patient);
        let mut rng = SimRng::from_seed(1);

        let mut low_fuel = ctx();
        low_fuel.fuel_pct = 5.0;
        assert_eq!(
            controller.on_lap_complete(&low_fuel, &mut rng),
            AiAction::Pit(PitService::Full)
        );
    }

    #[test]
    fn test_fuel_only_requires_pit_skill() {
        let mut low_fuel = ctx();
        low_fuel.fuel_pct = 5.0;
        low_fuel.tire_pct = 95.0;

        let controller = AiController::new(Personality::Patient);
        let mut rng = SimRng::from_seed(1);

        assert_eq!(
            controller.on_lap_complete(&low_fuel, &mut rng),
            AiAction::Pit(PitService::Full)
        );

        low_fuel.pit_strategy_skill = 75.0;
        assert_eq!(
            controller.on_lap_complete(&low_fuel, &mut rng),
            AiAction::Pit(PitService::FuelOnly)
        );
    }

    #[test]
    fn test_tire_threshold_depends_on_personality() {
        let mut worn = ctx();
        worn.tire_pct = 50.0;
        let mut rng = SimRng::from_seed(1);

        let patient = AiController::new(Personality::Patient);
        assert_eq!(
            patient.on_lap_complete(&worn, &mut rng),
            AiAction::Pit(PitService::Full)
        );

        let aggressive = AiController::new(Personality::Aggressive);
        assert_eq!(aggressive.on_lap_complete(&worn, &mut rng), AiAction::None);
    }

    #[test]
    fn test_no_fuel_stop_when_race_ends_first() {
        let controller = AiController::new(Personality::Patient);
        let mut rng = SimRng::from_seed(1);

        let mut closing_laps = ctx();
        closing_laps.fuel_pct = 5.0;
        closing_laps.laps_to_go = 2;
        assert_eq!(
            controller.on_lap_complete(&closing_laps, &mut rng),
            AiAction::None
        );
    }

    #[test]
    fn test_aggressive_tries_passes_more_often() {
        let mut close = ctx();
        close.gap_next_s = 0.5;

        let count = |personality: Personality| {
            let controller = AiController::new(personality);
            let mut rng = SimRng::from_seed(77);
            (0..400)
                .filter(|_| controller.on_lap_complete(&close, &mut rng) == AiAction::AttemptPass)
                .count()
        };

        assert!(count(Personality::Aggressive) > count(Personality::Patient));
    }

    #[test]
    fn test_caution_opportunism() {
        let controller = AiController::new(Personality::Adaptive);
        let mut rng = SimRng::from_seed(1);

        let mut under_yellow = ctx();
        under_yellow.caution = true;
        under_yellow.tire_pct = 65.0;
        assert_eq!(
            controller.on_lap_complete(&under_yellow, &mut rng),
            AiAction::Pit(PitService::Full)
        );
    }
}
