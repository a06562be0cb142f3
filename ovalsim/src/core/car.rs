use serde::{Deserialize, Serialize};

/// The pit services a crew can perform. Costs are the net track-time loss of the full pit cycle
/// (pit road transit plus standstill).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitService {
    Full,
    FuelOnly,
    TiresOnly,
}

impl PitService {
    pub fn track_time_cost_s(&self) -> f64 {
        match self {
            PitService::Full => 12.0,
            PitService::FuelOnly => 6.0,
            PitService::TiresOnly => 8.0,
        }
    }
}

/// Per-driver per-race car state. All percentages live in [0, 100]; mutations clamp silently.
/// The race engine is the only mutator: wear is applied on lap crossings, pit services through
/// `apply_pit`, and decision outcomes through `apply_decision_effects`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarState {
    pub tire_pct: f64,
    pub fuel_pct: f64,
    pub damage_pct: f64,
    pub laps_since_pit: u32,
    pub in_pit_this_lap: bool,
}

fn clamp_pct(val: f64) -> f64 {
    val.max(0.0).min(100.0)
}

impl CarState {
    pub fn fresh() -> CarState {
        CarState {
            tire_pct: 100.0,
            fuel_pct: 100.0,
            damage_pct: 0.0,
            laps_since_pit: 0,
            in_pit_this_lap: false,
        }
    }

    /// apply_lap_wear burns one lap worth of tire and fuel.
    pub fn apply_lap_wear(&mut self, tire_wear_pct: f64, fuel_burn_pct: f64) {
        self.tire_pct = clamp_pct(self.tire_pct - tire_wear_pct.max(0.0));
        self.fuel_pct = clamp_pct(self.fuel_pct - fuel_burn_pct.max(0.0));
        self.laps_since_pit += 1;
    }

    /// apply_pit performs the given service. Damage is not repaired by any standard stop.
    pub fn apply_pit(&mut self, service: PitService) {
        match service {
            PitService::Full => {
                self.tire_pct = 100.0;
                self.fuel_pct = 100.0;
            }
            PitService::FuelOnly => self.fuel_pct = 100.0,
            PitService::TiresOnly => self.tire_pct = 100.0,
        }

        self.laps_since_pit = 0;
        self.in_pit_this_lap = true;
    }

    /// apply_decision_effects folds the car-related part of a decision outcome into the state.
    pub fn apply_decision_effects(&mut self, tire_delta: f64, fuel_delta: f64, damage_delta: f64) {
        self.tire_pct = clamp_pct(self.tire_pct + tire_delta);
        self.fuel_pct = clamp_pct(self.fuel_pct + fuel_delta);
        self.damage_pct = clamp_pct(self.damage_pct + damage_delta);
    }

    pub fn add_damage(&mut self, amount: f64) {
        self.damage_pct = clamp_pct(self.damage_pct + amount.max(0.0));
    }

    pub fn in_range(&self) -> bool {
        [self.tire_pct, self.fuel_pct, self.damage_pct]
            .iter()
            .all(|v| (0.0..=100.0).contains(v) && v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn test_lap_wear_accumulates() {
        let mut car = CarState::fresh();
        car.apply_lap_wear(1.2, 2.0);
        car.apply_lap_wear(1.2, 2.0);

        assert_ulps_eq!(car.tire_pct, 97.6);
        assert_ulps_eq!(car.fuel_pct, 96.0);
        assert_eq!(car.laps_since_pit, 2);
    }

    #[test]
    fn test_wear_clamps_at_zero() {
        let mut car = CarState::fresh();
        car.apply_lap_wear(150.0, 150.0);

        assert_ulps_eq!(car.tire_pct, 0.0);
        assert_ulps_eq!(car.fuel_pct, 0.0);
        assert!(car.in_range());
    }

    #[test]
    fn test_full_service_resets_tires_and_fuel() {
        let mut car = CarState::fresh();
        car.apply_lap_wear(40.0, 60.0);
        car.add_damage(15.0);
        car.apply_pit(PitService::Full);

        assert_ulps_eq!(car.tire_pct, 100.0);
        assert_ulps_eq!(car.fuel_pct, 100.0);
        assert_ulps_eq!(car.damage_pct, 15.0);
        assert_eq!(car.laps_since_pit, 0);
        assert!(car.in_pit_this_lap);
    }

    #[test]
    fn test_fuel_only_leaves_tires() {
        let mut car = CarState::fresh();
        car.apply_lap_wear(40.0, 60.0);
        car.apply_pit(PitService::FuelOnly);

        assert_ulps_eq!(car.tire_pct, 60.0);
        assert_ulps_eq!(car.fuel_pct, 100.0);
    }

    #[test]
    fn test_tires_only_leaves_fuel() {
        let mut car = CarState::fresh();
        car.apply_lap_wear(40.0, 60.0);
        car.apply_pit(PitService::TiresOnly);

        assert_ulps_eq!(car.tire_pct, 100.0);
        assert_ulps_eq!(car.fuel_pct, 40.0);
    }

    #[test]
    fn test_decision_effects_clamp() {
        let mut car = CarState::fresh();
        car.apply_decision_effects(20.0, -150.0, 5.0);

        assert_ulps_eq!(car.tire_pct, 100.0);
        assert_ulps_eq!(car.fuel_pct, 0.0);
        assert_ulps_eq!(car.damage_pct, 5.0);
    }

    #[test]
    fn test_service_costs() {
        assert_ulps_eq!(PitService::Full.track_time_cost_s(), 12.0);
        assert_ulps_eq!(PitService::FuelOnly.track_time_cost_s(), 6.0);
        assert_ulps_eq!(PitService::TiresOnly.track_time_cost_s(), 8.0);
    }
}
