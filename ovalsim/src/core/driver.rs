use crate::core::mental::MentalState;
use crate::core::skills::{SkillKind, SkillLevels, SkillSet};
use serde::{Deserialize, Serialize};

pub type DriverId = u32;

/// * `id` - Unique driver id
/// * `name` - Driver name, e.g. Junior Calloway
/// * `number` - Car number, e.g. 43
/// * `color` - Hex-code of the car color (used by external renderers)
/// * `skills` - Skill levels, each in [0, 100]
/// * `mental_baseline` - Mental state at the race start and recovery target during the race
/// * `career` - Career statistics carried over from previous races (empty for a rookie)
#[derive(Debug, Deserialize, Clone)]
pub struct DriverPars {
    pub id: DriverId,
    pub name: String,
    pub number: u32,
    pub color: String,
    pub skills: SkillLevels,
    #[serde(default)]
    pub mental_baseline: MentalState,
    #[serde(default)]
    pub career: CareerStats,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CareerStats {
    pub races: u32,
    pub wins: u32,
    pub top5: u32,
    pub top10: u32,
    pub poles: u32,
    pub laps_led: u32,
    pub avg_finish: f64,
}

impl CareerStats {
    /// record_finish folds one race result into the running statistics. The average finish is
    /// updated with the incremental running mean, which is free of cumulative drift.
    pub fn record_finish(&mut self, position: u32, laps_led: u32, pole: bool) {
        self.races += 1;

        if position == 1 {
            self.wins += 1
        }

        if position <= 5 {
            self.top5 += 1
        }

        if position <= 10 {
            self.top10 += 1
        }

        if pole {
            self.poles += 1
        }

        self.laps_led += laps_led;
        self.avg_finish += (position as f64 - self.avg_finish) / self.races as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub number: u32,
    pub color: String,
    pub is_player: bool,
    pub skills: SkillSet,
    pub mental: MentalState,
    pub mental_baseline: MentalState,
    pub career: CareerStats,
}

impl Driver {
    pub fn new(driver_pars: &DriverPars, is_player: bool) -> Driver {
        Driver {
            id: driver_pars.id,
            name: driver_pars.name.to_owned(),
            number: driver_pars.number,
            color: driver_pars.color.to_owned(),
            is_player,
            skills: SkillSet::from_levels(&driver_pars.skills),
            mental: driver_pars.mental_baseline,
            mental_baseline: driver_pars.mental_baseline,
            career: driver_pars.career.to_owned(),
        }
    }

    /// skill returns the current level of the given axis as a float for the pace and probability
    /// formulas.
    pub fn skill(&self, kind: SkillKind) -> f64 {
        self.skills.value(kind)
    }
}
