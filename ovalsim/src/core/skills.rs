use serde::{Deserialize, Serialize};

/// Highest reachable skill level. XP gained beyond the cap threshold is retained but has no
/// behavioral effect.
pub const SKILL_CAP: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Racecraft,
    Consistency,
    Aggression,
    Focus,
    Stamina,
    Composure,
    DraftSense,
    TireManagement,
    FuelManagement,
    PitStrategy,
}

impl SkillKind {
    pub const ALL: [SkillKind; 10] = [
        SkillKind::Racecraft,
        SkillKind::Consistency,
        SkillKind::Aggression,
        SkillKind::Focus,
        SkillKind::Stamina,
        SkillKind::Composure,
        SkillKind::DraftSense,
        SkillKind::TireManagement,
        SkillKind::FuelManagement,
        SkillKind::PitStrategy,
    ];
}

/// xp_required returns the XP needed to advance from the given level to the next one. The curve
/// is flat up to level 40 and then steepens in two stages.
pub fn xp_required(level: u32) -> u32 {
    if level < 40 {
        100
    } else if level < 70 {
        200 + (level - 40) * 10
    } else {
        500 + (level - 70) * 16
    }
}

/// cumulative_xp returns the total XP that corresponds to reaching the given level from zero.
fn cumulative_xp(level: u32) -> u64 {
    (0..level.min(SKILL_CAP)).map(|l| xp_required(l) as u64).sum()
}

/// A single skill axis. The level in [0, 100] is derived from the accumulated XP; levels never
/// decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    xp: u64,
}

impl Skill {
    pub fn from_level(level: u32) -> Skill {
        Skill {
            xp: cumulative_xp(level.min(SKILL_CAP)),
        }
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        let mut level = 0;
        let mut rem = self.xp;

        while level < SKILL_CAP {
            let req = xp_required(level) as u64;

            if rem < req {
                break;
            }

            rem -= req;
            level += 1;
        }

        level
    }

    /// value returns the level as a float for use in the pace and probability formulas.
    pub fn value(&self) -> f64 {
        self.level() as f64
    }

    /// gain adds XP to the skill. Non-positive amounts are ignored.
    pub fn gain(&mut self, amount: i64) {
        if amount > 0 {
            self.xp += amount as u64
        }
    }
}

/// The full set of the ten skill axes of a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSet {
    pub racecraft: Skill,
    pub consistency: Skill,
    pub aggression: Skill,
    pub focus: Skill,
    pub stamina: Skill,
    pub composure: Skill,
    pub draft_sense: Skill,
    pub tire_management: Skill,
    pub fuel_management: Skill,
    pub pit_strategy: Skill,
}

/// * `racecraft` - Base pace and pass execution
/// * `consistency` - Lap-to-lap spread
/// * `aggression` - Pass boldness, extra tire burn at high values
/// * `focus` - Mistake avoidance, decision time windows
/// * `stamina` - Focus drain per lap
/// * `composure` - Mental recovery rate
/// * `draft_sense` - Draft exploitation
/// * `tire_management` - Tire wear reduction
/// * `fuel_management` - Fuel burn reduction
/// * `pit_strategy` - Pit decision quality, unlocks advanced services at 60+
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct SkillLevels {
    pub racecraft: u32,
    pub consistency: u32,
    pub aggression: u32,
    pub focus: u32,
    pub stamina: u32,
    pub composure: u32,
    pub draft_sense: u32,
    pub tire_management: u32,
    pub fuel_management: u32,
    pub pit_strategy: u32,
}

impl SkillLevels {
    pub fn as_array(&self) -> [u32; 10] {
        [
            self.racecraft,
            self.consistency,
            self.aggression,
            self.focus,
            self.stamina,
            self.composure,
            self.draft_sense,
            self.tire_management,
            self.fuel_management,
            self.pit_strategy,
        ]
    }
}

impl SkillSet {
    pub fn from_levels(levels: &SkillLevels) -> SkillSet {
        SkillSet {
            racecraft: Skill::from_level(levels.racecraft),
            consistency: Skill::from_level(levels.consistency),
            aggression: Skill::from_level(levels.aggression),
            focus: Skill::from_level(levels.focus),
            stamina: Skill::from_level(levels.stamina),
            composure: Skill::from_level(levels.composure),
            draft_sense: Skill::from_level(levels.draft_sense),
            tire_management: Skill::from_level(levels.tire_management),
            fuel_management: Skill::from_level(levels.fuel_management),
            pit_strategy: Skill::from_level(levels.pit_strategy),
        }
    }

    pub fn get(&self, kind: SkillKind) -> &Skill {
        match kind {
            SkillKind::Racecraft => &self.racecraft,
            SkillKind::Consistency => &self.consistency,
            SkillKind::Aggression => &self.aggression,
            SkillKind::Focus => &self.focus,
            SkillKind::Stamina => &self.stamina,
            SkillKind::Composure => &self.composure,
            SkillKind::DraftSense => &self.draft_sense,
            SkillKind::TireManagement => &self.tire_management,
            SkillKind::FuelManagement => &self.fuel_management,
            SkillKind::PitStrategy => &self.pit_strategy,
        }
    }

    fn get_mut(&mut self, kind: SkillKind) -> &mut Skill {
        match kind {
            SkillKind::Racecraft => &mut self.racecraft,
            SkillKind::Consistency => &mut self.consistency,
            SkillKind::Aggression => &mut self.aggression,
            SkillKind::Focus => &mut self.focus,
            SkillKind::Stamina => &mut self.stamina,
            SkillKind::Composure => &mut self.composure,
            SkillKind::DraftSense => &mut self.draft_sense,
            SkillKind::TireManagement => &mut self.tire_management,
            SkillKind::FuelManagement => &mut self.fuel_management,
            SkillKind::PitStrategy => &mut self.pit_strategy,
        }
    }

    pub fn value(&self, kind: SkillKind) -> f64 {
        self.get(kind).value()
    }

    pub fn gain(&mut self, kind: SkillKind, amount: i64) {
        self.get_mut(kind).gain(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xp_required_stages() {
        assert_eq!(xp_required(0), 100);
        assert_eq!(xp_required(39), 100);
        assert_eq!(xp_required(40), 200);
        assert_eq!(xp_required(69), 490);
        assert_eq!(xp_required(70), 500);
        assert_eq!(xp_required(99), 964);
    }

    #[test]
    fn test_level_roundtrip() {
        for level in [0, 1, 39, 40, 55, 69, 70, 85, 99, 100].iter() {
            assert_eq!(Skill::from_level(*level).level(), *level);
        }
    }

    #[test]
    fn test_gain_advances_level() {
        let mut skill = Skill::from_level(39);
        skill.gain(99);
        assert_eq!(skill.level(), 39);
        skill.gain(1);
        assert_eq!(skill.level(), 40);
    }

    #[test]
    fn test_negative_gain_is_noop() {
        let mut skill = Skill::from_level(50);
        let xp_before = skill.xp();
        skill.gain(-25);
        skill.gain(0);
        assert_eq!(skill.xp(), xp_before);
    }

    #[test]
    fn test_cap_retains_surplus_xp() {
        let mut skill = Skill::from_level(100);
        skill.gain(10_000);
        assert_eq!(skill.level(), 100);
        assert!(skill.xp() > Skill::from_level(100).xp());
    }

    #[test]
    fn test_level_never_exceeds_cap() {
        let mut skill = Skill::from_level(0);
        skill.gain(10_000_000);
        assert_eq!(skill.level(), SKILL_CAP);
    }
}
