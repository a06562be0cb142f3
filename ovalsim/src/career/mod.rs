use crate::core::driver::Driver;
use crate::core::skills::SkillKind;
use crate::post::race_result::RaceResult;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// points_for_position returns the championship points of a finishing position: 40 for the win,
/// then a descending ladder with a single point for everything from 35th back.
pub fn points_for_position(position: u32) -> u32 {
    match position {
        0 => 0,
        1 => 40,
        2..=35 => 36 - position,
        _ => 1,
    }
}

/// The persisted career state between races. Serialized as JSON; the seed keeps career-mode
/// race generation reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerSave {
    pub driver: Driver,
    pub season: u32,
    pub race_index: u32,
    pub points: u32,
    pub unlocked_tracks: Vec<String>,
    pub schedule_id: String,
    pub rng_seed: u64,
}

impl CareerSave {
    pub fn new(driver: Driver, schedule_id: &str, rng_seed: u64) -> CareerSave {
        CareerSave {
            driver,
            season: 1,
            race_index: 0,
            points: 0,
            unlocked_tracks: vec!["Bristol".to_owned(), "Martinsville".to_owned()],
            schedule_id: schedule_id.to_owned(),
            rng_seed,
        }
    }

    /// apply_race_result folds one finished race into the career: the in-race skill gains are
    /// kept, the career statistics and points are updated, the finishing XP is awarded, and the
    /// mental state resets to its baseline for the next race weekend.
    pub fn apply_race_result(&mut self, result: &RaceResult) -> anyhow::Result<()> {
        let entry = result
            .player_entry()
            .context("No player in the classification!")?;
        let final_driver = result
            .drivers
            .iter()
            .find(|driver| driver.is_player)
            .context("No player in the final driver states!")?;

        // adopt the skills as they left the race (decision XP included)
        self.driver.skills = final_driver.skills.to_owned();
        self.driver
            .career
            .record_finish(entry.position, entry.laps_led, false);
        self.driver.mental = self.driver.mental_baseline;

        self.points += points_for_position(entry.position);
        if entry.laps_led > 0 {
            self.points += 1;
        }

        self.race_index += 1;

        // finishing XP: the race itself teaches racecraft, long runs build stamina
        let finish_xp = match entry.position {
            1 => 50,
            2..=5 => 30,
            6..=10 => 20,
            _ => 10,
        };
        self.driver.skills.gain(SkillKind::Racecraft, finish_xp);
        self.driver
            .skills
            .gain(SkillKind::Stamina, (entry.laps_completed / 50) as i64);

        // a good run on a big stage opens the bigger tracks
        if entry.position <= 10 {
            for unlock in ["Charlotte", "Daytona"].iter() {
                if !self.unlocked_tracks.iter().any(|name| name == unlock) {
                    self.unlocked_tracks.push((*unlock).to_owned());
                    break;
                }
            }
        }

        Ok(())
    }
}

/// save_career writes the career state as pretty-printed JSON.
pub fn save_career(save: &CareerSave, filepath: &Path) -> anyhow::Result<()> {
    let fh = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(filepath)
        .context(format!("Failed to open career file {}!", filepath.display()))?;

    serde_json::to_writer_pretty(&fh, save).context("Failed to write the career file!")
}

/// load_career reads a career state back from disk.
pub fn load_career(filepath: &Path) -> anyhow::Result<CareerSave> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open career file {}!", filepath.display()))?;

    serde_json::from_reader(&fh).context("Failed to parse the career file!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::DriverPars;
    use crate::core::mental::MentalState;
    use crate::core::skills::SkillLevels;
    use crate::post::race_result::FinishEntry;

    fn test_driver() -> Driver {
        Driver::new(
            &DriverPars {
                id: 1,
                name: "Junior Calloway".to_owned(),
                number: 43,
                color: "#1e90ff".to_owned(),
                skills: SkillLevels {
                    racecraft: 60,
                    consistency: 55,
                    aggression: 50,
                    focus: 60,
                    stamina: 50,
                    composure: 55,
                    draft_sense: 45,
                    tire_management: 50,
                    fuel_management: 50,
                    pit_strategy: 40,
                },
                mental_baseline: MentalState::default(),
                career: Default::default(),
            },
            true,
        )
    }

    fn result_with_player_finish(position: u32, laps_led: u32) -> RaceResult {
        let driver = test_driver();

        RaceResult {
            track_name: "Bristol".to_owned(),
            total_laps: 500,
            classification: vec![FinishEntry {
                driver_id: driver.id,
                name: driver.name.to_owned(),
                number: driver.number,
                position,
                laps_completed: 500,
                laps_led,
                is_player: true,
            }],
            drivers: vec![driver],
            laptimes: vec![vec![]],
            racetimes: vec![vec![0.0]],
        }
    }

    #[test]
    fn test_points_ladder() {
        assert_eq!(points_for_position(1), 40);
        assert_eq!(points_for_position(2), 34);
        assert_eq!(points_for_position(10), 26);
        assert_eq!(points_for_position(35), 1);
        assert_eq!(points_for_position(43), 1);
    }

    #[test]
    fn test_apply_result_updates_stats_and_points() {
        let mut save = CareerSave::new(test_driver(), "cup-1", 42);
        save.apply_race_result(&result_with_player_finish(3, 120)).unwrap();

        assert_eq!(save.race_index, 1);
        assert_eq!(save.points, 33 + 1); // third pays 33, plus the led-a-lap bonus
        assert_eq!(save.driver.career.races, 1);
        assert_eq!(save.driver.career.top5, 1);
        assert_eq!(save.driver.career.laps_led, 120);
    }

    #[test]
    fn test_apply_result_awards_finishing_xp() {
        let mut save = CareerSave::new(test_driver(), "cup-1", 42);
        let racecraft_before = save.driver.skills.racecraft.xp();

        save.apply_race_result(&result_with_player_finish(1, 0)).unwrap();
        assert_eq!(save.driver.skills.racecraft.xp(), racecraft_before + 50);
    }

    #[test]
    fn test_mental_resets_between_races() {
        let mut save = CareerSave::new(test_driver(), "cup-1", 42);
        save.driver.mental.frustration = 90.0;

        save.apply_race_result(&result_with_player_finish(12, 0)).unwrap();
        assert_eq!(save.driver.mental, save.driver.mental_baseline);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("career.json");

        let save = CareerSave::new(test_driver(), "cup-1", 7);
        save_career(&save, &path).unwrap();
        let restored = load_career(&path).unwrap();

        assert_eq!(restored.schedule_id, save.schedule_id);
        assert_eq!(restored.rng_seed, save.rng_seed);
        assert_eq!(restored.driver.name, save.driver.name);
        assert_eq!(
            restored.driver.skills.racecraft.xp(),
            save.driver.skills.racecraft.xp()
        );
    }
}
