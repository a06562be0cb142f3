use crate::core::driver::{Driver, DriverId};
use helpers::general::argmax;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One row of the final classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishEntry {
    pub driver_id: DriverId,
    pub name: String,
    pub number: u32,
    pub position: u32,
    pub laps_completed: u32,
    pub laps_led: u32,
    pub is_player: bool,
}

/// RaceResult contains all race information that is required for post-processing: the
/// classification, the final driver states (XP gained during the race included), and the full
/// lap and race time matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResult {
    pub track_name: String,
    pub total_laps: u32,
    pub classification: Vec<FinishEntry>,
    pub drivers: Vec<Driver>,
    pub laptimes: Vec<Vec<f64>>,
    pub racetimes: Vec<Vec<f64>>,
}

impl RaceResult {
    pub fn winner(&self) -> &FinishEntry {
        &self.classification[0]
    }

    pub fn player_entry(&self) -> Option<&FinishEntry> {
        self.classification.iter().find(|entry| entry.is_player)
    }

    /// print_classification prints the finishing order to the console output.
    pub fn print_classification(&self) {
        let mut tmp_string = String::new();

        writeln!(
            &mut tmp_string,
            "{:>4}  {:>3}  {:<24} {:>5} {:>9}",
            "Pos", "No", "Driver", "Laps", "Led"
        )
        .unwrap();

        for entry in self.classification.iter() {
            let marker = if entry.is_player { "*" } else { " " };

            writeln!(
                &mut tmp_string,
                "{:>4}  {:>3}  {:<24} {:>5} {:>9}{}",
                entry.position, entry.number, entry.name, entry.laps_completed, entry.laps_led, marker
            )
            .unwrap();
        }

        println!("RESULT: {} ({} laps)", self.track_name, self.total_laps);
        println!("{}", tmp_string);

        // single out the driver who controlled the race
        let led_counts: Vec<u32> = self.classification.iter().map(|e| e.laps_led).collect();
        let dominant = &self.classification[argmax(&led_counts)];

        if dominant.laps_led > 0 {
            println!(
                "RESULT: Most laps led: {} ({} laps)",
                dominant.name, dominant.laps_led
            );
        }
    }

    /// print_player_laptimes prints the player's lap times, five per line.
    pub fn print_player_laptimes(&self) {
        let player_idx = match self.drivers.iter().position(|d| d.is_player) {
            Some(idx) => idx,
            None => return,
        };

        let mut tmp_string = String::new();

        for (lap, lap_time) in self.laptimes[player_idx].iter().enumerate() {
            write!(&mut tmp_string, "{:3}: {:7.3}s  ", lap + 1, lap_time).unwrap();

            if (lap + 1) % 5 == 0 {
                writeln!(&mut tmp_string).unwrap();
            }
        }

        println!("RESULT: Player lap times");
        println!("{}", tmp_string);
    }
}
