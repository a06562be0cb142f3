use serde::{Deserialize, Serialize};

/// The four bounded mental axes of a driver. All values live in [0, 100]; every mutation clamps
/// silently instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MentalState {
    pub confidence: f64,
    pub frustration: f64,
    pub focus: f64,
    pub distraction: f64,
}

impl Default for MentalState {
    fn default() -> Self {
        MentalState {
            confidence: 50.0,
            frustration: 10.0,
            focus: 70.0,
            distraction: 10.0,
        }
    }
}

/// A signed delta over the four mental axes, e.g. produced by a decision outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct MentalDelta {
    pub confidence: f64,
    pub frustration: f64,
    pub focus: f64,
    pub distraction: f64,
}

/// Discrete in-race happenings that nudge the mental state by fixed amounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MicroEvent {
    /// Completed an on-track pass
    PassCompleted,
    /// Lost a position on track
    WasPassed,
    /// Driving error (spin, missed apex, loose exit)
    Mistake,
    /// Heavy contact
    Crash,
    /// Crossed the line as the leader
    LedLap,
    /// Held up behind the same car for several laps
    StuckInTraffic,
    /// Field slowed behind the pace car
    CautionBreather,
    /// Five consecutive laps without an incident
    CleanLapsStreak,
}

impl MicroEvent {
    pub fn delta(&self) -> MentalDelta {
        match self {
            MicroEvent::PassCompleted => MentalDelta {
                confidence: 5.0,
                frustration: -5.0,
                ..MentalDelta::default()
            },
            MicroEvent::WasPassed => MentalDelta {
                confidence: -3.0,
                ..MentalDelta::default()
            },
            MicroEvent::Mistake => MentalDelta {
                confidence: -10.0,
                frustration: 10.0,
                focus: -5.0,
                ..MentalDelta::default()
            },
            MicroEvent::Crash => MentalDelta {
                confidence: -20.0,
                ..MentalDelta::default()
            },
            MicroEvent::LedLap => MentalDelta {
                confidence: 2.0,
                ..MentalDelta::default()
            },
            MicroEvent::StuckInTraffic => MentalDelta {
                frustration: 10.0,
                ..MentalDelta::default()
            },
            MicroEvent::CautionBreather => MentalDelta {
                focus: 15.0,
                frustration: -10.0,
                ..MentalDelta::default()
            },
            MicroEvent::CleanLapsStreak => MentalDelta {
                frustration: -3.0,
                ..MentalDelta::default()
            },
        }
    }
}

fn clamp_axis(val: f64) -> f64 {
    val.max(0.0).min(100.0)
}

impl MentalState {
    pub fn apply_delta(&mut self, delta: &MentalDelta) {
        self.confidence = clamp_axis(self.confidence + delta.confidence);
        self.frustration = clamp_axis(self.frustration + delta.frustration);
        self.focus = clamp_axis(self.focus + delta.focus);
        self.distraction = clamp_axis(self.distraction + delta.distraction);
    }

    pub fn apply_micro_event(&mut self, event: MicroEvent) {
        self.apply_delta(&event.delta())
    }

    /// drain_focus applies the per-lap focus loss. Low stamina drains faster, and a frustrated
    /// driver loses focus at 1.5x the normal rate.
    pub fn drain_focus(&mut self, stamina: f64) {
        let frust_factor = if self.frustration > 60.0 { 1.5 } else { 1.0 };
        let drain = (1.0 - stamina / 100.0) * 0.5 * frust_factor;
        self.focus = clamp_axis(self.focus - drain);
    }

    /// recover moves every axis toward its baseline by up to one point per lap, doubled at
    /// maximum composure.
    pub fn recover(&mut self, baseline: &MentalState, composure: f64) {
        let rate = 1.0 * (1.0 + composure / 100.0);
        self.confidence = step_toward(self.confidence, baseline.confidence, rate);
        self.frustration = step_toward(self.frustration, baseline.frustration, rate);
        self.focus = step_toward(self.focus, baseline.focus, rate);
        self.distraction = step_toward(self.distraction, baseline.distraction, rate);
    }

    pub fn in_range(&self) -> bool {
        [self.confidence, self.frustration, self.focus, self.distraction]
            .iter()
            .all(|v| (0.0..=100.0).contains(v) && v.is_finite())
    }
}

fn step_toward(val: f64, target: f64, rate: f64) -> f64 {
    if (val - target).abs() <= rate {
        target
    } else if val < target {
        clamp_axis(val + rate)
    } else {
        clamp_axis(val - rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn test_deltas_clamp_to_range() {
        let mut mental = MentalState {
            confidence: 95.0,
            frustration: 3.0,
            focus: 50.0,
            distraction: 0.0,
        };
        mental.apply_delta(&MentalDelta {
            confidence: 20.0,
            frustration: -10.0,
            focus: 0.0,
            distraction: -5.0,
        });
        assert_ulps_eq!(mental.confidence, 100.0);
        assert_ulps_eq!(mental.frustration, 0.0);
        assert_ulps_eq!(mental.distraction, 0.0);
        assert!(mental.in_range());
    }

    #[test]
    fn test_mistake_event() {
        let mut mental = MentalState::default();
        mental.apply_micro_event(MicroEvent::Mistake);
        assert_ulps_eq!(mental.confidence, 40.0);
        assert_ulps_eq!(mental.frustration, 20.0);
        assert_ulps_eq!(mental.focus, 65.0);
    }

    #[test]
    fn test_focus_drain_scales_with_stamina() {
        let mut fresh = MentalState::default();
        let mut tired = MentalState::default();
        fresh.drain_focus(100.0);
        tired.drain_focus(0.0);
        assert_ulps_eq!(fresh.focus, 70.0);
        assert_ulps_eq!(tired.focus, 69.5);
    }

    #[test]
    fn test_focus_drain_faster_when_frustrated() {
        let mut mental = MentalState {
            frustration: 80.0,
            ..MentalState::default()
        };
        mental.drain_focus(0.0);
        assert_ulps_eq!(mental.focus, 69.25);
    }

    #[test]
    fn test_recovery_moves_toward_baseline() {
        let baseline = MentalState::default();
        let mut mental = MentalState {
            confidence: 30.0,
            frustration: 60.0,
            focus: 70.0,
            distraction: 40.0,
        };

        // composure 100 recovers at twice the base rate
        mental.recover(&baseline, 100.0);
        assert_ulps_eq!(mental.confidence, 32.0);
        assert_ulps_eq!(mental.frustration, 58.0);
        assert_ulps_eq!(mental.focus, 70.0);
        assert_ulps_eq!(mental.distraction, 38.0);
    }

    #[test]
    fn test_recovery_saturates_at_baseline() {
        let baseline = MentalState::default();
        let mut mental = MentalState {
            confidence: 49.5,
            ..baseline
        };
        mental.recover(&baseline, 50.0);
        assert_ulps_eq!(mental.confidence, 50.0);
    }
}
