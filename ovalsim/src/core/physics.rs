use crate::core::track::{SectionPars, Track, TrackClass};
use std::error::Error;
use std::fmt;

pub const G_FT_S2: f64 = 32.174;
pub const MPH_TO_FPS: f64 = 22.0 / 15.0;

/// Reference tire-surface friction coefficient at full grip.
pub const MU_REF: f64 = 1.15;

pub const CAR_LENGTH_FT: f64 = 18.0;

/// A car within this many car lengths of the car ahead picks up the draft.
pub const DRAFT_RANGE_CAR_LENGTHS: f64 = 3.0;

/// Draft gain as a fraction of the baseline straight-section speed, before the draft-sense
/// scaling.
pub const BASE_DRAFT_PCT: f64 = 0.015;

/// Fuel burn multiplier while running in the draft.
pub const DRAFT_FUEL_FACTOR: f64 = 0.90;

/// InvalidInput is returned by the pure physics functions for out-of-range or non-finite
/// arguments. The kernel never panics.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidInput;

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid physics input")
    }
}

impl Error for InvalidInput {}

/// k_tire is the lap-time sensitivity to worn tires; short tracks punish worn tires hardest.
pub fn k_tire(class: TrackClass) -> f64 {
    match class {
        TrackClass::ShortTrack => 0.08,
        TrackClass::Intermediate => 0.06,
        TrackClass::Superspeedway => 0.05,
    }
}

/// base_tire_wear_pct is the tire wear per green lap before driver modifiers.
pub fn base_tire_wear_pct(class: TrackClass) -> f64 {
    match class {
        TrackClass::ShortTrack => 0.9,
        TrackClass::Intermediate => 1.1,
        TrackClass::Superspeedway => 0.7,
    }
}

/// base_fuel_burn_pct is the fuel burn per lap before driver modifiers.
pub fn base_fuel_burn_pct(class: TrackClass) -> f64 {
    match class {
        TrackClass::ShortTrack => 0.8,
        TrackClass::Intermediate => 1.8,
        TrackClass::Superspeedway => 2.4,
    }
}

fn check_pct(val: f64) -> Result<f64, InvalidInput> {
    if !val.is_finite() || !(0.0..=100.0).contains(&val) {
        return Err(InvalidInput);
    }
    Ok(val)
}

/// The driver/car/situation inputs of one lap-time evaluation. All percentages and skill values
/// must be within [0, 100].
#[derive(Debug, Clone, Copy)]
pub struct PaceInputs {
    pub racecraft: f64,
    pub confidence: f64,
    pub frustration: f64,
    pub distraction: f64,
    pub tire_pct: f64,
    pub fuel_pct: f64,
    pub damage_pct: f64,
    pub draft_sense: f64,
    pub drafting: bool,
}

impl PaceInputs {
    fn check(&self) -> Result<(), InvalidInput> {
        check_pct(self.racecraft)?;
        check_pct(self.confidence)?;
        check_pct(self.frustration)?;
        check_pct(self.distraction)?;
        check_pct(self.tire_pct)?;
        check_pct(self.fuel_pct)?;
        check_pct(self.damage_pct)?;
        check_pct(self.draft_sense)?;
        Ok(())
    }
}

/// corner_speed_fps returns the cornering speed sustained on a banked arc. The banked-turn
/// relation v^2 = g*r*(tan(theta) + mu) / (1 - mu*tan(theta)) with mu scaled by the surface
/// grip; the caller caps the result at the drag-limited straight speed.
pub fn corner_speed_fps(radius_ft: f64, banking_deg: f64, grip: f64) -> Result<f64, InvalidInput> {
    if !radius_ft.is_finite() || radius_ft <= 0.0 {
        return Err(InvalidInput);
    }
    if !banking_deg.is_finite() || !(0.0..=35.0).contains(&banking_deg) {
        return Err(InvalidInput);
    }
    if !grip.is_finite() || grip <= 0.0 || grip > 1.0 {
        return Err(InvalidInput);
    }

    let mu = MU_REF * grip;
    let tan_b = banking_deg.to_radians().tan();
    let lateral = (tan_b + mu) / (1.0 - mu * tan_b);

    Ok((G_FT_S2 * radius_ft * lateral).sqrt())
}

/// straight_speed_fps returns the straight-line speed: the track's drag-limited reference,
/// raised by the draft bonus when running in the draft. The bonus is a percentage of the
/// baseline speed, scaled up to +50% of itself by draft sense.
pub fn straight_speed_fps(v_top_mph: f64, draft_sense: Option<f64>) -> f64 {
    let base = v_top_mph * MPH_TO_FPS;

    match draft_sense {
        Some(sense) => base * (1.0 + BASE_DRAFT_PCT * (1.0 + sense / 200.0)),
        None => base,
    }
}

/// base_lap_time_s assembles the raw lap time from the section loop: each turn at its banked
/// cornering speed (capped by the reference speed), each straight at the reference speed with
/// the draft bonus applied when active.
pub fn base_lap_time_s(track: &Track, drafting: bool, draft_sense: f64) -> Result<f64, InvalidInput> {
    let v_top_fps = track.v_top_mph * MPH_TO_FPS;
    let mut time = 0.0;

    for section in track.sections.iter() {
        let speed = match section.pars {
            SectionPars::Turn { radius_ft, .. } => {
                let banked = corner_speed_fps(
                    radius_ft,
                    section.banking_at(0.5),
                    track.effective_grip(section.start_frac),
                )?;
                banked.min(v_top_fps)
            }
            SectionPars::Straight { .. } => {
                let sense = if drafting { Some(draft_sense) } else { None };
                straight_speed_fps(track.v_top_mph, sense)
            }
        };

        time += section.length_ft / speed;
    }

    if !time.is_finite() || time <= 0.0 {
        return Err(InvalidInput);
    }

    Ok(time)
}

/// lap_time_s produces the deterministic lap time of one driver-car combo: the base lap time
/// multiplied by the chained skill, mental, and car modifiers. The stochastic per-lap jitter is
/// drawn separately by the engine and added on top.
pub fn lap_time_s(track: &Track, inputs: &PaceInputs) -> Result<f64, InvalidInput> {
    inputs.check()?;

    let base = base_lap_time_s(track, inputs.drafting, inputs.draft_sense)?;

    let racecraft_mod = 1.0 - ((inputs.racecraft - 50.0) / 50.0) * 0.02;
    let confidence_mod = 1.0 - ((inputs.confidence - 50.0) / 50.0) * 0.05;
    let frustration_penalty = if inputs.frustration > 30.0 {
        inputs.frustration / 100.0 * 0.10
    } else {
        0.0
    };
    let distraction_penalty = if inputs.distraction > 30.0 {
        inputs.distraction / 100.0 * 0.05
    } else {
        0.0
    };
    let tire_mod = 1.0 + (1.0 - inputs.tire_pct / 100.0) * k_tire(track.class);
    let fuel_weight_mod = 1.0 + inputs.fuel_pct * 0.0001;
    let damage_mod = 1.0 + inputs.damage_pct / 100.0 * 0.05;

    Ok(base
        * racecraft_mod
        * confidence_mod
        * (1.0 + frustration_penalty)
        * (1.0 + distraction_penalty)
        * tire_mod
        * fuel_weight_mod
        * damage_mod)
}

/// lap_variance_halfwidth_s is the half-width of the symmetric per-lap jitter distribution: a
/// half second for a hopeless driver, down to a tenth at maximum consistency.
pub fn lap_variance_halfwidth_s(consistency: f64) -> f64 {
    0.5 - consistency / 100.0 * 0.4
}

/// tire_wear_per_lap_pct applies the driver modifiers to the base wear: very aggressive drivers
/// burn 5% more, tire management saves up to 30%.
pub fn tire_wear_per_lap_pct(class: TrackClass, aggression: f64, tire_management: f64) -> f64 {
    let aggression_bonus = if aggression >= 80.0 { 0.05 } else { 0.0 };
    base_tire_wear_pct(class) * (1.0 + aggression_bonus) * (1.0 - tire_management / 100.0 * 0.30)
}

/// fuel_burn_per_lap_pct applies the draft saving and fuel management to the base burn.
pub fn fuel_burn_per_lap_pct(class: TrackClass, drafting: bool, fuel_management: f64) -> f64 {
    let draft_factor = if drafting { DRAFT_FUEL_FACTOR } else { 1.0 };
    base_fuel_burn_pct(class) * draft_factor * (1.0 - fuel_management / 100.0 * 0.15)
}

/// mistake_probability is the per-lap chance of a driving error; a rattled driver (high
/// frustration or distraction) picks up an extra flat risk.
pub fn mistake_probability(focus: f64, frustration: f64, distraction: f64) -> f64 {
    let mut p = 0.10 * (1.0 - focus / 100.0);

    if frustration > 60.0 {
        p += 0.05
    }

    if distraction > 60.0 {
        p += 0.05
    }

    p.max(0.0).min(1.0)
}

/// draft_available checks the spatial gap to the car ahead against the draft range.
pub fn draft_available(gap_ft: f64) -> bool {
    (0.0..=DRAFT_RANGE_CAR_LENGTHS * CAR_LENGTH_FT).contains(&gap_ft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::TrackPars;
    use approx::assert_abs_diff_eq;

    fn skilled_inputs() -> PaceInputs {
        PaceInputs {
            racecraft: 70.0,
            confidence: 75.0,
            frustration: 15.0,
            distraction: 10.0,
            tire_pct: 100.0,
            fuel_pct: 100.0,
            damage_pct: 0.0,
            draft_sense: 50.0,
            drafting: false,
        }
    }

    #[test]
    fn test_short_track_clean_lap_window() {
        let track = Track::new(&TrackPars::bristol()).unwrap();
        let lap = lap_time_s(&track, &skilled_inputs()).unwrap();
        assert!(
            (15.0..=16.0).contains(&lap),
            "lap time {:.3}s out of window",
            lap
        );
    }

    #[test]
    fn test_worn_tires_cost_half_a_second() {
        let track = Track::new(&TrackPars::bristol()).unwrap();
        let fresh = lap_time_s(&track, &skilled_inputs()).unwrap();

        let mut worn_inputs = skilled_inputs();
        worn_inputs.tire_pct = 50.0;
        let worn = lap_time_s(&track, &worn_inputs).unwrap();

        let delta = worn - fresh;
        assert!(
            (0.4..=0.9).contains(&delta),
            "tire delta {:.3}s out of window",
            delta
        );
    }

    #[test]
    fn test_superspeedway_draft_gain_window() {
        let track = Track::new(&TrackPars::daytona()).unwrap();
        let clean = lap_time_s(&track, &skilled_inputs()).unwrap();

        let mut draft_inputs = skilled_inputs();
        draft_inputs.drafting = true;
        let drafting = lap_time_s(&track, &draft_inputs).unwrap();

        let gain = clean - drafting;
        assert!(
            (0.2..=0.6).contains(&gain),
            "draft gain {:.3}s out of window",
            gain
        );
    }

    #[test]
    fn test_draft_cuts_fuel_burn_to_90_pct() {
        let clean = fuel_burn_per_lap_pct(TrackClass::Superspeedway, false, 50.0);
        let draft = fuel_burn_per_lap_pct(TrackClass::Superspeedway, true, 50.0);
        assert_abs_diff_eq!(draft / clean, 0.90, epsilon = 1e-12);
    }

    #[test]
    fn test_rattled_driver_loses_eight_pct() {
        let track = Track::new(&TrackPars::charlotte()).unwrap();

        let rattled = PaceInputs {
            racecraft: 70.0,
            confidence: 25.0,
            frustration: 75.0,
            distraction: 20.0,
            tire_pct: 30.0,
            fuel_pct: 60.0,
            damage_pct: 0.0,
            draft_sense: 50.0,
            drafting: false,
        };
        let composed = PaceInputs {
            confidence: 80.0,
            frustration: 20.0,
            ..rattled
        };

        let slow = lap_time_s(&track, &rattled).unwrap();
        let fast = lap_time_s(&track, &composed).unwrap();
        assert!(slow / fast >= 1.08, "ratio {:.4} below 1.08", slow / fast);
    }

    #[test]
    fn test_lap_time_monotonic_in_tire() {
        let track = Track::new(&TrackPars::bristol()).unwrap();
        let mut prev = 0.0;

        for tire in (0..=100).rev().step_by(5) {
            let mut inputs = skilled_inputs();
            inputs.tire_pct = tire as f64;
            let lap = lap_time_s(&track, &inputs).unwrap();
            assert!(lap >= prev);
            prev = lap;
        }
    }

    #[test]
    fn test_lap_time_monotonic_in_racecraft_and_confidence() {
        let track = Track::new(&TrackPars::bristol()).unwrap();
        let mut prev_rc = f64::INFINITY;
        let mut prev_conf = f64::INFINITY;

        for level in (0..=100).step_by(5) {
            let mut by_rc = skilled_inputs();
            by_rc.racecraft = level as f64;
            let lap_rc = lap_time_s(&track, &by_rc).unwrap();
            assert!(lap_rc <= prev_rc);
            prev_rc = lap_rc;

            let mut by_conf = skilled_inputs();
            by_conf.confidence = level as f64;
            let lap_conf = lap_time_s(&track, &by_conf).unwrap();
            assert!(lap_conf <= prev_conf);
            prev_conf = lap_conf;
        }
    }

    #[test]
    fn test_lap_time_monotonic_in_frustration_above_30() {
        let track = Track::new(&TrackPars::bristol()).unwrap();
        let mut prev = 0.0;

        for frustration in (31..=100).step_by(3) {
            let mut inputs = skilled_inputs();
            inputs.frustration = frustration as f64;
            let lap = lap_time_s(&track, &inputs).unwrap();
            assert!(lap >= prev);
            prev = lap;
        }
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let track = Track::new(&TrackPars::bristol()).unwrap();

        let mut nan_inputs = skilled_inputs();
        nan_inputs.tire_pct = f64::NAN;
        assert!(lap_time_s(&track, &nan_inputs).is_err());

        let mut oob_inputs = skilled_inputs();
        oob_inputs.racecraft = 120.0;
        assert!(lap_time_s(&track, &oob_inputs).is_err());

        assert!(corner_speed_fps(-100.0, 20.0, 1.0).is_err());
        assert!(corner_speed_fps(250.0, 40.0, 1.0).is_err());
        assert!(corner_speed_fps(250.0, 20.0, 0.0).is_err());
    }

    #[test]
    fn test_banking_raises_corner_speed() {
        let flat = corner_speed_fps(250.0, 5.0, 1.0).unwrap();
        let banked = corner_speed_fps(250.0, 28.0, 1.0).unwrap();
        assert!(banked > flat);
    }

    #[test]
    fn test_lap_variance_shrinks_with_consistency() {
        assert_abs_diff_eq!(lap_variance_halfwidth_s(0.0), 0.5);
        assert_abs_diff_eq!(lap_variance_halfwidth_s(100.0), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_tire_wear_modifiers() {
        let neutral = tire_wear_per_lap_pct(TrackClass::ShortTrack, 50.0, 0.0);
        assert_abs_diff_eq!(neutral, 0.9);

        let aggressive = tire_wear_per_lap_pct(TrackClass::ShortTrack, 85.0, 0.0);
        assert_abs_diff_eq!(aggressive, 0.9 * 1.05);

        let manager = tire_wear_per_lap_pct(TrackClass::ShortTrack, 50.0, 100.0);
        assert_abs_diff_eq!(manager, 0.9 * 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_mistake_probability_shape() {
        assert_abs_diff_eq!(mistake_probability(100.0, 0.0, 0.0), 0.0);
        assert_abs_diff_eq!(mistake_probability(0.0, 0.0, 0.0), 0.10);
        assert_abs_diff_eq!(mistake_probability(50.0, 70.0, 0.0), 0.10);
        assert_abs_diff_eq!(mistake_probability(50.0, 70.0, 70.0), 0.15);
    }

    #[test]
    fn test_draft_range() {
        assert!(draft_available(0.0));
        assert!(draft_available(CAR_LENGTH_FT * 1.5));
        assert!(!draft_available(CAR_LENGTH_FT * 3.5));
        assert!(!draft_available(-1.0));
    }
}
