use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

pub const FT_PER_MILE: f64 = 5280.0;

/// Maximum banking angle a section may declare.
pub const MAX_BANKING_DEG: f64 = 35.0;

/// Tolerance of the loop-closure checks: section lengths must match the declared track length
/// within 1%, turn arcs must sum to a full circle within one degree.
const LENGTH_CLOSURE_TOL: f64 = 0.01;
const ARC_CLOSURE_TOL_DEG: f64 = 1.0;

/// InvalidGeometry is raised when track parameters describe an impossible loop (open loop,
/// excessive banking, zero radius, length mismatch).
#[derive(Debug, Clone)]
pub struct InvalidGeometry(pub String);

impl fmt::Display for InvalidGeometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid track geometry: {}", self.0)
    }
}

impl Error for InvalidGeometry {}

/// Broad track category; selects the wear, burn, and tire-sensitivity constants of the physics
/// kernel. Derived from the track length when not declared explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackClass {
    ShortTrack,
    Intermediate,
    Superspeedway,
}

impl TrackClass {
    pub fn from_length(length_miles: f64) -> TrackClass {
        if length_miles < 1.0 {
            TrackClass::ShortTrack
        } else if length_miles < 2.0 {
            TrackClass::Intermediate
        } else {
            TrackClass::Superspeedway
        }
    }
}

/// Interpolation shape of the banking between the inner and the outer edge of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BankingCurve {
    Linear,
    Cubic,
    EaseInOut,
}

impl Default for BankingCurve {
    fn default() -> Self {
        BankingCurve::Linear
    }
}

impl BankingCurve {
    fn blend(&self, t: f64) -> f64 {
        let t = t.max(0.0).min(1.0);
        match self {
            BankingCurve::Linear => t,
            BankingCurve::Cubic => t * t * t,
            BankingCurve::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// One piece of the closed track loop.
///
/// * `Turn` - Circular arc with its radius, swept angle, and banking range
/// * `Straight` - Flat-out piece with its length and banking range
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SectionPars {
    Turn {
        radius_ft: f64,
        arc_deg: f64,
        banking_inner: f64,
        banking_outer: f64,
        #[serde(default)]
        banking_curve: BankingCurve,
    },
    Straight {
        length_ft: f64,
        banking_inner: f64,
        banking_outer: f64,
        #[serde(default)]
        banking_curve: BankingCurve,
    },
}

/// * `name` - Track name, e.g. Bristol
/// * `length_miles` - Declared lap length
/// * `class` - Track category (derived from the length if omitted)
/// * `v_top_mph` - Straight-line reference speed (drag-limited)
/// * `grip` - Surface grip factor in (0, 1]
/// * `width_ft` - Racing surface width
/// * `sections` - Ordered loop of sections, starting at the start/finish line
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackPars {
    pub name: String,
    pub length_miles: f64,
    #[serde(default)]
    pub class: Option<TrackClass>,
    pub v_top_mph: f64,
    pub grip: f64,
    pub width_ft: f64,
    pub sections: Vec<SectionPars>,
}

/// A section with its precomputed place on the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub pars: SectionPars,
    pub length_ft: f64,
    /// Start of the section as a lap fraction
    pub start_frac: f64,
    /// End of the section as a lap fraction
    pub end_frac: f64,
}

impl Section {
    pub fn is_turn(&self) -> bool {
        matches!(self.pars, SectionPars::Turn { .. })
    }

    pub fn banking_range(&self) -> (f64, f64, BankingCurve) {
        match self.pars {
            SectionPars::Turn {
                banking_inner,
                banking_outer,
                banking_curve,
                ..
            } => (banking_inner, banking_outer, banking_curve),
            SectionPars::Straight {
                banking_inner,
                banking_outer,
                banking_curve,
                ..
            } => (banking_inner, banking_outer, banking_curve),
        }
    }

    /// banking_at returns the surface angle in degrees at the given lateral position, where 0 is
    /// the inner edge and 1 the outer edge.
    pub fn banking_at(&self, lateral: f64) -> f64 {
        let (inner, outer, curve) = self.banking_range();
        inner + (outer - inner) * curve.blend(lateral)
    }
}

/// Immutable run-time representation of a track. Built once from the parameters, then shared
/// read-only by the engine and any observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub class: TrackClass,
    pub length_miles: f64,
    pub length_ft: f64,
    pub v_top_mph: f64,
    pub grip: f64,
    pub width_ft: f64,
    pub sections: Vec<Section>,
}

impl Track {
    pub fn new(track_pars: &TrackPars) -> Result<Track, InvalidGeometry> {
        if !(track_pars.length_miles > 0.0) {
            return Err(InvalidGeometry("track length must be positive".into()));
        }
        if !(track_pars.v_top_mph > 0.0) {
            return Err(InvalidGeometry("reference speed must be positive".into()));
        }
        if !(track_pars.grip > 0.0 && track_pars.grip <= 1.0) {
            return Err(InvalidGeometry("grip must be in (0, 1]".into()));
        }
        if !(track_pars.width_ft > 0.0) {
            return Err(InvalidGeometry("track width must be positive".into()));
        }
        if track_pars.sections.is_empty() {
            return Err(InvalidGeometry("track has no sections".into()));
        }

        let length_ft = track_pars.length_miles * FT_PER_MILE;

        // validate the individual sections and sum up lengths and arcs
        let mut sum_length = 0.0;
        let mut sum_arc = 0.0;

        for section_pars in track_pars.sections.iter() {
            let (inner, outer) = match section_pars {
                SectionPars::Turn {
                    radius_ft,
                    arc_deg,
                    banking_inner,
                    banking_outer,
                    ..
                } => {
                    if !(*radius_ft > 0.0) {
                        return Err(InvalidGeometry("turn radius must be positive".into()));
                    }
                    if !(*arc_deg > 0.0) {
                        return Err(InvalidGeometry("turn arc must be positive".into()));
                    }
                    sum_length += radius_ft * arc_deg.to_radians();
                    sum_arc += arc_deg;
                    (*banking_inner, *banking_outer)
                }
                SectionPars::Straight {
                    length_ft,
                    banking_inner,
                    banking_outer,
                    ..
                } => {
                    if !(*length_ft > 0.0) {
                        return Err(InvalidGeometry("straight length must be positive".into()));
                    }
                    sum_length += length_ft;
                    (*banking_inner, *banking_outer)
                }
            };

            if !(0.0..=MAX_BANKING_DEG).contains(&inner) || !(0.0..=MAX_BANKING_DEG).contains(&outer)
            {
                return Err(InvalidGeometry(format!(
                    "banking must be within [0, {}] degrees",
                    MAX_BANKING_DEG
                )));
            }

            if outer < inner {
                return Err(InvalidGeometry(
                    "outer banking must not be below inner banking".into(),
                ));
            }
        }

        if (sum_arc - 360.0).abs() > ARC_CLOSURE_TOL_DEG {
            return Err(InvalidGeometry(format!(
                "turn arcs sum to {:.1} degrees instead of 360",
                sum_arc
            )));
        }

        if (sum_length - length_ft).abs() > length_ft * LENGTH_CLOSURE_TOL {
            return Err(InvalidGeometry(format!(
                "section lengths sum to {:.0}ft, declared length is {:.0}ft",
                sum_length, length_ft
            )));
        }

        // precompute the lap fractions of each section
        let mut sections = Vec::with_capacity(track_pars.sections.len());
        let mut s = 0.0;

        for section_pars in track_pars.sections.iter() {
            let sec_length = match section_pars {
                SectionPars::Turn {
                    radius_ft, arc_deg, ..
                } => radius_ft * arc_deg.to_radians(),
                SectionPars::Straight { length_ft, .. } => *length_ft,
            };

            sections.push(Section {
                pars: section_pars.to_owned(),
                length_ft: sec_length,
                start_frac: s / sum_length,
                end_frac: (s + sec_length) / sum_length,
            });

            s += sec_length;
        }

        // close the loop exactly
        if let Some(last) = sections.last_mut() {
            last.end_frac = 1.0
        }

        Ok(Track {
            name: track_pars.name.to_owned(),
            class: track_pars
                .class
                .unwrap_or_else(|| TrackClass::from_length(track_pars.length_miles)),
            length_miles: track_pars.length_miles,
            length_ft,
            v_top_mph: track_pars.v_top_mph,
            grip: track_pars.grip,
            width_ft: track_pars.width_ft,
            sections,
        })
    }

    pub fn length(&self) -> f64 {
        self.length_miles
    }

    /// section_at maps a lap progress in [0, 1) to its section and the local progress within
    /// that section.
    pub fn section_at(&self, progress: f64) -> (&Section, f64) {
        let p = progress.rem_euclid(1.0);

        for section in self.sections.iter() {
            if p < section.end_frac {
                let local = (p - section.start_frac) / (section.end_frac - section.start_frac);
                return (section, local);
            }
        }

        // p numerically at 1.0 wraps onto the first section
        (&self.sections[0], 0.0)
    }

    /// banking_at returns the surface angle in degrees at the given progress and lateral
    /// position (0 inner edge, 1 outer edge).
    pub fn banking_at(&self, progress: f64, lateral: f64) -> f64 {
        let (section, _) = self.section_at(progress);
        section.banking_at(lateral)
    }

    /// effective_grip returns the usable grip fraction at the given progress.
    pub fn effective_grip(&self, _progress: f64) -> f64 {
        // the surface is modeled as uniform; the per-progress signature leaves room for local
        // surface conditions
        self.grip
    }
}

impl TrackPars {
    /// oval builds a symmetric two-turn oval: two straights connected by two 180-degree turns.
    /// The straight lengths follow from the declared lap length and the turn radius.
    pub fn oval(
        name: &str,
        length_miles: f64,
        radius_ft: f64,
        banking_turn: (f64, f64),
        banking_straight: (f64, f64),
        v_top_mph: f64,
        grip: f64,
        width_ft: f64,
    ) -> TrackPars {
        let length_ft = length_miles * FT_PER_MILE;
        let turn_total = 2.0 * std::f64::consts::PI * radius_ft;
        let straight = (length_ft - turn_total) / 2.0;

        let turn = SectionPars::Turn {
            radius_ft,
            arc_deg: 180.0,
            banking_inner: banking_turn.0,
            banking_outer: banking_turn.1,
            banking_curve: BankingCurve::Linear,
        };
        let straight_sec = |len: f64| SectionPars::Straight {
            length_ft: len,
            banking_inner: banking_straight.0,
            banking_outer: banking_straight.1,
            banking_curve: BankingCurve::Linear,
        };

        TrackPars {
            name: name.to_owned(),
            length_miles,
            class: None,
            v_top_mph,
            grip,
            width_ft,
            sections: vec![
                straight_sec(straight),
                turn.to_owned(),
                straight_sec(straight),
                turn,
            ],
        }
    }

    /// tri_oval builds a three-cornered loop: two main 170-degree turns plus a shallow
    /// 20-degree kink splitting the frontstretch, the signature superspeedway shape.
    pub fn tri_oval(
        name: &str,
        length_miles: f64,
        radius_ft: f64,
        kink_radius_ft: f64,
        banking_turn: (f64, f64),
        banking_kink: (f64, f64),
        v_top_mph: f64,
        grip: f64,
        width_ft: f64,
    ) -> TrackPars {
        let length_ft = length_miles * FT_PER_MILE;
        let main_turn_len = radius_ft * 170.0_f64.to_radians();
        let kink_len = kink_radius_ft * 20.0_f64.to_radians();
        let straight_total = length_ft - 2.0 * main_turn_len - kink_len;
        // backstretch takes half of the remaining length, the split frontstretch the other half
        let back = straight_total * 0.5;
        let front_half = straight_total * 0.25;

        let turn = |radius: f64, arc: f64, banking: (f64, f64)| SectionPars::Turn {
            radius_ft: radius,
            arc_deg: arc,
            banking_inner: banking.0,
            banking_outer: banking.1,
            banking_curve: BankingCurve::EaseInOut,
        };
        let straight_sec = |len: f64| SectionPars::Straight {
            length_ft: len,
            banking_inner: 2.0,
            banking_outer: 3.0,
            banking_curve: BankingCurve::Linear,
        };

        TrackPars {
            name: name.to_owned(),
            length_miles,
            class: None,
            v_top_mph,
            grip,
            width_ft,
            sections: vec![
                straight_sec(front_half),
                turn(radius_ft, 170.0, banking_turn),
                straight_sec(back),
                turn(radius_ft, 170.0, banking_turn),
                straight_sec(front_half),
                turn(kink_radius_ft, 20.0, banking_kink),
            ],
        }
    }

    /// paperclip builds a long-and-narrow loop: two long straights joined by two tight,
    /// nearly flat 180-degree turns.
    pub fn paperclip(
        name: &str,
        length_miles: f64,
        radius_ft: f64,
        banking_turn: (f64, f64),
        v_top_mph: f64,
        grip: f64,
        width_ft: f64,
    ) -> TrackPars {
        let mut pars = TrackPars::oval(
            name,
            length_miles,
            radius_ft,
            banking_turn,
            (0.0, 1.0),
            v_top_mph,
            grip,
            width_ft,
        );
        pars.class = Some(TrackClass::ShortTrack);
        pars
    }

    /// bristol is the canonical high-banked half-mile short track.
    pub fn bristol() -> TrackPars {
        TrackPars::oval("Bristol", 0.533, 250.0, (24.0, 28.0), (4.0, 8.0), 128.0, 1.0, 40.0)
    }

    /// charlotte is the canonical 1.5-mile intermediate.
    pub fn charlotte() -> TrackPars {
        TrackPars::oval(
            "Charlotte",
            1.5,
            700.0,
            (22.0, 26.0),
            (3.0, 5.0),
            185.0,
            1.0,
            60.0,
        )
    }

    /// daytona is the canonical 2.5-mile superspeedway.
    pub fn daytona() -> TrackPars {
        TrackPars::tri_oval(
            "Daytona",
            2.5,
            1000.0,
            2000.0,
            (29.0, 33.0),
            (16.0, 19.0),
            197.0,
            1.0,
            75.0,
        )
    }

    /// martinsville is the canonical flat paperclip.
    pub fn martinsville() -> TrackPars {
        TrackPars::paperclip("Martinsville", 0.526, 190.0, (10.0, 12.0), 115.0, 1.0, 45.0)
    }
}
