//! Magnitude scales for circle radius, line thickness and line color.
//!
//! Every scale is total: an empty or zero-width domain maps all inputs to
//! the scale's minimum output, and non-finite results are replaced by it.

use flowmap_flow_models::Flow;

use crate::colors::{ColorRamp, FlowMapColors, Rgba};

/// Radius range of location circles, in pixels.
pub const CIRCLE_RADIUS_RANGE: (f64, f64) = (0.0, 15.0);

/// Thickness range of flow lines, in renderer units.
pub const LINE_THICKNESS_RANGE: (f64, f64) = (0.0, 0.5);

/// Square-root scale over `[0, domain_max]`, so circle area is linear in
/// magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqrtScale {
    domain_max: f64,
    range: (f64, f64),
}

impl SqrtScale {
    #[must_use]
    pub const fn new(domain_max: f64, range: (f64, f64)) -> Self {
        Self { domain_max, range }
    }

    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        let (lo, hi) = self.range;
        if !(self.domain_max.is_finite() && self.domain_max > 0.0) {
            return lo;
        }
        let t = value.signum() * value.abs().sqrt() / self.domain_max.sqrt();
        finite_or(lo + t * (hi - lo), lo)
    }
}

/// Linear scale over `[0, domain_max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain_max: f64,
    range: (f64, f64),
}

impl LinearScale {
    #[must_use]
    pub const fn new(domain_max: f64, range: (f64, f64)) -> Self {
        Self { domain_max, range }
    }

    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        let (lo, hi) = self.range;
        if !(self.domain_max.is_finite() && self.domain_max > 0.0) {
            return lo;
        }
        finite_or(lo + value / self.domain_max * (hi - lo), lo)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Maps a flow magnitude to a line color.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowColorScale {
    /// One ramp normalized over `[0, max |magnitude|]`.
    Normal { ramp: ColorRamp, max: f64 },
    /// Positive magnitudes over `[0, max]`, negative over `[min, 0]`.
    Diff {
        positive: ColorRamp,
        negative: ColorRamp,
        min: f64,
        max: f64,
    },
}

impl FlowColorScale {
    /// Builds the color scale for a magnitude extent. `None` (no flows)
    /// behaves as a zero-width extent.
    #[must_use]
    pub fn new(colors: &FlowMapColors, extent: Option<(f64, f64)>) -> Self {
        let (min, max) = extent.unwrap_or((0.0, 0.0));
        match colors {
            FlowMapColors::Normal(c) => Self::Normal {
                ramp: c.flows.clone(),
                max: min.abs().max(max.abs()),
            },
            FlowMapColors::Diff { positive, negative } => Self::Diff {
                positive: positive.flows.clone(),
                negative: negative.flows.clone(),
                min: min.min(0.0),
                max: max.max(0.0),
            },
        }
    }

    #[must_use]
    pub fn color(&self, magnitude: f64) -> Rgba {
        match self {
            Self::Normal { ramp, max } => ramp.at(ratio(magnitude.abs(), *max)),
            Self::Diff {
                positive,
                negative,
                min,
                max,
            } => {
                if magnitude < 0.0 {
                    negative.at(ratio(magnitude, *min))
                } else {
                    positive.at(ratio(magnitude, *max))
                }
            }
        }
    }
}

/// `value / bound`, or `0` when the bound is zero or non-finite.
fn ratio(value: f64, bound: f64) -> f64 {
    if bound == 0.0 || !bound.is_finite() {
        0.0
    } else {
        finite_or(value / bound, 0.0)
    }
}

/// `[min, max]` of flow magnitudes, `None` for an empty set.
#[must_use]
pub fn magnitude_extent(flows: &[Flow]) -> Option<(f64, f64)> {
    flows
        .iter()
        .map(Flow::magnitude)
        .filter(|m| m.is_finite())
        .fold(None, |acc, m| {
            Some(acc.map_or((m, m), |(lo, hi): (f64, f64)| (lo.min(m), hi.max(m))))
        })
}

/// The radius, thickness and color scales used for one layer build.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowScales {
    pub radius: SqrtScale,
    pub thickness: LinearScale,
    pub color: FlowColorScale,
}

impl FlowScales {
    /// `max_abs_total` is the largest per-location max-abs total; the
    /// thickness domain is the largest absolute flow count.
    #[must_use]
    pub fn new(max_abs_total: f64, flows: &[Flow], colors: &FlowMapColors) -> Self {
        let max_count = flows
            .iter()
            .map(|f| f.count.abs())
            .filter(|c| c.is_finite())
            .fold(0.0, f64::max);

        Self {
            radius: SqrtScale::new(max_abs_total, CIRCLE_RADIUS_RANGE),
            thickness: LinearScale::new(max_count, LINE_THICKNESS_RANGE),
            color: FlowColorScale::new(colors, magnitude_extent(flows)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::colors::ColorSettings;

    use super::*;

    const EPS: f64 = 1e-9;

    fn flow(count: f64) -> Flow {
        Flow {
            origin: "A".to_owned(),
            dest: "B".to_owned(),
            count,
            time: None,
        }
    }

    #[test]
    fn sqrt_scale_is_area_linear() {
        let scale = SqrtScale::new(100.0, CIRCLE_RADIUS_RANGE);
        assert!((scale.scale(100.0) - 15.0).abs() < EPS);
        assert!((scale.scale(25.0) - 7.5).abs() < EPS);
        assert!(scale.scale(0.0).abs() < EPS);
    }

    #[test]
    fn degenerate_domains_map_to_minimum_output() {
        assert!(SqrtScale::new(0.0, CIRCLE_RADIUS_RANGE).scale(5.0).abs() < EPS);
        assert!(LinearScale::new(0.0, LINE_THICKNESS_RANGE).scale(5.0).abs() < EPS);
        assert!(LinearScale::new(f64::NAN, LINE_THICKNESS_RANGE).scale(5.0).abs() < EPS);
    }

    #[test]
    fn linear_scale_hits_range_end() {
        let scale = LinearScale::new(8.0, LINE_THICKNESS_RANGE);
        assert!((scale.scale(8.0) - 0.5).abs() < EPS);
        assert!((scale.scale(2.0) - 0.125).abs() < EPS);
    }

    #[test]
    fn empty_flow_set_builds_usable_scales() {
        let scales = FlowScales::new(0.0, &[], &FlowMapColors::default());
        assert!(scales.thickness.scale(1.0).abs() < EPS);
        let FlowColorScale::Normal { ramp, .. } = &scales.color else {
            panic!("expected a normal color scale");
        };
        assert_eq!(scales.color.color(3.0), ramp.at(0.0));
    }

    #[test]
    fn extent_covers_signed_magnitudes() {
        assert_eq!(magnitude_extent(&[]), None);
        assert_eq!(
            magnitude_extent(&[flow(3.0), flow(-2.0), flow(f64::NAN), flow(1.0)]),
            Some((-2.0, 3.0))
        );
    }

    #[test]
    fn diff_scale_picks_ramp_by_sign() {
        let colors = FlowMapColors::new(&ColorSettings {
            diff_mode: true,
            fade_enabled: false,
            ..ColorSettings::default()
        });
        let FlowMapColors::Diff { positive, negative } = &colors else {
            panic!("expected diff colors");
        };
        let scale = FlowColorScale::new(&colors, Some((-4.0, 2.0)));
        assert_eq!(scale.color(2.0), positive.flows.at(1.0));
        assert_eq!(scale.color(-4.0), negative.flows.at(1.0));
        assert_eq!(scale.color(-2.0), negative.flows.at(0.5));
    }
}
