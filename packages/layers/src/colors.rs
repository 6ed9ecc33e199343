//! Named color ramps and the flow map color sets derived from them.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// An 8-bit RGBA color, the layout the line and circle color buffers use.
pub type Rgba = [u8; 4];

type Rgb = [u8; 3];

const LIGHT_BACKGROUND: Rgb = [255, 255, 255];
const DARK_BACKGROUND: Rgb = [26, 26, 26];

/// Every key accepted as a color scheme name.
pub const COLOR_SCHEME_KEYS: &[&str] = &[
    "Default", "Blues", "Burg", "DarkMint", "Emrld", "Greens", "Greys", "Magenta", "Oranges",
    "PuRd", "Purples", "Reds", "Teal", "YlGnBu", "YlOrRd",
];

/// Sequential color schemes, named by their key.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    AsRefStr,
)]
pub enum ColorScheme {
    #[default]
    Default,
    Blues,
    Burg,
    DarkMint,
    Emrld,
    Greens,
    Greys,
    Magenta,
    Oranges,
    PuRd,
    Purples,
    Reds,
    Teal,
    YlGnBu,
    YlOrRd,
}

impl ColorScheme {
    /// Looks up a scheme by key, falling back to [`ColorScheme::Default`]
    /// for absent or unknown keys.
    #[must_use]
    pub fn from_key(key: Option<&str>) -> Self {
        match key {
            None => Self::Default,
            Some(key) => key.parse().unwrap_or_else(|_| {
                log::warn!("Unknown color scheme {key:?}, using the default scheme");
                Self::Default
            }),
        }
    }

    /// Whether `key` names a known scheme.
    #[must_use]
    pub fn is_known_key(key: &str) -> bool {
        Self::iter().any(|s| s.as_ref() == key)
    }

    /// Ramp stops from weakest to strongest, as drawn on a light map.
    #[must_use]
    const fn stops(self) -> &'static [Rgb] {
        match self {
            Self::Default | Self::Teal => &[
                [0xd1, 0xee, 0xea],
                [0xa8, 0xdb, 0xd9],
                [0x85, 0xc4, 0xc9],
                [0x68, 0xab, 0xb8],
                [0x4f, 0x90, 0xa6],
                [0x3b, 0x73, 0x8f],
                [0x2a, 0x56, 0x74],
            ],
            Self::Blues => &[
                [0xf7, 0xfb, 0xff],
                [0xde, 0xeb, 0xf7],
                [0xc6, 0xdb, 0xef],
                [0x9e, 0xca, 0xe1],
                [0x6b, 0xae, 0xd6],
                [0x42, 0x92, 0xc6],
                [0x21, 0x71, 0xb5],
                [0x08, 0x51, 0x9c],
                [0x08, 0x30, 0x6b],
            ],
            Self::Burg => &[
                [0xff, 0xc6, 0xc4],
                [0xf4, 0xa3, 0xa8],
                [0xe3, 0x81, 0x91],
                [0xcc, 0x60, 0x7d],
                [0xad, 0x46, 0x6c],
                [0x8b, 0x30, 0x58],
                [0x67, 0x20, 0x44],
            ],
            Self::DarkMint => &[
                [0xd2, 0xfb, 0xd4],
                [0xa5, 0xdb, 0xc2],
                [0x7b, 0xbc, 0xb0],
                [0x55, 0x9c, 0x9e],
                [0x3a, 0x7c, 0x89],
                [0x23, 0x5d, 0x72],
                [0x12, 0x3f, 0x5a],
            ],
            Self::Emrld => &[
                [0xd3, 0xf2, 0xa3],
                [0x97, 0xe1, 0x96],
                [0x6c, 0xc0, 0x8b],
                [0x4c, 0x9b, 0x82],
                [0x21, 0x7a, 0x79],
                [0x10, 0x59, 0x65],
                [0x07, 0x40, 0x50],
            ],
            Self::Greens => &[
                [0xf7, 0xfc, 0xf5],
                [0xe5, 0xf5, 0xe0],
                [0xc7, 0xe9, 0xc0],
                [0xa1, 0xd9, 0x9b],
                [0x74, 0xc4, 0x76],
                [0x41, 0xab, 0x5d],
                [0x23, 0x8b, 0x45],
                [0x00, 0x6d, 0x2c],
                [0x00, 0x44, 0x1b],
            ],
            Self::Greys => &[
                [0xff, 0xff, 0xff],
                [0xf0, 0xf0, 0xf0],
                [0xd9, 0xd9, 0xd9],
                [0xbd, 0xbd, 0xbd],
                [0x96, 0x96, 0x96],
                [0x73, 0x73, 0x73],
                [0x52, 0x52, 0x52],
                [0x25, 0x25, 0x25],
                [0x00, 0x00, 0x00],
            ],
            Self::Magenta => &[
                [0xf3, 0xcb, 0xd3],
                [0xea, 0xa9, 0xbd],
                [0xdd, 0x88, 0xac],
                [0xca, 0x69, 0x9d],
                [0xb1, 0x4d, 0x8e],
                [0x91, 0x35, 0x7d],
                [0x6c, 0x21, 0x67],
            ],
            Self::Oranges => &[
                [0xff, 0xf5, 0xeb],
                [0xfe, 0xe6, 0xce],
                [0xfd, 0xd0, 0xa2],
                [0xfd, 0xae, 0x6b],
                [0xfd, 0x8d, 0x3c],
                [0xf1, 0x69, 0x13],
                [0xd9, 0x48, 0x01],
                [0xa6, 0x36, 0x03],
                [0x7f, 0x27, 0x04],
            ],
            Self::PuRd => &[
                [0xf7, 0xf4, 0xf9],
                [0xe7, 0xe1, 0xef],
                [0xd4, 0xb9, 0xda],
                [0xc9, 0x94, 0xc7],
                [0xdf, 0x65, 0xb0],
                [0xe7, 0x29, 0x8a],
                [0xce, 0x12, 0x56],
                [0x98, 0x00, 0x43],
                [0x67, 0x00, 0x1f],
            ],
            Self::Purples => &[
                [0xfc, 0xfb, 0xfd],
                [0xef, 0xed, 0xf5],
                [0xda, 0xda, 0xeb],
                [0xbc, 0xbd, 0xdc],
                [0x9e, 0x9a, 0xc8],
                [0x80, 0x7d, 0xba],
                [0x6a, 0x51, 0xa3],
                [0x54, 0x27, 0x8f],
                [0x3f, 0x00, 0x7d],
            ],
            Self::Reds => &[
                [0xff, 0xf5, 0xf0],
                [0xfe, 0xe0, 0xd2],
                [0xfc, 0xbb, 0xa1],
                [0xfc, 0x92, 0x72],
                [0xfb, 0x6a, 0x4a],
                [0xef, 0x3b, 0x2c],
                [0xcb, 0x18, 0x1d],
                [0xa5, 0x0f, 0x15],
                [0x67, 0x00, 0x0d],
            ],
            Self::YlGnBu => &[
                [0xff, 0xff, 0xd9],
                [0xed, 0xf8, 0xb1],
                [0xc7, 0xe9, 0xb4],
                [0x7f, 0xcd, 0xbb],
                [0x41, 0xb6, 0xc4],
                [0x1d, 0x91, 0xc0],
                [0x22, 0x5e, 0xa8],
                [0x25, 0x34, 0x94],
                [0x08, 0x1d, 0x58],
            ],
            Self::YlOrRd => &[
                [0xff, 0xff, 0xcc],
                [0xff, 0xed, 0xa0],
                [0xfe, 0xd9, 0x76],
                [0xfe, 0xb2, 0x4c],
                [0xfd, 0x8d, 0x3c],
                [0xfc, 0x4e, 0x2a],
                [0xe3, 0x1a, 0x1c],
                [0xbd, 0x00, 0x26],
                [0x80, 0x00, 0x26],
            ],
        }
    }
}

const DIFF_POSITIVE_STOPS: &[Rgb] = &[[0xfe, 0xe0, 0xd2], [0xfc, 0x92, 0x72], [0xde, 0x2d, 0x26]];
const DIFF_NEGATIVE_STOPS: &[Rgb] = &[[0xde, 0xeb, 0xf7], [0x9e, 0xca, 0xe1], [0x31, 0x82, 0xbd]];

/// A piecewise-linear ramp over evenly spaced RGBA stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: Vec<Rgba>,
}

impl ColorRamp {
    /// Builds a ramp from opaque RGB stops. An empty slice yields a single
    /// opaque black stop.
    #[must_use]
    pub fn from_rgb(stops: &[[u8; 3]]) -> Self {
        let stops = if stops.is_empty() {
            vec![[0, 0, 0, 255]]
        } else {
            stops.iter().map(|&[r, g, b]| [r, g, b, 255]).collect()
        };
        Self { stops }
    }

    /// Color at `t` in `[0, 1]`. Out-of-range and NaN inputs are clamped to
    /// the nearest end.
    #[must_use]
    pub fn at(&self, t: f64) -> Rgba {
        let last = self.stops.len() - 1;
        if last == 0 {
            return self.stops[0];
        }
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        #[allow(clippy::cast_precision_loss)]
        let pos = t * last as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let i = (pos.floor() as usize).min(last - 1);
        #[allow(clippy::cast_precision_loss)]
        let frac = pos - i as f64;

        lerp_rgba(self.stops[i], self.stops[i + 1], frac)
    }

    fn reversed(mut self) -> Self {
        self.stops.reverse();
        self
    }

    /// Blends the weak end of the ramp toward `background`, by `amount` at
    /// the first stop and not at all at the last.
    fn faded(mut self, background: Rgb, amount: f64) -> Self {
        let last = self.stops.len().saturating_sub(1).max(1);
        let [r, g, b] = background;
        for (i, stop) in self.stops.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let weight = amount * (1.0 - i as f64 / last as f64);
            *stop = lerp_rgba(*stop, [r, g, b, 255], weight);
        }
        self
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp_rgba(a: Rgba, b: Rgba, t: f64) -> Rgba {
    let mut out = [0; 4];
    for (o, (&x, &y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        let v = f64::from(x) + (f64::from(y) - f64::from(x)) * t;
        *o = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Colors for the three location circle roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCircleColors {
    /// Circle fill for locations that mostly receive.
    pub incoming: Rgba,
    /// Circle fill for locations that mostly send.
    pub outgoing: Rgba,
    /// Circle fill for balanced locations.
    pub inner: Rgba,
}

/// A flow ramp plus the matching location circle colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowColors {
    pub flows: ColorRamp,
    pub location_circles: LocationCircleColors,
}

impl FlowColors {
    fn from_ramp(flows: ColorRamp) -> Self {
        let location_circles = LocationCircleColors {
            incoming: flows.at(1.0),
            outgoing: flows.at(0.5),
            inner: flows.at(0.75),
        };
        Self {
            flows,
            location_circles,
        }
    }
}

/// Display settings that determine the color set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSettings<'a> {
    pub scheme_key: Option<&'a str>,
    pub dark_mode: bool,
    pub fade_enabled: bool,
    /// Fade strength, `0..=100`.
    pub fade_amount: f64,
    /// Signed counts: use a diverging positive/negative pair of ramps.
    pub diff_mode: bool,
}

impl Default for ColorSettings<'_> {
    fn default() -> Self {
        Self {
            scheme_key: None,
            dark_mode: true,
            fade_enabled: true,
            fade_amount: 50.0,
            diff_mode: false,
        }
    }
}

/// Either a single sequential color set or a diverging pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowMapColors {
    Normal(FlowColors),
    Diff {
        positive: FlowColors,
        negative: FlowColors,
    },
}

impl FlowMapColors {
    #[must_use]
    pub fn new(settings: &ColorSettings<'_>) -> Self {
        let build = |stops: &[Rgb]| {
            let mut ramp = ColorRamp::from_rgb(stops);
            let background = if settings.dark_mode {
                ramp = ramp.reversed();
                DARK_BACKGROUND
            } else {
                LIGHT_BACKGROUND
            };
            if settings.fade_enabled {
                ramp = ramp.faded(background, settings.fade_amount.clamp(0.0, 100.0) / 100.0);
            }
            FlowColors::from_ramp(ramp)
        };

        if settings.diff_mode {
            Self::Diff {
                positive: build(DIFF_POSITIVE_STOPS),
                negative: build(DIFF_NEGATIVE_STOPS),
            }
        } else {
            Self::Normal(build(ColorScheme::from_key(settings.scheme_key).stops()))
        }
    }

    #[must_use]
    pub const fn is_diff(&self) -> bool {
        matches!(self, Self::Diff { .. })
    }

    /// Circle colors used for all locations: the positive set in diff mode.
    #[must_use]
    pub const fn location_circles(&self) -> &LocationCircleColors {
        match self {
            Self::Normal(colors) | Self::Diff { positive: colors, .. } => &colors.location_circles,
        }
    }
}

impl Default for FlowMapColors {
    fn default() -> Self {
        Self::new(&ColorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_scheme_variants() {
        let variants: Vec<String> = ColorScheme::iter().map(|s| s.to_string()).collect();
        assert_eq!(variants, COLOR_SCHEME_KEYS);
        assert!(ColorScheme::is_known_key("Blues"));
        assert!(!ColorScheme::is_known_key("blues"));
    }

    #[test]
    fn unknown_key_falls_back_to_default() {
        assert_eq!(ColorScheme::from_key(Some("Rainbow")), ColorScheme::Default);
        assert_eq!(ColorScheme::from_key(None), ColorScheme::Default);
        assert_eq!(ColorScheme::from_key(Some("Reds")), ColorScheme::Reds);
    }

    #[test]
    fn ramp_interpolates_between_stops() {
        let ramp = ColorRamp::from_rgb(&[[0, 0, 0], [200, 100, 50]]);
        assert_eq!(ramp.at(0.0), [0, 0, 0, 255]);
        assert_eq!(ramp.at(1.0), [200, 100, 50, 255]);
        assert_eq!(ramp.at(0.5), [100, 50, 25, 255]);
        assert_eq!(ramp.at(7.0), [200, 100, 50, 255]);
        assert_eq!(ramp.at(f64::NAN), [0, 0, 0, 255]);
    }

    #[test]
    fn light_mode_without_fade_keeps_scheme_ends() {
        let colors = FlowMapColors::new(&ColorSettings {
            scheme_key: Some("Blues"),
            dark_mode: false,
            fade_enabled: false,
            ..ColorSettings::default()
        });
        let FlowMapColors::Normal(colors) = colors else {
            panic!("expected normal colors");
        };
        assert_eq!(colors.flows.at(0.0), [0xf7, 0xfb, 0xff, 255]);
        assert_eq!(colors.location_circles.incoming, [0x08, 0x30, 0x6b, 255]);
    }

    #[test]
    fn dark_mode_reverses_the_ramp() {
        let colors = FlowMapColors::new(&ColorSettings {
            scheme_key: Some("Blues"),
            dark_mode: true,
            fade_enabled: false,
            ..ColorSettings::default()
        });
        assert_eq!(colors.location_circles().incoming, [0xf7, 0xfb, 0xff, 255]);
    }

    #[test]
    fn full_fade_turns_weakest_stop_into_background() {
        let colors = FlowMapColors::new(&ColorSettings {
            scheme_key: Some("Reds"),
            dark_mode: false,
            fade_enabled: true,
            fade_amount: 100.0,
            diff_mode: false,
        });
        let FlowMapColors::Normal(colors) = colors else {
            panic!("expected normal colors");
        };
        assert_eq!(colors.flows.at(0.0), [255, 255, 255, 255]);
        assert_eq!(colors.flows.at(1.0), [0x67, 0x00, 0x0d, 255]);
    }

    #[test]
    fn diff_mode_builds_two_ramps() {
        let colors = FlowMapColors::new(&ColorSettings {
            diff_mode: true,
            ..ColorSettings::default()
        });
        assert!(colors.is_diff());
    }
}
