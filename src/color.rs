use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorValue", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    /// Range-checked construction from wide integers, as they come off the command line.
    pub fn from_components(r: i64, g: i64, b: i64) -> Result<Rgb> {
        let channel = |value: i64| {
            u8::try_from(value).map_err(|_| Error::InvalidColor(format!("{r} {g} {b}")))
        };
        Ok(Rgb::new(channel(r)?, channel(g)?, channel(b)?))
    }

    pub fn from_slice(px: &[u8]) -> Rgb {
        Rgb::new(px[0], px[1], px[2])
    }

    pub fn into_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(color: Rgb) -> [u8; 3] {
        color.into_array()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Accepts `#rrggbb`, `R,G,B` or `R G B`.
    fn from_str(s: &str) -> Result<Rgb> {
        let text = s.trim();
        if let Some(hex) = text.strip_prefix('#') {
            let mut bytes = [0u8; 3];
            if hex::decode_to_slice(hex, &mut bytes).is_err() {
                return Err(Error::InvalidColor(s.to_owned()));
            }
            return Ok(Rgb::new(bytes[0], bytes[1], bytes[2]));
        }

        let parts = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidColor(s.to_owned()))?;
        match parts[..] {
            [r, g, b] => Rgb::from_components(r, g, b),
            _ => Err(Error::InvalidColor(s.to_owned())),
        }
    }
}

/// Color as written in a config file: `[r, g, b]` or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Components([i64; 3]),
    Text(String),
}

impl TryFrom<ColorValue> for Rgb {
    type Error = Error;

    fn try_from(value: ColorValue) -> Result<Rgb> {
        match value {
            ColorValue::Components([r, g, b]) => Rgb::from_components(r, g, b),
            ColorValue::Text(text) => text.parse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Straight-line distance in RGB space.
    #[default]
    Euclidean,
    /// Euclidean distance weighted by the mean red level of both colors.
    Redmean,
    /// Largest single-channel difference.
    Chebyshev,
}

impl DistanceMetric {
    pub fn distance(self, a: Rgb, b: Rgb) -> f64 {
        let (dr, dg, db) = deltas(a, b);
        match self {
            DistanceMetric::Euclidean => ((dr * dr + dg * dg + db * db) as f64).sqrt(),
            DistanceMetric::Redmean => {
                let rmean = (a.r as f64 + b.r as f64) / 2.0;
                let (dr, dg, db) = (dr as f64, dg as f64, db as f64);
                ((2.0 + rmean / 256.0) * dr * dr
                    + 4.0 * dg * dg
                    + (2.0 + (255.0 - rmean) / 256.0) * db * db)
                    .sqrt()
            }
            DistanceMetric::Chebyshev => dr.abs().max(dg.abs()).max(db.abs()) as f64,
        }
    }

    /// True when `a` and `b` are at most `tolerance` apart.
    pub fn within(self, a: Rgb, b: Rgb, tolerance: u32) -> bool {
        let (dr, dg, db) = deltas(a, b);
        match self {
            // Squared comparison keeps the boundary exact.
            DistanceMetric::Euclidean => {
                ((dr * dr + dg * dg + db * db) as u64) <= (tolerance as u64).pow(2)
            }
            DistanceMetric::Chebyshev => {
                dr.unsigned_abs().max(dg.unsigned_abs()).max(db.unsigned_abs()) <= tolerance
            }
            DistanceMetric::Redmean => self.distance(a, b) <= tolerance as f64,
        }
    }
}

fn deltas(a: Rgb, b: Rgb) -> (i32, i32, i32) {
    (
        a.r as i32 - b.r as i32,
        a.g as i32 - b.g as i32,
        a.b as i32 - b.b as i32,
    )
}

/// A target color plus the tolerance a pixel may stray from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub target: Rgb,
    pub tolerance: u32,
    pub metric: DistanceMetric,
}

impl Marker {
    pub fn new(target: Rgb, tolerance: u32) -> Marker {
        Marker {
            target,
            tolerance,
            metric: DistanceMetric::default(),
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Marker {
        self.metric = metric;
        self
    }

    pub fn matches(&self, color: Rgb) -> bool {
        self.metric.within(color, self.target, self.tolerance)
    }
}

/// Decides which pixels count as collision markers. Alpha is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classifier {
    Marker(Marker),
    /// Any shade of pink: red and blue both strong and dominant over green,
    /// with their difference bounded by five times the tolerance.
    PinkHeuristic { tolerance: u32 },
}

impl Classifier {
    pub fn is_marked(&self, color: Rgb) -> bool {
        match self {
            Classifier::Marker(marker) => marker.matches(color),
            Classifier::PinkHeuristic { tolerance } => {
                let (r, g, b) = (color.r as u32, color.g as u32, color.b as u32);
                r > 60
                    && b > 60
                    && r > g
                    && b > g
                    // (r + b) > 1.2 * g
                    && 5 * (r + b) > 6 * g
                    && (r.abs_diff(b) as u64) <= (*tolerance as u64) * 5
            }
        }
    }

    pub fn is_marked_px(&self, px: &[u8]) -> bool {
        self.is_marked(Rgb::from_slice(px))
    }
}

impl From<Marker> for Classifier {
    fn from(marker: Marker) -> Classifier {
        Classifier::Marker(marker)
    }
}
