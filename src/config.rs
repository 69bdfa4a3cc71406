//! Typed run configurations.
//!
//! Every tool starts from a `*Settings` value whose fields are all optional.
//! Command-line flags are layered over the config file with [`SolidifySettings::or`]
//! (or its animation twin), and `resolve` then fills the gaps with the
//! built-in defaults and validates everything before a single image is read.

use crate::color::{DistanceMetric, Rgb};
use crate::error::{Error, Result};
use log_dep::warn;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_MARKER: Rgb = Rgb::new(234, 0, 249);
pub const DEFAULT_FILL: Rgb = Rgb::WHITE;
pub const DEFAULT_TOLERANCE: u32 = 100;
pub const DEFAULT_MIN_PIXELS: u64 = 1000;

pub const DEFAULT_DURATION_MS: u32 = 500;
pub const DEFAULT_LOOP_COUNT: u16 = 0;
pub const DEFAULT_MATTE: Rgb = Rgb::WHITE;
pub const DEFAULT_GIF_OUTPUT: &str = "output.gif";
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

/// GIF stores frame delays as a u16 count of hundredths of a second.
pub const MAX_DURATION_MS: u32 = u16::MAX as u32 * 10;

fn non_negative(name: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::invalid(name, value, "must not be negative"))
}

fn bounded<T: TryFrom<u64>>(name: &'static str, value: i64, reason: &'static str) -> Result<T> {
    T::try_from(non_negative(name, value)?).map_err(|_| Error::invalid(name, value, reason))
}

fn positive_size(name: &'static str, [width, height]: [i64; 2]) -> Result<(u32, u32)> {
    let width: u32 = bounded(name, width, "is too large")?;
    let height: u32 = bounded(name, height, "is too large")?;
    if width == 0 || height == 0 {
        return Err(Error::invalid(
            name,
            format!("{width}x{height}"),
            "must be at least 1x1",
        ));
    }
    Ok((width, height))
}

#[cfg(feature = "solidify")]
pub use solidify_config::*;

#[cfg(feature = "solidify")]
mod solidify_config {
    use super::*;
    use crate::color::{Classifier, Marker};
    use crate::labeling::Connectivity;
    use crate::solidify::{Selection, SolidifyOptions};
    use std::path::Path;

    /// Which regions a solidifier run repaints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SolidifyMode {
        /// Only the single largest region.
        Largest,
        /// Every region at or above the minimum pixel threshold.
        Threshold,
    }

    impl SolidifyMode {
        pub fn output_suffix(self) -> &'static str {
            match self {
                SolidifyMode::Largest => "collision",
                SolidifyMode::Threshold => "anti_collision",
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct SolidifySettings {
        pub marker: Option<Rgb>,
        pub fill: Option<Rgb>,
        pub tolerance: Option<i64>,
        pub min_pixels: Option<i64>,
        pub metric: Option<DistanceMetric>,
        pub connectivity: Option<Connectivity>,
        pub pink: Option<bool>,
        pub background: Option<Rgb>,
    }

    impl SolidifySettings {
        /// Field-wise: keep what is set here, take the rest from `fallback`.
        pub fn or(self, fallback: SolidifySettings) -> SolidifySettings {
            SolidifySettings {
                marker: self.marker.or(fallback.marker),
                fill: self.fill.or(fallback.fill),
                tolerance: self.tolerance.or(fallback.tolerance),
                min_pixels: self.min_pixels.or(fallback.min_pixels),
                metric: self.metric.or(fallback.metric),
                connectivity: self.connectivity.or(fallback.connectivity),
                pink: self.pink.or(fallback.pink),
                background: self.background.or(fallback.background),
            }
        }

        pub fn resolve(
            self,
            mode: SolidifyMode,
            input: PathBuf,
            output: Option<PathBuf>,
            report: Option<PathBuf>,
        ) -> Result<SolidifyConfig> {
            let tolerance: u32 = match self.tolerance {
                Some(value) => bounded("tolerance", value, "is too large")?,
                None => DEFAULT_TOLERANCE,
            };
            let min_pixels = match self.min_pixels {
                Some(value) => non_negative("minimum pixel count", value)?,
                None => DEFAULT_MIN_PIXELS,
            };

            let classifier = if self.pink.unwrap_or(false) {
                if self.marker.is_some() || self.metric.is_some() {
                    warn!("Pink detection ignores the marker color and distance metric settings");
                }
                Classifier::PinkHeuristic { tolerance }
            } else {
                Marker::new(self.marker.unwrap_or(DEFAULT_MARKER), tolerance)
                    .with_metric(self.metric.unwrap_or_default())
                    .into()
            };
            let selection = match mode {
                SolidifyMode::Largest => Selection::Largest,
                SolidifyMode::Threshold => Selection::AtLeast(min_pixels),
            };

            let output = match output {
                Some(output) => output,
                None => crate::file::default_output_path(&input, mode.output_suffix()),
            };
            check_distinct(&input, &output)?;
            crate::file::output_format(&output)?;

            Ok(SolidifyConfig {
                input,
                output,
                report,
                options: SolidifyOptions {
                    classifier,
                    connectivity: self.connectivity.unwrap_or_default(),
                    selection,
                    fill: self.fill.unwrap_or(DEFAULT_FILL),
                    background: self.background,
                },
            })
        }
    }

    fn check_distinct(input: &Path, output: &Path) -> Result<()> {
        if input == output {
            return Err(Error::invalid(
                "output path",
                output.display(),
                "must differ from the input path",
            ));
        }
        Ok(())
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct SolidifyConfig {
        pub input: PathBuf,
        pub output: PathBuf,
        /// Where to write the JSON region report, if anywhere.
        pub report: Option<PathBuf>,
        pub options: SolidifyOptions,
    }
}

#[cfg(feature = "animate")]
pub use animate_config::*;

#[cfg(feature = "animate")]
mod animate_config {
    use super::*;
    use crate::animate::{FrameSource, Resize};

    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct AnimationSettings {
        pub duration_ms: Option<i64>,
        pub loop_count: Option<i64>,
        pub extensions: Option<Vec<String>>,
        pub matte: Option<Rgb>,
        pub max_size: Option<[i64; 2]>,
        pub target_size: Option<[i64; 2]>,
    }

    impl AnimationSettings {
        pub fn or(self, fallback: AnimationSettings) -> AnimationSettings {
            AnimationSettings {
                duration_ms: self.duration_ms.or(fallback.duration_ms),
                loop_count: self.loop_count.or(fallback.loop_count),
                extensions: self.extensions.or(fallback.extensions),
                matte: self.matte.or(fallback.matte),
                max_size: self.max_size.or(fallback.max_size),
                target_size: self.target_size.or(fallback.target_size),
            }
        }

        /// `input` is a directory, or a comma-separated list of frame files.
        pub fn resolve(self, input: &str, output: Option<PathBuf>) -> Result<AnimationConfig> {
            let duration_ms = match self.duration_ms {
                Some(value) => gif_delay(value)?,
                None => DEFAULT_DURATION_MS,
            };
            let loop_count = match self.loop_count {
                Some(value) => bounded("loop count", value, "must be at most 65535")?,
                None => DEFAULT_LOOP_COUNT,
            };

            // A size limit takes precedence over an exact size.
            let resize = match (self.max_size, self.target_size) {
                (Some(size), _) => {
                    let (width, height) = positive_size("maximum size", size)?;
                    Some(Resize::Fit { width, height })
                }
                (None, Some(size)) => {
                    let (width, height) = positive_size("target size", size)?;
                    Some(Resize::Exact { width, height })
                }
                (None, None) => None,
            };

            let extensions = match self.extensions {
                Some(extensions) => normalize_extensions(extensions)?,
                None => DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            };

            Ok(AnimationConfig {
                source: FrameSource::parse(input, extensions),
                output: output.unwrap_or_else(|| PathBuf::from(DEFAULT_GIF_OUTPUT)),
                duration_ms,
                loop_count,
                resize,
                matte: self.matte.unwrap_or(DEFAULT_MATTE),
            })
        }
    }

    /// GIF frame delays are whole hundredths of a second. Other durations are
    /// rounded to the nearest hundredth, and never below one.
    fn gif_delay(value: i64) -> Result<u32> {
        let duration: u32 = bounded("duration", value, "is too large")?;
        if duration == 0 {
            return Err(Error::invalid("duration", value, "must be at least 10 ms"));
        }
        if duration > MAX_DURATION_MS {
            return Err(Error::invalid(
                "duration",
                value,
                "exceeds the 655350 ms GIF frame delay limit",
            ));
        }
        let rounded = ((duration + 5) / 10 * 10).clamp(10, MAX_DURATION_MS);
        if rounded != duration {
            warn!("GIF delays are in steps of 10 ms, using {rounded}ms instead of {duration}ms");
        }
        Ok(rounded)
    }

    /// Lowercases and strips the leading dot, so `.PNG` and `png` agree.
    fn normalize_extensions(extensions: Vec<String>) -> Result<Vec<String>> {
        let normalized: Vec<String> = extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if normalized.is_empty() {
            return Err(Error::invalid(
                "extension list",
                extensions.join(" "),
                "must name at least one extension",
            ));
        }
        Ok(normalized)
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct AnimationConfig {
        pub source: FrameSource,
        pub output: PathBuf,
        pub duration_ms: u32,
        /// 0 repeats forever.
        pub loop_count: u16,
        pub resize: Option<Resize>,
        /// Color that partially transparent pixels are flattened onto.
        pub matte: Rgb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "solidify")]
    mod solidify {
        use super::*;
        use crate::color::{Classifier, Marker};
        use crate::labeling::Connectivity;
        use crate::solidify::Selection;

        #[test]
        fn defaults_fill_every_gap() {
            let config = SolidifySettings::default()
                .resolve(
                    SolidifyMode::Threshold,
                    PathBuf::from("assets/map.png"),
                    None,
                    None,
                )
                .unwrap();
            assert_eq!(config.output, PathBuf::from("assets/map_anti_collision.png"));
            assert_eq!(config.options.fill, DEFAULT_FILL);
            assert_eq!(config.options.selection, Selection::AtLeast(DEFAULT_MIN_PIXELS));
            assert_eq!(config.options.connectivity, Connectivity::Four);
            assert_eq!(config.options.background, None);
            assert_eq!(
                config.options.classifier,
                Classifier::Marker(Marker::new(DEFAULT_MARKER, DEFAULT_TOLERANCE))
            );
        }

        #[test]
        fn flags_override_file_values() {
            let file = SolidifySettings {
                tolerance: Some(20),
                min_pixels: Some(50),
                ..Default::default()
            };
            let flags = SolidifySettings {
                tolerance: Some(5),
                ..Default::default()
            };
            let merged = flags.or(file);
            assert_eq!(merged.tolerance, Some(5));
            assert_eq!(merged.min_pixels, Some(50));
        }

        #[test]
        fn negative_values_are_rejected() {
            for settings in [
                SolidifySettings {
                    tolerance: Some(-1),
                    ..Default::default()
                },
                SolidifySettings {
                    min_pixels: Some(-10),
                    ..Default::default()
                },
            ] {
                let err = settings
                    .resolve(SolidifyMode::Threshold, PathBuf::from("a.png"), None, None)
                    .unwrap_err();
                assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
            }
        }

        #[test]
        fn pink_flag_switches_classifier() {
            let config = SolidifySettings {
                pink: Some(true),
                tolerance: Some(30),
                ..Default::default()
            }
            .resolve(SolidifyMode::Largest, PathBuf::from("a.png"), None, None)
            .unwrap();
            assert_eq!(
                config.options.classifier,
                Classifier::PinkHeuristic { tolerance: 30 }
            );
            assert_eq!(config.options.selection, Selection::Largest);
            assert_eq!(config.output, PathBuf::from("a_collision.png"));
        }

        #[test]
        fn pink_wins_over_marker_and_metric() {
            let config = SolidifySettings {
                pink: Some(true),
                marker: Some(Rgb::new(1, 2, 3)),
                metric: Some(DistanceMetric::Chebyshev),
                ..Default::default()
            }
            .resolve(SolidifyMode::Threshold, PathBuf::from("a.png"), None, None)
            .unwrap();
            assert_eq!(
                config.options.classifier,
                Classifier::PinkHeuristic {
                    tolerance: DEFAULT_TOLERANCE
                }
            );
        }

        #[test]
        fn unsupported_output_extension_fails_at_resolve() {
            let err = SolidifySettings::default()
                .resolve(
                    SolidifyMode::Largest,
                    PathBuf::from("missing.png"),
                    Some(PathBuf::from("out.unknown")),
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, Error::UnsupportedOutput(_)));
            assert_eq!(err.exit_code(), 73);

            let config = SolidifySettings::default()
                .resolve(SolidifyMode::Largest, PathBuf::from("map.xcf"), None, None)
                .unwrap();
            assert_eq!(config.output, PathBuf::from("map_collision.png"));
        }

        #[test]
        fn output_may_not_overwrite_input() {
            let err = SolidifySettings::default()
                .resolve(
                    SolidifyMode::Largest,
                    PathBuf::from("a.png"),
                    Some(PathBuf::from("a.png")),
                    None,
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidParameter { .. }));
        }
    }

    #[cfg(feature = "animate")]
    mod animate {
        use super::*;
        use crate::animate::{FrameSource, Resize};

        #[test]
        fn defaults_match_the_cli_contract() {
            let config = AnimationSettings::default().resolve("frames", None).unwrap();
            assert_eq!(config.duration_ms, 500);
            assert_eq!(config.loop_count, 0);
            assert_eq!(config.output, PathBuf::from("output.gif"));
            assert_eq!(config.resize, None);
            assert!(matches!(config.source, FrameSource::Directory { .. }));
        }

        #[test]
        fn comma_separated_input_is_a_file_list() {
            let config = AnimationSettings::default()
                .resolve("b.png, a.png", None)
                .unwrap();
            assert_eq!(
                config.source,
                FrameSource::Files(vec![PathBuf::from("b.png"), PathBuf::from("a.png")])
            );
        }

        #[test]
        fn rejects_negative_and_oversized_timing() {
            for settings in [
                AnimationSettings {
                    duration_ms: Some(-1),
                    ..Default::default()
                },
                AnimationSettings {
                    duration_ms: Some(MAX_DURATION_MS as i64 + 1),
                    ..Default::default()
                },
                AnimationSettings {
                    duration_ms: Some(0),
                    ..Default::default()
                },
                AnimationSettings {
                    loop_count: Some(-3),
                    ..Default::default()
                },
                AnimationSettings {
                    loop_count: Some(70_000),
                    ..Default::default()
                },
                AnimationSettings {
                    target_size: Some([0, 10]),
                    ..Default::default()
                },
            ] {
                let err = settings.resolve("frames", None).unwrap_err();
                assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
            }
        }

        #[test]
        fn durations_round_to_whole_hundredths() {
            for (requested, expected) in [
                (5, 10),
                (1, 10),
                (15, 20),
                (99, 100),
                (120, 120),
                (MAX_DURATION_MS as i64, MAX_DURATION_MS),
            ] {
                let config = AnimationSettings {
                    duration_ms: Some(requested),
                    ..Default::default()
                }
                .resolve("frames", None)
                .unwrap();
                assert_eq!(config.duration_ms, expected, "{requested}ms");
            }
        }

        #[test]
        fn max_size_wins_over_target_size() {
            let config = AnimationSettings {
                max_size: Some([64, 64]),
                target_size: Some([32, 32]),
                ..Default::default()
            }
            .resolve("frames", None)
            .unwrap();
            assert_eq!(
                config.resize,
                Some(Resize::Fit {
                    width: 64,
                    height: 64
                })
            );
        }

        #[test]
        fn extensions_are_normalized() {
            let config = AnimationSettings {
                extensions: Some(vec![".PNG".to_owned(), "Gif".to_owned()]),
                ..Default::default()
            }
            .resolve("frames", None)
            .unwrap();
            match config.source {
                FrameSource::Directory { extensions, .. } => {
                    assert_eq!(extensions, vec!["png".to_owned(), "gif".to_owned()])
                }
                other => panic!("expected a directory source, got {other:?}"),
            }
        }
    }
}
