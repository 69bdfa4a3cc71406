//! Sprite-sheet post-processing: collision region solidifying and GIF assembly.

pub mod color;
pub mod config;
pub mod error;
pub mod file;

#[cfg(feature = "animate")]
pub mod animate;
#[cfg(feature = "solidify")]
pub mod labeling;
#[cfg(feature = "log")]
pub mod log;
#[cfg(feature = "solidify")]
pub mod solidify;
#[cfg(feature = "toml")]
pub mod toml;

pub use color::{Classifier, DistanceMetric, Marker, Rgb};
pub use error::{Error, ErrorKind, Result};
