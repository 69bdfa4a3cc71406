use std::{fmt, io, path::PathBuf, result};

use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

/// Width and height of an image, displayed as `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions(pub u32, pub u32);

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

/// Broad classification used to pick the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Validation,
    Output,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input file {} not found.", .0.display())]
    InputNotFound(PathBuf),
    #[error("Could not read {}: {source}", .path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Unsupported input image format: {}", .0.display())]
    UnsupportedInput(PathBuf),
    #[error("No image files found in {}.", .0.display())]
    NoFrames(PathBuf),
    #[error(
        "Frame {index} ({}) is {found}, expected {expected} like the first frame.",
        .path.display()
    )]
    FrameSizeMismatch {
        index: usize,
        path: PathBuf,
        expected: Dimensions,
        found: Dimensions,
    },
    #[error("Invalid color {0:?}: expected three components in 0..=255 or #rrggbb.")]
    InvalidColor(String),
    #[error("Invalid {name} {value}: {reason}.")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("Invalid config file {}: {message}", .path.display())]
    InvalidConfig { path: PathBuf, message: String },
    #[error("Unsupported output image format: {}", .0.display())]
    UnsupportedOutput(PathBuf),
    #[error("Could not write {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[cfg(feature = "solidify")]
    #[error("Could not serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Error {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputNotFound(_)
            | Error::InputRead { .. }
            | Error::Decode { .. }
            | Error::UnsupportedInput(_)
            | Error::NoFrames(_)
            | Error::FrameSizeMismatch { .. } => ErrorKind::Input,
            Error::InvalidColor(_)
            | Error::InvalidParameter { .. }
            | Error::InvalidConfig { .. } => ErrorKind::Validation,
            Error::UnsupportedOutput(_) | Error::OutputWrite { .. } | Error::Encode { .. } => {
                ErrorKind::Output
            }
            #[cfg(feature = "solidify")]
            Error::Report(_) => ErrorKind::Output,
        }
    }

    /// sysexits-style status: EX_USAGE, EX_NOINPUT, EX_CANTCREAT.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Validation => 64,
            ErrorKind::Input => 66,
            ErrorKind::Output => 73,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_exit_codes() {
        let input = Error::NoFrames(PathBuf::from("frames"));
        let validation = Error::invalid("tolerance", -1, "must not be negative");
        let output = Error::UnsupportedOutput(PathBuf::from("out.xyz"));

        assert_eq!(input.kind(), ErrorKind::Input);
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(output.kind(), ErrorKind::Output);
        assert_eq!(input.exit_code(), 66);
        assert_eq!(validation.exit_code(), 64);
        assert_eq!(output.exit_code(), 73);
    }

    #[test]
    fn mismatch_message_names_both_sizes() {
        let err = Error::FrameSizeMismatch {
            index: 2,
            path: PathBuf::from("b.png"),
            expected: Dimensions(16, 16),
            found: Dimensions(8, 16),
        };
        assert_eq!(
            err.to_string(),
            "Frame 2 (b.png) is 8x16, expected 16x16 like the first frame."
        );
    }
}
