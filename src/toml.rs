//! Optional TOML config file holding per-tool default overrides.
//!
//! ```toml
//! [solidify]
//! marker = [234, 0, 249]
//! fill = "#ffffff"
//! tolerance = 80
//! min_pixels = 50
//! connectivity = "eight"
//!
//! [gif]
//! duration_ms = 120
//! loop_count = 0
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    #[cfg(feature = "solidify")]
    pub solidify: crate::config::SolidifySettings,
    #[cfg(feature = "animate")]
    pub gif: crate::config::AnimationSettings,
}

impl ConfigFile {
    pub fn parse(path: &Path, text: &str) -> Result<ConfigFile> {
        toml_dep::from_str(text).map_err(|err| Error::InvalidConfig {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }
}

pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_owned()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| Error::InputRead {
        path: path.to_owned(),
        source,
    })?;
    ConfigFile::parse(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_no_overrides() {
        let config = ConfigFile::parse(Path::new("empty.toml"), "").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[cfg(all(feature = "solidify", feature = "animate"))]
    #[test]
    fn reads_both_sections() {
        use crate::{color::Rgb, labeling::Connectivity};

        let config = ConfigFile::parse(
            Path::new("tools.toml"),
            r##"
                [solidify]
                marker = [234, 0, 249]
                fill = "#000000"
                tolerance = 80
                connectivity = "eight"

                [gif]
                duration_ms = 120
                extensions = ["png"]
            "##,
        )
        .unwrap();
        assert_eq!(config.solidify.marker, Some(Rgb::new(234, 0, 249)));
        assert_eq!(config.solidify.fill, Some(Rgb::BLACK));
        assert_eq!(config.solidify.tolerance, Some(80));
        assert_eq!(config.solidify.connectivity, Some(Connectivity::Eight));
        assert_eq!(config.solidify.min_pixels, None);
        assert_eq!(config.gif.duration_ms, Some(120));
        assert_eq!(config.gif.extensions, Some(vec!["png".to_owned()]));
    }

    #[cfg(feature = "solidify")]
    #[test]
    fn bad_values_are_validation_errors() {
        for text in [
            "[solidify]\nfill = [256, 0, 0]\n",
            "[solidify]\nunknown = 1\n",
            "[nonsense]\n",
            "not toml at all",
        ] {
            let err = ConfigFile::parse(Path::new("bad.toml"), text).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig { .. }), "{text}: {err}");
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        }
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = read_config_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }
}
