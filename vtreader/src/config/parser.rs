//! INI parsing logic for converting `Ini` into `ConfigFile`.

use ini::Ini;
use std::path::PathBuf;

use super::file::{ConfigFile, ConfigFileError};

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = section.get("page_size") {
            config.source.page_size = v
                .trim()
                .parse()
                .ok()
                .filter(|n: &usize| *n >= 1)
                .ok_or_else(|| invalid("source", "page_size", v, "must be a positive integer"))?;
        }
        if let Some(v) = section.get("max_tiles") {
            let v = v.trim();
            if !v.is_empty() {
                config.source.max_tiles = Some(v.parse().map_err(|_| {
                    invalid("source", "max_tiles", v, "must be a non-negative integer")
                })?);
            }
        }
        if let Some(v) = section.get("timeout") {
            config.source.timeout = v
                .trim()
                .parse()
                .ok()
                .filter(|n: &u64| *n >= 1)
                .ok_or_else(|| {
                    invalid("source", "timeout", v, "must be a positive integer (seconds)")
                })?;
        }
    }

    // [codec] section
    if let Some(section) = ini.section(Some("codec")) {
        if let Some(v) = section.get("y_axis") {
            config.codec.y_axis = v
                .parse()
                .map_err(|_| invalid("codec", "y_axis", v, "must be 'up' or 'down'"))?;
        }
    }

    // [reproject] section
    if let Some(section) = ini.section(Some("reproject")) {
        if let Some(v) = section.get("extent") {
            config.reproject.extent = v
                .trim()
                .parse()
                .ok()
                .filter(|n: &u32| *n >= 1)
                .ok_or_else(|| invalid("reproject", "extent", v, "must be a positive integer"))?;
        }
        if let Some(v) = section.get("precision") {
            config.reproject.precision = v.parse().map_err(|_| {
                invalid(
                    "reproject",
                    "precision",
                    v,
                    "must be one of: truncate, round, exact",
                )
            })?;
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.output.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::YAxis;
    use crate::coord::CoordinatePrecision;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.source.page_size, 5);
        assert_eq!(config.source.max_tiles, None);
        assert_eq!(config.source.timeout, 30);
        assert_eq!(config.codec.y_axis, YAxis::Up);
        assert_eq!(config.reproject.extent, 4096);
        assert_eq!(config.reproject.precision, CoordinatePrecision::Truncate);
    }

    #[test]
    fn test_all_sections() {
        let config = parse(
            "[source]\npage_size = 8\nmax_tiles = 100\ntimeout = 10\n\
             [codec]\ny_axis = down\n\
             [reproject]\nextent = 512\nprecision = exact\n\
             [output]\ndirectory = /tmp/out\n\
             [logging]\nfile = /tmp/vt.log\n",
        )
        .unwrap();

        assert_eq!(config.source.page_size, 8);
        assert_eq!(config.source.max_tiles, Some(100));
        assert_eq!(config.source.timeout, 10);
        assert_eq!(config.codec.y_axis, YAxis::Down);
        assert_eq!(config.reproject.extent, 512);
        assert_eq!(config.reproject.precision, CoordinatePrecision::Exact);
        assert_eq!(config.output.directory, PathBuf::from("/tmp/out"));
        assert_eq!(config.logging.file, PathBuf::from("/tmp/vt.log"));
    }

    #[test]
    fn test_empty_max_tiles_means_unlimited() {
        let config = parse("[source]\nmax_tiles =\n").unwrap();
        assert_eq!(config.source.max_tiles, None);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = parse("[source]\npage_size = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref section, ref key, .. }
                if section == "source" && key == "page_size"
        ));
    }

    #[test]
    fn test_invalid_precision_rejected() {
        let err = parse("[reproject]\nprecision = fuzzy\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: reproject.precision = 'fuzzy' - \
             must be one of: truncate, round, exact"
        );
    }

    #[test]
    fn test_invalid_y_axis_rejected() {
        assert!(parse("[codec]\ny_axis = sideways\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
