//! Maps `[section] key` pairs onto [`ConfigFile`] fields.
//!
//! Unknown keys are ignored; known keys with unusable values are rejected
//! with [`ConfigFileError::InvalidValue`].

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::MAX_CONCURRENCY;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_ZOOM;

/// Overlays the values present in `ini` on the defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = section.get("template") {
            let v = v.trim();
            if !v.is_empty() {
                config.source.template = Some(v.to_string());
            }
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("zoom") {
            let zoom: u8 = parse_number("download", "zoom", v, "must be an integer")?;
            if zoom > MAX_ZOOM {
                return Err(invalid(
                    "download",
                    "zoom",
                    v,
                    &format!("must be between 0 and {}", MAX_ZOOM),
                ));
            }
            config.download.zoom = zoom;
        }
        if let Some(v) = section.get("concurrency") {
            let concurrency: usize =
                parse_number("download", "concurrency", v, "must be a positive integer")?;
            if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                return Err(invalid(
                    "download",
                    "concurrency",
                    v,
                    &format!("must be between 1 and {}", MAX_CONCURRENCY),
                ));
            }
            config.download.concurrency = concurrency;
        }
        if let Some(v) = section.get("request_timeout_ms") {
            let timeout: u64 = parse_number(
                "download",
                "request_timeout_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
            if timeout == 0 {
                return Err(invalid(
                    "download",
                    "request_timeout_ms",
                    v,
                    "must be a positive integer (milliseconds)",
                ));
            }
            config.download.request_timeout_ms = timeout;
        }
        if let Some(v) = section.get("max_retries") {
            config.download.max_retries = parse_number(
                "download",
                "max_retries",
                v,
                "must be a non-negative integer",
            )?;
        }
        if let Some(v) = section.get("retry_base_delay_ms") {
            config.download.retry_base_delay_ms = parse_number(
                "download",
                "retry_base_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.download.user_agent = v.to_string();
            }
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
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if v.contains('/') || v.contains('\\') {
                return Err(invalid(
                    "output",
                    "name",
                    v,
                    "must be a file name, not a path",
                ));
            }
            if !v.is_empty() {
                config.output.name = v.to_string();
            }
        }
        if let Some(v) = section.get("compression") {
            config.output.compression = v.parse().map_err(|_| {
                invalid(
                    "output",
                    "compression",
                    v,
                    "must be 'none', 'lzw', or 'deflate'",
                )
            })?;
        }
        if let Some(v) = section.get("scratch_dir") {
            let v = v.trim();
            if !v.is_empty() {
                config.output.scratch_dir = Some(expand_tilde(v));
            }
        }
    }

    // [boundary] section
    if let Some(section) = ini.section(Some("boundary")) {
        if let Some(v) = section.get("persist_reprojected") {
            config.boundary.persist_reprojected = parse_bool(v);
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

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
