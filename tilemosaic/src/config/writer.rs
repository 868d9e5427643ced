//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let template = config.source.template.as_deref().unwrap_or("");
    let scratch_dir = config
        .output
        .scratch_dir
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let persist_reprojected = if config.boundary.persist_reprojected {
        "true"
    } else {
        "false"
    };

    format!(
        r#"[source]
; Tile source template. Must contain {{x}}, {{y}} and {{z}}.
;   Remote: https://tile.example.org/{{z}}/{{x}}/{{y}}.png
;   Local:  file:///data/tiles/{{z}}/{{x}}/{{y}}.png or /data/tiles/{{z}}/{{x}}/{{y}}.png
template = {}

[download]
; Zoom level of the tile pyramid (0-23)
zoom = {}
; Number of tiles fetched and georeferenced concurrently
concurrency = {}
; Timeout in milliseconds for each HTTP request
request_timeout_ms = {}
; Retry attempts after a failed request (0 disables retries)
max_retries = {}
; Base delay for exponential backoff between retries, in milliseconds
retry_base_delay_ms = {}
; User-Agent header sent to the tile server
user_agent = {}

[output]
; Directory receiving the mosaic (created if missing)
directory = {}
; Mosaic file name
name = {}
; GeoTIFF compression: none, lzw, or deflate
compression = {}
; Parent directory for per-run scratch files (empty = system temp directory)
scratch_dir = {}

[boundary]
; Write the reprojected boundary as <name>.epsg4326.geojson in the output directory
persist_reprojected = {}

[logging]
; Log file path
file = {}
"#,
        template,
        config.download.zoom,
        config.download.concurrency,
        config.download.request_timeout_ms,
        config.download.max_retries,
        config.download.retry_base_delay_ms,
        config.download.user_agent,
        path_to_string(&config.output.directory),
        config.output.name,
        config.output.compression,
        scratch_dir,
        persist_reprojected,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
