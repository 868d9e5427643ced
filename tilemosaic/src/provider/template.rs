//! Tile source templates.
//!
//! A template is an opaque string carrying the `{x}`, `{y}` and `{z}`
//! placeholders, for example `https://tile.example.org/{z}/{x}/{y}.png` or
//! `file:///data/cache/{z}/{x}/{y}.png`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::coord::TileIndex;

const PLACEHOLDERS: [&str; 3] = ["{x}", "{y}", "{z}"];
const FILE_SCHEME: &str = "file://";

/// Errors raised while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("tile source template is empty")]
    Empty,

    #[error("tile source template '{template}' is missing the {placeholder} placeholder")]
    MissingPlaceholder {
        template: String,
        placeholder: &'static str,
    },

    #[error("unsupported URL scheme in '{0}' (only http and https are fetched remotely)")]
    UnsupportedScheme(String),
}

/// Where rendered templates point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `http://` or `https://` URL, fetched over the network
    Remote,
    /// Filesystem path, used in place
    Local,
}

/// A validated tile source template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    template: String,
    kind: SourceKind,
}

impl TileSource {
    /// Parses and validates a template.
    ///
    /// Anything that is not an http(s) URL is treated as a local path; a
    /// leading `file://` is stripped so `file:///tiles/{z}/{x}/{y}.png`
    /// becomes the absolute path `/tiles/{z}/{x}/{y}.png`.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let trimmed = template.trim();
        if trimmed.is_empty() {
            return Err(TemplateError::Empty);
        }

        for placeholder in PLACEHOLDERS {
            if !trimmed.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder {
                    template: trimmed.to_string(),
                    placeholder,
                });
            }
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self {
                template: trimmed.to_string(),
                kind: SourceKind::Remote,
            });
        }

        if let Some(path) = strip_prefix_ignore_case(trimmed, FILE_SCHEME) {
            return Ok(Self {
                template: path.to_string(),
                kind: SourceKind::Local,
            });
        }

        // Something like ftp://; a single-letter scheme is a Windows drive.
        if let Some((scheme, _)) = trimmed.split_once("://") {
            if scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
                return Err(TemplateError::UnsupportedScheme(trimmed.to_string()));
            }
        }

        Ok(Self {
            template: trimmed.to_string(),
            kind: SourceKind::Local,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_remote(&self) -> bool {
        self.kind == SourceKind::Remote
    }

    /// The template as stored (local templates without `file://`).
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitutes the tile index into every placeholder.
    pub fn render(&self, index: &TileIndex) -> String {
        self.template
            .replace("{x}", &index.x.to_string())
            .replace("{y}", &index.y.to_string())
            .replace("{z}", &index.z.to_string())
    }

    /// Rendered local path. `None` for remote sources.
    pub fn local_path(&self, index: &TileIndex) -> Option<PathBuf> {
        match self.kind {
            SourceKind::Local => Some(PathBuf::from(self.render(index))),
            SourceKind::Remote => None,
        }
    }
}

impl fmt::Display for TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl std::str::FromStr for TileSource {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => s.get(prefix.len()..),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: u32, y: u32, z: u8) -> TileIndex {
        TileIndex::new(x, y, z).unwrap()
    }

    #[test]
    fn test_remote_template_renders_all_placeholders() {
        let source = TileSource::parse("https://tile.example.org/{z}/{x}/{y}.png").unwrap();
        assert_eq!(source.kind(), SourceKind::Remote);
        assert_eq!(
            source.render(&tile(842, 388, 10)),
            "https://tile.example.org/10/842/388.png"
        );
        assert!(source.local_path(&tile(0, 0, 0)).is_none());
    }

    #[test]
    fn test_repeated_placeholders_are_all_replaced() {
        let source = TileSource::parse("http://a/{z}/{x}/{y}?tag={x}-{y}").unwrap();
        assert_eq!(source.render(&tile(1, 2, 3)), "http://a/3/1/2?tag=1-2");
    }

    #[test]
    fn test_file_scheme_is_stripped() {
        let source = TileSource::parse("file:///data/tiles/{z}/{x}/{y}.png").unwrap();
        assert_eq!(source.kind(), SourceKind::Local);
        assert_eq!(source.as_str(), "/data/tiles/{z}/{x}/{y}.png");
        assert_eq!(
            source.local_path(&tile(3, 4, 5)).unwrap(),
            PathBuf::from("/data/tiles/5/3/4.png")
        );
    }

    #[test]
    fn test_plain_path_is_local() {
        let source = TileSource::parse("tiles/{z}_{x}_{y}.jpg").unwrap();
        assert!(!source.is_remote());
        assert_eq!(source.render(&tile(1, 1, 1)), "tiles/1_1_1.jpg");
    }

    #[test]
    fn test_windows_drive_path_is_local() {
        let source = TileSource::parse("C://tiles/{z}/{x}/{y}.png").unwrap();
        assert_eq!(source.kind(), SourceKind::Local);
    }

    #[test]
    fn test_missing_placeholder_is_rejected() {
        let err = TileSource::parse("https://tile.example.org/{z}/{x}.png").unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingPlaceholder {
                template: "https://tile.example.org/{z}/{x}.png".to_string(),
                placeholder: "{y}",
            }
        );
    }

    #[test]
    fn test_empty_and_unsupported_templates() {
        assert_eq!(TileSource::parse("   "), Err(TemplateError::Empty));
        assert!(matches!(
            TileSource::parse("ftp://host/{z}/{x}/{y}.png"),
            Err(TemplateError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_scheme_detection_is_case_insensitive() {
        let source: TileSource = "HTTPS://Tiles.Example.org/{z}/{x}/{y}".parse().unwrap();
        assert!(source.is_remote());
    }
}
