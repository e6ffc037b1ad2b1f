//! Resource location resolution
//!
//! Schema locations are resolved against the location of the document that
//! references them and canonicalized, so that two spellings of the same
//! document ("a/../b.xsd" and "b.xsd") share one download-table key.

use crate::error::Result;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Resource location - either a URL or a file system path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File system path (absolute or relative to the working directory)
    Path(PathBuf),
    /// URL (file, http, https, urn, ...)
    Url(Url),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            // single letter schemes are Windows drive letters, not URLs
            if url.scheme().len() > 1 {
                return Ok(Location::Url(url));
            }
        }
        Ok(Location::Path(normalize_path(Path::new(s))))
    }

    /// Resolve `relative` against this location
    pub fn join(&self, relative: &str) -> Result<Location> {
        if let Ok(url) = Url::parse(relative) {
            if url.scheme().len() > 1 {
                return Ok(Location::Url(url));
            }
        }
        match self {
            Location::Url(base) => Ok(Location::Url(base.join(relative)?)),
            Location::Path(base) => {
                let relative_path = Path::new(relative);
                if relative_path.is_absolute() {
                    return Ok(Location::Path(normalize_path(relative_path)));
                }
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(normalize_path(&dir.join(relative_path))))
            }
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().replace('\\', "/"),
            Location::Url(u) => u.to_string(),
        }
    }

    /// Check if this is a remote location (a URL with a non-file scheme)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(u) if u.scheme() != "file")
    }

    /// Local file system path, if this location has one
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match self {
            Location::Path(p) => Some(p.clone()),
            Location::Url(u) if u.scheme() == "file" => u.to_file_path().ok(),
            Location::Url(_) => None,
        }
    }
}

/// Resolve `relative` against an optional base location and return the
/// canonical string form used as a cache key
pub fn resolve_location(base: Option<&str>, relative: &str) -> Result<String> {
    let resolved = match base {
        Some(base) => Location::parse(base)?.join(relative)?,
        None => Location::parse(relative)?,
    };
    Ok(resolved.as_str())
}

/// Fold `.` and `..` components without touching the file system
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::parse("http://example.com/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::parse("/tmp/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Path(_)));
        assert!(!loc.is_remote());
        assert_eq!(loc.to_file_path(), Some(PathBuf::from("/tmp/schema.xsd")));
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_location(Some("schemas/main.xsd"), "types.xsd").unwrap(),
            "schemas/types.xsd"
        );
        assert_eq!(
            resolve_location(Some("schemas/sub/main.xsd"), "../common/./types.xsd").unwrap(),
            "schemas/common/types.xsd"
        );
        assert_eq!(resolve_location(Some("main.xsd"), "types.xsd").unwrap(), "types.xsd");
        assert_eq!(resolve_location(None, "a/../b.xsd").unwrap(), "b.xsd");
    }

    #[test]
    fn test_resolve_against_url() {
        assert_eq!(
            resolve_location(Some("http://example.com/xsd/main.xsd"), "../common.xsd").unwrap(),
            "http://example.com/common.xsd"
        );
        assert_eq!(
            resolve_location(Some("main.xsd"), "http://example.com/a.xsd").unwrap(),
            "http://example.com/a.xsd"
        );
    }

    #[test]
    fn test_leading_parent_dirs_are_kept() {
        assert_eq!(resolve_location(Some("main.xsd"), "../x.xsd").unwrap(), "../x.xsd");
    }
}
