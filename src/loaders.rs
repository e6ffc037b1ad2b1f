//! Schema document loading
//!
//! The import resolver fetches every referenced document through a
//! [`DocumentLoader`]. Locations handed to a loader are already absolute and
//! canonical (see [`crate::locations::resolve_location`]).

use std::collections::HashMap;
use std::fs;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::{resolve_location, Location};
use crate::parsing::SchemaDocument;

/// Fetches and reads schema documents
pub trait DocumentLoader {
    /// Load the document at `location`, referenced for `namespace`
    fn load(&self, namespace: Option<&str>, location: &str) -> Result<SchemaDocument>;
}

/// Loads schema documents from the local file system
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    limits: Limits,
}

impl FileLoader {
    /// Create a new loader with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Read the text of a local document
    pub fn read(&self, location: &str) -> Result<String> {
        let parsed = Location::parse(location)?;
        if parsed.is_remote() {
            return Err(Error::Resource(format!(
                "remote schema locations are not supported: {}",
                location
            )));
        }
        let path = parsed
            .to_file_path()
            .ok_or_else(|| Error::Resource(format!("'{}' is not a file location", location)))?;
        let metadata = fs::metadata(&path)
            .map_err(|e| Error::Resource(format!("failed to read file '{}': {}", path.display(), e)))?;
        self.limits.check_document_size(metadata.len() as usize)?;

        fs::read_to_string(&path)
            .map_err(|e| Error::Resource(format!("failed to read file '{}': {}", path.display(), e)))
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, _namespace: Option<&str>, location: &str) -> Result<SchemaDocument> {
        let text = self.read(location)?;
        SchemaDocument::parse_str(&text, Some(location))
    }
}

/// Serves schema documents registered in memory, keyed by location
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, String>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the text of a document under a location
    pub fn insert(&mut self, location: &str, text: impl Into<String>) -> Result<()> {
        let key = resolve_location(None, location)?;
        self.documents.insert(key, text.into());
        Ok(())
    }

    /// Builder form of [`MemoryLoader::insert`]
    pub fn with_document(mut self, location: &str, text: impl Into<String>) -> Result<Self> {
        self.insert(location, text)?;
        Ok(self)
    }

    /// Read a registered document, for use as a starting document
    pub fn parse(&self, location: &str) -> Result<SchemaDocument> {
        self.load(None, location)
    }

    /// Number of registered documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, _namespace: Option<&str>, location: &str) -> Result<SchemaDocument> {
        let key = resolve_location(None, location)?;
        let text = self
            .documents
            .get(&key)
            .ok_or_else(|| Error::Resource(format!("no document registered at '{}'", key)))?;
        SchemaDocument::parse_str(text, Some(&key))
    }
}

/// Refuses every fetch; used when downloads are disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoader;

impl DocumentLoader for NoLoader {
    fn load(&self, _namespace: Option<&str>, location: &str) -> Result<SchemaDocument> {
        Err(Error::Resource(format!(
            "downloads are disabled, cannot fetch '{}'",
            location
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EMPTY_SCHEMA: &str =
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t"/>"#;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", EMPTY_SCHEMA).unwrap();

        let location = file.path().to_string_lossy().to_string();
        let schema = FileLoader::new().load(Some("urn:t"), &location).unwrap();

        assert_eq!(schema.target_namespace.as_deref(), Some("urn:t"));
        assert_eq!(schema.location.as_deref(), Some(location.as_str()));
    }

    #[test]
    fn test_missing_file() {
        let err = FileLoader::new().load(None, "/nonexistent/dir/schema.xsd").unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
    }

    #[test]
    fn test_remote_refused() {
        let err = FileLoader::new().load(None, "http://example.com/a.xsd").unwrap_err();
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = file.path().to_string_lossy().to_string();
        let loader = FileLoader::new().with_limits(Limits::strict());

        // Strict limits (10 MB max) should reject 11MB file
        assert!(matches!(loader.load(None, &location), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_memory_loader_canonical_keys() {
        let loader = MemoryLoader::new()
            .with_document("dir/../a.xsd", EMPTY_SCHEMA)
            .unwrap();

        assert_eq!(loader.len(), 1);
        let schema = loader.load(None, "a.xsd").unwrap();
        assert_eq!(schema.location.as_deref(), Some("a.xsd"));
        assert!(loader.load(None, "b.xsd").is_err());
    }

    #[test]
    fn test_no_loader() {
        assert!(NoLoader.load(None, "a.xsd").is_err());
    }
}
