//! Limits for a single schema compilation
//!
//! These bound how much work one compilation may do, so that a hostile or
//! runaway import graph cannot exhaust memory.

use crate::error::{Error, Result};

/// Compilation limits
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum size of one fetched schema document in bytes
    pub max_document_size: usize,

    /// Maximum number of schema documents in one compilation
    pub max_documents: usize,

    /// Maximum import/include/redefine chain depth
    pub max_import_depth: usize,

    /// Maximum number of schema components (types, elements, attributes)
    pub max_components: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_size: 100 * 1024 * 1024, // 100 MB
            max_documents: 10_000,
            max_import_depth: 100,
            max_components: 1_000_000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_document_size: 10 * 1024 * 1024, // 10 MB
            max_documents: 500,
            max_import_depth: 20,
            max_components: 100_000,
        }
    }

    /// Check if a fetched document size is within limits
    pub fn check_document_size(&self, size: usize) -> Result<()> {
        if size > self.max_document_size {
            Err(Error::LimitExceeded(format!(
                "document size {} bytes exceeds maximum {} bytes",
                size, self.max_document_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of queued documents is within limits
    pub fn check_documents(&self, count: usize) -> Result<()> {
        if count > self.max_documents {
            Err(Error::LimitExceeded(format!(
                "document count {} exceeds maximum {}",
                count, self.max_documents
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an import chain depth is within limits
    pub fn check_import_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_import_depth {
            Err(Error::LimitExceeded(format!(
                "import depth {} exceeds maximum {}",
                depth, self.max_import_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of schema components is within limits
    pub fn check_components(&self, count: usize) -> Result<()> {
        if count > self.max_components {
            Err(Error::LimitExceeded(format!(
                "schema component count {} exceeds maximum {}",
                count, self.max_components
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_import_depth, 100);
        assert!(limits.check_import_depth(50).is_ok());
        assert!(limits.check_import_depth(150).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_documents < Limits::default().max_documents);
        assert!(limits.check_documents(501).is_err());
    }

    #[test]
    fn test_check_document_size() {
        let limits = Limits::default();
        assert!(limits.check_document_size(1024).is_ok());
        assert!(limits.check_document_size(200 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_check_components() {
        let limits = Limits::strict();
        assert!(limits.check_components(10).is_ok());
        assert!(limits.check_components(100_001).is_err());
    }
}
