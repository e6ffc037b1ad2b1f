//! Schema compilation
//!
//! [`compile`] turns a set of parsed schema documents into a
//! [`SchemaTypeSystem`] in four sequential passes over one
//! [`context::CompileContext`]:
//!
//! 1. import resolution follows `import`, `include` and `redefine` and
//!    collects one unit per distinct document
//! 2. translation registers every global component in the name tables
//! 3. type resolution builds types in dependency order, detecting cycles
//! 4. checking validates restrictions, values and substitution groups
//!
//! Problems are recorded as [`CompileError`] diagnostics and never stop a
//! pass; the compilation fails when at least one of them has error
//! severity.

mod checker;
mod content;
mod context;
mod importer;
mod linker;
mod resolver;
mod translate;
mod typesystem;

use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CompileError, Error, ErrorCategory, Result, Severity};
use crate::limits::Limits;
use crate::loaders::{DocumentLoader, FileLoader};
use crate::parsing::SchemaDocument;

pub use typesystem::{
    AttributeSummary, BuiltinLoader, ComponentHandle, ElementSummary, LinkedLoader, LinkedSystems,
    SchemaTypeSystem, TypeSummary, TypeSystemSummary,
};

/// Compilation options
#[derive(Clone)]
pub struct CompileOptions {
    pub(crate) downloads: bool,
    pub(crate) restriction_checks: bool,
    pub(crate) partial: bool,
    pub(crate) limits: Limits,
    pub(crate) loader: Arc<dyn DocumentLoader + Send + Sync>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            downloads: true,
            restriction_checks: true,
            partial: false,
            limits: Limits::default(),
            loader: Arc::new(FileLoader::new()),
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("downloads", &self.downloads)
            .field("restriction_checks", &self.restriction_checks)
            .field("partial", &self.partial)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl CompileOptions {
    /// Default options: downloads on, restriction checks on, not partial
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid fetching imported and included documents. A
    /// forbidden fetch is recorded like a failed one.
    pub fn with_downloads(mut self, downloads: bool) -> Self {
        self.downloads = downloads;
        self
    }

    /// Enable or disable the particle restriction checks
    pub fn with_restriction_checks(mut self, checks: bool) -> Self {
        self.restriction_checks = checks;
        self
    }

    /// Partial compilation: unresolved references degrade to xs:anyType
    /// and are recorded as recoverable
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Resource limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The loader used to fetch referenced documents
    pub fn with_loader(mut self, loader: impl DocumentLoader + Send + Sync + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Whether documents may be fetched
    pub fn downloads(&self) -> bool {
        self.downloads
    }

    /// Whether particle restrictions are checked
    pub fn restriction_checks(&self) -> bool {
        self.restriction_checks
    }

    /// Whether this is a partial compilation
    pub fn partial(&self) -> bool {
        self.partial
    }

    /// Resource limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

/// What a compilation produced
#[derive(Debug)]
pub struct CompileOutcome {
    /// The type system; None when an error-severity diagnostic was recorded
    pub type_system: Option<SchemaTypeSystem>,
    /// Every recorded diagnostic, in the order recorded
    pub errors: Vec<CompileError>,
}

impl CompileOutcome {
    /// Whether the compilation produced a type system
    pub fn is_success(&self) -> bool {
        self.type_system.is_some()
    }

    /// Diagnostics of error severity
    pub fn fatal_errors(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter().filter(|e| e.is_fatal())
    }

    /// Diagnostics of a given severity
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &CompileError> {
        self.errors.iter().filter(move |e| e.severity == severity)
    }

    /// The type system, or the first fatal diagnostic
    pub fn into_result(self) -> std::result::Result<SchemaTypeSystem, CompileError> {
        match self.type_system {
            Some(system) => Ok(system),
            None => Err(self
                .errors
                .into_iter()
                .find(CompileError::is_fatal)
                .unwrap_or_else(|| CompileError::new(ErrorCategory::Structure, "compilation failed"))),
        }
    }
}

/// Compile `documents` into a type system
///
/// `linked` resolves references to previously compiled type systems; pass
/// [`BuiltinLoader`] to link only the built-in types. A missing loader is
/// the one precondition failure; every schema problem is returned in
/// [`CompileOutcome::errors`] instead.
pub fn compile(
    documents: Vec<SchemaDocument>,
    linked: Option<&dyn LinkedLoader>,
    options: &CompileOptions,
) -> Result<CompileOutcome> {
    let linked = linked.ok_or_else(|| Error::Precondition("no linked type loader supplied".to_string()))?;
    let mut ctx = context::CompileContext::new(options, linked);

    let loader: Option<&dyn DocumentLoader> = if options.downloads {
        Some(options.loader.as_ref() as &dyn DocumentLoader)
    } else {
        None
    };
    let units = importer::resolve_imports(&mut ctx, documents, loader);
    translate::translate(&mut ctx, units);
    resolver::resolve(&mut ctx);
    checker::check(&mut ctx);

    let errors = mem::take(&mut ctx.errors);
    let failed = errors.iter().any(CompileError::is_fatal);
    debug!(diagnostics = errors.len(), failed, "compilation complete");

    let type_system = if failed {
        None
    } else {
        Some(SchemaTypeSystem::from_context(ctx))
    };
    Ok(CompileOutcome { type_system, errors })
}

/// Parse and compile schema text held in memory
///
/// Convenience for a single self-contained document; references to other
/// documents go through the configured loader.
pub fn compile_str(text: &str, location: Option<&str>, options: &CompileOptions) -> Result<CompileOutcome> {
    let document = SchemaDocument::parse_str(text, location)?;
    compile(vec![document], Some(&BuiltinLoader), options)
}
