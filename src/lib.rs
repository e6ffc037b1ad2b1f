//! # xmlschema-compiler
//!
//! Compiles XML Schema 1.0 documents into a resolved, checked schema type
//! system.
//!
//! ## Features
//!
//! - `import`, `include` and `redefine` resolution with content-digest
//!   deduplication and chameleon namespace adoption
//! - Type resolution in dependency order with cycle detection
//! - Particle Valid (Restriction) and the other derivation checks
//! - Default and fixed value validation against the built-in types
//! - Partial compilation: unresolved references degrade to `xs:anyType`
//! - Linking against previously compiled type systems
//!
//! ## Example
//!
//! ```rust
//! use xmlschema_compiler::compiler::{compile_str, CompileOptions};
//!
//! let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!   <xs:element name="note" type="xs:string"/>
//! </xs:schema>"#;
//!
//! let outcome = compile_str(xsd, Some("note.xsd"), &CompileOptions::new())?;
//! let system = outcome.type_system.expect("schema compiles");
//! assert_eq!(system.global_elements().count(), 1);
//! # Ok::<(), xmlschema_compiler::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and locations
pub mod namespaces;
pub mod names;
pub mod locations;
pub mod qnameset;

// Document reading and loading
pub mod documents;
pub mod parsing;
pub mod loaders;

// Schema components and compilation
pub mod components;
pub mod compiler;

// Re-exports for convenience
pub use compiler::{
    compile, compile_str, BuiltinLoader, CompileOptions, CompileOutcome, LinkedLoader,
    LinkedSystems, SchemaTypeSystem,
};
pub use error::{CompileError, Error, ErrorCategory, Result, Severity};
pub use namespaces::QName;

/// Version of the xmlschema-compiler library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
