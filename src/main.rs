//! Command-line interface for the schema compiler

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use xmlschema_compiler::compiler::{
    compile, BuiltinLoader, CompileOptions, CompileOutcome, ComponentHandle,
};
#[cfg(feature = "cli")]
use xmlschema_compiler::loaders::{DocumentLoader, FileLoader};
#[cfg(feature = "cli")]
use xmlschema_compiler::parsing::SchemaDocument;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsdc")]
#[command(author, version, about = "XML Schema compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile schema documents and report diagnostics
    Compile {
        /// Paths to the XSD schema files
        #[arg(value_name = "SCHEMA", required = true)]
        schemas: Vec<PathBuf>,

        /// Do not fetch imported or included documents
        #[arg(long)]
        no_download: bool,

        /// Skip the particle restriction checks
        #[arg(long)]
        no_pvr: bool,

        /// Degrade unresolved references to xs:anyType instead of failing
        #[arg(long)]
        partial: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile schema documents and show one component
    Show {
        /// Paths to the XSD schema files
        #[arg(value_name = "SCHEMA", required = true)]
        schemas: Vec<PathBuf>,

        /// Component handle, e.g. "type:{urn:example}Address" or "element#3"
        #[arg(short = 'H', long)]
        handle: String,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            schemas,
            no_download,
            no_pvr,
            partial,
            json,
        } => {
            let options = CompileOptions::new()
                .with_downloads(!no_download)
                .with_restriction_checks(!no_pvr)
                .with_partial(partial);
            cmd_compile(&schemas, &options, json)
        }
        Commands::Show { schemas, handle } => cmd_show(&schemas, &handle),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn read_documents(paths: &[PathBuf]) -> Result<Vec<SchemaDocument>, Box<dyn std::error::Error>> {
    let loader = FileLoader::new();
    paths
        .iter()
        .map(|path| -> Result<SchemaDocument, Box<dyn std::error::Error>> {
            let location = absolute_location(path)?;
            Ok(loader.load(None, &location)?)
        })
        .collect()
}

#[cfg(feature = "cli")]
fn absolute_location(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let absolute = std::fs::canonicalize(path)?;
    Ok(absolute.to_string_lossy().into_owned())
}

#[cfg(feature = "cli")]
fn run(paths: &[PathBuf], options: &CompileOptions) -> Result<CompileOutcome, Box<dyn std::error::Error>> {
    let documents = read_documents(paths)?;
    Ok(compile(documents, Some(&BuiltinLoader), options)?)
}

#[cfg(feature = "cli")]
fn cmd_compile(paths: &[PathBuf], options: &CompileOptions, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = run(paths, options)?;

    if json_output {
        use serde_json::{json, Value};

        let summary = match &outcome.type_system {
            Some(system) => serde_json::to_value(system.summary())?,
            None => Value::Null,
        };
        let output = json!({
            "success": outcome.is_success(),
            "diagnostics": outcome.errors,
            "typeSystem": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for error in &outcome.errors {
            println!("{}", error);
        }
        match &outcome.type_system {
            Some(system) => {
                let summary = system.summary();
                println!("=== Compiled ===");
                println!("Namespaces: {}", summary.namespaces.join(", "));
                println!("Global types: {}", summary.types.len());
                println!("Global elements: {}", summary.elements.len());
                println!("Global attributes: {}", summary.attributes.len());
                if !summary.invalid_types.is_empty() {
                    println!("Invalid types: {}", summary.invalid_types.join(", "));
                }
            }
            None => println!("✗ Compilation failed with {} error(s)", outcome.fatal_errors().count()),
        }
    }

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_show(paths: &[PathBuf], handle: &str) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = run(paths, &CompileOptions::new())?;
    let system = outcome
        .into_result()
        .map_err(|e| format!("compilation failed: {}", e))?;

    match system.resolve_handle(handle) {
        Some(ComponentHandle::Type(ty)) => {
            println!("Type: {}", ty.display_name());
            println!("  Kind: {:?}", ty.kind);
            println!("  Content: {}", ty.content);
            if let Some(base) = ty.base.and_then(|b| system.type_by_id(b)) {
                println!("  Base: {} ({})", base.display_name(), ty.derivation);
            }
            if let Some(particle) = &ty.particle {
                println!("  Content model: {}", particle.describe());
            }
            for attribute in ty.attributes.uses.values() {
                let required = if attribute.required { " (required)" } else { "" };
                println!("  Attribute: {}{}", attribute.name, required);
            }
            println!("  Valid: {}", system.is_valid(ty.id));
        }
        Some(ComponentHandle::Element(element)) => {
            println!("Element: {}", element.name);
            if let Some(ty) = system.type_by_id(element.type_id) {
                println!("  Type: {}", ty.display_name());
            }
            println!("  Nillable: {}", element.nillable);
            for member in &element.substitution_members {
                println!("  Substitution member: {}", member);
            }
        }
        Some(ComponentHandle::Attribute(attribute)) => {
            println!("Attribute: {}", attribute.name);
            if let Some(ty) = system.type_by_id(attribute.type_id) {
                println!("  Type: {}", ty.display_name());
            }
        }
        Some(ComponentHandle::Identity(identity)) => {
            println!("{}: {}", identity.category, identity.name);
            println!("  Selector: {}", identity.selector);
            for field in &identity.fields {
                println!("  Field: {}", field);
            }
        }
        None => return Err(format!("no component for handle '{}'", handle).into()),
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
