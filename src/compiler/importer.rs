//! Import, include and redefine resolution
//!
//! Starting from the documents handed to `compile`, follow every
//! `xs:import`, `xs:include` and `xs:redefine` and produce the ordered list
//! of [`DocumentUnit`]s to translate. Each unit carries the namespace it is
//! compiled under. Fetches go through a [`DownloadTable`] so that a
//! document reached along several paths is fetched once and, when its
//! content is identical, compiled once.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::{CompileError, ErrorCategory, Severity};
use crate::loaders::DocumentLoader;
use crate::locations::resolve_location;
use crate::parsing::{Redefine, SchemaDocument};

use super::context::CompileContext;

/// A document queued for translation
#[derive(Debug, Clone)]
pub struct DocumentUnit {
    /// The parsed document
    pub document: SchemaDocument,
    /// Effective target namespace
    pub namespace: Option<String>,
    /// Whether the document has no namespace of its own and was included
    /// or redefined into `namespace`
    pub chameleon: bool,
    /// The redefinitions applied to this document, when it was reached
    /// through `xs:redefine`
    pub redefine: Option<RedefineContext>,
}

/// An `xs:redefine` clause together with the defaults of the document
/// that contains it
#[derive(Debug, Clone)]
pub struct RedefineContext {
    /// The redefining components
    pub redefine: Redefine,
    /// Location of the redefining document
    pub location: Option<String>,
    /// elementFormDefault of the redefining document
    pub element_form_qualified: bool,
    /// attributeFormDefault of the redefining document
    pub attribute_form_qualified: bool,
}

type FetchResult = std::result::Result<SchemaDocument, String>;

/// Cache of fetched documents and of units already queued
#[derive(Debug, Default)]
pub struct DownloadTable {
    /// By (namespace, absolute location)
    fetched: HashMap<(Option<String>, String), FetchResult>,
    /// By absolute location alone, successful fetches only
    documents: HashMap<String, SchemaDocument>,
    /// (effective namespace, digest, redefining location) of queued units
    units: HashSet<(Option<String>, String, Option<String>)>,
}

impl DownloadTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a document available without fetching it
    pub fn seed(&mut self, document: &SchemaDocument) {
        if let Some(location) = &document.location {
            self.documents.insert(location.clone(), document.clone());
        }
    }

    /// Fetch the document at an absolute location, or reuse an earlier
    /// fetch. Without a loader only known documents are available.
    pub fn fetch(
        &mut self,
        loader: Option<&dyn DocumentLoader>,
        namespace: Option<&str>,
        location: &str,
    ) -> FetchResult {
        let key = (namespace.map(str::to_string), location.to_string());
        if let Some(cached) = self.fetched.get(&key) {
            return cached.clone();
        }
        let result = match self.documents.get(location) {
            Some(document) => Ok(document.clone()),
            None => match loader {
                Some(loader) => {
                    debug!(location, namespace, "fetching schema document");
                    loader.load(namespace, location).map_err(|e| e.to_string())
                }
                None => Err(format!("downloads are disabled and '{}' is not available", location)),
            },
        };
        if let Ok(document) = &result {
            self.documents.insert(location.to_string(), document.clone());
        }
        self.fetched.insert(key, result.clone());
        result
    }

    /// Whether a document is already known at this location
    pub fn contains(&self, location: &str) -> bool {
        self.documents.contains_key(location)
    }

    /// Register a unit; false when an identical one was registered before
    fn claim(&mut self, unit: &QueueItem) -> bool {
        self.units.insert((
            unit.namespace.clone(),
            unit.document.digest.clone(),
            unit.redefine.as_ref().map(|r| r.location.clone().unwrap_or_default()),
        ))
    }
}

#[derive(Debug)]
struct QueueItem {
    document: SchemaDocument,
    namespace: Option<String>,
    chameleon: bool,
    redefine: Option<RedefineContext>,
    depth: usize,
}

/// Build the units reachable from `start`
pub(crate) fn resolve_imports(
    ctx: &mut CompileContext<'_>,
    start: Vec<SchemaDocument>,
    loader: Option<&dyn DocumentLoader>,
) -> Vec<DocumentUnit> {
    let mut importer = Importer {
        table: DownloadTable::new(),
        queue: VecDeque::new(),
        units: Vec::new(),
        consumed: HashSet::new(),
        loader,
    };

    let mut chameleons = Vec::new();
    for document in start {
        importer.table.seed(&document);
        match document.target_namespace.clone() {
            Some(namespace) => importer.queue.push_back(QueueItem {
                document,
                namespace: Some(namespace),
                chameleon: false,
                redefine: None,
                depth: 0,
            }),
            None => chameleons.push(document),
        }
    }

    importer.drain(ctx);

    // no-namespace start documents nobody included stand on their own
    for document in chameleons {
        if importer.consumed.contains(&document.digest) {
            continue;
        }
        importer.queue.push_back(QueueItem {
            document,
            namespace: None,
            chameleon: false,
            redefine: None,
            depth: 0,
        });
        importer.drain(ctx);
    }

    debug!(units = importer.units.len(), "import resolution complete");
    importer.units
}

struct Importer<'l> {
    table: DownloadTable,
    queue: VecDeque<QueueItem>,
    units: Vec<DocumentUnit>,
    /// Digests of no-namespace documents pulled in by include or redefine
    consumed: HashSet<String>,
    loader: Option<&'l dyn DocumentLoader>,
}

impl Importer<'_> {
    fn drain(&mut self, ctx: &mut CompileContext<'_>) {
        while let Some(item) = self.queue.pop_front() {
            if !self.table.claim(&item) {
                debug!(location = ?item.document.location, "skipping duplicate document");
                continue;
            }
            if let Err(e) = ctx.options.limits.check_documents(self.units.len() + 1) {
                ctx.record(CompileError::new(ErrorCategory::Resource, e.to_string()));
                self.queue.clear();
                return;
            }
            debug!(
                location = ?item.document.location,
                namespace = ?item.namespace,
                chameleon = item.chameleon,
                "queued schema document"
            );
            self.follow_imports(ctx, &item);
            self.follow_includes(ctx, &item);
            self.follow_redefines(ctx, &item);

            if let Some(namespace) = &item.namespace {
                ctx.namespaces.insert(namespace.clone());
            } else {
                ctx.namespaces.insert(String::new());
            }
            self.units.push(DocumentUnit {
                document: item.document,
                namespace: item.namespace,
                chameleon: item.chameleon,
                redefine: item.redefine,
            });
        }
    }

    /// Absolute location of a reference, or a recorded error
    fn locate(&self, ctx: &mut CompileContext<'_>, item: &QueueItem, reference: &str) -> Option<String> {
        match resolve_location(item.document.location.as_deref(), reference) {
            Ok(location) => Some(location),
            Err(e) => {
                ctx.record(resource_error(
                    format!("cannot resolve schema location '{}': {}", reference, e),
                    &item.document,
                ));
                None
            }
        }
    }

    fn within_depth(&self, ctx: &mut CompileContext<'_>, item: &QueueItem) -> bool {
        match ctx.options.limits.check_import_depth(item.depth + 1) {
            Ok(()) => true,
            Err(e) => {
                ctx.record(resource_error(e.to_string(), &item.document));
                false
            }
        }
    }

    fn follow_imports(&mut self, ctx: &mut CompileContext<'_>, item: &QueueItem) {
        for import in &item.document.imports {
            if import.namespace == item.namespace {
                ctx.record(document_error(
                    ErrorCategory::Structure,
                    format!(
                        "a document cannot import its own namespace '{}'",
                        import.namespace.as_deref().unwrap_or("")
                    ),
                    &item.document,
                ));
                continue;
            }
            let Some(reference) = &import.schema_location else {
                continue;
            };
            let Some(location) = self.locate(ctx, item, reference) else {
                continue;
            };
            if !self.within_depth(ctx, item) {
                continue;
            }

            let available = self.table.contains(&location);
            if self.loader.is_none() && !available {
                // the components may still come from a linked system or another document
                let known = ctx.linked.has_namespace(import.namespace.as_deref())
                    || self.namespace_queued(import.namespace.as_deref());
                if known {
                    ctx.record(
                        resource_error(
                            format!(
                                "not downloading '{}'; namespace '{}' is already available",
                                location,
                                import.namespace.as_deref().unwrap_or("")
                            ),
                            &item.document,
                        )
                        .with_severity(Severity::Warning),
                    );
                    continue;
                }
            }

            let document = match self.table.fetch(self.loader, import.namespace.as_deref(), &location) {
                Ok(document) => document,
                Err(message) => {
                    ctx.record(resource_error(message, &item.document));
                    continue;
                }
            };
            if document.target_namespace != import.namespace {
                ctx.record(resource_error(
                    format!(
                        "imported document '{}' has namespace '{}', expected '{}'",
                        location,
                        document.namespace_str(),
                        import.namespace.as_deref().unwrap_or("")
                    ),
                    &item.document,
                ));
                continue;
            }
            self.queue.push_back(QueueItem {
                namespace: document.target_namespace.clone(),
                document,
                chameleon: false,
                redefine: None,
                depth: item.depth + 1,
            });
        }
    }

    fn follow_includes(&mut self, ctx: &mut CompileContext<'_>, item: &QueueItem) {
        for include in &item.document.includes {
            if let Some(next) = self.fetch_same_namespace(ctx, item, &include.schema_location, "included") {
                self.queue.push_back(next);
            }
        }
    }

    fn follow_redefines(&mut self, ctx: &mut CompileContext<'_>, item: &QueueItem) {
        for redefine in &item.document.redefines {
            if let Some(mut next) = self.fetch_same_namespace(ctx, item, &redefine.schema_location, "redefined") {
                next.redefine = Some(RedefineContext {
                    redefine: redefine.clone(),
                    location: item.document.location.clone(),
                    element_form_qualified: item.document.element_form_qualified,
                    attribute_form_qualified: item.document.attribute_form_qualified,
                });
                self.queue.push_back(next);
            }
        }
    }

    /// Fetch an included or redefined document, which must share the
    /// including document's namespace or have none
    fn fetch_same_namespace(
        &mut self,
        ctx: &mut CompileContext<'_>,
        item: &QueueItem,
        reference: &str,
        verb: &str,
    ) -> Option<QueueItem> {
        let location = self.locate(ctx, item, reference)?;
        if !self.within_depth(ctx, item) {
            return None;
        }
        let document = match self.table.fetch(self.loader, item.namespace.as_deref(), &location) {
            Ok(document) => document,
            Err(message) => {
                ctx.record(resource_error(message, &item.document));
                return None;
            }
        };

        let chameleon = match &document.target_namespace {
            ns if *ns == item.namespace => item.chameleon,
            None => {
                self.consumed.insert(document.digest.clone());
                item.namespace.is_some()
            }
            Some(ns) => {
                ctx.record(resource_error(
                    format!(
                        "{} document '{}' has namespace '{}', expected '{}'",
                        verb,
                        location,
                        ns,
                        item.namespace.as_deref().unwrap_or("")
                    ),
                    &item.document,
                ));
                return None;
            }
        };
        Some(QueueItem {
            document,
            namespace: item.namespace.clone(),
            chameleon,
            redefine: None,
            depth: item.depth + 1,
        })
    }

    fn namespace_queued(&self, namespace: Option<&str>) -> bool {
        let matches = |ns: &Option<String>| ns.as_deref() == namespace;
        self.units.iter().any(|u| matches(&u.namespace)) || self.queue.iter().any(|q| matches(&q.namespace))
    }
}

fn resource_error(message: impl Into<String>, document: &SchemaDocument) -> CompileError {
    document_error(ErrorCategory::Resource, message, document)
}

fn document_error(category: ErrorCategory, message: impl Into<String>, document: &SchemaDocument) -> CompileError {
    let error = CompileError::new(category, message);
    match &document.location {
        Some(location) => error.with_location(location.clone()),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::compiler::{BuiltinLoader, CompileOptions};
    use crate::limits::Limits;
    use crate::loaders::MemoryLoader;

    fn schema(body: &str, tns: Option<&str>) -> String {
        let tns = tns.map(|ns| format!(r#" targetNamespace="{}""#, ns)).unwrap_or_default();
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"{}>{}</xs:schema>"#,
            tns, body
        )
    }

    fn run(loader: &MemoryLoader, start: &[&str], downloads: bool) -> (Vec<DocumentUnit>, Vec<CompileError>) {
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&options, &BuiltinLoader);
        let documents = start.iter().map(|l| loader.parse(l).unwrap()).collect();
        let fetcher: Option<&dyn DocumentLoader> = if downloads { Some(loader) } else { None };
        let units = resolve_imports(&mut ctx, documents, fetcher);
        (units, ctx.errors)
    }

    #[test]
    fn test_include_and_import_closure() {
        let loader = MemoryLoader::new()
            .with_document(
                "main.xsd",
                schema(r#"<xs:include schemaLocation="part.xsd"/>
                       <xs:import namespace="urn:b" schemaLocation="b/b.xsd"/>"#,
                    Some("urn:a"),
                ),
            )
            .unwrap()
            .with_document("part.xsd", schema("", Some("urn:a")))
            .unwrap()
            .with_document("b/b.xsd", schema("", Some("urn:b")))
            .unwrap();

        let (units, errors) = run(&loader, &["main.xsd"], true);
        assert!(errors.is_empty(), "{:?}", errors);
        let locations: Vec<_> = units.iter().map(|u| u.document.location.clone().unwrap()).collect();
        assert_eq!(locations, vec!["main.xsd", "b/b.xsd", "part.xsd"]);
        assert!(units.iter().all(|u| !u.chameleon));
    }

    #[test]
    fn test_chameleon_include() {
        let loader = MemoryLoader::new()
            .with_document(
                "main.xsd",
                schema(r#"<xs:include schemaLocation="common.xsd"/>"#, Some("urn:a")),
            )
            .unwrap()
            .with_document("common.xsd", schema("", None))
            .unwrap();

        let (units, errors) = run(&loader, &["main.xsd", "common.xsd"], true);
        assert!(errors.is_empty(), "{:?}", errors);
        // the start copy of common.xsd was consumed by the include
        assert_eq!(units.len(), 2);
        assert!(units[1].chameleon);
        assert_eq!(units[1].namespace.as_deref(), Some("urn:a"));
    }

    #[test]
    fn test_unconsumed_chameleon_is_drained() {
        let loader = MemoryLoader::new()
            .with_document("main.xsd", schema("", Some("urn:a")))
            .unwrap()
            .with_document("loose.xsd", schema("", None))
            .unwrap();

        let (units, _) = run(&loader, &["main.xsd", "loose.xsd"], true);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].namespace, None);
        assert!(!units[1].chameleon);
    }

    #[test]
    fn test_identical_content_is_compiled_once() {
        let part = schema(r#"<xs:element name="e"/>"#, Some("urn:a"));
        let loader = MemoryLoader::new()
            .with_document(
                "main.xsd",
                schema(r#"<xs:include schemaLocation="one/part.xsd"/><xs:include schemaLocation="two/part.xsd"/>"#,
                    Some("urn:a"),
                ),
            )
            .unwrap()
            .with_document("one/part.xsd", part.clone())
            .unwrap()
            .with_document("two/part.xsd", part)
            .unwrap();

        let (units, errors) = run(&loader, &["main.xsd"], true);
        assert!(errors.is_empty());
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn test_import_namespace_mismatch() {
        let loader = MemoryLoader::new()
            .with_document(
                "main.xsd",
                schema(r#"<xs:import namespace="urn:b" schemaLocation="wrong.xsd"/>"#,
                    Some("urn:a"),
                ),
            )
            .unwrap()
            .with_document("wrong.xsd", schema("", Some("urn:c")))
            .unwrap();

        let (units, errors) = run(&loader, &["main.xsd"], true);
        assert_eq!(units.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::Resource);
        assert!(errors[0].message.contains("urn:c"));
    }

    #[test]
    fn test_downloads_disabled() {
        let loader = MemoryLoader::new()
            .with_document(
                "main.xsd",
                schema(r#"<xs:include schemaLocation="part.xsd"/>
                       <xs:import namespace="urn:b" schemaLocation="b.xsd"/>"#,
                    Some("urn:a"),
                ),
            )
            .unwrap()
            .with_document("part.xsd", schema("", Some("urn:a")))
            .unwrap()
            .with_document("b.xsd", schema("", Some("urn:b")))
            .unwrap();

        // b.xsd is a start document, so its namespace is available; part.xsd is a miss
        let (units, errors) = run(&loader, &["main.xsd", "b.xsd"], false);
        assert_eq!(units.len(), 2);
        let fatal: Vec<_> = errors.iter().filter(|e| e.is_fatal()).collect();
        assert_eq!(fatal.len(), 1);
        assert!(fatal[0].message.contains("part.xsd"));
    }

    /// Remembers every location it was asked for
    struct RecordingLoader {
        inner: MemoryLoader,
        fetched: RefCell<Vec<String>>,
    }

    impl DocumentLoader for RecordingLoader {
        fn load(&self, namespace: Option<&str>, location: &str) -> crate::error::Result<SchemaDocument> {
            self.fetched.borrow_mut().push(location.to_string());
            self.inner.load(namespace, location)
        }
    }

    #[test]
    fn test_depth_limit_stops_before_fetching() {
        let inner = MemoryLoader::new()
            .with_document(
                "main.xsd",
                schema(r#"<xs:import namespace="urn:b" schemaLocation="b.xsd"/>"#, Some("urn:a")),
            )
            .unwrap()
            .with_document(
                "b.xsd",
                schema(
                    r#"<xs:include schemaLocation="deep.xsd"/>
                       <xs:import namespace="urn:c" schemaLocation="c.xsd"/>"#,
                    Some("urn:b"),
                ),
            )
            .unwrap()
            .with_document("deep.xsd", schema("", Some("urn:b")))
            .unwrap()
            .with_document("c.xsd", schema("", Some("urn:c")))
            .unwrap();
        let loader = RecordingLoader {
            inner,
            fetched: RefCell::new(Vec::new()),
        };
        let options = CompileOptions::default().with_limits(Limits {
            max_import_depth: 1,
            ..Limits::default()
        });
        let mut ctx = CompileContext::new(&options, &BuiltinLoader);
        let start = loader.inner.parse("main.xsd").unwrap();

        let units = resolve_imports(&mut ctx, vec![start], Some(&loader as &dyn DocumentLoader));

        assert_eq!(units.len(), 2);
        assert_eq!(*loader.fetched.borrow(), vec!["b.xsd".to_string()]);
        assert_eq!(ctx.errors.len(), 2, "{:?}", ctx.errors);
        assert!(ctx.errors.iter().all(|e| e.category == ErrorCategory::Resource));
    }
}
