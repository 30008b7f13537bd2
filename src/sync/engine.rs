//! The sync engine: one explicit context per content tree.
//!
//! [`SyncEngine`] owns everything a watch session mutates: the registry
//! snapshot, dependency edges, per-path suppression state and the
//! source ↔ output maps. Nothing lives in globals, so two engines over two
//! trees never interfere.
//!
//! # Event handling
//!
//! | Event | Action |
//! |-------|--------|
//! | source changed | upsert, render own output, fan out to `dependents_of(type)` |
//! | source removed | soft-delete, remove output and edges, fan out |
//! | `[Type]` changed/removed | reload registry, re-sync the type's instances, fan out |
//! | output changed, hash = last written | self-echo, ignored |
//! | output changed, other hash | external edit, debounced then [`SyncEngine::reconcile`] |
//!
//! Errors are returned per event; the watch loop logs them and moves on.

use dashmap::{DashMap, DashSet};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use super::state::{PathState, SyncState};
use super::watcher::{FsEvent, FsEventKind};
use crate::config::{IgnoreMatcher, SyncConfig};
use crate::core::SyncError;
use crate::deps::{DependencyTracker, extract_dependencies};
use crate::extract;
use crate::markdown::{Document, has_extension, list_documents, type_definition_name};
use crate::registry::{Instance, TypeDefinition, TypeRegistry};
use crate::store::{Record, Store};
use crate::template::{Renderer, placeholder_data};
use crate::utils::fs::{atomic_write, content_hash, display_relative, normalize_path};

/// Counts from a full sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Registered types.
    pub types: usize,
    /// Instances upserted.
    pub instances: usize,
    /// Outputs written.
    pub written: usize,
    /// Outputs rendered with unchanged bytes.
    pub unchanged: usize,
    /// Previously known sources that no longer exist.
    pub removed: usize,
    /// Documents that failed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl SyncReport {
    /// Whether every document synced.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What [`SyncEngine::handle_event`] did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Not a path the engine manages, or nothing changed.
    Ignored,
    /// The engine's own output write.
    SelfEcho,
    /// A source was synced; lists every output written.
    SourceSynced {
        /// Outputs written, own output first.
        written: Vec<PathBuf>,
    },
    /// A source was removed; lists dependents re-written.
    SourceRemoved {
        /// Outputs written by the fan-out.
        written: Vec<PathBuf>,
    },
    /// Type definitions were reloaded.
    TypesReloaded {
        /// Types whose instances were re-synced.
        types: Vec<String>,
        /// Outputs written.
        written: Vec<PathBuf>,
    },
    /// An output was edited outside the engine and awaits reconciliation.
    ExternalEdit(PathBuf),
}

/// Result of reconciling an edited output.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Changes were written back to the source.
    Merged {
        /// Changed fields; `content` when the body changed.
        fields: Vec<String>,
        /// Match confidence.
        confidence: f64,
    },
    /// The edit matched but changed nothing.
    NoChanges,
    /// Too few anchors matched; the source was left untouched.
    LowConfidence {
        /// Match confidence.
        confidence: f64,
    },
    /// Not an output of a known source, or the file is gone.
    Skipped,
}

/// Outcome of rendering one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendered {
    Written,
    Unchanged,
    NoOutput,
    /// The output holds an unreconciled edit; rendered after reconciliation.
    Deferred,
}

/// A synced source and its bound instance.
#[derive(Debug, Clone)]
struct SourceEntry {
    instance: Instance,
    namespace: String,
}

impl SourceEntry {
    fn rendered_path(&self) -> Option<&Path> {
        self.instance.rendered_path.as_deref()
    }
}

/// Reactive render/reconcile engine over one content tree.
pub struct SyncEngine<S: Store> {
    root: PathBuf,
    config: SyncConfig,
    ignore: IgnoreMatcher,
    store: Arc<S>,
    registry: RwLock<Arc<TypeRegistry>>,
    deps: DependencyTracker,
    state: SyncState,
    sources: DashMap<PathBuf, SourceEntry>,
    outputs: DashMap<PathBuf, PathBuf>,
    deferred: DashSet<PathBuf>,
}

impl<S: Store> std::fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("root", &self.root)
            .field("sources", &self.sources.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

impl<S: Store> SyncEngine<S> {
    /// Create an engine for `root` and load its type definitions.
    ///
    /// # Errors
    ///
    /// Fails when the root cannot be resolved or the configuration is
    /// invalid. Individual malformed definitions are skipped.
    pub fn new(root: impl AsRef<Path>, config: SyncConfig, store: Arc<S>) -> Result<Self, SyncError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|e| SyncError::io("open root", root, &e))?;
        let config_path = SyncConfig::path_for(&root);
        config.validate(&config_path)?;
        let ignore = config.ignore_matcher(&config_path)?;

        let engine = Self {
            root,
            config,
            ignore,
            store,
            registry: RwLock::new(Arc::new(TypeRegistry::new())),
            deps: DependencyTracker::new(),
            state: SyncState::new(),
            sources: DashMap::new(),
            outputs: DashMap::new(),
            deferred: DashSet::new(),
        };
        let paths = engine.scan_sources();
        engine.rebuild_registry(&paths, &mut Vec::new());
        Ok(engine)
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn set_registry(&self, registry: TypeRegistry) -> Arc<TypeRegistry> {
        let registry = Arc::new(registry);
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&registry);
        registry
    }

    /// Dependency edges.
    pub fn deps(&self) -> &DependencyTracker {
        &self.deps
    }

    /// Suppression state.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Output path of a synced source.
    pub fn rendered_path_for(&self, source: &Path) -> Option<PathBuf> {
        self.sources.get(source).and_then(|e| e.rendered_path().map(Path::to_path_buf))
    }

    /// Source of a known output path.
    pub fn source_for(&self, rendered: &Path) -> Option<PathBuf> {
        self.outputs.get(rendered).map(|e| e.value().clone())
    }

    fn rel(&self, path: &Path) -> String {
        display_relative(&self.root, path)
    }

    /// Whether the engine never touches `path`.
    pub fn is_ignored(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(relative) => self.ignore.is_ignored(relative),
            Err(_) => true,
        }
    }

    fn scan_sources(&self) -> Vec<PathBuf> {
        list_documents(&self.root, &self.config.source_extension, |p| !self.is_ignored(p))
    }

    fn rebuild_registry(&self, paths: &[PathBuf], failures: &mut Vec<(PathBuf, String)>) -> Arc<TypeRegistry> {
        let mut documents = Vec::new();
        for path in paths.iter().filter(|p| type_definition_name(p).is_some()) {
            match std::fs::read_to_string(path) {
                Ok(raw) => {
                    self.state.record_source(path, &content_hash(raw.as_bytes()));
                    match Document::parse(path, raw) {
                        Ok(doc) => documents.push(doc),
                        Err(e) => {
                            warn!("Skipping {}: {e}", self.rel(path));
                            failures.push((path.clone(), e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    let e = SyncError::io("read", path, &e);
                    warn!("Skipping {}: {e}", self.rel(path));
                    failures.push((path.clone(), e.to_string()));
                }
            }
        }

        let registry = TypeRegistry::load(&documents);
        registry.warn_on_cycles();
        debug!("Loaded {} type definitions", registry.len());
        self.set_registry(registry)
    }

    /// Scan the tree, reload every definition and upsert every instance,
    /// without writing outputs.
    ///
    /// Dependency edges are recorded for every instance with an output, so
    /// fan-out works before the first render.
    pub async fn index(&self) -> (SyncReport, Vec<PathBuf>) {
        let mut report = SyncReport::default();
        let paths = self.scan_sources();
        let registry = self.rebuild_registry(&paths, &mut report.failures);
        report.types = registry.len();

        let mut indexed = Vec::new();
        for path in paths.iter().filter(|p| type_definition_name(p).is_none()) {
            let result = match read_source(path).await {
                Ok(raw) => self.ingest(path, raw, &registry).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(ingested) => {
                    report.instances += 1;
                    if let Some(rendered) = ingested.entry.rendered_path()
                        && let Some(def) = registry.lookup(&ingested.entry.instance.type_name)
                    {
                        self.deps.record_edges(rendered, extract_dependencies(&def.template, Some(&*def)));
                    }
                    indexed.push(path.clone());
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", self.rel(path));
                    report.failures.push((path.clone(), e.to_string()));
                }
            }
        }

        let present: HashSet<&PathBuf> = paths.iter().collect();
        let stale: Vec<PathBuf> = self
            .sources
            .iter()
            .filter(|e| !present.contains(e.key()))
            .map(|e| e.key().clone())
            .collect();
        for path in stale {
            match self.retire(&path).await {
                Ok(Some(_)) => report.removed += 1,
                Ok(None) => {}
                Err(e) => report.failures.push((path.clone(), e.to_string())),
            }
        }

        (report, indexed)
    }

    /// Index the tree, then render every output.
    ///
    /// Rendering starts only after every instance is in the store, so each
    /// output sees the complete data set. Running it again repairs any
    /// inconsistency left by an interrupted session.
    pub async fn full_sync(&self) -> SyncReport {
        let (mut report, indexed) = self.index().await;
        let registry = self.registry();

        for path in indexed {
            let Some(entry) = self.sources.get(&path).map(|e| e.clone()) else {
                continue;
            };
            match self.render_entry(&entry, &registry).await {
                Ok(Rendered::Written) => report.written += 1,
                Ok(Rendered::Unchanged) => report.unchanged += 1,
                Ok(Rendered::NoOutput | Rendered::Deferred) => {}
                Err(e) => {
                    error!("Failed to render {}: {e}", self.rel(&path));
                    report.failures.push((path, e.to_string()));
                }
            }
        }

        info!(
            "Synced {} instances of {} types: {} written, {} unchanged, {} failed",
            report.instances,
            report.types,
            report.written,
            report.unchanged,
            report.failures.len()
        );
        report
    }

    /// Render a source's output text without writing it.
    pub async fn preview(&self, source: &Path) -> Result<String, SyncError> {
        let registry = self.registry();
        let raw = read_source(source).await?;
        let doc = Document::parse(source, raw)?;
        let (instance, def) = Instance::from_document(&doc, &registry, &self.config.output_extension)?;
        let namespace = instance.resolve_namespace(self.config.namespace.as_deref())?;
        Ok(Renderer::new(&*self.store, &registry, &namespace).render(&instance, &def).await)
    }

    /// Classify and apply one filesystem event.
    pub async fn handle_event(&self, event: &FsEvent) -> Result<EventOutcome, SyncError> {
        let path = event.path.as_path();
        if self.is_ignored(path) {
            return Ok(EventOutcome::Ignored);
        }

        if has_extension(path, &self.config.source_extension) {
            if type_definition_name(path).is_some() {
                return self.reload_type(path).await;
            }
            return match event.kind {
                FsEventKind::Removed => self.remove_source(path).await,
                FsEventKind::Changed => self.sync_source(path).await,
            };
        }

        if has_extension(path, &self.config.output_extension) {
            return self.classify_output(path, event.kind).await;
        }

        Ok(EventOutcome::Ignored)
    }

    async fn classify_output(&self, path: &Path, kind: FsEventKind) -> Result<EventOutcome, SyncError> {
        if !self.outputs.contains_key(path) {
            return Ok(EventOutcome::Ignored);
        }
        if kind == FsEventKind::Removed {
            debug!("Output {} removed; it is restored on the next sync", self.rel(path));
            return Ok(EventOutcome::Ignored);
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EventOutcome::Ignored),
            Err(e) => return Err(SyncError::io("read", path, &e)),
        };
        let hash = content_hash(&bytes);

        if self.state.is_self_echo(path, &hash) {
            debug!("Ignoring self-write echo for {}", self.rel(path));
            // An edit reverted to the engine's bytes releases any held render
            self.flush_deferred(path).await;
            return Ok(EventOutcome::SelfEcho);
        }
        if self.state.was_reconciled(path, &hash) {
            debug!("Edit to {} was already reconciled", self.rel(path));
            return Ok(EventOutcome::Ignored);
        }

        debug!("External edit to {}", self.rel(path));
        self.state.transition(path, PathState::ExternalEditPending);
        Ok(EventOutcome::ExternalEdit(path.to_path_buf()))
    }

    /// Upsert a changed source, render it and fan out to its dependents.
    pub async fn sync_source(&self, path: &Path) -> Result<EventOutcome, SyncError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.remove_source(path).await,
            Err(e) => return Err(SyncError::io("read", path, &e)),
        };
        if self.state.source_unchanged(path, &content_hash(raw.as_bytes())) {
            debug!("Source {} unchanged", self.rel(path));
            return Ok(EventOutcome::Ignored);
        }

        let registry = self.registry();
        let ingested = self.ingest(path, raw, &registry).await?;

        let mut written = Vec::new();
        let mut done = HashSet::new();
        if let Some(rendered) = ingested.entry.rendered_path() {
            done.insert(rendered.to_path_buf());
            if self.render_entry(&ingested.entry, &registry).await? == Rendered::Written {
                written.push(rendered.to_path_buf());
            }
        }

        let mut types = BTreeSet::from([ingested.entry.instance.type_name.clone()]);
        types.extend(ingested.previous_type);
        written.extend(self.fan_out(&types, done, &registry).await);

        Ok(EventOutcome::SourceSynced {
            written,
        })
    }

    /// Soft-delete a removed source, drop its output and fan out.
    pub async fn remove_source(&self, path: &Path) -> Result<EventOutcome, SyncError> {
        let Some(entry) = self.retire(path).await? else {
            return Ok(EventOutcome::Ignored);
        };
        let types = BTreeSet::from([entry.instance.type_name]);
        let written = self.fan_out(&types, HashSet::new(), &self.registry()).await;
        Ok(EventOutcome::SourceRemoved {
            written,
        })
    }

    /// Forget a source: soft-delete its row and remove its output.
    async fn retire(&self, path: &Path) -> Result<Option<SourceEntry>, SyncError> {
        self.state.forget_source(path);
        let Some((_, entry)) = self.sources.remove(path) else {
            return Ok(None);
        };

        info!("Removing {} '{}'", entry.instance.type_name, entry.instance.id);
        self.store.soft_delete(&entry.namespace, &entry.instance.type_name, &entry.instance.id).await?;
        if let Some(rendered) = entry.rendered_path() {
            self.drop_output(rendered).await?;
        }
        Ok(Some(entry))
    }

    async fn drop_output(&self, rendered: &Path) -> Result<(), SyncError> {
        self.outputs.remove(rendered);
        self.deps.remove_path(rendered);
        self.state.forget_rendered(rendered);
        match tokio::fs::remove_file(rendered).await {
            Ok(()) => {
                debug!("Removed output {}", self.rel(rendered));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io("remove", rendered, &e)),
        }
    }

    /// Reload a changed or removed `[Type]` definition.
    async fn reload_type(&self, path: &Path) -> Result<EventOutcome, SyncError> {
        let current = self.registry();
        let mut next = (*current).clone();
        let mut affected = BTreeSet::new();
        affected.extend(next.remove_path(path));

        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let hash = content_hash(raw.as_bytes());
                if self.state.source_unchanged(path, &hash) {
                    return Ok(EventOutcome::Ignored);
                }
                let def = TypeDefinition::from_document(&Document::parse(path, raw)?)?;
                info!("Reloaded type '{}' from {}", def.name, self.rel(path));
                affected.insert(def.name.clone());
                next.insert(def);
                self.state.record_source(path, &hash);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Type definition {} removed", self.rel(path));
                self.state.forget_source(path);
            }
            Err(e) => return Err(SyncError::io("read", path, &e)),
        }

        if affected.is_empty() {
            return Ok(EventOutcome::Ignored);
        }
        next.warn_on_cycles();
        let registry = self.set_registry(next);

        // Instances of the affected types, plus documents beside the
        // definition that may only now resolve to a type
        let dir = path.parent().unwrap_or(&self.root);
        let mut candidates: BTreeSet<PathBuf> = self
            .sources
            .iter()
            .filter(|e| affected.contains(&e.instance.type_name))
            .map(|e| e.key().clone())
            .collect();
        candidates.extend(
            self.scan_sources()
                .into_iter()
                .filter(|p| p.parent() == Some(dir) && type_definition_name(p).is_none()),
        );

        let mut written = Vec::new();
        let mut done = HashSet::new();
        for source in candidates {
            let result = match read_source(&source).await {
                Ok(raw) => self.ingest(&source, raw, &registry).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(ingested) => {
                    affected.extend(ingested.previous_type);
                    if let Some(rendered) = ingested.entry.rendered_path() {
                        done.insert(rendered.to_path_buf());
                        match self.render_entry(&ingested.entry, &registry).await {
                            Ok(Rendered::Written) => written.push(rendered.to_path_buf()),
                            Ok(_) => {}
                            Err(e) => error!("Failed to render {}: {e}", self.rel(rendered)),
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", self.rel(&source));
                    if let Some(entry) = self.retire(&source).await? {
                        affected.insert(entry.instance.type_name);
                    }
                }
            }
        }

        written.extend(self.fan_out(&affected, done, &registry).await);
        Ok(EventOutcome::TypesReloaded {
            types: affected.into_iter().collect(),
            written,
        })
    }

    /// Parse and upsert one instance and record it as synced.
    async fn ingest(&self, path: &Path, raw: String, registry: &TypeRegistry) -> Result<Ingested, SyncError> {
        let hash = content_hash(raw.as_bytes());
        let doc = Document::parse(path, raw)?;
        let (mut instance, _) = Instance::from_document(&doc, registry, &self.config.output_extension)?;
        instance.rendered_path = instance.rendered_path.as_deref().map(normalize_path);
        if let Some(rendered) = &instance.rendered_path
            && !rendered.starts_with(&self.root)
        {
            return Err(SyncError::parse(
                self.rel(path),
                format!("output path {} is outside the project root", rendered.display()),
            ));
        }
        let namespace = instance.resolve_namespace(self.config.namespace.as_deref())?;

        self.store
            .upsert(Record {
                namespace: &namespace,
                type_name: &instance.type_name,
                id: &instance.id,
                data: &instance.data,
                content: &instance.content,
            })
            .await?;
        debug!("Upserted {} '{}' in '{namespace}'", instance.type_name, instance.id);

        let mut previous_type = None;
        if let Some(prev) = self.sources.get(path).map(|e| e.clone()) {
            let same_row = prev.instance.type_name == instance.type_name
                && prev.instance.id == instance.id
                && prev.namespace == namespace;
            if !same_row {
                self.store
                    .soft_delete(&prev.namespace, &prev.instance.type_name, &prev.instance.id)
                    .await?;
            }
            if prev.instance.type_name != instance.type_name {
                previous_type = Some(prev.instance.type_name.clone());
            }
            if let Some(old) = prev.rendered_path()
                && prev.instance.rendered_path != instance.rendered_path
            {
                self.drop_output(old).await?;
            }
        }

        if let Some(rendered) = &instance.rendered_path {
            self.outputs.insert(rendered.clone(), path.to_path_buf());
        }
        let entry = SourceEntry {
            instance,
            namespace,
        };
        self.sources.insert(path.to_path_buf(), entry.clone());
        self.state.record_source(path, &hash);

        Ok(Ingested {
            entry,
            previous_type,
        })
    }

    /// Render an instance and write its output if the bytes changed.
    async fn render_entry(&self, entry: &SourceEntry, registry: &TypeRegistry) -> Result<Rendered, SyncError> {
        let Some(rendered) = entry.rendered_path() else {
            return Ok(Rendered::NoOutput);
        };
        let def = registry.lookup(&entry.instance.type_name).ok_or_else(|| SyncError::TypeNotFound {
            name: entry.instance.type_name.clone(),
        })?;
        self.deps.record_edges(rendered, extract_dependencies(&def.template, Some(&*def)));

        // Unreconciled bytes on disk are never overwritten
        if matches!(self.state.state(rendered), PathState::ExternalEditPending | PathState::Reconciling) {
            debug!("Deferring render of {} until its edit is reconciled", self.rel(rendered));
            self.deferred.insert(rendered.to_path_buf());
            return Ok(Rendered::Deferred);
        }
        self.deferred.remove(rendered);

        self.state.transition(rendered, PathState::Rendering);
        let text = Renderer::new(&*self.store, registry, &entry.namespace).render(&entry.instance, &def).await;

        let hash = content_hash(text.as_bytes());
        let unchanged = match tokio::fs::read(rendered).await {
            Ok(existing) => content_hash(&existing) == hash,
            Err(_) => false,
        };
        if unchanged {
            self.state.record_written(rendered, &hash, false);
            debug!("Output {} unchanged", self.rel(rendered));
            return Ok(Rendered::Unchanged);
        }

        // Hash is recorded before the bytes land so the echo is always recognised
        self.state.record_written(rendered, &hash, true);
        if let Err(e) = atomic_write(rendered, text.as_bytes()) {
            self.state.transition(rendered, PathState::Clean);
            return Err(SyncError::Io {
                operation: "write".into(),
                path: rendered.display().to_string(),
                message: format!("{e:#}"),
            });
        }
        info!("Rendered {}", self.rel(rendered));
        Ok(Rendered::Written)
    }

    /// Re-render every dependent of `types` once, skipping `done`.
    ///
    /// Rendering never writes to the store, so one wave is complete: no
    /// dependent can change what another dependent would render.
    async fn fan_out(
        &self,
        types: &BTreeSet<String>,
        mut done: HashSet<PathBuf>,
        registry: &TypeRegistry,
    ) -> Vec<PathBuf> {
        let mut queue = VecDeque::new();
        for type_name in types {
            for rendered in self.deps.dependents_of(type_name) {
                if done.insert(rendered.clone()) {
                    queue.push_back(rendered);
                }
            }
        }
        if !queue.is_empty() {
            debug!("Fan-out for {types:?}: {} dependents", queue.len());
        }

        let mut written = Vec::new();
        while let Some(rendered) = queue.pop_front() {
            let entry = self
                .source_for(&rendered)
                .and_then(|source| self.sources.get(&source).map(|e| e.clone()));
            let Some(entry) = entry else {
                continue;
            };
            match self.render_entry(&entry, registry).await {
                Ok(Rendered::Written) => written.push(rendered),
                Ok(_) => {}
                Err(e) => error!("Failed to re-render {}: {e}", self.rel(&rendered)),
            }
        }
        written
    }

    /// Reconcile an externally edited output back into its source.
    ///
    /// Below the confidence threshold the source is left byte-identical.
    /// Renders of `path` held back while the edit was pending run once the
    /// edit has been reconciled.
    pub async fn reconcile(&self, path: &Path) -> Result<ReconcileOutcome, SyncError> {
        let Some(source) = self.source_for(path) else {
            return Ok(ReconcileOutcome::Skipped);
        };
        let outcome = self.reconcile_output(path, &source).await;
        if !matches!(outcome, Ok(ReconcileOutcome::Merged { .. })) {
            self.state.transition(path, PathState::Clean);
        }
        if outcome.is_ok() {
            self.flush_deferred(path).await;
        }
        outcome
    }

    async fn reconcile_output(&self, path: &Path, source: &Path) -> Result<ReconcileOutcome, SyncError> {
        let edited = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReconcileOutcome::Skipped),
            Err(e) => return Err(SyncError::io("read", path, &e)),
        };
        let hash = content_hash(edited.as_bytes());
        if self.state.is_self_echo(path, &hash) {
            return Ok(ReconcileOutcome::Skipped);
        }

        self.state.transition(path, PathState::Reconciling);
        self.state.record_reconciled(path, &hash);
        self.merge_edit(path, source, &edited).await
    }

    /// Run a render of `rendered` that was held back by a pending edit.
    async fn flush_deferred(&self, rendered: &Path) {
        if self.deferred.remove(rendered).is_none() {
            return;
        }
        let entry = self
            .source_for(rendered)
            .and_then(|source| self.sources.get(&source).map(|e| e.clone()));
        let Some(entry) = entry else {
            return;
        };
        if let Err(e) = self.render_entry(&entry, &self.registry()).await {
            error!("Failed to render {}: {e}", self.rel(rendered));
        }
    }

    async fn merge_edit(&self, path: &Path, source: &Path, edited: &str) -> Result<ReconcileOutcome, SyncError> {
        let registry = self.registry();
        let doc = Document::parse(source, read_source(source).await?)?;
        let (instance, def) = Instance::from_document(&doc, &registry, &self.config.output_extension)?;

        let extraction = extract::reconcile(&def.template, edited);
        if !extraction.is_confident(self.config.confidence_threshold) {
            warn!(
                "Edit to {} not merged: confidence {:.2} is below {:.2} ({}/{} anchors matched)",
                self.rel(path),
                extraction.confidence,
                self.config.confidence_threshold,
                extraction.anchors_found,
                extraction.anchors_total
            );
            return Ok(ReconcileOutcome::LowConfidence {
                confidence: extraction.confidence,
            });
        }

        let mut changes = extract::changes(&extraction, &placeholder_data(&instance), &instance.content);
        // Only schema or frontmatter fields are written back; `id` and unknown keys are not
        changes.fields.retain(|field, _| {
            let known = instance.data.contains_key(field);
            if !known {
                debug!("Ignoring edit to synthetic field '{field}' in {}", self.rel(path));
            }
            known
        });
        if changes.is_empty() {
            debug!("Edit to {} changes no fields", self.rel(path));
            return Ok(ReconcileOutcome::NoChanges);
        }

        let body = changes.content.as_deref().map(|content| replace_trimmed(&doc.body, content));
        let text = doc.with_changes(&changes.fields, body.as_deref())?;
        atomic_write(source, text.as_bytes()).map_err(|e| SyncError::Io {
            operation: "write".into(),
            path: source.display().to_string(),
            message: format!("{e:#}"),
        })?;

        let mut fields: Vec<String> = changes.fields.keys().cloned().collect();
        if changes.content.is_some() {
            fields.push("content".into());
        }
        // The source now carries the edit, so the output may be rendered again
        self.state.transition(path, PathState::Clean);
        info!(
            "Merged {} from {} into {} (confidence {:.2})",
            fields.join(", "),
            self.rel(path),
            self.rel(source),
            extraction.confidence
        );

        self.sync_source(source).await?;
        Ok(ReconcileOutcome::Merged {
            fields,
            confidence: extraction.confidence,
        })
    }
}

struct Ingested {
    entry: SourceEntry,
    previous_type: Option<String>,
}

async fn read_source(path: &Path) -> Result<String, SyncError> {
    tokio::fs::read_to_string(path).await.map_err(|e| SyncError::io("read", path, &e))
}

/// Replace the trimmed part of `body` with `content`, keeping the
/// surrounding whitespace.
fn replace_trimmed(body: &str, content: &str) -> String {
    let start = body.len() - body.trim_start().len();
    let end = body.trim_end().len().max(start);
    format!("{}{}{}", &body[..start], content, &body[end..])
}
