use std::collections::BTreeSet;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use kiln_hooks::{HookContext, HookDispatcher, HookEvent, Operation, PostHookReport, ProcessHook};
use kiln_protocol::{FetchItem, PutResult, RejectReason};
use kiln_store::{
    BitObject, ComponentVersion, FsObjectStore, InMemoryObjectStore, ObjectKind, ObjectStore,
    Source, SourceFileRef, StoreResult, StoredObject, Symlink, VersionLog,
};
use kiln_sync::{FetchedComponent, Remote, SyncError, SyncResult, SyncVerifier};
use kiln_types::{
    validate_component_name, validate_scope_name, BitId, ComponentKey, ObjectId, Version,
    VersionSpec,
};

use crate::catalog::{Catalog, CatalogEntry, CATALOG_FILE};
use crate::config::{ScopeConfig, CONFIG_FILE};
use crate::error::{ErrorKind, ScopeError, ScopeResult};
use crate::remotes::{RemoteEntry, RemoteRegistry, REMOTES_FILE};
use crate::resolver::Resolver;
use crate::tag::{LogEntry, NewVersion, TagRequest};

/// Pause before retry `n` is `n` times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Outcome of [`Scope::import`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Requested ids that already resolved locally.
    pub already_local: Vec<BitId>,
    /// Versions fetched and committed, dependencies included.
    pub imported: Vec<BitId>,
    pub objects_written: usize,
}

/// An object the remote refused during [`Scope::export`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedObject {
    pub id: ObjectId,
    pub reason: RejectReason,
    pub detail: String,
}

/// Outcome of [`Scope::export`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Components whose version and every source the remote accepted.
    pub exported: Vec<BitId>,
    /// Exactly the ids the remote acknowledged as persisted.
    pub accepted: Vec<ObjectId>,
    pub rejected: Vec<RejectedObject>,
}

/// Outcome of [`Scope::remove`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemoveReport {
    pub versions: Vec<BitId>,
    /// Symlinks deleted because they led only to removed history.
    pub symlinks: Vec<ObjectId>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// A component scope: object store, catalog, remotes and hooks under one
/// name.
///
/// Every mutating and network operation is wrapped by its pre- and
/// post-hooks. Objects are always written before the catalog links them.
pub struct Scope {
    config: ScopeConfig,
    root: Option<PathBuf>,
    store: Arc<dyn ObjectStore>,
    catalog: Catalog,
    remotes: RemoteRegistry,
    hooks: HookDispatcher,
    tag_lock: tokio::sync::Mutex<()>,
    post_reports: Mutex<Vec<PostHookReport>>,
}

impl Scope {
    /// A scope over `store` with an in-memory catalog and registry.
    pub fn new(config: ScopeConfig, store: Arc<dyn ObjectStore>) -> ScopeResult<Self> {
        config.validate()?;
        Ok(Self::assemble(
            config,
            None,
            store,
            Catalog::in_memory(),
            RemoteRegistry::in_memory(),
        ))
    }

    pub fn in_memory(name: &str) -> ScopeResult<Self> {
        Self::new(ScopeConfig::new(name), Arc::new(InMemoryObjectStore::new()))
    }

    /// Create a scope directory at `root` and open it.
    pub fn init(root: &Path, config: ScopeConfig) -> ScopeResult<Self> {
        config.validate()?;
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(ScopeError::Validation(format!(
                "a scope already exists at {}",
                root.display()
            )));
        }
        fs::create_dir_all(root)?;
        config.save(&config_path)?;
        info!(scope = %config.name, path = %root.display(), "scope initialized");
        Self::open(root)
    }

    /// Open the scope directory at `root`.
    pub fn open(root: &Path) -> ScopeResult<Self> {
        let config = ScopeConfig::load(&root.join(CONFIG_FILE))?;
        let store = FsObjectStore::open(root)?;
        let catalog = Catalog::open(&root.join(CATALOG_FILE))?;
        let remotes = RemoteRegistry::open(&root.join(REMOTES_FILE))?;
        debug!(scope = %config.name, path = %root.display(), "scope opened");
        Ok(Self::assemble(
            config,
            Some(root.to_path_buf()),
            Arc::new(store),
            catalog,
            remotes,
        ))
    }

    fn assemble(
        config: ScopeConfig,
        root: Option<PathBuf>,
        store: Arc<dyn ObjectStore>,
        catalog: Catalog,
        remotes: RemoteRegistry,
    ) -> Self {
        let hooks = HookDispatcher::new();
        let configured = [
            (Operation::Export, "post_export_hook", config.hooks.post_export_hook.as_ref()),
            (Operation::Import, "post_import_hook", config.hooks.post_import_hook.as_ref()),
        ];
        for (op, name, command) in configured {
            if let Some(command) = command {
                hooks.register(op.post(), Arc::new(ProcessHook::new(name, command.as_str())));
            }
        }
        if config.hooks.ci_enable {
            if let Some(command) = &config.hooks.ci_command {
                hooks.register(
                    Operation::ReceiveObjects.post(),
                    Arc::new(ProcessHook::new("ci", command.as_str())),
                );
            }
        }
        Self {
            config,
            root,
            store,
            catalog,
            remotes,
            hooks,
            tag_lock: tokio::sync::Mutex::new(()),
            post_reports: Mutex::new(Vec::new()),
        }
    }

    // ---- Accessors ----

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn remotes(&self) -> &RemoteRegistry {
        &self.remotes
    }

    pub fn hooks(&self) -> &HookDispatcher {
        &self.hooks
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.store.as_ref(), &self.config.name, self.config.max_symlink_hops)
    }

    /// Post-hook reports with failures since the last call.
    pub fn take_post_hook_failures(&self) -> Vec<PostHookReport> {
        std::mem::take(&mut *self.post_reports.lock().expect("lock poisoned"))
    }

    // ---- Local operations ----

    /// Register a local component that has no versions yet.
    pub fn track(&self, name: &str) -> ScopeResult<ComponentKey> {
        validate_component_name(name).map_err(|e| ScopeError::from(e).context("track", name))?;
        let key = ComponentKey::new(self.name(), name);
        if self.catalog.track(&key)? {
            info!(op = "track", id = %key, "component tracked");
        }
        Ok(key)
    }

    /// Tag the next version of a local component.
    ///
    /// Dependencies must resolve before anything is written; they are
    /// stored pinned to the exact version they resolved to.
    pub async fn tag(&self, request: TagRequest) -> ScopeResult<NewVersion> {
        let key = ComponentKey::new(self.name(), request.name.clone());
        let ctx = self.hook_context().with_ids([&key]);
        self.hooked(Operation::Tag, ctx, async {
            let _guard = self.tag_lock.lock().await;
            self.tag_locked(request)
        })
        .await
        .map_err(|e| e.context("tag", &key))
    }

    fn tag_locked(&self, request: TagRequest) -> ScopeResult<NewVersion> {
        let TagRequest {
            name,
            files,
            dependencies,
            release,
            message,
            username,
            email,
            compiler,
            tester,
        } = request;

        validate_component_name(&name)?;
        if message.trim().is_empty() {
            return Err(ScopeError::Validation("tag message must not be empty".into()));
        }
        let key = ComponentKey::new(self.name(), name);
        if let Some(CatalogEntry::Symlink { real_scope }) = self.catalog.get(&key) {
            return Err(ScopeError::Validation(format!("{key} has moved to scope {real_scope}")));
        }
        let mut paths = BTreeSet::new();
        for file in &files {
            if file.relative_path.is_empty() || !paths.insert(file.relative_path.as_str()) {
                return Err(ScopeError::Validation(format!(
                    "invalid or duplicate file path {:?}",
                    file.relative_path
                )));
            }
        }

        let resolver = self.resolver();
        let mut pinned = Vec::with_capacity(dependencies.len());
        for dep in &dependencies {
            match resolver.resolve(dep) {
                Ok(resolved) => pinned.push(resolved.version.bit_id()),
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::CyclicSymlink) => {
                    return Err(ScopeError::Validation(format!("dependency {dep} does not resolve: {e}")));
                }
                Err(e) => return Err(e),
            }
        }
        if pinned.iter().any(|dep| dep.key_in(self.name()) == key) {
            return Err(ScopeError::Validation(format!("{key} cannot depend on itself")));
        }

        let previous = resolver.versions(&key)?.last().copied();
        let release = release.unwrap_or(self.config.default_release_type);
        let version = match previous {
            Some(prev) => prev.bump(release)?,
            None => Version::initial(release),
        };

        let mut batch = Vec::with_capacity(files.len() + 1);
        let mut refs = Vec::with_capacity(files.len());
        for file in files {
            let source = Source::new(file.contents);
            refs.push(SourceFileRef {
                relative_path: file.relative_path,
                file: source.id(),
            });
            batch.push(BitObject::Source(source).to_stored_object()?);
        }
        let log = VersionLog {
            message,
            date: now_millis(),
            username,
            email,
        };
        let mut component = ComponentVersion::new(&key, version, refs, pinned, log);
        if let Some(compiler) = compiler {
            component = component.with_compiler(compiler);
        }
        if let Some(tester) = tester {
            component = component.with_tester(tester);
        }
        batch.push(BitObject::Version(component.clone()).to_stored_object()?);

        self.store.put_batch(&batch)?;
        self.catalog.link_version(&key, version)?;
        info!(op = "tag", id = %component.id(), "version tagged");

        Ok(NewVersion {
            id: component.bit_id(),
            version,
            previous,
            object_id: component.id(),
            dependencies: component.dependencies,
        })
    }

    /// Tag several components, one after another.
    pub async fn tag_all(&self, requests: Vec<TagRequest>) -> ScopeResult<Vec<NewVersion>> {
        let names: Vec<String> = requests.iter().map(|r| r.name.clone()).collect();
        let ctx = self.hook_context().with_ids(&names);
        self.hooked(Operation::TagAll, ctx, async {
            let mut seen = BTreeSet::new();
            for name in &names {
                validate_component_name(name)?;
                if !seen.insert(name.as_str()) {
                    return Err(ScopeError::Validation(format!("{name} is listed twice")));
                }
            }
            let mut tagged = Vec::with_capacity(requests.len());
            for request in requests {
                tagged.push(self.tag(request).await?);
            }
            Ok::<_, ScopeError>(tagged)
        })
        .await
        .map_err(|e| e.context("tag-all", names.join(",")))
    }

    /// History of a component, newest first. Follows symlinks.
    pub fn log(&self, id: &BitId) -> ScopeResult<Vec<LogEntry>> {
        self.log_inner(id).map_err(|e| e.context("log", id))
    }

    fn log_inner(&self, id: &BitId) -> ScopeResult<Vec<LogEntry>> {
        let resolver = self.resolver();
        let (key, _) = resolver.resolve_key(id)?;
        let versions = resolver.versions(&key)?;
        if versions.is_empty() {
            return match self.catalog.get(&key) {
                Some(CatalogEntry::Tracked) => Ok(Vec::new()),
                _ => Err(ScopeError::NotFound(id.to_string())),
            };
        }
        versions
            .iter()
            .rev()
            .map(|v| {
                resolver
                    .load_version(&key.version_id(*v))
                    .map(|cv| LogEntry::from(&cv))
            })
            .collect()
    }

    /// Point `scope/name` at `real_scope`. An existing symlink is replaced.
    pub fn symlink(&self, scope: &str, name: &str, real_scope: &str) -> ScopeResult<Symlink> {
        let target = format!("{scope}/{name}");
        self.symlink_inner(scope, name, real_scope)
            .map_err(|e| e.context("symlink", target))
    }

    fn symlink_inner(&self, scope: &str, name: &str, real_scope: &str) -> ScopeResult<Symlink> {
        validate_scope_name(scope)?;
        validate_scope_name(real_scope)?;
        validate_component_name(name)?;
        if scope == real_scope {
            return Err(ScopeError::Validation("a symlink must point at another scope".into()));
        }
        let link = Symlink::new(scope, name, real_scope);
        let outcome = self.store.store(&BitObject::Symlink(link.clone()))?;
        if !self.catalog.link_symlink(&link.key(), real_scope)? {
            debug!(op = "symlink", id = %link.id(), "key has versions, catalog entry kept");
        }
        info!(op = "symlink", id = %link.id(), real_scope, ?outcome, "symlink written");
        Ok(link)
    }

    /// Delete stored versions of a component.
    ///
    /// `id` is resolved through symlinks and names one version, or the whole
    /// history when it carries no version. Removal is refused while another
    /// stored version depends on a version being removed. Once no version is
    /// left, every symlink leading to the component, directly or through
    /// other symlinks, is deleted too. Sources may be shared and are kept.
    pub async fn remove(&self, id: &BitId) -> ScopeResult<RemoveReport> {
        let ctx = self.hook_context().with_ids([id]);
        self.hooked(Operation::Remove, ctx, async {
            let _guard = self.tag_lock.lock().await;
            self.remove_locked(id)
        })
        .await
        .map_err(|e| e.context("remove", id))
    }

    fn remove_locked(&self, id: &BitId) -> ScopeResult<RemoveReport> {
        let resolver = self.resolver();
        let (key, _) = resolver.resolve_key(id)?;
        let versions = resolver.versions(&key)?;
        let doomed: Vec<Version> = match id.version.exact() {
            Some(v) if versions.contains(&v) => vec![v],
            Some(v) => return Err(ScopeError::NotFound(key.version_id(v).to_string())),
            None if versions.is_empty() => return Err(ScopeError::NotFound(id.to_string())),
            None => versions.clone(),
        };
        let doomed_ids: BTreeSet<BitId> = doomed
            .iter()
            .map(|v| key.bit_id(VersionSpec::Exact(*v)))
            .collect();

        let mut links = Vec::new();
        let all = self.store.list("")?.collect::<StoreResult<Vec<ObjectId>>>()?;
        for oid in all {
            let stored = self.store.get(&oid)?;
            if stored.kind == ObjectKind::Source {
                continue;
            }
            match BitObject::from_stored_object(&stored)? {
                BitObject::Version(v) if v.key() == key && doomed.contains(&v.version) => {}
                BitObject::Version(v) => {
                    if let Some(dep) = v.dependencies.iter().find(|d| doomed_ids.contains(*d)) {
                        return Err(ScopeError::Validation(format!(
                            "{} depends on {dep}",
                            v.bit_id()
                        )));
                    }
                }
                BitObject::Symlink(link) => links.push(link),
                BitObject::Source(_) => {}
            }
        }

        let remaining = versions.iter().filter(|v| !doomed.contains(v)).max().copied();
        let mut dead_links: Vec<Symlink> = Vec::new();
        if remaining.is_none() {
            let mut unreachable = BTreeSet::from([key.clone()]);
            loop {
                let before = dead_links.len();
                for link in &links {
                    let target = link.real_component_id().key_in(self.name());
                    if unreachable.contains(&target) && unreachable.insert(link.key()) {
                        dead_links.push(link.clone());
                    }
                }
                if dead_links.len() == before {
                    break;
                }
            }
        }

        // Unlink before deleting so the catalog never names a missing object.
        match remaining {
            Some(latest) => self.catalog.set_latest(&key, latest)?,
            None => {
                self.catalog.unlink(&key)?;
            }
        }
        for link in &dead_links {
            self.catalog.unlink(&link.key())?;
        }
        for v in &doomed {
            self.store.delete(&key.version_id(*v))?;
        }
        for link in &dead_links {
            self.store.delete(&link.id())?;
        }
        info!(
            op = "remove",
            id = %key,
            versions = doomed.len(),
            symlinks = dead_links.len(),
            "component versions removed"
        );
        Ok(RemoveReport {
            versions: doomed_ids.into_iter().collect(),
            symlinks: dead_links.iter().map(Symlink::id).collect(),
        })
    }

    // ---- Remote registry ----

    pub fn add_remote(&self, name: &str, url: &str) -> ScopeResult<RemoteEntry> {
        self.remotes.add(name, url).map_err(|e| e.context("add-remote", name))
    }

    pub async fn remove_remote(&self, name: &str) -> ScopeResult<RemoteEntry> {
        let ctx = self.hook_context().with_remote(name);
        self.hooked(Operation::RemoveRemote, ctx, async { self.remotes.remove(name) })
            .await
            .map_err(|e| e.context("remove-remote", name))
    }

    pub async fn deprecate_remote(&self, name: &str) -> ScopeResult<RemoteEntry> {
        let ctx = self.hook_context().with_remote(name);
        self.hooked(Operation::DeprecateRemote, ctx, async { self.remotes.deprecate(name) })
            .await
            .map_err(|e| e.context("deprecate-remote", name))
    }

    // ---- Network operations ----

    /// Bring components from `remote` into this scope.
    ///
    /// Ids that resolve locally are not fetched. Everything fetched,
    /// missing dependencies included, is verified before the first object
    /// is written, and the whole set is committed as one batch.
    pub async fn import(&self, ids: &[BitId], remote: &Remote) -> ScopeResult<ImportReport> {
        let ctx = self
            .hook_context()
            .with_ids(ids)
            .with_remote(remote.name());
        self.hooked(Operation::Import, ctx, self.import_inner(ids, remote))
            .await
            .map_err(|e| e.context("import", join_ids(ids)))
    }

    async fn import_inner(&self, ids: &[BitId], remote: &Remote) -> ScopeResult<ImportReport> {
        let mut report = ImportReport::default();
        let mut pending = Vec::new();
        for id in ids {
            match self.resolver().resolve(id) {
                Ok(_) => report.already_local.push(id.clone()),
                Err(e) if e.kind() == ErrorKind::NotFound => pending.push(id.clone()),
                Err(e) => return Err(e),
            }
        }
        if pending.is_empty() {
            return Ok(report);
        }

        let remote_scope = self
            .with_retries("import", remote.name(), || remote.hello(self.name()))
            .await?;
        let mut seen: BTreeSet<BitId> = pending.iter().cloned().collect();
        let mut fetched: Vec<FetchedComponent> = Vec::new();

        while !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            let items = self
                .with_retries("import", remote.name(), || remote.fetch(&batch))
                .await?;
            if items.len() != batch.len() {
                return Err(ScopeError::Integrity {
                    id: remote.name().to_string(),
                    reason: format!("asked for {} components, got {}", batch.len(), items.len()),
                });
            }
            for (requested, item) in batch.iter().zip(items) {
                let objects = match item {
                    FetchItem::Found { requested: got, objects } if &got == requested => objects,
                    FetchItem::Found { requested: got, .. } => {
                        return Err(ScopeError::Integrity {
                            id: requested.to_string(),
                            reason: format!("remote answered for {got}"),
                        })
                    }
                    FetchItem::Missing { .. } => {
                        return Err(ScopeError::NotFound(format!("{requested} on remote {}", remote.name())))
                    }
                };
                let component = SyncVerifier::verify_fetched(
                    requested,
                    &remote_scope,
                    objects,
                    self.config.max_symlink_hops,
                )
                .map_err(from_sync)?;

                for dep in &component.version.dependencies {
                    let have = fetched.iter().any(|c| &c.version.bit_id() == dep)
                        || component.version.bit_id() == *dep;
                    if have || !seen.insert(dep.clone()) {
                        continue;
                    }
                    match self.resolver().resolve(dep) {
                        Ok(_) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => pending.push(dep.clone()),
                        Err(e) => return Err(e),
                    }
                }
                debug!(op = "import", id = %component.version.id(), objects = component.objects.len(), "component verified");
                fetched.push(component);
            }
        }

        // Dependencies were fetched after their dependents; write them first.
        let staged: Vec<StoredObject> = fetched
            .iter()
            .rev()
            .flat_map(|c| c.objects.iter().cloned())
            .collect();
        self.store.put_batch(&staged)?;
        for component in fetched.iter().rev() {
            self.catalog
                .link_version(&component.version.key(), component.version.version)?;
            for link in &component.symlinks {
                self.catalog.link_symlink(&link.key(), &link.real_scope)?;
            }
        }
        report.objects_written = staged.len();
        report.imported = fetched.iter().map(|c| c.version.bit_id()).collect();
        info!(op = "import", remote = remote.name(), components = report.imported.len(), "import committed");
        Ok(report)
    }

    /// Send components to `remote`.
    ///
    /// Every id must resolve locally before anything is sent; a failed
    /// check produces no traffic at all.
    pub async fn export(&self, ids: &[BitId], remote: &Remote) -> ScopeResult<ExportReport> {
        let ctx = self
            .hook_context()
            .with_ids(ids)
            .with_remote(remote.name());
        self.hooked(Operation::Export, ctx, self.export_inner(ids, remote))
            .await
            .map_err(|e| e.context("export", join_ids(ids)))
    }

    async fn export_inner(&self, ids: &[BitId], remote: &Remote) -> ScopeResult<ExportReport> {
        if self.remotes.get(remote.name()).is_some_and(|r| r.deprecated) {
            return Err(ScopeError::Validation(format!(
                "remote {} is deprecated",
                remote.name()
            )));
        }

        let resolver = self.resolver();
        let resolved = ids
            .iter()
            .map(|id| resolver.resolve(id))
            .collect::<ScopeResult<Vec<_>>>()?;

        let mut report = ExportReport::default();
        let mut seen = BTreeSet::new();
        let mut objects = Vec::new();
        for id in resolved.iter().flat_map(|r| r.object_ids()) {
            if seen.insert(id.clone()) {
                objects.push(self.store.get(&id)?);
            }
        }
        if objects.is_empty() {
            return Ok(report);
        }

        self.with_retries("export", remote.name(), || remote.hello(self.name()))
            .await?;
        let sent = objects.len();
        let results = self
            .with_retries("export", remote.name(), || remote.put(objects.clone()))
            .await?;
        if results.len() != sent {
            return Err(ScopeError::Integrity {
                id: remote.name().to_string(),
                reason: format!("sent {sent} objects, got {} results", results.len()),
            });
        }
        for result in results {
            match result {
                PutResult::Accepted { id } => report.accepted.push(id),
                PutResult::Rejected { id, reason, detail } => {
                    warn!(op = "export", remote = remote.name(), id = %id, %reason, %detail, "object rejected");
                    report.rejected.push(RejectedObject { id, reason, detail });
                }
            }
        }
        let accepted: BTreeSet<&ObjectId> = report.accepted.iter().collect();
        report.exported = resolved
            .iter()
            .filter(|r| r.object_ids().iter().all(|id| accepted.contains(id)))
            .map(|r| r.version.bit_id())
            .collect();
        info!(
            op = "export",
            remote = remote.name(),
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "export finished"
        );
        Ok(report)
    }

    // ---- Plumbing ----

    pub(crate) fn hook_context(&self) -> HookContext {
        HookContext::new(self.name())
    }

    /// Run `body` between the pre- and post-hooks of `op`.
    async fn hooked<T, F>(&self, op: Operation, ctx: HookContext, body: F) -> ScopeResult<T>
    where
        T: Serialize,
        F: Future<Output = ScopeResult<T>>,
    {
        self.hooks.run_pre(op.pre(), &ctx).await?;
        let out = body.await?;
        let result = serde_json::to_value(&out).unwrap_or(serde_json::Value::Null);
        self.run_post(op.post(), &ctx.with_result(result)).await;
        Ok(out)
    }

    /// Run post-hooks and keep the report if any handler failed.
    pub(crate) async fn run_post(&self, event: HookEvent, ctx: &HookContext) {
        let report = self.hooks.run_post(event, ctx).await;
        if !report.is_clean() {
            self.post_reports.lock().expect("lock poisoned").push(report);
        }
    }

    /// Call the remote, retrying transient failures up to the configured
    /// number of extra attempts.
    async fn with_retries<T, F, Fut>(&self, op: &'static str, remote: &str, mut call: F) -> ScopeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let attempts = self.config.transport_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(op, remote, attempt, error = %e, "transient failure, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(ScopeError::Transient {
                        attempts: attempt,
                        source: e,
                    })
                }
                Err(e) => return Err(from_sync(e)),
            }
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.config.name)
            .field("root", &self.root)
            .finish()
    }
}

fn from_sync(e: SyncError) -> ScopeError {
    match e {
        SyncError::Verification { id, reason } => ScopeError::Integrity {
            id: id.to_string(),
            reason,
        },
        other => ScopeError::Sync(other),
    }
}

fn join_ids(ids: &[BitId]) -> String {
    ids.iter().map(BitId::to_string).collect::<Vec<_>>().join(",")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
