//! Store build orchestration: corpus → read → flatten → project → write →
//! publish.
//!
//! A build writes into a staging file next to the configured store path. On
//! success the staging file replaces the store, is reopened read-only and is
//! published to readers through a watch channel. On failure the staging file
//! is removed and whatever was published before stays published.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fleetsql_document::{Package, read_corpus_paths, read_package};
use fleetsql_shared::{BuildConfig, BuildSummary, FleetSqlError, PackageStats, Result};
use fleetsql_storage::{ReadOnlyStore, Store};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::ecs::{EcsDictionary, FieldDictionary, NoDictionary};
use crate::writer::{ecs_reference, write_package};

// ---------------------------------------------------------------------------
// Published store
// ---------------------------------------------------------------------------

/// Build state. Moves forward only: `Idle → Building → Ready | Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Building,
    Ready,
    Failed(String),
}

type Published = Option<Arc<ReadOnlyStore>>;

/// Write side of the published store. Held by the build task only.
pub struct StorePublisher {
    store: watch::Sender<Published>,
    phase: watch::Sender<BuildPhase>,
}

/// Read side of the published store. Cheap to clone.
#[derive(Clone)]
pub struct StoreHandle {
    store: watch::Receiver<Published>,
    phase: watch::Receiver<BuildPhase>,
}

/// Create an empty publish channel in the `Idle` phase.
pub fn store_channel() -> (StorePublisher, StoreHandle) {
    let (store_tx, store_rx) = watch::channel(None);
    let (phase_tx, phase_rx) = watch::channel(BuildPhase::Idle);
    (
        StorePublisher {
            store: store_tx,
            phase: phase_tx,
        },
        StoreHandle {
            store: store_rx,
            phase: phase_rx,
        },
    )
}

impl StorePublisher {
    fn set_phase(&self, phase: BuildPhase) {
        self.phase.send_replace(phase);
    }

    /// Make `store` the one readers see. The previous store is released here;
    /// readers still holding it keep it alive until they finish.
    fn publish(&self, store: ReadOnlyStore) {
        let previous = self.store.send_replace(Some(Arc::new(store)));
        drop(previous);
    }
}

impl StoreHandle {
    /// Currently published store, if any. Never waits.
    pub fn current(&self) -> Option<Arc<ReadOnlyStore>> {
        self.store.borrow().clone()
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase.borrow().clone()
    }

    /// Wait until the build leaves `Idle`/`Building`.
    pub async fn wait_finished(&mut self) -> BuildPhase {
        let result = self
            .phase
            .wait_for(|p| matches!(p, BuildPhase::Ready | BuildPhase::Failed(_)))
            .await
            .map(|p| p.clone());
        match result {
            Ok(phase) => phase,
            // The publisher is gone; report whatever it left behind.
            Err(_) => self.phase(),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting build status.
pub trait BuildProgress: Send + Sync {
    /// Called once the corpus has been listed.
    fn started(&self, total: usize);
    /// Called after each package is committed.
    fn package_written(&self, name: &str, current: usize, total: usize);
    /// Called when the build completes successfully.
    fn done(&self, summary: &BuildSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BuildProgress for SilentProgress {
    fn started(&self, _total: usize) {}
    fn package_written(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &BuildSummary) {}
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Dictionary for `config`: the ECS directory when configured, else none.
pub fn dictionary_for(config: &BuildConfig) -> Arc<dyn FieldDictionary> {
    match &config.ecs_dir {
        Some(dir) => Arc::new(EcsDictionary::new(dir)),
        None => Arc::new(NoDictionary),
    }
}

/// Staging path used while building `store_path`.
pub fn staging_path(store_path: &Path) -> PathBuf {
    let name = store_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fleetpkg.db".to_string());
    store_path.with_file_name(format!("{name}.building"))
}

/// Run one build and publish the result.
///
/// Any error aborts the whole build: nothing is published, the staging file
/// is removed, and the phase becomes `Failed`.
#[instrument(skip_all, fields(dir = %config.integrations_dir.display()))]
pub async fn build_store(
    config: &BuildConfig,
    dictionary: Arc<dyn FieldDictionary>,
    publisher: &StorePublisher,
    progress: &dyn BuildProgress,
) -> Result<BuildSummary> {
    publisher.set_phase(BuildPhase::Building);
    let staging = staging_path(&config.store_path);

    match build_into(config, &staging, dictionary, progress).await {
        Ok(summary) => {
            let store = match promote(&staging, &config.store_path).await {
                Ok(store) => store,
                Err(e) => return Err(fail(publisher, &staging, e)),
            };
            publisher.publish(store);
            publisher.set_phase(BuildPhase::Ready);
            info!(
                packages = summary.packages,
                processors = summary.totals.processors,
                fields = summary.totals.fields,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "store published"
            );
            progress.done(&summary);
            Ok(summary)
        }
        Err(e) => Err(fail(publisher, &staging, e)),
    }
}

fn fail(publisher: &StorePublisher, staging: &Path, e: FleetSqlError) -> FleetSqlError {
    error!(error = %e, "store build failed");
    if let Err(rm) = std::fs::remove_file(staging) {
        if rm.kind() != std::io::ErrorKind::NotFound {
            error!(path = %staging.display(), error = %rm, "failed to remove staging file");
        }
    }
    publisher.set_phase(BuildPhase::Failed(e.to_string()));
    e
}

async fn build_into(
    config: &BuildConfig,
    staging: &Path,
    dictionary: Arc<dyn FieldDictionary>,
    progress: &dyn BuildProgress,
) -> Result<BuildSummary> {
    let start = Instant::now();

    let root = config.integrations_dir.clone();
    let dirs = blocking(move || read_corpus_paths(&root)).await?;
    let total = dirs.len();
    info!(count = total, "found packages");
    if !dictionary.enabled() {
        warn!("no ECS dictionary configured; ECS field resolution is disabled");
    }
    progress.started(total);

    let store = Store::create(staging).await?;
    store.create_tables().await?;

    let mut totals = PackageStats::default();
    for (i, dir) in dirs.into_iter().enumerate() {
        let dict = dictionary.clone();
        let pkg = blocking(move || load_package(&dir, dict.as_ref())).await?;
        let stats = write_package(&store, &pkg, dictionary.as_ref()).await?;
        totals.merge(&stats);
        progress.package_written(&pkg.dir_name, i + 1, total);
    }

    Ok(BuildSummary {
        packages: total,
        totals,
        elapsed: start.elapsed(),
    })
}

/// Read a package and warm the dictionary for its ECS reference.
fn load_package(dir: &Path, dictionary: &dyn FieldDictionary) -> Result<Package> {
    let pkg = read_package(dir)?;
    if let Some(reference) = ecs_reference(&pkg) {
        dictionary.prepare(reference);
    }
    Ok(pkg)
}

/// Move the finished staging file into place and reopen it read-only.
async fn promote(staging: &Path, store_path: &Path) -> Result<ReadOnlyStore> {
    std::fs::rename(staging, store_path).map_err(|e| FleetSqlError::io(store_path, e))?;
    ReadOnlyStore::open(store_path).await
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FleetSqlError::Task(e.to_string()))?
}

/// Start the one build of this process on a background task.
pub fn spawn_build(
    config: BuildConfig,
    dictionary: Arc<dyn FieldDictionary>,
    publisher: StorePublisher,
) -> JoinHandle<Result<BuildSummary>> {
    tokio::spawn(async move { build_store(&config, dictionary, &publisher, &SilentProgress).await })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_sits_next_to_store() {
        assert_eq!(
            staging_path(Path::new("/data/fleetpkg.db")),
            PathBuf::from("/data/fleetpkg.db.building")
        );
        assert_eq!(staging_path(Path::new("pkgs.db")), PathBuf::from("pkgs.db.building"));
    }

    #[tokio::test]
    async fn channel_starts_idle_and_empty() {
        let (_publisher, handle) = store_channel();
        assert_eq!(handle.phase(), BuildPhase::Idle);
        assert!(handle.current().is_none());
    }

    #[tokio::test]
    async fn failed_build_leaves_nothing_published() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            integrations_dir: tmp.path().join("missing"),
            store_path: tmp.path().join("fleetpkg.db"),
            ecs_dir: None,
        };
        let (publisher, mut handle) = store_channel();
        let result = build_store(&config, Arc::new(NoDictionary), &publisher, &SilentProgress).await;
        assert!(result.is_err());
        assert!(handle.current().is_none());
        assert!(matches!(handle.wait_finished().await, BuildPhase::Failed(_)));
        assert!(!staging_path(&config.store_path).exists());
    }
}
