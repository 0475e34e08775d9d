//! Refresh orchestration and the read-only query surface consumers use.
//!
//! The coordinator is the single owner of the committed [`SyncSnapshot`].
//! Every refresh fetches the four tables together and either commits all of
//! them or none; readers only ever see whole snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStore, JsonFileCache, persist_snapshot, restore_snapshot};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::io::{HttpTableSource, TableSource, fetch_all};
use crate::mapping::FieldDictionary;
use crate::model::{
    MaintenanceRecord, Product, RepairRecord, RepairSummary, SpecEntry, SyncSnapshot,
};
use crate::snapshot::build_snapshot;

/// Where the coordinator is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing fetched yet.
    Idle,
    Fetching,
    /// The last refresh committed fresh data.
    Committed,
    /// The last refresh failed and the persisted snapshot was applied.
    FallbackApplied,
    /// The last refresh failed and no usable cache existed.
    Failed,
}

/// Result of one refresh generation.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Committed { generation: u64, products: usize },
    FallbackApplied { generation: u64, error: Arc<SyncError> },
    Failed { generation: u64, error: Arc<SyncError> },
    /// A newer refresh started before this one finished; its result was
    /// discarded.
    Superseded { generation: u64 },
}

impl SyncOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            SyncOutcome::Committed { generation, .. }
            | SyncOutcome::FallbackApplied { generation, .. }
            | SyncOutcome::Failed { generation, .. }
            | SyncOutcome::Superseded { generation } => *generation,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncOutcome::FallbackApplied { error, .. } | SyncOutcome::Failed { error, .. } => {
                Some(error.as_ref())
            }
            _ => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, SyncOutcome::Committed { .. })
    }
}

type RefreshFuture = Shared<BoxFuture<'static, SyncOutcome>>;

struct InFlight {
    generation: u64,
    future: RefreshFuture,
}

struct CoordinatorState {
    snapshot: Arc<SyncSnapshot>,
    phase: SyncState,
    error: Option<Arc<SyncError>>,
    committed_generation: u64,
}

struct Inner {
    source: Arc<dyn TableSource>,
    cache: Arc<dyn CacheStore>,
    dictionary: FieldDictionary,
    state: Mutex<CoordinatorState>,
    latest_generation: AtomicU64,
    persisted_generation: Mutex<u64>,
    in_flight: Mutex<Option<InFlight>>,
}

/// Owns the authoritative snapshot and serialises refreshes.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn new(source: Arc<dyn TableSource>, cache: Arc<dyn CacheStore>) -> Self {
        Self::with_dictionary(source, cache, FieldDictionary::standard())
    }

    pub fn with_dictionary(
        source: Arc<dyn TableSource>,
        cache: Arc<dyn CacheStore>,
        dictionary: FieldDictionary,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache,
                dictionary,
                state: Mutex::new(CoordinatorState {
                    snapshot: Arc::new(SyncSnapshot::default()),
                    phase: SyncState::Idle,
                    error: None,
                    committed_generation: 0,
                }),
                latest_generation: AtomicU64::new(0),
                persisted_generation: Mutex::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// HTTP source plus a JSON file cache, both taken from `config`.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let source = HttpTableSource::new(config)?;
        let cache = JsonFileCache::new(&config.cache_dir);
        Ok(Self::new(Arc::new(source), Arc::new(cache)))
    }

    pub fn dictionary(&self) -> &FieldDictionary {
        &self.inner.dictionary
    }

    /// Installs the persisted snapshot without touching the network.
    ///
    /// Does nothing when a refresh has already committed. Returns the number
    /// of products now visible.
    #[instrument(level = "info", skip_all)]
    pub fn warm_start(&self) -> Result<usize> {
        let restored = restore_snapshot(self.inner.cache.as_ref())?;
        let mut state = self.inner.state.lock();
        if state.committed_generation > 0 {
            debug!("fresh data already committed, keeping it");
            return Ok(state.snapshot.products.len());
        }
        let products = restored.products.len();
        state.snapshot = Arc::new(restored);
        info!(products, "restored cached snapshot");
        Ok(products)
    }

    /// Like [`SyncCoordinator::warm_start`], with a missing cache reported as
    /// `Ok(None)` rather than an error.
    pub fn warm_start_if_cached(&self) -> Result<Option<usize>> {
        match self.warm_start() {
            Ok(products) => Ok(Some(products)),
            Err(SyncError::CacheMiss) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Fetches all four tables and commits them together.
    ///
    /// Joins the refresh already in flight, if any, instead of starting a
    /// second one. Errors are reported through the outcome and
    /// [`SyncCoordinator::error`], never returned.
    pub async fn refresh(&self) -> SyncOutcome {
        let future = {
            let mut slot = self.inner.in_flight.lock();
            let joined = slot
                .as_ref()
                .map(|in_flight| (in_flight.generation, in_flight.future.clone()));
            match joined {
                Some((generation, future)) => {
                    debug!(generation, "joining in-flight refresh");
                    future
                }
                None => self.start(&mut slot),
            }
        };
        future.await
    }

    /// Starts a new generation even when one is in flight. The older
    /// generation's result is discarded when it arrives.
    pub async fn force_refresh(&self) -> SyncOutcome {
        let future = {
            let mut slot = self.inner.in_flight.lock();
            self.start(&mut slot)
        };
        future.await
    }

    fn start(&self, slot: &mut Option<InFlight>) -> RefreshFuture {
        let generation = self.inner.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.lock().phase = SyncState::Fetching;

        let inner = Arc::clone(&self.inner);
        let future = async move {
            let outcome = inner.run(generation).await;
            inner.finish(generation);
            outcome
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            generation,
            future: future.clone(),
        });
        future
    }

    /// The last committed (or restored) snapshot.
    pub fn snapshot(&self) -> Arc<SyncSnapshot> {
        Arc::clone(&self.inner.state.lock().snapshot)
    }

    pub fn state(&self) -> SyncState {
        self.inner.state.lock().phase
    }

    pub fn loading(&self) -> bool {
        self.state() == SyncState::Fetching
    }

    /// Error of the last refresh that did not commit, cleared by the next
    /// commit.
    pub fn error(&self) -> Option<Arc<SyncError>> {
        self.inner.state.lock().error.clone()
    }

    /// Generation of the snapshot currently committed, `0` before the first
    /// commit.
    pub fn committed_generation(&self) -> u64 {
        self.inner.state.lock().committed_generation
    }

    pub fn list_products(&self) -> Vec<Product> {
        self.snapshot().products.clone()
    }

    pub fn get_repairs_by_sn(&self, sn: &str) -> Vec<RepairRecord> {
        self.snapshot().repairs_by_sn(sn).to_vec()
    }

    pub fn get_maintenance_by_sn(&self, sn: &str) -> Vec<MaintenanceRecord> {
        self.snapshot().maintenance_by_sn(sn).to_vec()
    }

    pub fn get_specs_by_sn(&self, sn: &str) -> Vec<SpecEntry> {
        self.snapshot().specs_by_sn(sn).to_vec()
    }

    pub fn get_repair_summary(&self, sn: &str) -> RepairSummary {
        self.snapshot().repair_summary(sn)
    }
}

impl Inner {
    #[instrument(level = "info", skip(self))]
    async fn run(&self, generation: u64) -> SyncOutcome {
        match fetch_all(self.source.as_ref()).await {
            Ok(tables) => self.commit(generation, build_snapshot(&self.dictionary, &tables)),
            Err(error) => self.fall_back(generation, error),
        }
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest_generation.load(Ordering::SeqCst) == generation
    }

    fn commit(&self, generation: u64, snapshot: SyncSnapshot) -> SyncOutcome {
        let snapshot = Arc::new(snapshot);
        {
            let mut state = self.state.lock();
            if !self.is_latest(generation) {
                info!(generation, "discarding result of superseded refresh");
                return SyncOutcome::Superseded { generation };
            }
            state.snapshot = Arc::clone(&snapshot);
            state.phase = SyncState::Committed;
            state.error = None;
            state.committed_generation = generation;
        }

        self.persist(generation, &snapshot);
        info!(
            generation,
            products = snapshot.products.len(),
            repairs = snapshot.repairs.record_count(),
            maintenance = snapshot.maintenance.record_count(),
            specs = snapshot.specs.record_count(),
            "snapshot committed"
        );
        SyncOutcome::Committed {
            generation,
            products: snapshot.products.len(),
        }
    }

    /// Cache writes are best effort; a failure only gets logged.
    fn persist(&self, generation: u64, snapshot: &SyncSnapshot) {
        let mut persisted = self.persisted_generation.lock();
        if *persisted > generation {
            debug!(generation, persisted = *persisted, "newer snapshot already persisted");
            return;
        }
        match persist_snapshot(self.cache.as_ref(), snapshot) {
            Ok(()) => *persisted = generation,
            Err(error) => warn!(generation, %error, "failed to persist snapshot"),
        }
    }

    fn fall_back(&self, generation: u64, error: SyncError) -> SyncOutcome {
        let error = Arc::new(error);
        warn!(generation, %error, kind = ?error.kind(), "refresh failed");
        let restored = restore_snapshot(self.cache.as_ref());

        let mut state = self.state.lock();
        if !self.is_latest(generation) {
            info!(generation, "discarding failure of superseded refresh");
            return SyncOutcome::Superseded { generation };
        }
        state.error = Some(Arc::clone(&error));

        match restored {
            Ok(snapshot) => {
                info!(products = snapshot.products.len(), "applied cached snapshot");
                state.snapshot = Arc::new(snapshot);
                state.phase = SyncState::FallbackApplied;
                SyncOutcome::FallbackApplied { generation, error }
            }
            Err(cache_error) => {
                if matches!(cache_error, SyncError::CacheMiss) {
                    info!("no cached snapshot to fall back to");
                } else {
                    warn!(error = %cache_error, "cached snapshot is unreadable");
                }
                state.phase = SyncState::Failed;
                SyncOutcome::Failed { generation, error }
            }
        }
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.in_flight.lock();
        if slot
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            *slot = None;
        }
    }
}
