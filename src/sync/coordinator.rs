use crate::identity::{Direction, UserId};
use crate::node::{NodeError, RemoteNodeClient};
use crate::state::{PendingOperations, Snapshot, StateStore};
use crate::sync::merge::merge_connections;
use crate::sync::notifications::{derive_notifications, DEFAULT_RECOVERY_THRESHOLD};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SyncError {
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

/// Stages of one refresh cycle, in execution order. Each stage needs the
/// previous stage to have published; the connections stage needs both
/// directions fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Verifications,
    Memberships,
    Connections,
    Profile,
    Notifications,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Verifications => "verifications",
            Stage::Memberships => "memberships",
            Stage::Connections => "connections",
            Stage::Profile => "profile",
            Stage::Notifications => "notifications",
        };
        f.write_str(name)
    }
}

/// 刷新阶段失败信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    /// Every stage published and notifications were scheduled
    Complete,

    /// A stage failed; later stages did not run
    Failed(StageFailure),

    /// A newer refresh started; this one stopped before publishing `at`
    Superseded { at: Stage },
}

/// What one refresh cycle did. Stage errors end up here instead of being
/// returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub generation: u64,

    /// Pending operation count snapshotted when the cycle started
    pub pending_operations: usize,

    pub published: Vec<Stage>,

    pub skipped: Vec<Stage>,

    pub status: RefreshStatus,
}

impl RefreshReport {
    fn new(generation: u64, pending_operations: usize) -> Self {
        Self {
            generation,
            pending_operations,
            published: Vec::new(),
            skipped: Vec::new(),
            status: RefreshStatus::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, RefreshStatus::Complete)
    }

    pub fn has_published(&self, stage: Stage) -> bool {
        self.published.contains(&stage)
    }
}

enum Abort {
    Failed(Stage, NodeError),
    Superseded(Stage),
}

/// Runs refresh cycles of the local user's state against the node.
///
/// Every refresh takes a new generation number. A cycle whose generation is
/// no longer the latest stops publishing, so overlapping refreshes can never
/// write out of order.
#[derive(Clone)]
pub struct SyncCoordinator {
    node: Arc<dyn RemoteNodeClient>,
    store: StateStore,
    pending: PendingOperations,
    generation: Arc<AtomicU64>,
    recovery_threshold: usize,
    notifications_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncCoordinator {
    pub fn new(node: Arc<dyn RemoteNodeClient>, store: StateStore, pending: PendingOperations) -> Self {
        Self {
            node,
            store,
            pending,
            generation: Arc::new(AtomicU64::new(0)),
            recovery_threshold: DEFAULT_RECOVERY_THRESHOLD,
            notifications_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_recovery_threshold(mut self, threshold: usize) -> Self {
        self.recovery_threshold = threshold;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn pending(&self) -> &PendingOperations {
        &self.pending
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    /// Refreshes the user held by the store
    pub async fn refresh_self(&self) -> Result<RefreshReport, SyncError> {
        let self_id = self.store.self_id().await;
        self.refresh(&self_id).await
    }

    /// Runs one refresh cycle for `self_id`.
    ///
    /// Only an empty id is an error. Node failures stop the cycle, are logged
    /// and show up in the report's status.
    pub async fn refresh(&self, self_id: &UserId) -> Result<RefreshReport, SyncError> {
        if self_id.is_empty() {
            return Err(SyncError::Precondition("id missing".to_string()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // 在周期开始时读取一次，之后不再重新检查
        let pending_total = self.pending.total();

        info!("refreshing user info {} (generation {})", self_id, generation);
        info!("traced operations: {}", pending_total);

        let mut report = RefreshReport::new(generation, pending_total);
        report.status = match self.run_stages(self_id, generation, pending_total, &mut report).await {
            Ok(()) => RefreshStatus::Complete,
            Err(Abort::Superseded(stage)) => {
                info!("refresh generation {} superseded before {}", generation, stage);
                RefreshStatus::Superseded { at: stage }
            }
            Err(Abort::Failed(stage, err)) => {
                error!("refresh generation {} failed at {}: {}", generation, stage, err);
                RefreshStatus::Failed(StageFailure {
                    stage,
                    message: err.to_string(),
                })
            }
        };

        Ok(report)
    }

    async fn run_stages(
        &self,
        self_id: &UserId,
        generation: u64,
        pending_total: usize,
        report: &mut RefreshReport,
    ) -> Result<(), Abort> {
        // 1. verifications, always published
        self.ensure_current(generation, Stage::Verifications)?;
        let verifications = self
            .node
            .get_verifications(self_id)
            .await
            .map_err(|e| Abort::Failed(Stage::Verifications, e))?;
        self.publish(generation, Stage::Verifications, report, |snapshot| {
            snapshot.set_verifications(verifications)
        })
        .await?;

        // 2. memberships, only without pending operations so a group the
        // user just created is not replaced by the node's older list
        if pending_total == 0 {
            self.ensure_current(generation, Stage::Memberships)?;
            let memberships = self
                .node
                .get_memberships(self_id)
                .await
                .map_err(|e| Abort::Failed(Stage::Memberships, e))?;
            self.publish(generation, Stage::Memberships, report, |snapshot| {
                snapshot.replace_memberships(memberships)
            })
            .await?;
        } else {
            debug!("skipping memberships, {} operations pending", pending_total);
            report.skipped.push(Stage::Memberships);
        }

        // 3. both directions, 4. merge once both are in
        self.ensure_current(generation, Stage::Connections)?;
        let (outbound, inbound) = tokio::try_join!(
            self.node.get_connections(self_id, Direction::Outbound),
            self.node.get_connections(self_id, Direction::Inbound),
        )
        .map_err(|e| Abort::Failed(Stage::Connections, e))?;
        debug!("fetched {} outbound and {} inbound connections", outbound.len(), inbound.len());

        let merged = merge_connections(outbound, &inbound);
        self.publish(generation, Stage::Connections, report, |snapshot| {
            snapshot.replace_connections(merged)
        })
        .await?;

        // 5. sponsorship
        self.ensure_current(generation, Stage::Profile)?;
        let profile = self
            .node
            .get_profile(self_id)
            .await
            .map_err(|e| Abort::Failed(Stage::Profile, e))?;
        self.publish(generation, Stage::Profile, report, |snapshot| {
            snapshot.user.sponsored = profile.sponsored
        })
        .await?;

        // 6. fire and forget
        self.spawn_notifications(generation);

        Ok(())
    }

    fn ensure_current(&self, generation: u64, stage: Stage) -> Result<(), Abort> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(Abort::Superseded(stage))
        }
    }

    /// Applies a stage's result, unless a newer generation started. The check
    /// happens under the write lock.
    async fn publish(
        &self,
        generation: u64,
        stage: Stage,
        report: &mut RefreshReport,
        apply: impl FnOnce(&mut Snapshot),
    ) -> Result<(), Abort> {
        let mut snapshot = self.store.write().await;
        if !self.is_current(generation) {
            return Err(Abort::Superseded(stage));
        }

        apply(&mut snapshot);
        debug!("published {} (generation {})", stage, generation);
        report.published.push(stage);
        Ok(())
    }

    fn spawn_notifications(&self, generation: u64) {
        let store = self.store.clone();
        let current = self.generation.clone();
        let threshold = self.recovery_threshold;

        let handle = tokio::spawn(async move {
            let mut snapshot = store.write().await;
            if current.load(Ordering::SeqCst) != generation {
                debug!("dropping notifications of superseded generation {}", generation);
                return;
            }
            let notifications = derive_notifications(&snapshot, threshold);
            debug!("{} notifications (generation {})", notifications.len(), generation);
            snapshot.notifications = notifications;
        });

        let mut task = self
            .notifications_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *task = Some(handle);
    }

    /// Waits for the most recently scheduled notifications refresh
    pub async fn notifications_settled(&self) {
        let handle = self
            .notifications_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("notifications refresh panicked: {}", e);
            }
        }
    }
}
