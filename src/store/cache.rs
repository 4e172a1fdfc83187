use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RoleId, StoreError, StoreResult, TurnRecord, UserId};

/// Default lifetime of a cached history view
pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(300);

const DEFAULT_MAX_VIEWS: u64 = 10_000;

/// Invalidation hook the pipeline calls after writing history or summaries
#[async_trait]
pub trait HistoryCache: Send + Sync {
    /// Drop every cached read view belonging to `user_id`
    async fn invalidate_user(&self, user_id: UserId);
}

/// Cached read views over a user's history
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HistoryView {
    /// Every turn of the user across all roles
    All { user_id: UserId },
    /// Every turn of the user with one role
    Role { user_id: UserId, role_id: RoleId },
    /// The most recent turns of the user, across roles
    Recent { user_id: UserId },
}

impl HistoryView {
    pub fn user_id(&self) -> UserId {
        match self {
            HistoryView::All { user_id }
            | HistoryView::Role { user_id, .. }
            | HistoryView::Recent { user_id } => *user_id,
        }
    }

    /// Flat key, used in logs
    pub fn cache_key(&self) -> String {
        match self {
            HistoryView::All { user_id } => format!("history:all:{user_id}"),
            HistoryView::Role { user_id, role_id } => format!("history:role:{user_id}:{role_id}"),
            HistoryView::Recent { user_id } => format!("recent:messages:{user_id}"),
        }
    }
}

/// moka-backed cache of history views
///
/// Each user carries an invalidation generation. A load that overlaps an
/// invalidation of its user is served to its caller but never left in the
/// cache, so a snapshot read before a write cannot outlive the write.
#[derive(Clone)]
pub struct HistoryViewCache {
    views: Cache<HistoryView, Arc<Vec<TurnRecord>>>,
    generations: Arc<DashMap<UserId, u64>>,
}

impl HistoryViewCache {
    pub fn new(ttl: Duration) -> Self {
        let views = Cache::builder()
            .max_capacity(DEFAULT_MAX_VIEWS)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self {
            views,
            generations: Arc::new(DashMap::new()),
        }
    }

    fn generation(&self, user_id: UserId) -> u64 {
        self.generations.get(&user_id).map_or(0, |g| *g)
    }

    /// Return the cached view or populate it with `load`
    ///
    /// Concurrent misses for the same view share a single load.
    pub async fn get_or_load<F, Fut>(
        &self,
        view: HistoryView,
        load: F,
    ) -> StoreResult<Arc<Vec<TurnRecord>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<Vec<TurnRecord>>>,
    {
        let key = view.cache_key();
        let user_id = view.user_id();
        let generation = self.generation(user_id);

        let turns = self
            .views
            .try_get_with(view.clone(), async move { load().await.map(Arc::new) })
            .await
            .map_err(|e: Arc<StoreError>| {
                debug!(key = %key, "History view load failed");
                StoreError::Backend(e.to_string())
            })?;

        if self.generation(user_id) != generation {
            // The user was written to while this view loaded
            debug!(key = %key, "Dropping history view that raced an invalidation");
            self.views.invalidate(&view).await;
        }
        Ok(turns)
    }

    pub async fn run_pending_tasks(&self) {
        self.views.run_pending_tasks().await;
    }
}

impl Default for HistoryViewCache {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TTL)
    }
}

#[async_trait]
impl HistoryCache for HistoryViewCache {
    async fn invalidate_user(&self, user_id: UserId) {
        *self.generations.entry(user_id).or_insert(0) += 1;
        match self
            .views
            .invalidate_entries_if(move |view, _| view.user_id() == user_id)
        {
            Ok(_) => debug!(user_id, "Invalidated cached history views"),
            Err(e) => warn!(user_id, error = %e, "Failed to invalidate history views"),
        }
    }
}
