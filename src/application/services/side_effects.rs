//! Best-effort work dispatched after a store mutation has committed.
//!
//! Cache writes, invalidations and event publishes never decide the outcome of
//! a request. Each one runs as its own task and every failure ends up in a
//! single `warn!` here instead of at the call site.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::events::EventChannelName;
use crate::infrastructure::cache::CacheError;

/// Why a best-effort effect did not take place.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("event not delivered to {0}")]
    NotPublished(EventChannelName),
}

/// Spawns and tracks best-effort effects.
///
/// Cloning is cheap; clones share the same task set so [`SideEffects::drain`]
/// waits for everything dispatched through any of them.
#[derive(Clone, Default)]
pub struct SideEffects {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `effect` in the background. A failure is logged under `label`.
    pub fn dispatch<F>(&self, label: &'static str, effect: F)
    where
        F: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            match effect.await {
                Ok(()) => debug!(effect = label, "Side effect applied"),
                Err(e) => warn!(effect = label, error = %e, "Best-effort side effect failed"),
            }
        });
    }

    /// Number of effects not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks().len()
    }

    /// Waits for every dispatched effect, up to `timeout`. Effects still
    /// running afterwards are aborted. Returns true if all of them finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut tasks = std::mem::take(&mut *self.tasks());

        let finished = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!("Side effect task ended abnormally: {}", e);
                }
            }
        })
        .await
        .is_ok();

        if !finished {
            warn!("Aborting {} unfinished side effects", tasks.len());
            tasks.abort_all();
        }
        finished
    }
}
