use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dbprov_engine::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<ServerConfig>,
    pub run_locks: Arc<RunLocks>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: ServerConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            run_locks: Arc::new(RunLocks::default()),
        }
    }
}

/// At most one active run per project.
#[derive(Debug, Default)]
pub struct RunLocks {
    active: Mutex<HashSet<String>>,
}

impl RunLocks {
    /// Claim `project_id`, or `None` when a run already holds it. The claim
    /// is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>, project_id: &str) -> Option<RunGuard> {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if !active.insert(project_id.to_string()) {
            return None;
        }
        Some(RunGuard {
            locks: Arc::clone(self),
            project_id: project_id.to_string(),
        })
    }

    pub fn is_active(&self, project_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(project_id)
    }
}

/// Held for the duration of a run.
#[derive(Debug)]
pub struct RunGuard {
    locks: Arc<RunLocks>,
    project_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.locks
            .active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.project_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() {
        let locks = Arc::new(RunLocks::default());
        let guard = locks.try_acquire("shop").unwrap();
        assert!(locks.try_acquire("shop").is_none());
        assert!(locks.try_acquire("blog").is_some());
        assert!(locks.is_active("shop"));

        drop(guard);
        assert!(!locks.is_active("shop"));
        assert!(locks.try_acquire("shop").is_some());
    }
}
