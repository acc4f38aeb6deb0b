use serde::{Deserialize, Serialize};

/// Pipeline stage reported through [`ProgressObserver::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discovery,
    Processing,
    Completed,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Processing => "processing",
            Stage::Completed => "completed",
            Stage::Error => "error",
        }
    }
}

/// Observer for run progress. The default implementation does nothing, so
/// callers that don't care never pay for it.
pub trait ProgressObserver: Send + Sync {
    fn update(&self, current: u64, total: u64, stage: Stage);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn update(&self, _current: u64, _total: u64, _stage: Stage) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    pub(crate) struct CountingProgress {
        pub calls: AtomicU64,
    }

    impl ProgressObserver for CountingProgress {
        fn update(&self, _current: u64, _total: u64, _stage: Stage) {
            self.calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn stage_names_match_wire_labels() {
        assert_eq!(Stage::Discovery.as_str(), "discovery");
        assert_eq!(Stage::Processing.as_str(), "processing");
        assert_eq!(Stage::Completed.as_str(), "completed");
        assert_eq!(Stage::Error.as_str(), "error");
    }

    #[test]
    fn observer_is_object_safe() {
        let counting = Arc::new(CountingProgress::default());
        let observer: Arc<dyn ProgressObserver> = counting.clone();
        observer.update(1, 2, Stage::Processing);
        assert_eq!(counting.calls.load(Ordering::Relaxed), 1);
    }
}
