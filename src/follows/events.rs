use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use serde::Serialize;

use super::FollowRelationship;

/// Notifications emitted by the store once a change has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FollowEvent {
    Started(FollowRelationship),
    Stopped(FollowRelationship),
    /// Emitted before every relationship of a user is removed.
    RemovingUserData { user_id: i64 },
    UserDataRemoved { user_id: i64, removed: u64 },
}

impl FollowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FollowEvent::Started(_) => "started_following",
            FollowEvent::Stopped(_) => "stopped_following",
            FollowEvent::RemovingUserData { .. } => "removing_user_data",
            FollowEvent::UserDataRemoved { .. } => "user_data_removed",
        }
    }
}

/// Receives follow events, e.g. an activity recorder or a notifier.
pub trait FollowObserver: Send + Sync {
    fn notify(&self, event: &FollowEvent) -> anyhow::Result<()>;
}

impl<F> FollowObserver for F
where
    F: Fn(&FollowEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &FollowEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Registered observers, called in registration order.
#[derive(Clone, Default)]
pub struct Observers {
    handlers: Vec<Arc<dyn FollowObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn FollowObserver>) {
        self.handlers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Delivers `event` to every observer. A failing or panicking observer is
    /// logged and skipped; the rest still run.
    pub fn dispatch(&self, event: &FollowEvent) {
        for (index, observer) in self.handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.notify(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Follow observer #{} failed on {}: {:?}",
                        index,
                        event.name(),
                        e
                    );
                }
                Err(_) => {
                    tracing::warn!("Follow observer #{} panicked on {}", index, event.name());
                }
            }
        }
    }
}
