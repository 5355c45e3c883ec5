use std::fmt;
use std::sync::Arc;

use crate::Cacheable;
use crate::EntityId;

/// Which listener method a notification must be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Entity value changed
    Update,
    /// Entity status re-confirmed
    StatusConfirmation,
}

impl fmt::Display for NotificationKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            NotificationKind::Update => write!(f, "update"),
            NotificationKind::StatusConfirmation => write!(f, "status_confirmation"),
        }
    }
}

/// An immutable notification: a payload tagged with the method it targets
///
/// For pooled delivery this is the unit placed on the shared task queue; it
/// is created per enqueue and consumed exactly once.
#[derive(Debug, Clone)]
pub struct Notification<P> {
    pub kind: NotificationKind,
    pub payload: P,
}

impl<P> Notification<P> {
    pub fn update(payload: P) -> Self {
        Self {
            kind: NotificationKind::Update,
            payload,
        }
    }

    pub fn status_confirmation(payload: P) -> Self {
        Self {
            kind: NotificationKind::StatusConfirmation,
            payload,
        }
    }
}

impl<T: Cacheable> Notification<Arc<T>> {
    /// Id of the entity snapshot carried by this notification
    pub fn entity_id(&self) -> EntityId {
        self.payload.id()
    }
}
