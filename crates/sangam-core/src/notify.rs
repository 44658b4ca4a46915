//! Best-effort notification delivery.
//!
//! A [`Notifier`] only has to accept a message; it must not block on the
//! actual delivery. Services call it after their own writes have committed
//! and swallow any failure with a warning, so delivery problems never affect
//! the outcome of the triggering operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub notification_id: Uuid,
  pub profile_id:      Uuid,
  pub title:           String,
  pub body:            String,
  pub created_at:      DateTime<Utc>,
}

impl Notification {
  pub fn new(profile_id: Uuid, title: impl Into<String>, body: impl Into<String>) -> Self {
    Self {
      notification_id: Uuid::new_v4(),
      profile_id,
      title: title.into(),
      body: body.into(),
      created_at: Utc::now(),
    }
  }
}

#[derive(Debug, Error)]
#[error("notification not accepted: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
  /// Hand a notification over for delivery. Must return promptly.
  fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Discards everything. Used where no delivery channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
  fn notify(&self, _: Notification) -> Result<(), NotifyError> { Ok(()) }
}

/// Fire-and-forget dispatch: failures are logged and dropped.
pub(crate) fn dispatch(
  notifier: &dyn Notifier,
  profile_id: Uuid,
  title: &str,
  body: impl Into<String>,
) {
  let notification = Notification::new(profile_id, title, body);
  if let Err(e) = notifier.notify(notification) {
    tracing::warn!(%profile_id, title, error = %e, "dropping notification");
  }
}
