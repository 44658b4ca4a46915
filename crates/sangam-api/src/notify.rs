//! Delivery collaborators for the server: a bounded notification queue with a
//! persisting worker, and an OTP sender that only logs.

use std::sync::Arc;

use sangam_core::{
  notify::{Notification, Notifier, NotifyError},
  registration::OtpSender,
  store::NotificationStore,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Enqueues notifications without waiting; a full or closed queue is an
/// error the caller logs and drops.
#[derive(Clone)]
pub struct ChannelNotifier {
  tx: mpsc::Sender<Notification>,
}

impl Notifier for ChannelNotifier {
  fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
    self.tx.try_send(notification).map_err(|e| match e {
      mpsc::error::TrySendError::Full(_) => NotifyError("notification queue is full".into()),
      mpsc::error::TrySendError::Closed(_) => NotifyError("notification worker has stopped".into()),
    })
  }
}

/// Start the worker that stores queued notifications in the member inbox.
///
/// The worker exits once every [`ChannelNotifier`] clone has been dropped.
pub fn spawn_worker<S>(store: Arc<S>, capacity: usize) -> (ChannelNotifier, JoinHandle<()>)
where
  S: NotificationStore + 'static,
{
  let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));
  let handle = tokio::spawn(async move {
    while let Some(notification) = rx.recv().await {
      let profile_id = notification.profile_id;
      let title = notification.title.clone();
      match store.record_notification(notification).await {
        Ok(()) => debug!(%profile_id, %title, "notification delivered"),
        Err(e) => warn!(%profile_id, %title, error = %e, "notification could not be stored"),
      }
    }
    info!("notification worker stopped");
  });
  (ChannelNotifier { tx }, handle)
}

/// Writes OTP codes to the log instead of sending an SMS.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOtpSender;

impl OtpSender for LogOtpSender {
  fn send_otp(&self, country_code: &str, mobile_number: &str, code: &str) -> Result<(), NotifyError> {
    info!(%country_code, mobile = %mask(mobile_number), "otp issued");
    debug!(%country_code, %mobile_number, code, "otp code");
    Ok(())
  }
}

/// Keep the last four digits of a phone number.
fn mask(mobile_number: &str) -> String {
  let digits = mobile_number.chars().count();
  mobile_number
    .chars()
    .enumerate()
    .map(|(i, c)| if i + 4 < digits { '*' } else { c })
    .collect()
}
