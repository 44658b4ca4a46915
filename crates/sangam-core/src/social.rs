//! Likes and blocks between profiles.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  notify::{Notifier, dispatch},
  store::ProfileStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
  pub profile_id: Uuid,
  pub is_liked:   bool,
}

pub struct Social<S> {
  store:    Arc<S>,
  notifier: Arc<dyn Notifier>,
}

impl<S> Clone for Social<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), notifier: self.notifier.clone() }
  }
}

impl<S: ProfileStore> Social<S> {
  pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self { Self { store, notifier } }

  /// Like `target` if not yet liked, otherwise withdraw the like.
  pub async fn toggle_like(&self, viewer_id: Uuid, target_id: Uuid) -> Result<LikeState> {
    if viewer_id == target_id {
      return Err(Error::SelfLike);
    }
    let viewer = self.require(viewer_id).await?;
    self.require(target_id).await?;

    let currently = self
      .store
      .edges(viewer_id)
      .await
      .map_err(Error::store)?
      .liked
      .contains(&target_id);
    let is_liked = !currently;
    let changed = self
      .store
      .set_like(viewer_id, target_id, is_liked)
      .await
      .map_err(Error::store)?;

    if changed && is_liked {
      let who = viewer.details.full_name();
      let who = if who.is_empty() { "Someone".to_owned() } else { who };
      dispatch(self.notifier.as_ref(), target_id, "New like", format!("{who} liked your profile"));
    }
    Ok(LikeState { profile_id: target_id, is_liked })
  }

  pub async fn block(&self, viewer_id: Uuid, target_id: Uuid) -> Result<()> {
    if viewer_id == target_id {
      return Err(Error::SelfBlock);
    }
    self.require(viewer_id).await?;
    self.require(target_id).await?;
    if self
      .store
      .set_block(viewer_id, target_id, true)
      .await
      .map_err(Error::store)?
    {
      info!(blocker = %viewer_id, blocked = %target_id, "profile blocked");
    }
    Ok(())
  }

  pub async fn unblock(&self, viewer_id: Uuid, target_id: Uuid) -> Result<()> {
    if viewer_id == target_id {
      return Err(Error::SelfBlock);
    }
    self
      .store
      .set_block(viewer_id, target_id, false)
      .await
      .map_err(Error::store)?;
    Ok(())
  }

  async fn require(&self, id: Uuid) -> Result<crate::profile::Profile> {
    self
      .store
      .get_profile(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProfileNotFound(id))
  }
}
