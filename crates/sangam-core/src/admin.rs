//! Moderation and catalog maintenance.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  catalog::{Community, MembershipPlan, PlanInput, Religion},
  ledger::{Ledger, Transaction},
  profile::Profile,
  store::{CatalogStore, LedgerStore, ProfileStore},
};

pub struct Admin<S> {
  store:  Arc<S>,
  ledger: Ledger<S>,
}

impl<S> Clone for Admin<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), ledger: self.ledger.clone() }
  }
}

impl<S> Admin<S>
where
  S: ProfileStore + CatalogStore + LedgerStore,
{
  pub fn new(store: Arc<S>, ledger: Ledger<S>) -> Self { Self { store, ledger } }

  /// Approve or withdraw approval of a profile. Only approved profiles are
  /// ever shown to other users.
  pub async fn set_admin_verify(&self, profile_id: Uuid, approved: bool) -> Result<Profile> {
    let mut profile = self
      .store
      .get_profile(profile_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProfileNotFound(profile_id))?;
    if profile.admin_verify != approved {
      profile.admin_verify = approved;
      profile.updated_at = Utc::now();
      self.store.save_profile(profile.clone()).await.map_err(Error::store)?;
      info!(%profile_id, approved, "moderation state changed");
    }
    Ok(profile)
  }

  pub async fn upsert_plan(&self, input: PlanInput) -> Result<MembershipPlan> {
    let plan = input.into_plan()?;
    self.store.upsert_plan(plan.clone()).await.map_err(Error::store)?;
    info!(membership_id = %plan.membership_id, price = plan.price, active = plan.active, "plan saved");
    Ok(plan)
  }

  pub async fn list_plans(&self) -> Result<Vec<MembershipPlan>> {
    self.store.list_plans(true).await.map_err(Error::store)
  }

  pub async fn add_religion(&self, name: &str) -> Result<Religion> {
    let name = non_empty("religionName", name)?;
    let religion = self.store.add_religion(name).await.map_err(Error::store)?;
    info!(religion_id = %religion.religion_id, "religion added");
    Ok(religion)
  }

  pub async fn add_community(&self, religion_id: Uuid, name: &str) -> Result<Community> {
    let name = non_empty("name", name)?;
    self
      .store
      .add_community(religion_id, name)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ReligionNotFound(religion_id))
  }

  /// Set the flat referral credit. Zero turns referral bonuses off.
  pub async fn set_referral_bonus(&self, amount: i64) -> Result<()> {
    if amount < 0 {
      return Err(Error::Validation(format!("referral bonus cannot be negative: {amount}")));
    }
    self.store.set_referral_bonus(amount).await.map_err(Error::store)?;
    info!(amount, "referral bonus updated");
    Ok(())
  }

  /// Top up a wallet on behalf of the payment provider.
  pub async fn credit_wallet(
    &self,
    profile_id: Uuid,
    amount: i64,
    description: Option<&str>,
  ) -> Result<Transaction> {
    self.ledger.add_money(profile_id, amount, description).await
  }
}

fn non_empty(field: &str, value: &str) -> Result<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(Error::Validation(format!("{field} is required")));
  }
  Ok(value.to_owned())
}
