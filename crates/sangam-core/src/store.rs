//! Storage traits.
//!
//! Backends (e.g. `sangam-store-sqlite`) implement every trait here; the
//! services in this crate and the HTTP layer depend only on the abstractions.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{
  collections::{HashMap, HashSet},
  future::Future,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  catalog::{Community, MembershipPlan, Religion},
  ledger::{Account, AccountCommit, CommitOutcome, Transaction},
  notify::Notification,
  profile::{Credentials, Edges, Profile},
};

/// Common error type shared by every store trait of one backend.
pub trait Store: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Profiles ────────────────────────────────────────────────────────────────

pub trait ProfileStore: Store {
  /// Persist a freshly created profile unless its mobile number is already
  /// taken. Returns `false` when an existing profile kept the number.
  fn insert_profile(
    &self,
    profile: Profile,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Overwrite the document fields of an existing profile (everything except
  /// edges and credentials).
  fn save_profile(
    &self,
    profile: Profile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn find_by_mobile(
    &self,
    mobile_number: String,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn find_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn find_by_referral_code(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Write the completed profile together with its password hash, but only
  /// while the stored profile is still unregistered. Returns `false` when
  /// another registration already completed it; nothing is written then.
  fn finish_registration(
    &self,
    profile: Profile,
    password_hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn credentials(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  fn set_credentials(
    &self,
    id: Uuid,
    credentials: Credentials,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Count one wrong OTP code against the outstanding challenge. Once
  /// `limit` misses have accumulated the challenge is withdrawn and `true`
  /// is returned.
  fn record_otp_miss(
    &self,
    id: Uuid,
    limit: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Profiles that passed both verification gates and share `religion_id`.
  ///
  /// This is the in-storage stage of the eligibility chain; callers still
  /// apply the full predicate in-process.
  fn matchable_profiles(
    &self,
    religion_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  // ── Edges ─────────────────────────────────────────────────────────────────

  /// Outgoing like and block edges of `id`.
  fn edges(&self, id: Uuid) -> impl Future<Output = Result<Edges, Self::Error>> + Send + '_;

  /// Reverse lookup: every profile whose block list contains `id`.
  fn blockers_of(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + '_;

  /// Incoming-like counts for the given profiles. Missing ids count zero.
  fn like_counts(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<HashMap<Uuid, u64>, Self::Error>> + Send + '_;

  /// Add or remove a like edge. Returns `true` when the edge set changed.
  fn set_like(
    &self,
    from: Uuid,
    to: Uuid,
    liked: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Add or remove a block edge. Returns `true` when the edge set changed.
  fn set_block(
    &self,
    from: Uuid,
    to: Uuid,
    blocked: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub trait CatalogStore: Store {
  fn list_religions(&self) -> impl Future<Output = Result<Vec<Religion>, Self::Error>> + Send + '_;

  fn get_religion(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Religion>, Self::Error>> + Send + '_;

  fn add_religion(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Religion, Self::Error>> + Send + '_;

  /// Returns `None` when the religion does not exist.
  fn add_community(
    &self,
    religion_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<Option<Community>, Self::Error>> + Send + '_;

  fn list_plans(
    &self,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<MembershipPlan>, Self::Error>> + Send + '_;

  fn get_plan(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MembershipPlan>, Self::Error>> + Send + '_;

  fn upsert_plan(
    &self,
    plan: MembershipPlan,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The flat amount credited to a referrer. Zero until configured.
  fn referral_bonus(&self) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  fn set_referral_bonus(
    &self,
    amount: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub trait LedgerStore: Store {
  /// Current account aggregate for a profile, created with a zero balance on
  /// first access. `None` if the profile does not exist.
  fn load_account(
    &self,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Conditionally replace the account and append its transaction as one
  /// atomic unit.
  ///
  /// The write only happens if the stored version still equals
  /// `commit.expected_version`; otherwise nothing is written and
  /// [`CommitOutcome::Conflict`] is returned.
  fn commit_account(
    &self,
    commit: AccountCommit,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  /// Append a transaction that does not move the balance (failed attempts).
  fn append_transaction(
    &self,
    transaction: Transaction,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All transactions of a profile, newest first.
  fn transactions(
    &self,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Transaction>, Self::Error>> + Send + '_;

  /// The subset of `ids` holding a grant that is active at `at`.
  fn active_members(
    &self,
    ids: Vec<Uuid>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + '_;
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub trait NotificationStore: Store {
  fn record_notification(
    &self,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// A profile's inbox, newest first.
  fn notifications(
    &self,
    profile_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;
}

/// Everything the services and the HTTP layer need from one backend.
pub trait Backend:
  ProfileStore + CatalogStore + LedgerStore + NotificationStore + 'static
{
}

impl<T> Backend for T where
  T: ProfileStore + CatalogStore + LedgerStore + NotificationStore + 'static
{
}
