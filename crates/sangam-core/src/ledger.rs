//! Wallet ledger: balance, membership grant and the transaction log.
//!
//! Each profile owns one [`Account`] aggregate holding the running balance
//! and the current [`MembershipGrant`]. Every mutation is a single
//! read → decide → conditional-commit unit: the decision is made against the
//! loaded account, and [`LedgerStore::commit_account`] only applies it if the
//! account version has not moved in the meantime. A moved version re-runs the
//! decision against fresh state, so two concurrent debits can never both pass
//! the balance check.
//!
//! The balance is not derived from the transaction log; both are written by
//! the same commit and [`Ledger::audit`] checks that they agree.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  catalog::PlanType,
  notify::{Notifier, dispatch},
  store::{CatalogStore, LedgerStore},
};

/// Conditional commits attempted before giving up on a hot account.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;

// ─── Transactions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
  #[serde(rename = "addMoney")]
  AddMoney,
  #[serde(rename = "subscription")]
  Subscription,
  #[serde(rename = "referral")]
  Referral,
}

impl TransactionKind {
  /// Whether this kind moves money into the wallet.
  pub fn is_credit(self) -> bool { !matches!(self, TransactionKind::Subscription) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
  Success,
  Failed,
}

/// An immutable ledger entry. `amount` is always the positive magnitude; the
/// sign is implied by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub transaction_id: Uuid,
  pub profile_id:     Uuid,
  pub amount:         i64,
  #[serde(rename = "type")]
  pub kind:           TransactionKind,
  pub status:         TransactionStatus,
  pub description:    String,
  pub created_at:     DateTime<Utc>,
}

impl Transaction {
  fn new(
    profile_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    status: TransactionStatus,
    description: &str,
    at: DateTime<Utc>,
  ) -> Self {
    Self {
      transaction_id: Uuid::new_v4(),
      profile_id,
      amount,
      kind,
      status,
      description: description.to_owned(),
      created_at: at,
    }
  }

  /// Effect on the balance: positive for credits, negative for debits, zero
  /// for failed entries.
  pub fn signed_amount(&self) -> i64 {
    match (self.status, self.kind.is_credit()) {
      (TransactionStatus::Failed, _) => 0,
      (TransactionStatus::Success, true) => self.amount,
      (TransactionStatus::Success, false) => -self.amount,
    }
  }
}

// ─── Account aggregate ───────────────────────────────────────────────────────

/// The time-bounded membership entitlement attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipGrant {
  pub membership_id: Uuid,
  pub plan_type:     PlanType,
  pub start_date:    DateTime<Utc>,
  pub end_date:      DateTime<Utc>,
}

impl MembershipGrant {
  /// Expiry is read-time: a grant is active strictly before its end date.
  pub fn is_active(&self, at: DateTime<Utc>) -> bool { self.end_date > at }
}

/// Wallet balance and membership of one profile, updated as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
  pub profile_id: Uuid,
  pub balance:    i64,
  pub grant:      Option<MembershipGrant>,
  /// Bumped by every commit; the compare-and-swap token.
  pub version:    u64,
}

impl Account {
  pub fn active_grant(&self, at: DateTime<Utc>) -> Option<&MembershipGrant> {
    self.grant.as_ref().filter(|g| g.is_active(at))
  }

  fn next(&self) -> Account {
    Account { version: self.version + 1, ..self.clone() }
  }

  fn credited(&self, amount: i64) -> Result<Account> {
    if amount <= 0 {
      return Err(Error::InvalidAmount(amount));
    }
    let mut next = self.next();
    next.balance = self
      .balance
      .checked_add(amount)
      .ok_or_else(|| Error::Validation(format!("credit of {amount} overflows the wallet")))?;
    Ok(next)
  }

  fn debited(&self, amount: i64) -> Result<Account> {
    if amount <= 0 {
      return Err(Error::InvalidAmount(amount));
    }
    if self.balance < amount {
      return Err(Error::InsufficientFunds { balance: self.balance, requested: amount });
    }
    let mut next = self.next();
    next.balance -= amount;
    Ok(next)
  }
}

/// A conditional account replacement plus the transaction that explains it.
#[derive(Debug, Clone)]
pub struct AccountCommit {
  pub expected_version: u64,
  pub account:          Account,
  pub transaction:      Transaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
  Applied,
  /// The stored version differed from the expected one; nothing was written.
  Conflict,
}

// ─── Read models ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipStatus {
  #[serde(flatten)]
  pub grant:     MembershipGrant,
  pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
  pub profile_id:   Uuid,
  pub balance:      i64,
  pub membership:   Option<MembershipStatus>,
  pub transactions: Vec<Transaction>,
}

/// Result of comparing the running balance with the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
  pub profile_id:   Uuid,
  pub balance:      i64,
  pub ledger_total: i64,
  pub consistent:   bool,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Ledger<S> {
  store:    Arc<S>,
  notifier: Arc<dyn Notifier>,
}

impl<S> Clone for Ledger<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), notifier: self.notifier.clone() }
  }
}

impl<S> Ledger<S>
where
  S: LedgerStore + CatalogStore,
{
  pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self { Self { store, notifier } }

  /// Add `amount` to the wallet and log a successful transaction.
  pub async fn credit(
    &self,
    profile_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    description: &str,
  ) -> Result<Transaction> {
    if !kind.is_credit() {
      return Err(Error::Validation(format!("{kind:?} is not a credit")));
    }
    let at = Utc::now();
    let (transaction, ()) = self
      .commit_with_retry(profile_id, |account| {
        let next = account.credited(amount)?;
        let tx = Transaction::new(
          profile_id,
          amount,
          kind,
          TransactionStatus::Success,
          description,
          at,
        );
        Ok((next, tx, ()))
      })
      .await?;

    info!(%profile_id, amount, ?kind, "wallet credited");
    let (title, body) = match kind {
      TransactionKind::Referral => {
        ("Referral bonus", format!("{amount} was added to your wallet for a referral"))
      }
      _ => ("Wallet credited", format!("{amount} was added to your wallet")),
    };
    dispatch(self.notifier.as_ref(), profile_id, title, body);
    Ok(transaction)
  }

  /// Take `amount` out of the wallet.
  ///
  /// The balance check runs against the state being replaced, so the wallet
  /// can never go negative. A refused debit is logged as a failed
  /// transaction and leaves the balance untouched.
  pub async fn debit(
    &self,
    profile_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    description: &str,
  ) -> Result<Transaction> {
    if kind.is_credit() {
      return Err(Error::Validation(format!("{kind:?} is not a debit")));
    }
    let at = Utc::now();
    let result = self
      .commit_with_retry(profile_id, |account| {
        let next = account.debited(amount)?;
        let tx = Transaction::new(
          profile_id,
          amount,
          kind,
          TransactionStatus::Success,
          description,
          at,
        );
        Ok((next, tx, ()))
      })
      .await;

    match result {
      Ok((transaction, ())) => {
        info!(%profile_id, amount, ?kind, "wallet debited");
        Ok(transaction)
      }
      Err(e @ Error::InsufficientFunds { .. }) => {
        self.record_failure(profile_id, amount, kind, description, at).await;
        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  pub async fn purchase_membership(
    &self,
    profile_id: Uuid,
    membership_id: Uuid,
  ) -> Result<MembershipGrant> {
    self.purchase_membership_at(profile_id, membership_id, Utc::now()).await
  }

  /// Buy a plan as of `at`.
  ///
  /// The price debit and the new grant are written by the same commit, so a
  /// refused debit never leaves a grant behind. A grant that is still active
  /// at `at` blocks the purchase; an expired one is replaced.
  pub async fn purchase_membership_at(
    &self,
    profile_id: Uuid,
    membership_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<MembershipGrant> {
    let plan = self
      .store
      .get_plan(membership_id)
      .await
      .map_err(Error::store)?
      .filter(|p| p.active)
      .ok_or(Error::PlanNotFound(membership_id))?;

    let end_date = plan.plan_type.end_from(at)?;
    let description = format!("{} membership", plan_label(plan.plan_type));

    let result = self
      .commit_with_retry(profile_id, |account| {
        if let Some(current) = account.active_grant(at) {
          return Err(Error::MembershipAlreadyActive(current.end_date));
        }
        let grant = MembershipGrant {
          membership_id,
          plan_type: plan.plan_type,
          start_date: at,
          end_date,
        };
        let mut next = account.debited(plan.price)?;
        next.grant = Some(grant.clone());
        let tx = Transaction::new(
          profile_id,
          plan.price,
          TransactionKind::Subscription,
          TransactionStatus::Success,
          &description,
          at,
        );
        Ok((next, tx, grant))
      })
      .await;

    match result {
      Ok((_, grant)) => {
        info!(%profile_id, %membership_id, end = %grant.end_date, "membership purchased");
        dispatch(
          self.notifier.as_ref(),
          profile_id,
          "Membership activated",
          format!("Your {description} is active until {}", grant.end_date.date_naive()),
        );
        Ok(grant)
      }
      Err(e @ Error::InsufficientFunds { .. }) => {
        self
          .record_failure(profile_id, plan.price, TransactionKind::Subscription, &description, at)
          .await;
        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  /// An `addMoney` top-up, labelled "wallet top-up" unless a description
  /// is given.
  pub async fn add_money(
    &self,
    profile_id: Uuid,
    amount: i64,
    description: Option<&str>,
  ) -> Result<Transaction> {
    let description = description
      .map(str::trim)
      .filter(|d| !d.is_empty())
      .unwrap_or("wallet top-up");
    self
      .credit(profile_id, amount, TransactionKind::AddMoney, description)
      .await
  }

  /// One-shot referral credit for the owner of a referral code.
  pub async fn apply_referral_bonus(&self, referrer_id: Uuid, amount: i64) -> Result<Transaction> {
    self
      .credit(referrer_id, amount, TransactionKind::Referral, "referral bonus")
      .await
  }

  /// Balance, membership and transaction history of a profile.
  pub async fn wallet(&self, profile_id: Uuid) -> Result<WalletView> {
    let account = self.load(profile_id).await?;
    let transactions = self.store.transactions(profile_id).await.map_err(Error::store)?;
    let now = Utc::now();
    Ok(WalletView {
      profile_id,
      balance: account.balance,
      membership: account.grant.map(|grant| MembershipStatus {
        is_active: grant.is_active(now),
        grant,
      }),
      transactions,
    })
  }

  /// Compare the running balance with the signed sum of successful
  /// transactions.
  pub async fn audit(&self, profile_id: Uuid) -> Result<Reconciliation> {
    let account = self.load(profile_id).await?;
    let transactions = self.store.transactions(profile_id).await.map_err(Error::store)?;
    let ledger_total = transactions.iter().map(Transaction::signed_amount).sum::<i64>();
    let consistent = ledger_total == account.balance;
    if !consistent {
      warn!(%profile_id, balance = account.balance, ledger_total, "wallet and ledger disagree");
    }
    Ok(Reconciliation { profile_id, balance: account.balance, ledger_total, consistent })
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn load(&self, profile_id: Uuid) -> Result<Account> {
    self
      .store
      .load_account(profile_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProfileNotFound(profile_id))
  }

  /// Run `decide` against the current account and commit its outcome if the
  /// account is still at the version it was read at; otherwise re-read and
  /// decide again.
  async fn commit_with_retry<T, F>(&self, profile_id: Uuid, mut decide: F) -> Result<(Transaction, T)>
  where
    F: FnMut(&Account) -> Result<(Account, Transaction, T)>,
  {
    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
      let current = self.load(profile_id).await?;
      let (account, transaction, out) = decide(&current)?;
      let commit = AccountCommit {
        expected_version: current.version,
        account,
        transaction: transaction.clone(),
      };
      match self.store.commit_account(commit).await.map_err(Error::store)? {
        CommitOutcome::Applied => return Ok((transaction, out)),
        CommitOutcome::Conflict => {
          debug!(%profile_id, attempt, "account version moved, retrying");
        }
      }
    }
    Err(Error::ContentionExhausted(profile_id))
  }

  async fn record_failure(
    &self,
    profile_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    description: &str,
    at: DateTime<Utc>,
  ) {
    let tx = Transaction::new(profile_id, amount, kind, TransactionStatus::Failed, description, at);
    if let Err(e) = self.store.append_transaction(tx).await {
      warn!(%profile_id, error = %e, "could not log failed transaction");
    }
  }
}

fn plan_label(plan_type: PlanType) -> &'static str {
  match plan_type {
    PlanType::Monthly => "monthly",
    PlanType::SixMonths => "6 month",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn account(balance: i64) -> Account {
    Account { profile_id: Uuid::nil(), balance, grant: None, version: 3 }
  }

  #[test]
  fn credit_bumps_version_and_balance() {
    let next = account(10).credited(5).unwrap();
    assert_eq!(next.balance, 15);
    assert_eq!(next.version, 4);
  }

  #[test]
  fn non_positive_amounts_are_rejected() {
    assert!(matches!(account(10).credited(0), Err(Error::InvalidAmount(0))));
    assert!(matches!(account(10).debited(-4), Err(Error::InvalidAmount(-4))));
  }

  #[test]
  fn debit_checks_balance_first() {
    let err = account(100).debited(101).unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds { balance: 100, requested: 101 }));
    assert_eq!(account(100).debited(100).unwrap().balance, 0);
  }

  #[test]
  fn credit_overflow_is_refused() {
    assert!(matches!(account(i64::MAX).credited(1), Err(Error::Validation(_))));
  }

  #[test]
  fn signed_amounts() {
    let at = Utc::now();
    let id = Uuid::nil();
    let sub = Transaction::new(id, 30, TransactionKind::Subscription, TransactionStatus::Success, "", at);
    let add = Transaction::new(id, 50, TransactionKind::AddMoney, TransactionStatus::Success, "", at);
    let failed = Transaction::new(id, 70, TransactionKind::Subscription, TransactionStatus::Failed, "", at);
    assert_eq!(sub.signed_amount(), -30);
    assert_eq!(add.signed_amount(), 50);
    assert_eq!(failed.signed_amount(), 0);
  }

  #[test]
  fn grant_expiry_is_read_time() {
    let start = Utc::now();
    let grant = MembershipGrant {
      membership_id: Uuid::nil(),
      plan_type:     PlanType::Monthly,
      start_date:    start,
      end_date:      start + chrono::Duration::days(30),
    };
    assert!(grant.is_active(start));
    assert!(!grant.is_active(grant.end_date));
  }

  #[test]
  fn transaction_wire_format() {
    let tx = Transaction::new(
      Uuid::nil(),
      300,
      TransactionKind::AddMoney,
      TransactionStatus::Success,
      "top up",
      Utc::now(),
    );
    let json = serde_json::to_value(&tx).unwrap();
    assert_eq!(json["type"], "addMoney");
    assert_eq!(json["status"], "success");
    assert_eq!(json["amount"], 300);
  }
}
