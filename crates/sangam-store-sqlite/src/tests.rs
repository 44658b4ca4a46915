//! Integration tests for the core services against an in-memory database.

use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use sangam_core::{
  Error,
  admin::Admin,
  catalog::{PlanInput, PlanType},
  eligibility::OtherGenderPolicy,
  ledger::{
    Account, AccountCommit, CommitOutcome, Ledger, Transaction, TransactionKind, TransactionStatus,
  },
  matching::{Matching, Page, SearchCriteria},
  notify::{Notification, Notifier, NotifyError},
  profile::{Coordinates, Gender, Profile, ProfileDetails, ProfileFor},
  registration::{MAX_OTP_ATTEMPTS, OtpSender, PasswordHashing, Registration, RegistrationForm},
  social::Social,
  store::{CatalogStore, LedgerStore, NotificationStore, ProfileStore},
};
use uuid::Uuid;

use crate::{SqliteStore, schema::SCHEMA};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct PlainHashing;

impl PasswordHashing for PlainHashing {
  fn hash(&self, password: &str) -> sangam_core::Result<String> { Ok(format!("plain${password}")) }

  fn verify(&self, password: &str, hash: &str) -> bool { hash == format!("plain${password}") }
}

#[derive(Default)]
struct CapturedOtp(Mutex<Vec<String>>);

impl CapturedOtp {
  fn last(&self) -> String { self.0.lock().unwrap().last().cloned().expect("an otp was sent") }
}

impl OtpSender for CapturedOtp {
  fn send_otp(&self, _: &str, _: &str, code: &str) -> Result<(), NotifyError> {
    self.0.lock().unwrap().push(code.to_owned());
    Ok(())
  }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Notification>>);

impl Recorder {
  fn titles_for(&self, profile_id: Uuid) -> Vec<String> {
    self
      .0
      .lock()
      .unwrap()
      .iter()
      .filter(|n| n.profile_id == profile_id)
      .map(|n| n.title.clone())
      .collect()
  }
}

impl Notifier for Recorder {
  fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
    self.0.lock().unwrap().push(notification);
    Ok(())
  }
}

struct Refusing;

impl Notifier for Refusing {
  fn notify(&self, _: Notification) -> Result<(), NotifyError> {
    Err(NotifyError("queue full".into()))
  }
}

struct World {
  store:        Arc<SqliteStore>,
  ledger:       Ledger<SqliteStore>,
  matching:     Matching<SqliteStore>,
  social:       Social<SqliteStore>,
  registration: Registration<SqliteStore>,
  admin:        Admin<SqliteStore>,
  otp:          Arc<CapturedOtp>,
  notes:        Arc<Recorder>,
}

async fn world() -> World {
  let store = Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));
  let notes = Arc::new(Recorder::default());
  let otp = Arc::new(CapturedOtp::default());
  let ledger = Ledger::new(store.clone(), notes.clone());
  World {
    matching: Matching::new(store.clone(), OtherGenderPolicy::Exclude),
    social: Social::new(store.clone(), notes.clone()),
    registration: Registration::new(
      store.clone(),
      ledger.clone(),
      otp.clone(),
      Arc::new(PlainHashing),
    ),
    admin: Admin::new(store.clone(), ledger.clone()),
    ledger,
    store,
    otp,
    notes,
  }
}

/// A verified, approved, registered profile inserted straight into the store.
async fn member(store: &SqliteStore, gender: Gender, religion: Uuid, first_name: &str) -> Profile {
  let mobile = Uuid::new_v4().simple().to_string()[..10].to_owned();
  let mut p = Profile::skeleton(mobile, "+91".into(), Utc::now());
  p.is_verified = true;
  p.admin_verify = true;
  p.registered = true;
  p.details = ProfileDetails {
    first_name: Some(first_name.into()),
    last_name: Some("Test".into()),
    gender: Some(gender),
    religion_id: Some(religion),
    ..Default::default()
  };
  store.insert_profile(p.clone()).await.unwrap();
  p
}

async fn plan(w: &World, plan_type: PlanType, price: i64) -> Uuid {
  w.admin
    .upsert_plan(PlanInput { membership_id: None, plan_type, price, active: true })
    .await
    .unwrap()
    .membership_id
}

async fn balance(w: &World, id: Uuid) -> i64 { w.ledger.wallet(id).await.unwrap().balance }

fn ids(cards: &[sangam_core::matching::ProfileCard]) -> Vec<Uuid> {
  cards.iter().map(|c| c.profile.profile_id).collect()
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn purchase_debits_price_and_grants_one_month() {
  let w = world().await;
  let r = Uuid::new_v4();
  let buyer = member(&w.store, Gender::Male, r, "Arjun").await;
  let monthly = plan(&w, PlanType::Monthly, 300).await;
  w.admin.credit_wallet(buyer.profile_id, 500, None).await.unwrap();

  let start = Utc::now();
  let grant = w
    .ledger
    .purchase_membership_at(buyer.profile_id, monthly, start)
    .await
    .unwrap();
  assert_eq!(grant.start_date, start);
  assert_eq!(grant.end_date, PlanType::Monthly.end_from(start).unwrap());

  let wallet = w.ledger.wallet(buyer.profile_id).await.unwrap();
  assert_eq!(wallet.balance, 200);
  assert!(wallet.membership.as_ref().is_some_and(|m| m.is_active));
  let subscriptions: Vec<&Transaction> = wallet
    .transactions
    .iter()
    .filter(|t| t.kind == TransactionKind::Subscription)
    .collect();
  assert_eq!(subscriptions.len(), 1);
  assert_eq!(subscriptions[0].amount, 300);
  assert_eq!(subscriptions[0].status, TransactionStatus::Success);
  let titles = w.notes.titles_for(buyer.profile_id);
  assert_eq!(titles.last().map(String::as_str), Some("Membership activated"));
}

#[tokio::test]
async fn month_end_purchase_is_clamped() {
  let w = world().await;
  let buyer = member(&w.store, Gender::Female, Uuid::new_v4(), "Meera").await;
  let monthly = plan(&w, PlanType::Monthly, 100).await;
  w.admin.credit_wallet(buyer.profile_id, 100, None).await.unwrap();

  let at = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
  let grant = w.ledger.purchase_membership_at(buyer.profile_id, monthly, at).await.unwrap();
  assert_eq!(grant.end_date, Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap());
}

#[tokio::test]
async fn active_membership_blocks_second_purchase() {
  let w = world().await;
  let buyer = member(&w.store, Gender::Male, Uuid::new_v4(), "Ravi").await;
  let monthly = plan(&w, PlanType::Monthly, 300).await;
  let half_year = plan(&w, PlanType::SixMonths, 1200).await;
  w.admin.credit_wallet(buyer.profile_id, 2000, None).await.unwrap();

  w.ledger.purchase_membership(buyer.profile_id, monthly).await.unwrap();
  let err = w.ledger.purchase_membership(buyer.profile_id, half_year).await.unwrap_err();
  assert!(matches!(err, Error::MembershipAlreadyActive(_)));
  assert_eq!(balance(&w, buyer.profile_id).await, 1700);
}

#[tokio::test]
async fn expired_membership_can_be_replaced() {
  let w = world().await;
  let buyer = member(&w.store, Gender::Male, Uuid::new_v4(), "Kiran").await;
  let monthly = plan(&w, PlanType::Monthly, 300).await;
  w.admin.credit_wallet(buyer.profile_id, 600, None).await.unwrap();

  let long_ago = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
  w.ledger.purchase_membership_at(buyer.profile_id, monthly, long_ago).await.unwrap();
  let grant = w.ledger.purchase_membership(buyer.profile_id, monthly).await.unwrap();
  assert!(grant.is_active(Utc::now()));
  assert_eq!(balance(&w, buyer.profile_id).await, 0);
}

#[tokio::test]
async fn insufficient_funds_changes_nothing_but_the_log() {
  let w = world().await;
  let buyer = member(&w.store, Gender::Female, Uuid::new_v4(), "Asha").await;
  let monthly = plan(&w, PlanType::Monthly, 300).await;
  w.admin.credit_wallet(buyer.profile_id, 100, None).await.unwrap();

  let err = w.ledger.purchase_membership(buyer.profile_id, monthly).await.unwrap_err();
  assert!(matches!(err, Error::InsufficientFunds { balance: 100, requested: 300 }));

  let wallet = w.ledger.wallet(buyer.profile_id).await.unwrap();
  assert_eq!(wallet.balance, 100);
  assert!(wallet.membership.is_none());
  assert_eq!(wallet.transactions[0].status, TransactionStatus::Failed);
  assert!(w.ledger.audit(buyer.profile_id).await.unwrap().consistent);
}

#[tokio::test]
async fn unknown_or_inactive_plan_is_not_found() {
  let w = world().await;
  let buyer = member(&w.store, Gender::Male, Uuid::new_v4(), "Dev").await;
  w.admin.credit_wallet(buyer.profile_id, 1000, None).await.unwrap();

  let missing = Uuid::new_v4();
  let err = w.ledger.purchase_membership(buyer.profile_id, missing).await.unwrap_err();
  assert!(matches!(err, Error::PlanNotFound(id) if id == missing));

  let retired = plan(&w, PlanType::Monthly, 300).await;
  w.admin
    .upsert_plan(PlanInput {
      membership_id: Some(retired),
      plan_type:     PlanType::Monthly,
      price:         300,
      active:        false,
    })
    .await
    .unwrap();
  let err = w.ledger.purchase_membership(buyer.profile_id, retired).await.unwrap_err();
  assert!(matches!(err, Error::PlanNotFound(_)));
  assert_eq!(balance(&w, buyer.profile_id).await, 1000);
  assert!(w.admin.list_plans().await.unwrap().iter().any(|p| p.membership_id == retired));
}

#[tokio::test]
async fn concurrent_debits_cannot_overdraw() {
  let w = world().await;
  let payer = member(&w.store, Gender::Male, Uuid::new_v4(), "Sam").await;
  w.admin.credit_wallet(payer.profile_id, 100, None).await.unwrap();

  let handles: Vec<_> = (0..2)
    .map(|_| {
      let ledger = w.ledger.clone();
      let id = payer.profile_id;
      tokio::spawn(async move {
        ledger.debit(id, 60, TransactionKind::Subscription, "race").await
      })
    })
    .collect();

  let mut ok = 0;
  let mut refused = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => ok += 1,
      Err(Error::InsufficientFunds { .. }) => refused += 1,
      Err(e) => panic!("unexpected error: {e}"),
    }
  }
  assert_eq!((ok, refused), (1, 1));
  assert_eq!(balance(&w, payer.profile_id).await, 40);
  assert!(w.ledger.audit(payer.profile_id).await.unwrap().consistent);
}

#[tokio::test]
async fn members_top_up_their_own_wallet() {
  let w = world().await;
  let p = member(&w.store, Gender::Female, Uuid::new_v4(), "Asha").await;

  let tx = w.ledger.add_money(p.profile_id, 250, None).await.unwrap();
  assert_eq!(tx.kind, TransactionKind::AddMoney);
  assert_eq!(tx.description, "wallet top-up");
  let tx = w.ledger.add_money(p.profile_id, 50, Some("UPI 4411")).await.unwrap();
  assert_eq!(tx.description, "UPI 4411");
  assert_eq!(balance(&w, p.profile_id).await, 300);

  assert!(matches!(
    w.ledger.add_money(p.profile_id, 0, None).await,
    Err(Error::InvalidAmount(0))
  ));
  assert_eq!(w.notes.titles_for(p.profile_id), vec!["Wallet credited", "Wallet credited"]);
}

#[tokio::test]
async fn stale_commit_is_rejected_without_writing() {
  let w = world().await;
  let p = member(&w.store, Gender::Male, Uuid::new_v4(), "Om").await;
  let account = w.store.load_account(p.profile_id).await.unwrap().unwrap();
  assert_eq!((account.balance, account.version), (0, 0));

  let credit = |amount: i64| Transaction {
    transaction_id: Uuid::new_v4(),
    profile_id: p.profile_id,
    amount,
    kind: TransactionKind::AddMoney,
    status: TransactionStatus::Success,
    description: "direct".into(),
    created_at: Utc::now(),
  };
  let first = AccountCommit {
    expected_version: 0,
    account:          Account { balance: 10, version: 1, ..account.clone() },
    transaction:      credit(10),
  };
  assert_eq!(w.store.commit_account(first).await.unwrap(), CommitOutcome::Applied);

  let stale = AccountCommit {
    expected_version: 0,
    account:          Account { balance: 99, version: 1, ..account },
    transaction:      credit(99),
  };
  assert_eq!(w.store.commit_account(stale).await.unwrap(), CommitOutcome::Conflict);

  let now = w.store.load_account(p.profile_id).await.unwrap().unwrap();
  assert_eq!((now.balance, now.version), (10, 1));
  assert_eq!(w.store.transactions(p.profile_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_profile_has_no_account() {
  let w = world().await;
  let ghost = Uuid::new_v4();
  assert!(w.store.load_account(ghost).await.unwrap().is_none());
  assert!(matches!(w.ledger.wallet(ghost).await, Err(Error::ProfileNotFound(_))));
  assert!(matches!(
    w.admin.credit_wallet(ghost, 10, None).await,
    Err(Error::ProfileNotFound(_))
  ));
}

#[tokio::test]
async fn refused_notification_does_not_undo_credit() {
  let w = world().await;
  let p = member(&w.store, Gender::Female, Uuid::new_v4(), "Nila").await;
  let quiet = Ledger::new(w.store.clone(), Arc::new(Refusing));
  quiet.credit(p.profile_id, 75, TransactionKind::AddMoney, "top up").await.unwrap();
  assert_eq!(balance(&w, p.profile_id).await, 75);
}

#[tokio::test]
async fn ledger_total_tracks_balance() {
  let w = world().await;
  let p = member(&w.store, Gender::Male, Uuid::new_v4(), "Ajay").await;
  let monthly = plan(&w, PlanType::Monthly, 250).await;
  w.admin.credit_wallet(p.profile_id, 200, Some("first")).await.unwrap();
  let _ = w.ledger.purchase_membership(p.profile_id, monthly).await;
  w.admin.credit_wallet(p.profile_id, 100, Some("second")).await.unwrap();
  w.ledger.purchase_membership(p.profile_id, monthly).await.unwrap();
  w.ledger.apply_referral_bonus(p.profile_id, 30).await.unwrap();

  let audit = w.ledger.audit(p.profile_id).await.unwrap();
  assert_eq!(audit.balance, 80);
  assert_eq!(audit.ledger_total, 80);
  assert!(audit.consistent);
}

// ─── Eligibility & matching ──────────────────────────────────────────────────

#[tokio::test]
async fn reference_population_yields_only_the_compatible_candidate() {
  let w = world().await;
  let (r1, r2) = (Uuid::new_v4(), Uuid::new_v4());
  let v = member(&w.store, Gender::Male, r1, "Viewer").await;
  let c1 = member(&w.store, Gender::Female, r1, "Cee").await;
  member(&w.store, Gender::Female, r2, "Other religion").await;
  member(&w.store, Gender::Male, r1, "Same gender").await;

  let cards = w.matching.list_profiles(v.profile_id, Page::default()).await.unwrap();
  assert_eq!(ids(&cards), vec![c1.profile_id]);
}

#[tokio::test]
async fn unapproved_profiles_stay_hidden_until_approved() {
  let w = world().await;
  let r = Uuid::new_v4();
  let v = member(&w.store, Gender::Female, r, "Viewer").await;
  let mut c = member(&w.store, Gender::Male, r, "Pending").await;
  c.admin_verify = false;
  w.store.save_profile(c.clone()).await.unwrap();

  assert!(w.matching.list_profiles(v.profile_id, Page::default()).await.unwrap().is_empty());
  w.admin.set_admin_verify(c.profile_id, true).await.unwrap();
  let cards = w.matching.list_profiles(v.profile_id, Page::default()).await.unwrap();
  assert_eq!(ids(&cards), vec![c.profile_id]);
}

#[tokio::test]
async fn blocking_hides_both_directions_until_unblocked() {
  let w = world().await;
  let r = Uuid::new_v4();
  let a = member(&w.store, Gender::Male, r, "A").await;
  let b = member(&w.store, Gender::Female, r, "B").await;

  w.social.block(a.profile_id, b.profile_id).await.unwrap();
  assert!(w.matching.list_profiles(a.profile_id, Page::default()).await.unwrap().is_empty());
  assert!(w.matching.list_profiles(b.profile_id, Page::default()).await.unwrap().is_empty());

  w.social.unblock(a.profile_id, b.profile_id).await.unwrap();
  assert_eq!(w.matching.list_profiles(b.profile_id, Page::default()).await.unwrap().len(), 1);
  assert!(matches!(w.social.block(a.profile_id, a.profile_id).await, Err(Error::SelfBlock)));
}

#[tokio::test]
async fn listing_is_newest_first_and_paginated() {
  let w = world().await;
  let r = Uuid::new_v4();
  let v = member(&w.store, Gender::Male, r, "Viewer").await;
  let base = Utc::now();
  let mut newest_first = Vec::new();
  for age_days in 0..5 {
    let mut c = Profile::skeleton(format!("80000000{age_days:02}"), "+91".into(), base - Duration::days(age_days));
    c.is_verified = true;
    c.admin_verify = true;
    c.details.gender = Some(Gender::Female);
    c.details.religion_id = Some(r);
    w.store.insert_profile(c.clone()).await.unwrap();
    newest_first.push(c.profile_id);
  }

  let all = w.matching.list_profiles(v.profile_id, Page::default()).await.unwrap();
  assert_eq!(ids(&all), newest_first);

  let page = w
    .matching
    .list_profiles(v.profile_id, Page { limit: Some(2), offset: Some(1) })
    .await
    .unwrap();
  assert_eq!(ids(&page), newest_first[1..3].to_vec());
}

#[tokio::test]
async fn search_without_criteria_returns_nothing() {
  let w = world().await;
  let r = Uuid::new_v4();
  let v = member(&w.store, Gender::Male, r, "Viewer").await;
  member(&w.store, Gender::Female, r, "Priya").await;

  let hits = w
    .matching
    .search_profiles(v.profile_id, SearchCriteria::default(), Page::default())
    .await
    .unwrap();
  assert!(hits.is_empty());

  let only_lat = SearchCriteria { lat: Some(12.9), ..Default::default() };
  let hits = w.matching.search_profiles(v.profile_id, only_lat, Page::default()).await.unwrap();
  assert!(hits.is_empty());
}

#[tokio::test]
async fn search_combines_text_age_and_community() {
  let w = world().await;
  let religion = w.admin.add_religion("Hindu").await.unwrap();
  let community = w.admin.add_community(religion.religion_id, "Iyer").await.unwrap();
  let r = religion.religion_id;
  let v = member(&w.store, Gender::Male, r, "Viewer").await;

  let mut priya = member(&w.store, Gender::Female, r, "Priya").await;
  priya.details.age = Some("27".into());
  priya.details.community_id = Some(community.community_id);
  priya.details.city = Some("Chennai".into());
  w.store.save_profile(priya.clone()).await.unwrap();

  let mut divya = member(&w.store, Gender::Female, r, "Divya").await;
  divya.details.age = Some("35".into());
  divya.details.city = Some("Chennai".into());
  w.store.save_profile(divya.clone()).await.unwrap();

  let by_city = SearchCriteria { text: Some("chennai".into()), ..Default::default() };
  let hits = w.matching.search_profiles(v.profile_id, by_city, Page::default()).await.unwrap();
  assert_eq!(hits.len(), 2);

  let young = SearchCriteria {
    text: Some("CHENNAI".into()),
    max_age: Some(30),
    ..Default::default()
  };
  let hits = w.matching.search_profiles(v.profile_id, young, Page::default()).await.unwrap();
  assert_eq!(ids(&hits), vec![priya.profile_id]);

  let in_community =
    SearchCriteria { community_id: Some(community.community_id), ..Default::default() };
  let hits = w
    .matching
    .search_profiles(v.profile_id, in_community, Page::default())
    .await
    .unwrap();
  assert_eq!(ids(&hits), vec![priya.profile_id]);
}

#[tokio::test]
async fn nearby_needs_a_location_and_respects_the_radius() {
  let w = world().await;
  let r = Uuid::new_v4();
  let v = member(&w.store, Gender::Female, r, "Viewer").await;

  let mut near = member(&w.store, Gender::Male, r, "Near").await;
  near.location = Some(Coordinates { lat: 13.05, lon: 77.60 });
  w.store.save_profile(near.clone()).await.unwrap();
  let mut far = member(&w.store, Gender::Male, r, "Far").await;
  far.location = Some(Coordinates { lat: 13.5, lon: 77.6 });
  w.store.save_profile(far).await.unwrap();
  member(&w.store, Gender::Male, r, "Nowhere").await;

  let err = w
    .matching
    .list_near_profiles(v.profile_id, Some(12.97), None, Page::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LocationRequired));

  let cards = w
    .matching
    .list_near_profiles(v.profile_id, Some(12.9716), Some(77.5946), Page::default())
    .await
    .unwrap();
  assert_eq!(ids(&cards), vec![near.profile_id]);
  let d = cards[0].distance_m.unwrap();
  assert!((8_000.0..9_500.0).contains(&d), "got {d}");
}

#[tokio::test]
async fn premium_flag_follows_active_membership() {
  let w = world().await;
  let r = Uuid::new_v4();
  let v = member(&w.store, Gender::Male, r, "Viewer").await;
  let c = member(&w.store, Gender::Female, r, "Gold").await;
  let monthly = plan(&w, PlanType::Monthly, 100).await;
  w.admin.credit_wallet(c.profile_id, 100, None).await.unwrap();
  w.ledger.purchase_membership(c.profile_id, monthly).await.unwrap();

  let cards = w.matching.list_profiles(v.profile_id, Page::default()).await.unwrap();
  assert!(cards[0].is_premium);
}

// ─── Social ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn likes_toggle_and_are_counted() {
  let w = world().await;
  let r = Uuid::new_v4();
  let a = member(&w.store, Gender::Male, r, "A").await;
  let a2 = member(&w.store, Gender::Male, r, "A2").await;
  let b = member(&w.store, Gender::Female, r, "B").await;

  assert!(w.social.toggle_like(a.profile_id, b.profile_id).await.unwrap().is_liked);
  assert!(w.social.toggle_like(a2.profile_id, b.profile_id).await.unwrap().is_liked);
  assert_eq!(w.notes.titles_for(b.profile_id), vec!["New like", "New like"]);

  let cards = w.matching.list_profiles(a.profile_id, Page::default()).await.unwrap();
  assert!(cards[0].is_liked);
  assert_eq!(cards[0].like_count, 2);
  assert_eq!(ids(&w.matching.liked_profiles(a.profile_id).await.unwrap()), vec![b.profile_id]);

  assert!(!w.social.toggle_like(a.profile_id, b.profile_id).await.unwrap().is_liked);
  let cards = w.matching.list_profiles(a.profile_id, Page::default()).await.unwrap();
  assert!(!cards[0].is_liked);
  assert_eq!(cards[0].like_count, 1);
  assert!(w.matching.liked_profiles(a.profile_id).await.unwrap().is_empty());

  w.social.toggle_like(a.profile_id, b.profile_id).await.unwrap();
  w.admin.set_admin_verify(b.profile_id, false).await.unwrap();
  assert!(w.matching.liked_profiles(a.profile_id).await.unwrap().is_empty());

  assert!(matches!(w.social.toggle_like(a.profile_id, a.profile_id).await, Err(Error::SelfLike)));
  assert!(matches!(
    w.social.toggle_like(a.profile_id, Uuid::new_v4()).await,
    Err(Error::ProfileNotFound(_))
  ));
}

// ─── Registration ────────────────────────────────────────────────────────────

fn form(mobile: &str, email: &str, referral_code: Option<String>) -> RegistrationForm {
  RegistrationForm {
    mobile_number: mobile.into(),
    email: email.into(),
    password: "secret123".into(),
    referral_code,
    lat: Some(19.07),
    lon: Some(72.87),
    details: ProfileDetails {
      profile_for: Some(ProfileFor::MySelf),
      first_name: Some("Neha".into()),
      last_name: Some("Rao".into()),
      gender: Some(Gender::Female),
      ..Default::default()
    },
  }
}

async fn verified(w: &World, mobile: &str) -> Uuid {
  let issued = w.registration.generate_otp(mobile, "+91").await.unwrap();
  assert!(!issued.is_verified);
  let code = w.otp.last();
  w.registration.verify_otp(mobile, "+91", &code).await.unwrap().profile_id
}

#[tokio::test]
async fn otp_flow_verifies_once() {
  let w = world().await;
  w.registration.generate_otp("9000000001", "+91").await.unwrap();
  let code = w.otp.last();
  let wrong = if code == "0000" { "1111" } else { "0000" };

  assert!(matches!(
    w.registration.verify_otp("9000000001", "+91", wrong).await,
    Err(Error::InvalidOtp)
  ));
  let profile = w.registration.verify_otp("9000000001", "+91", &code).await.unwrap();
  assert!(profile.is_verified);
  assert!(matches!(
    w.registration.verify_otp("9000000001", "+91", &code).await,
    Err(Error::InvalidOtp)
  ));

  let again = w.registration.generate_otp("9000000001", "+91").await.unwrap();
  assert_eq!(again.profile_id, profile.profile_id);
  assert!(again.is_verified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_contact_otp_requests_share_one_skeleton() {
  let w = world().await;
  for round in 0..10 {
    let mobile = format!("93000000{round:02}");
    let handles: Vec<_> = (0..2)
      .map(|_| {
        let registration = w.registration.clone();
        let mobile = mobile.clone();
        tokio::spawn(async move { registration.generate_otp(&mobile, "+91").await })
      })
      .collect();
    let mut ids = Vec::new();
    for h in handles {
      ids.push(h.await.unwrap().unwrap().profile_id);
    }
    assert_eq!(ids[0], ids[1]);
    let stored = w.store.find_by_mobile(mobile).await.unwrap().unwrap();
    assert_eq!(stored.profile_id, ids[0]);
  }
}

#[tokio::test]
async fn repeated_wrong_otps_withdraw_the_challenge() {
  let w = world().await;
  let issued = w.registration.generate_otp("9000000010", "+91").await.unwrap();
  let code = w.otp.last();

  // Issued codes are always in 1000..=9999.
  for _ in 1..MAX_OTP_ATTEMPTS {
    assert!(matches!(
      w.registration.verify_otp("9000000010", "+91", "0000").await,
      Err(Error::InvalidOtp)
    ));
  }
  let creds = w.store.credentials(issued.profile_id).await.unwrap().unwrap();
  assert_eq!(creds.otp_attempts, MAX_OTP_ATTEMPTS - 1);

  assert!(w.registration.verify_otp("9000000010", "+91", "0000").await.is_err());
  assert!(matches!(
    w.registration.verify_otp("9000000010", "+91", &code).await,
    Err(Error::InvalidOtp)
  ));
  assert!(!w.store.get_profile(issued.profile_id).await.unwrap().unwrap().is_verified);

  w.registration.generate_otp("9000000010", "+91").await.unwrap();
  let fresh = w.otp.last();
  assert_eq!(w.store.credentials(issued.profile_id).await.unwrap().unwrap().otp_attempts, 0);
  assert!(w.registration.verify_otp("9000000010", "+91", &fresh).await.unwrap().is_verified);
}

#[tokio::test]
async fn stale_otp_is_refused() {
  let w = world().await;
  let issued = w.registration.generate_otp("9000000002", "+91").await.unwrap();
  let code = w.otp.last();
  let late = issued.expires_at + Duration::seconds(1);
  assert!(matches!(
    w.registration.verify_otp_at("9000000002", "+91", &code, late).await,
    Err(Error::OtpExpired)
  ));
}

#[tokio::test]
async fn registration_credits_the_referrer_once() {
  let w = world().await;
  w.admin.set_referral_bonus(50).await.unwrap();
  let referrer = member(&w.store, Gender::Male, Uuid::new_v4(), "Ref").await;

  verified(&w, "9000000003").await;
  let code = referrer.referral_code.to_lowercase();
  let profile = w
    .registration
    .complete_registration(form("9000000003", "Neha@Example.com", Some(code)))
    .await
    .unwrap();
  assert!(profile.registered);
  assert_eq!(profile.email.as_deref(), Some("neha@example.com"));

  let wallet = w.ledger.wallet(referrer.profile_id).await.unwrap();
  assert_eq!(wallet.balance, 50);
  assert_eq!(wallet.transactions.len(), 1);
  assert_eq!(wallet.transactions[0].kind, TransactionKind::Referral);

  let again = w
    .registration
    .complete_registration(form("9000000003", "neha@example.com", Some(referrer.referral_code.clone())))
    .await;
  assert!(matches!(again, Err(Error::AlreadyRegistered)));
  assert_eq!(balance(&w, referrer.profile_id).await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_registrations_credit_the_referrer_once() {
  let w = world().await;
  w.admin.set_referral_bonus(50).await.unwrap();
  let referrer = member(&w.store, Gender::Male, Uuid::new_v4(), "Ref").await;

  for round in 0..10_i64 {
    let mobile = format!("94000000{round:02}");
    let id = verified(&w, &mobile).await;
    let handles: Vec<_> = (0..2)
      .map(|_| {
        let registration = w.registration.clone();
        let form = form(
          &mobile,
          &format!("race{round}@example.com"),
          Some(referrer.referral_code.clone()),
        );
        tokio::spawn(async move { registration.complete_registration(form).await })
      })
      .collect();

    let mut ok = 0;
    let mut refused = 0;
    for h in handles {
      match h.await.unwrap() {
        Ok(_) => ok += 1,
        Err(Error::AlreadyRegistered) => refused += 1,
        Err(e) => panic!("unexpected error: {e}"),
      }
    }
    assert_eq!((ok, refused), (1, 1), "round {round}");
    assert_eq!(balance(&w, referrer.profile_id).await, 50 * (round + 1));

    let creds = w.store.credentials(id).await.unwrap().unwrap();
    assert_eq!(creds.password_hash.as_deref(), Some("plain$secret123"));
  }
  assert!(w.ledger.audit(referrer.profile_id).await.unwrap().consistent);
}

#[tokio::test]
async fn unknown_referral_code_fails_before_any_write() {
  let w = world().await;
  w.admin.set_referral_bonus(50).await.unwrap();
  let id = verified(&w, "9000000004").await;

  let err = w
    .registration
    .complete_registration(form("9000000004", "x@example.com", Some("NOPE1234".into())))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidReferralCode(_)));
  let profile = w.store.get_profile(id).await.unwrap().unwrap();
  assert!(!profile.registered);
  assert!(profile.email.is_none());
}

#[tokio::test]
async fn registration_requires_verification_and_unique_email() {
  let w = world().await;
  w.registration.generate_otp("9000000005", "+91").await.unwrap();
  assert!(matches!(
    w.registration.complete_registration(form("9000000005", "a@example.com", None)).await,
    Err(Error::NotVerified)
  ));

  verified(&w, "9000000006").await;
  w.registration
    .complete_registration(form("9000000006", "taken@example.com", None))
    .await
    .unwrap();
  verified(&w, "9000000007").await;
  assert!(matches!(
    w.registration.complete_registration(form("9000000007", "TAKEN@example.com", None)).await,
    Err(Error::EmailInUse)
  ));
}

#[tokio::test]
async fn login_accepts_mobile_or_email() {
  let w = world().await;
  verified(&w, "9000000008").await;
  let p = w
    .registration
    .complete_registration(form("9000000008", "login@example.com", None))
    .await
    .unwrap();

  assert_eq!(w.registration.login("9000000008", "secret123").await.unwrap().profile_id, p.profile_id);
  assert_eq!(
    w.registration.login("Login@Example.com", "secret123").await.unwrap().profile_id,
    p.profile_id
  );
  assert!(matches!(
    w.registration.login("9000000008", "wrong").await,
    Err(Error::InvalidCredentials)
  ));
  assert!(matches!(
    w.registration.login("nobody@example.com", "secret123").await,
    Err(Error::InvalidCredentials)
  ));
}

#[tokio::test]
async fn password_change_checks_the_current_password() {
  let w = world().await;
  verified(&w, "9000000011").await;
  let p = w
    .registration
    .complete_registration(form("9000000011", "change@example.com", None))
    .await
    .unwrap();

  assert!(matches!(
    w.registration.change_password(p.profile_id, "wrong", "newpass1").await,
    Err(Error::InvalidCredentials)
  ));
  assert!(matches!(
    w.registration.change_password(p.profile_id, "secret123", "abc").await,
    Err(Error::Validation(_))
  ));
  w.registration
    .change_password(p.profile_id, "secret123", "newpass1")
    .await
    .unwrap();

  assert!(w.registration.login("9000000011", "newpass1").await.is_ok());
  assert!(matches!(
    w.registration.login("9000000011", "secret123").await,
    Err(Error::InvalidCredentials)
  ));
}

#[tokio::test]
async fn password_reset_through_otp() {
  let w = world().await;
  verified(&w, "9000000012").await;
  w.registration
    .complete_registration(form("9000000012", "reset@example.com", None))
    .await
    .unwrap();

  assert!(matches!(
    w.registration.request_password_reset("9000000099").await,
    Err(Error::InvalidCredentials)
  ));
  w.registration.request_password_reset("Reset@Example.com").await.unwrap();
  let code = w.otp.last();

  assert!(matches!(
    w.registration.reset_password("9000000012", &code, "abc").await,
    Err(Error::Validation(_))
  ));
  assert!(matches!(
    w.registration.reset_password("9000000012", "0000", "fresh-pass").await,
    Err(Error::InvalidOtp)
  ));
  w.registration
    .reset_password("reset@example.com", &code, "fresh-pass")
    .await
    .unwrap();

  assert!(w.registration.login("reset@example.com", "fresh-pass").await.is_ok());
  assert!(w.registration.login("reset@example.com", "secret123").await.is_err());
  assert!(matches!(
    w.registration.reset_password("9000000012", &code, "other-pass").await,
    Err(Error::InvalidOtp)
  ));
}

#[tokio::test]
async fn reset_is_refused_for_unregistered_numbers() {
  let w = world().await;
  verified(&w, "9000000013").await;
  assert!(matches!(
    w.registration.request_password_reset("9000000013").await,
    Err(Error::InvalidCredentials)
  ));
}

// ─── Admin & notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn catalog_maintenance() {
  let w = world().await;
  let religion = w.admin.add_religion("Jain").await.unwrap();
  w.admin.add_community(religion.religion_id, "Oswal").await.unwrap();
  w.admin.add_community(religion.religion_id, "Agarwal").await.unwrap();

  let stored = w.store.get_religion(religion.religion_id).await.unwrap().unwrap();
  let names: Vec<_> = stored.communities.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, vec!["Agarwal", "Oswal"]);

  assert!(matches!(
    w.admin.add_community(Uuid::new_v4(), "Lost").await,
    Err(Error::ReligionNotFound(_))
  ));
  assert!(matches!(w.admin.set_referral_bonus(-1).await, Err(Error::Validation(_))));
  assert!(matches!(w.admin.add_religion("  ").await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn notifications_are_listed_newest_first() {
  let w = world().await;
  let p = member(&w.store, Gender::Male, Uuid::new_v4(), "Inbox").await;
  let mut older = Notification::new(p.profile_id, "first", "one");
  older.created_at = Utc::now() - Duration::minutes(5);
  w.store.record_notification(older).await.unwrap();
  w.store
    .record_notification(Notification::new(p.profile_id, "second", "two"))
    .await
    .unwrap();

  let inbox = w.store.notifications(p.profile_id).await.unwrap();
  let titles: Vec<_> = inbox.iter().map(|n| n.title.as_str()).collect();
  assert_eq!(titles, vec!["second", "first"]);
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn version_one_files_are_migrated() {
  let path = std::env::temp_dir().join(format!("sangam-{}.db", Uuid::new_v4()));
  {
    let old = SCHEMA.replace("    otp_attempts   INTEGER NOT NULL DEFAULT 0,\n", "");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(&old).unwrap();
    conn.pragma_update(None, "user_version", 1).unwrap();
  }

  let store = SqliteStore::open(&path).await.unwrap();
  let p = member(&store, Gender::Male, Uuid::new_v4(), "Old").await;
  assert_eq!(store.credentials(p.profile_id).await.unwrap().unwrap().otp_attempts, 0);
  drop(store);

  // A second open finds the current version and migrates nothing.
  let store = SqliteStore::open(&path).await.unwrap();
  assert!(store.get_profile(p.profile_id).await.unwrap().is_some());
  drop(store);

  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}
