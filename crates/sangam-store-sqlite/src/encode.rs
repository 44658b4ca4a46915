//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that text ordering equals time ordering.
//! Profile details and photo lists are compact JSON. UUIDs are hyphenated
//! lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use sangam_core::{
  catalog::{MembershipPlan, PlanType},
  ledger::{Account, MembershipGrant, Transaction, TransactionKind, TransactionStatus},
  notify::Notification,
  profile::{Coordinates, Gender, Profile, ProfileDetails},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_version(v: u64) -> Result<i64> {
  i64::try_from(v).map_err(|_| Error::Decode(format!("account version out of range: {v}")))
}

fn decode_version(v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::Decode(format!("negative account version: {v}")))
}

pub fn encode_gender(g: Option<Gender>) -> Option<&'static str> {
  g.map(|g| match g {
    Gender::Male => "Male",
    Gender::Female => "Female",
    Gender::Other => "Other",
  })
}

pub fn encode_plan_type(t: PlanType) -> &'static str {
  match t {
    PlanType::Monthly => "monthly",
    PlanType::SixMonths => "6months",
  }
}

pub fn decode_plan_type(s: &str) -> Result<PlanType> {
  match s {
    "monthly" => Ok(PlanType::Monthly),
    "6months" => Ok(PlanType::SixMonths),
    other => Err(Error::Decode(format!("unknown plan type: {other:?}"))),
  }
}

pub fn encode_tx_kind(k: TransactionKind) -> &'static str {
  match k {
    TransactionKind::AddMoney => "addMoney",
    TransactionKind::Subscription => "subscription",
    TransactionKind::Referral => "referral",
  }
}

fn decode_tx_kind(s: &str) -> Result<TransactionKind> {
  match s {
    "addMoney" => Ok(TransactionKind::AddMoney),
    "subscription" => Ok(TransactionKind::Subscription),
    "referral" => Ok(TransactionKind::Referral),
    other => Err(Error::Decode(format!("unknown transaction type: {other:?}"))),
  }
}

pub fn encode_tx_status(s: TransactionStatus) -> &'static str {
  match s {
    TransactionStatus::Success => "success",
    TransactionStatus::Failed => "failed",
  }
}

fn decode_tx_status(s: &str) -> Result<TransactionStatus> {
  match s {
    "success" => Ok(TransactionStatus::Success),
    "failed" => Ok(TransactionStatus::Failed),
    other => Err(Error::Decode(format!("unknown transaction status: {other:?}"))),
  }
}

// ─── Profiles ────────────────────────────────────────────────────────────────

/// Column list matching [`RawProfile::from_row`].
pub const PROFILE_COLUMNS: &str = "profile_id, mobile_number, country_code, email, referral_code, \
                                   is_verified, admin_verify, registered, details_json, latitude, \
                                   longitude, photos_json, created_at, updated_at";

/// Owned column values of a profile, ready to bind.
pub struct ProfileRow {
  pub profile_id:    String,
  pub mobile_number: String,
  pub country_code:  String,
  pub email:         Option<String>,
  pub referral_code: String,
  pub is_verified:   bool,
  pub admin_verify:  bool,
  pub registered:    bool,
  pub gender:        Option<&'static str>,
  pub religion_id:   Option<String>,
  pub community_id:  Option<String>,
  pub details_json:  String,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
  pub photos_json:   String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl ProfileRow {
  pub fn encode(p: &Profile) -> Result<Self> {
    Ok(Self {
      profile_id:    encode_uuid(p.profile_id),
      mobile_number: p.mobile_number.clone(),
      country_code:  p.country_code.clone(),
      email:         p.email.clone(),
      referral_code: p.referral_code.clone(),
      is_verified:   p.is_verified,
      admin_verify:  p.admin_verify,
      registered:    p.registered,
      gender:        encode_gender(p.details.gender),
      religion_id:   p.details.religion_id.map(encode_uuid),
      community_id:  p.details.community_id.map(encode_uuid),
      details_json:  serde_json::to_string(&p.details)?,
      latitude:      p.location.map(|c| c.lat),
      longitude:     p.location.map(|c| c.lon),
      photos_json:   serde_json::to_string(&p.photos)?,
      created_at:    encode_dt(p.created_at),
      updated_at:    encode_dt(p.updated_at),
    })
  }
}

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub profile_id:    String,
  pub mobile_number: String,
  pub country_code:  String,
  pub email:         Option<String>,
  pub referral_code: String,
  pub is_verified:   bool,
  pub admin_verify:  bool,
  pub registered:    bool,
  pub details_json:  String,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
  pub photos_json:   String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawProfile {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id:    r.get(0)?,
      mobile_number: r.get(1)?,
      country_code:  r.get(2)?,
      email:         r.get(3)?,
      referral_code: r.get(4)?,
      is_verified:   r.get(5)?,
      admin_verify:  r.get(6)?,
      registered:    r.get(7)?,
      details_json:  r.get(8)?,
      latitude:      r.get(9)?,
      longitude:     r.get(10)?,
      photos_json:   r.get(11)?,
      created_at:    r.get(12)?,
      updated_at:    r.get(13)?,
    })
  }

  pub fn decode(self) -> Result<Profile> {
    let details: ProfileDetails = serde_json::from_str(&self.details_json)?;
    let location = match (self.latitude, self.longitude) {
      (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
      _ => None,
    };
    Ok(Profile {
      profile_id: decode_uuid(&self.profile_id)?,
      mobile_number: self.mobile_number,
      country_code: self.country_code,
      email: self.email,
      referral_code: self.referral_code,
      is_verified: self.is_verified,
      admin_verify: self.admin_verify,
      registered: self.registered,
      details,
      location,
      photos: serde_json::from_str(&self.photos_json)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Plans ───────────────────────────────────────────────────────────────────

pub const PLAN_COLUMNS: &str = "membership_id, plan_type, price, active";

pub struct RawPlan {
  pub membership_id: String,
  pub plan_type:     String,
  pub price:         i64,
  pub active:        bool,
}

impl RawPlan {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      membership_id: r.get(0)?,
      plan_type:     r.get(1)?,
      price:         r.get(2)?,
      active:        r.get(3)?,
    })
  }

  pub fn decode(self) -> Result<MembershipPlan> {
    Ok(MembershipPlan {
      membership_id: decode_uuid(&self.membership_id)?,
      plan_type:     decode_plan_type(&self.plan_type)?,
      price:         self.price,
      active:        self.active,
    })
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str =
  "profile_id, balance, grant_membership_id, grant_plan_type, grant_start, grant_end, version";

pub struct RawAccount {
  pub profile_id:          String,
  pub balance:             i64,
  pub grant_membership_id: Option<String>,
  pub grant_plan_type:     Option<String>,
  pub grant_start:         Option<String>,
  pub grant_end:           Option<String>,
  pub version:             i64,
}

impl RawAccount {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id:          r.get(0)?,
      balance:             r.get(1)?,
      grant_membership_id: r.get(2)?,
      grant_plan_type:     r.get(3)?,
      grant_start:         r.get(4)?,
      grant_end:           r.get(5)?,
      version:             r.get(6)?,
    })
  }

  pub fn decode(self) -> Result<Account> {
    let grant = match (
      self.grant_membership_id,
      self.grant_plan_type,
      self.grant_start,
      self.grant_end,
    ) {
      (Some(id), Some(plan_type), Some(start), Some(end)) => Some(MembershipGrant {
        membership_id: decode_uuid(&id)?,
        plan_type:     decode_plan_type(&plan_type)?,
        start_date:    decode_dt(&start)?,
        end_date:      decode_dt(&end)?,
      }),
      (None, None, None, None) => None,
      _ => {
        return Err(Error::Decode(format!(
          "partial membership grant on account {}",
          self.profile_id
        )));
      }
    };
    Ok(Account {
      profile_id: decode_uuid(&self.profile_id)?,
      balance: self.balance,
      grant,
      version: decode_version(self.version)?,
    })
  }
}

/// Bindable grant columns; all `None` when there is no grant.
pub type GrantColumns = (Option<String>, Option<&'static str>, Option<String>, Option<String>);

pub fn encode_grant(grant: Option<&MembershipGrant>) -> GrantColumns {
  match grant {
    Some(g) => (
      Some(encode_uuid(g.membership_id)),
      Some(encode_plan_type(g.plan_type)),
      Some(encode_dt(g.start_date)),
      Some(encode_dt(g.end_date)),
    ),
    None => (None, None, None, None),
  }
}

// ─── Transactions ────────────────────────────────────────────────────────────

pub const TRANSACTION_COLUMNS: &str =
  "transaction_id, profile_id, amount, kind, status, description, created_at";

pub struct TransactionRow {
  pub transaction_id: String,
  pub profile_id:     String,
  pub amount:         i64,
  pub kind:           &'static str,
  pub status:         &'static str,
  pub description:    String,
  pub created_at:     String,
}

impl TransactionRow {
  pub fn encode(t: &Transaction) -> Self {
    Self {
      transaction_id: encode_uuid(t.transaction_id),
      profile_id:     encode_uuid(t.profile_id),
      amount:         t.amount,
      kind:           encode_tx_kind(t.kind),
      status:         encode_tx_status(t.status),
      description:    t.description.clone(),
      created_at:     encode_dt(t.created_at),
    }
  }

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO transactions (
         transaction_id, profile_id, amount, kind, status, description, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        self.transaction_id,
        self.profile_id,
        self.amount,
        self.kind,
        self.status,
        self.description,
        self.created_at,
      ],
    )?;
    Ok(())
  }
}

pub struct RawTransaction {
  pub transaction_id: String,
  pub profile_id:     String,
  pub amount:         i64,
  pub kind:           String,
  pub status:         String,
  pub description:    String,
  pub created_at:     String,
}

impl RawTransaction {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transaction_id: r.get(0)?,
      profile_id:     r.get(1)?,
      amount:         r.get(2)?,
      kind:           r.get(3)?,
      status:         r.get(4)?,
      description:    r.get(5)?,
      created_at:     r.get(6)?,
    })
  }

  pub fn decode(self) -> Result<Transaction> {
    Ok(Transaction {
      transaction_id: decode_uuid(&self.transaction_id)?,
      profile_id:     decode_uuid(&self.profile_id)?,
      amount:         self.amount,
      kind:           decode_tx_kind(&self.kind)?,
      status:         decode_tx_status(&self.status)?,
      description:    self.description,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub struct RawNotification {
  pub notification_id: String,
  pub profile_id:      String,
  pub title:           String,
  pub body:            String,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: r.get(0)?,
      profile_id:      r.get(1)?,
      title:           r.get(2)?,
      body:            r.get(3)?,
      created_at:      r.get(4)?,
    })
  }

  pub fn decode(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      profile_id:      decode_uuid(&self.profile_id)?,
      title:           self.title,
      body:            self.body,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
