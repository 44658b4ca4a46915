//! [`SqliteStore`]: the SQLite implementation of the `sangam-core` store
//! traits.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  path::Path,
};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use sangam_core::{
  catalog::{Community, MembershipPlan, Religion},
  ledger::{Account, AccountCommit, CommitOutcome, Transaction},
  notify::Notification,
  profile::{Credentials, Edges, Profile},
  store::{CatalogStore, LedgerStore, NotificationStore, ProfileStore, Store},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ACCOUNT_COLUMNS, PLAN_COLUMNS, PROFILE_COLUMNS, ProfileRow, RawAccount, RawNotification,
    RawPlan, RawProfile, RawTransaction, TRANSACTION_COLUMNS, TransactionRow, decode_dt,
    decode_uuid, encode_dt, encode_grant, encode_plan_type, encode_uuid, encode_version,
  },
  schema::{MIGRATIONS, SCHEMA, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sangam store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let found: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        conn.execute_batch(SCHEMA)?;
        if found > 0 {
          for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > found) {
            debug!(from = found, to = version, "migrating store schema");
            conn.execute_batch(sql)?;
          }
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one profile where `column` equals `value`.
  async fn profile_where(&self, column: &'static str, value: String) -> Result<Option<Profile>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE {column} = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawProfile::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawProfile::decode).transpose()
  }

  /// Run a single-column id query bound to `id`.
  async fn edge_targets(&self, sql: &'static str, id: Uuid) -> Result<Vec<Uuid>> {
    let id_str = encode_uuid(id);
    let rows: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    rows.iter().map(|s| decode_uuid(s)).collect()
  }

  /// Insert or delete one directed edge; `true` when a row was touched.
  async fn toggle_edge(
    &self,
    insert: &'static str,
    delete: &'static str,
    from: Uuid,
    to: Uuid,
    present: bool,
  ) -> Result<bool> {
    let (from_str, to_str) = (encode_uuid(from), encode_uuid(to));
    let sql = if present { insert } else { delete };
    let touched = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![from_str, to_str])?))
      .await?;
    Ok(touched > 0)
  }

  async fn communities_of(&self, religion_ids: Vec<String>) -> Result<BTreeMap<String, Vec<Community>>> {
    let rows: Vec<(String, String, String)> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; religion_ids.len()].join(", ");
        let sql = format!(
          "SELECT religion_id, community_id, name FROM communities
           WHERE religion_id IN ({placeholders}) ORDER BY name"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(religion_ids.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut out: BTreeMap<String, Vec<Community>> = BTreeMap::new();
    for (religion_id, community_id, name) in rows {
      out
        .entry(religion_id)
        .or_default()
        .push(Community { community_id: decode_uuid(&community_id)?, name });
    }
    Ok(out)
  }
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── ProfileStore impl ───────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  async fn insert_profile(&self, profile: Profile) -> Result<bool> {
    let row = ProfileRow::encode(&profile)?;
    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO profiles (
             profile_id, mobile_number, country_code, email, referral_code,
             is_verified, admin_verify, registered, gender, religion_id,
             community_id, details_json, latitude, longitude, photos_json,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
           ON CONFLICT(mobile_number) DO NOTHING",
          rusqlite::params![
            row.profile_id,
            row.mobile_number,
            row.country_code,
            row.email,
            row.referral_code,
            row.is_verified,
            row.admin_verify,
            row.registered,
            row.gender,
            row.religion_id,
            row.community_id,
            row.details_json,
            row.latitude,
            row.longitude,
            row.photos_json,
            row.created_at,
            row.updated_at,
          ],
        )?;
        Ok(n > 0)
      })
      .await?;
    Ok(inserted)
  }

  async fn save_profile(&self, profile: Profile) -> Result<()> {
    let row = ProfileRow::encode(&profile)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE profiles SET
             email = ?2, is_verified = ?3, admin_verify = ?4, registered = ?5,
             gender = ?6, religion_id = ?7, community_id = ?8, details_json = ?9,
             latitude = ?10, longitude = ?11, photos_json = ?12, updated_at = ?13
           WHERE profile_id = ?1",
          rusqlite::params![
            row.profile_id,
            row.email,
            row.is_verified,
            row.admin_verify,
            row.registered,
            row.gender,
            row.religion_id,
            row.community_id,
            row.details_json,
            row.latitude,
            row.longitude,
            row.photos_json,
            row.updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn finish_registration(&self, profile: Profile, password_hash: String) -> Result<bool> {
    let row = ProfileRow::encode(&profile)?;
    let touched = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE profiles SET
             email = ?2, registered = 1, gender = ?3, religion_id = ?4,
             community_id = ?5, details_json = ?6, latitude = ?7, longitude = ?8,
             updated_at = ?9, password_hash = ?10
           WHERE profile_id = ?1 AND registered = 0",
          rusqlite::params![
            row.profile_id,
            row.email,
            row.gender,
            row.religion_id,
            row.community_id,
            row.details_json,
            row.latitude,
            row.longitude,
            row.updated_at,
            password_hash,
          ],
        )?)
      })
      .await?;
    Ok(touched > 0)
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
    self.profile_where("profile_id", encode_uuid(id)).await
  }

  async fn find_by_mobile(&self, mobile_number: String) -> Result<Option<Profile>> {
    self.profile_where("mobile_number", mobile_number).await
  }

  async fn find_by_email(&self, email: String) -> Result<Option<Profile>> {
    self.profile_where("email", email).await
  }

  async fn find_by_referral_code(&self, code: String) -> Result<Option<Profile>> {
    self.profile_where("referral_code", code).await
  }

  async fn credentials(&self, id: Uuid) -> Result<Option<Credentials>> {
    let id_str = encode_uuid(id);
    type Raw = (Option<String>, Option<String>, Option<String>, u32);
    let raw: Option<Raw> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT password_hash, otp_digest, otp_expires_at, otp_attempts
               FROM profiles WHERE profile_id = ?1",
              rusqlite::params![id_str],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(password_hash, otp_digest, expires, otp_attempts)| {
        Ok(Credentials {
          password_hash,
          otp_digest,
          otp_expires_at: expires.as_deref().map(decode_dt).transpose()?,
          otp_attempts,
        })
      })
      .transpose()
  }

  async fn set_credentials(&self, id: Uuid, credentials: Credentials) -> Result<()> {
    let id_str = encode_uuid(id);
    let expires = credentials.otp_expires_at.map(encode_dt);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE profiles SET
             password_hash = ?2, otp_digest = ?3, otp_expires_at = ?4, otp_attempts = ?5
           WHERE profile_id = ?1",
          rusqlite::params![
            id_str,
            credentials.password_hash,
            credentials.otp_digest,
            expires,
            credentials.otp_attempts,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_otp_miss(&self, id: Uuid, limit: u32) -> Result<bool> {
    let id_str = encode_uuid(id);
    let withdrawn = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE profiles SET otp_attempts = otp_attempts + 1
           WHERE profile_id = ?1 AND otp_digest IS NOT NULL",
          rusqlite::params![id_str],
        )?;
        let cleared = tx.execute(
          "UPDATE profiles SET otp_digest = NULL, otp_expires_at = NULL, otp_attempts = 0
           WHERE profile_id = ?1 AND otp_digest IS NOT NULL AND otp_attempts >= ?2",
          rusqlite::params![id_str, limit],
        )?;
        tx.commit()?;
        Ok(cleared > 0)
      })
      .await?;
    Ok(withdrawn)
  }

  async fn matchable_profiles(&self, religion_id: Uuid) -> Result<Vec<Profile>> {
    let religion_str = encode_uuid(religion_id);
    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles
           WHERE religion_id = ?1 AND is_verified = 1 AND admin_verify = 1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![religion_str], RawProfile::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawProfile::decode).collect()
  }

  // ── Edges ─────────────────────────────────────────────────────────────────

  async fn edges(&self, id: Uuid) -> Result<Edges> {
    let liked = self
      .edge_targets("SELECT liked_id FROM likes WHERE liker_id = ?1", id)
      .await?;
    let blocked = self
      .edge_targets("SELECT blocked_id FROM blocks WHERE blocker_id = ?1", id)
      .await?;
    Ok(Edges { liked: liked.into_iter().collect(), blocked: blocked.into_iter().collect() })
  }

  async fn blockers_of(&self, id: Uuid) -> Result<HashSet<Uuid>> {
    let ids = self
      .edge_targets("SELECT blocker_id FROM blocks WHERE blocked_id = ?1", id)
      .await?;
    Ok(ids.into_iter().collect())
  }

  async fn like_counts(&self, ids: Vec<Uuid>) -> Result<HashMap<Uuid, u64>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let id_strs: Vec<String> = ids.into_iter().map(encode_uuid).collect();
    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; id_strs.len()].join(", ");
        let sql = format!(
          "SELECT liked_id, COUNT(*) FROM likes WHERE liked_id IN ({placeholders})
           GROUP BY liked_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, n)| Ok((decode_uuid(&id)?, n.max(0) as u64)))
      .collect()
  }

  async fn set_like(&self, from: Uuid, to: Uuid, liked: bool) -> Result<bool> {
    self
      .toggle_edge(
        "INSERT OR IGNORE INTO likes (liker_id, liked_id) VALUES (?1, ?2)",
        "DELETE FROM likes WHERE liker_id = ?1 AND liked_id = ?2",
        from,
        to,
        liked,
      )
      .await
  }

  async fn set_block(&self, from: Uuid, to: Uuid, blocked: bool) -> Result<bool> {
    self
      .toggle_edge(
        "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id) VALUES (?1, ?2)",
        "DELETE FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2",
        from,
        to,
        blocked,
      )
      .await
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  async fn list_religions(&self) -> Result<Vec<Religion>> {
    let rows: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT religion_id, religion_name FROM religions ORDER BY religion_name")?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    let mut communities = self
      .communities_of(rows.iter().map(|(id, _)| id.clone()).collect())
      .await?;
    rows
      .into_iter()
      .map(|(id, religion_name)| {
        Ok(Religion {
          religion_id: decode_uuid(&id)?,
          religion_name,
          communities: communities.remove(&id).unwrap_or_default(),
        })
      })
      .collect()
  }

  async fn get_religion(&self, id: Uuid) -> Result<Option<Religion>> {
    let id_str = encode_uuid(id);
    let lookup = id_str.clone();
    let name: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT religion_name FROM religions WHERE religion_id = ?1",
              rusqlite::params![lookup],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    let Some(religion_name) = name else {
      return Ok(None);
    };

    let mut communities = self.communities_of(vec![id_str.clone()]).await?;
    Ok(Some(Religion {
      religion_id: id,
      religion_name,
      communities: communities.remove(&id_str).unwrap_or_default(),
    }))
  }

  async fn add_religion(&self, name: String) -> Result<Religion> {
    let religion = Religion {
      religion_id:   Uuid::new_v4(),
      religion_name: name,
      communities:   Vec::new(),
    };
    let id_str = encode_uuid(religion.religion_id);
    let name = religion.religion_name.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO religions (religion_id, religion_name) VALUES (?1, ?2)",
          rusqlite::params![id_str, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(religion)
  }

  async fn add_community(&self, religion_id: Uuid, name: String) -> Result<Option<Community>> {
    let community = Community { community_id: Uuid::new_v4(), name };
    let religion_str = encode_uuid(religion_id);
    let community_str = encode_uuid(community.community_id);
    let name = community.name.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM religions WHERE religion_id = ?1",
            rusqlite::params![religion_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO communities (community_id, religion_id, name) VALUES (?1, ?2, ?3)",
          rusqlite::params![community_str, religion_str, name],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(inserted.then_some(community))
  }

  async fn list_plans(&self, include_inactive: bool) -> Result<Vec<MembershipPlan>> {
    let raws: Vec<RawPlan> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {PLAN_COLUMNS} FROM membership_plans
           WHERE active = 1 OR ?1 ORDER BY price, membership_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![include_inactive], RawPlan::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPlan::decode).collect()
  }

  async fn get_plan(&self, id: Uuid) -> Result<Option<MembershipPlan>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM membership_plans WHERE membership_id = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawPlan::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPlan::decode).transpose()
  }

  async fn upsert_plan(&self, plan: MembershipPlan) -> Result<()> {
    let id_str = encode_uuid(plan.membership_id);
    let plan_type = encode_plan_type(plan.plan_type);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO membership_plans (membership_id, plan_type, price, active)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (membership_id) DO UPDATE SET
             plan_type = excluded.plan_type,
             price     = excluded.price,
             active    = excluded.active",
          rusqlite::params![id_str, plan_type, plan.price, plan.active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn referral_bonus(&self) -> Result<i64> {
    let amount: Option<i64> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row("SELECT amount FROM referral_config WHERE id = 1", [], |r| r.get(0))
            .optional()?,
        )
      })
      .await?;
    Ok(amount.unwrap_or(0))
  }

  async fn set_referral_bonus(&self, amount: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO referral_config (id, amount) VALUES (1, ?1)
           ON CONFLICT (id) DO UPDATE SET amount = excluded.amount",
          rusqlite::params![amount],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  async fn load_account(&self, profile_id: Uuid) -> Result<Option<Account>> {
    let id_str = encode_uuid(profile_id);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM profiles WHERE profile_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }
        tx.execute(
          "INSERT OR IGNORE INTO accounts (profile_id, balance, version) VALUES (?1, 0, 0)",
          rusqlite::params![id_str],
        )?;
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE profile_id = ?1");
        let raw = tx.query_row(&sql, rusqlite::params![id_str], RawAccount::from_row)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;
    raw.map(RawAccount::decode).transpose()
  }

  async fn commit_account(&self, commit: AccountCommit) -> Result<CommitOutcome> {
    let AccountCommit { expected_version, account, transaction } = commit;
    let id_str = encode_uuid(account.profile_id);
    let expected = encode_version(expected_version)?;
    let next = encode_version(account.version)?;
    let (grant_id, grant_type, grant_start, grant_end) = encode_grant(account.grant.as_ref());
    let balance = account.balance;
    let tx_row = TransactionRow::encode(&transaction);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE accounts SET
             balance = ?2, grant_membership_id = ?3, grant_plan_type = ?4,
             grant_start = ?5, grant_end = ?6, version = ?7
           WHERE profile_id = ?1 AND version = ?8",
          rusqlite::params![
            id_str,
            balance,
            grant_id,
            grant_type,
            grant_start,
            grant_end,
            next,
            expected,
          ],
        )?;
        if updated == 0 {
          return Ok(CommitOutcome::Conflict);
        }
        tx_row.insert(&tx)?;
        tx.commit()?;
        Ok(CommitOutcome::Applied)
      })
      .await?;

    if outcome == CommitOutcome::Conflict {
      debug!(profile_id = %account.profile_id, expected_version, "account commit lost the race");
    }
    Ok(outcome)
  }

  async fn append_transaction(&self, transaction: Transaction) -> Result<()> {
    let row = TransactionRow::encode(&transaction);
    self
      .conn
      .call(move |conn| {
        row.insert(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn transactions(&self, profile_id: Uuid) -> Result<Vec<Transaction>> {
    let id_str = encode_uuid(profile_id);
    let raws: Vec<RawTransaction> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE profile_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawTransaction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawTransaction::decode).collect()
  }

  async fn active_members(&self, ids: Vec<Uuid>, at: DateTime<Utc>) -> Result<HashSet<Uuid>> {
    if ids.is_empty() {
      return Ok(HashSet::new());
    }
    let at_str = encode_dt(at);
    let id_strs: Vec<String> = ids.into_iter().map(encode_uuid).collect();
    let rows: Vec<String> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; id_strs.len()].join(", ");
        let sql = format!(
          "SELECT profile_id FROM accounts
           WHERE grant_end > ? AND profile_id IN ({placeholders})"
        );
        let params = std::iter::once(&at_str).chain(id_strs.iter());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    rows.iter().map(|s| decode_uuid(s)).collect()
  }
}

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  async fn record_notification(&self, notification: Notification) -> Result<()> {
    let id_str = encode_uuid(notification.notification_id);
    let profile_str = encode_uuid(notification.profile_id);
    let at_str = encode_dt(notification.created_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (notification_id, profile_id, title, body, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, profile_str, notification.title, notification.body, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn notifications(&self, profile_id: Uuid) -> Result<Vec<Notification>> {
    let id_str = encode_uuid(profile_id);
    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT notification_id, profile_id, title, body, created_at FROM notifications
           WHERE profile_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawNotification::decode).collect()
  }
}
