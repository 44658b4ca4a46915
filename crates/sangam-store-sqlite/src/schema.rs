//! SQL schema for the Sangam SQLite store.
//!
//! Executed at connection startup; `PRAGMA user_version` records the layout
//! so older files can be brought forward by [`MIGRATIONS`].

/// Layout version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

/// Statements that lift a file at version `n - 1` to version `n`, keyed by
/// `n`. Fresh files get the full [`SCHEMA`] and skip these.
pub const MIGRATIONS: &[(i64, &str)] = &[(
  2,
  "ALTER TABLE profiles ADD COLUMN otp_attempts INTEGER NOT NULL DEFAULT 0;",
)];

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS religions (
    religion_id   TEXT PRIMARY KEY,
    religion_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS communities (
    community_id TEXT PRIMARY KEY,
    religion_id  TEXT NOT NULL REFERENCES religions(religion_id),
    name         TEXT NOT NULL
);

-- gender, religion_id and community_id duplicate fields of details_json so
-- the matching pre-filter can run in SQL.
CREATE TABLE IF NOT EXISTS profiles (
    profile_id     TEXT PRIMARY KEY,
    mobile_number  TEXT NOT NULL UNIQUE,
    country_code   TEXT NOT NULL,
    email          TEXT UNIQUE,
    referral_code  TEXT NOT NULL UNIQUE,
    is_verified    INTEGER NOT NULL DEFAULT 0,
    admin_verify   INTEGER NOT NULL DEFAULT 0,
    registered     INTEGER NOT NULL DEFAULT 0,
    gender         TEXT,            -- 'Male' | 'Female' | 'Other'
    religion_id    TEXT,
    community_id   TEXT,
    details_json   TEXT NOT NULL DEFAULT '{}',
    latitude       REAL,
    longitude      REAL,
    photos_json    TEXT NOT NULL DEFAULT '[]',
    password_hash  TEXT,
    otp_digest     TEXT,
    otp_expires_at TEXT,
    otp_attempts   INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
    liker_id   TEXT NOT NULL REFERENCES profiles(profile_id),
    liked_id   TEXT NOT NULL REFERENCES profiles(profile_id),
    PRIMARY KEY (liker_id, liked_id),
    CHECK (liker_id != liked_id)
);

CREATE TABLE IF NOT EXISTS blocks (
    blocker_id TEXT NOT NULL REFERENCES profiles(profile_id),
    blocked_id TEXT NOT NULL REFERENCES profiles(profile_id),
    PRIMARY KEY (blocker_id, blocked_id),
    CHECK (blocker_id != blocked_id)
);

CREATE TABLE IF NOT EXISTS membership_plans (
    membership_id TEXT PRIMARY KEY,
    plan_type     TEXT NOT NULL,    -- 'monthly' | '6months'
    price         INTEGER NOT NULL CHECK (price > 0),
    active        INTEGER NOT NULL DEFAULT 1
);

-- One row per profile; version is the compare-and-swap token.
CREATE TABLE IF NOT EXISTS accounts (
    profile_id          TEXT PRIMARY KEY REFERENCES profiles(profile_id),
    balance             INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    grant_membership_id TEXT,
    grant_plan_type     TEXT,
    grant_start         TEXT,
    grant_end           TEXT,
    version             INTEGER NOT NULL DEFAULT 0
);

-- Strictly append-only.
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id TEXT PRIMARY KEY,
    profile_id     TEXT NOT NULL REFERENCES profiles(profile_id),
    amount         INTEGER NOT NULL CHECK (amount > 0),
    kind           TEXT NOT NULL,   -- 'addMoney' | 'subscription' | 'referral'
    status         TEXT NOT NULL,   -- 'success' | 'failed'
    description    TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS referral_config (
    id     INTEGER PRIMARY KEY CHECK (id = 1),
    amount INTEGER NOT NULL CHECK (amount >= 0)
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    profile_id      TEXT NOT NULL REFERENCES profiles(profile_id),
    title           TEXT NOT NULL,
    body            TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS profiles_match_idx       ON profiles(religion_id, is_verified, admin_verify);
CREATE INDEX IF NOT EXISTS likes_liked_idx          ON likes(liked_id);
CREATE INDEX IF NOT EXISTS blocks_blocked_idx       ON blocks(blocked_id);
CREATE INDEX IF NOT EXISTS communities_religion_idx ON communities(religion_id);
CREATE INDEX IF NOT EXISTS transactions_profile_idx ON transactions(profile_id, created_at);
CREATE INDEX IF NOT EXISTS notifications_profile_idx ON notifications(profile_id, created_at);
CREATE INDEX IF NOT EXISTS accounts_grant_end_idx   ON accounts(grant_end);
";
