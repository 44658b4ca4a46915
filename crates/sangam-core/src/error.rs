//! Error types for `sangam-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("profile not found: {0}")]
  ProfileNotFound(Uuid),

  #[error("membership plan not found: {0}")]
  PlanNotFound(Uuid),

  #[error("religion not found: {0}")]
  ReligionNotFound(Uuid),

  #[error("community {community} not found in religion {religion}")]
  CommunityNotFound { religion: Uuid, community: Uuid },

  #[error("membership already active until {0}")]
  MembershipAlreadyActive(DateTime<Utc>),

  #[error("a profile cannot like itself")]
  SelfLike,

  #[error("a profile cannot block itself")]
  SelfBlock,

  #[error("profile is already registered")]
  AlreadyRegistered,

  #[error("email is already in use")]
  EmailInUse,

  #[error("insufficient funds: balance {balance}, requested {requested}")]
  InsufficientFunds { balance: i64, requested: i64 },

  #[error("amount must be positive, got {0}")]
  InvalidAmount(i64),

  #[error("invalid referral code: {0:?}")]
  InvalidReferralCode(String),

  #[error("latitude and longitude are required")]
  LocationRequired,

  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("invalid otp")]
  InvalidOtp,

  #[error("otp expired")]
  OtpExpired,

  #[error("profile is not verified")]
  NotVerified,

  #[error("account {0} kept changing underneath the update")]
  ContentionExhausted(Uuid),

  #[error("password hashing failed: {0}")]
  Hashing(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  Conflict,
  InsufficientFunds,
  InvalidReferralCode,
  LocationRequired,
  Unauthorized,
  Internal,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Validation(_) | Error::InvalidAmount(_) => ErrorKind::Validation,
      Error::ProfileNotFound(_)
      | Error::PlanNotFound(_)
      | Error::ReligionNotFound(_)
      | Error::CommunityNotFound { .. } => ErrorKind::NotFound,
      Error::MembershipAlreadyActive(_)
      | Error::SelfLike
      | Error::SelfBlock
      | Error::AlreadyRegistered
      | Error::EmailInUse => ErrorKind::Conflict,
      Error::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
      Error::InvalidReferralCode(_) => ErrorKind::InvalidReferralCode,
      Error::LocationRequired => ErrorKind::LocationRequired,
      Error::InvalidCredentials
      | Error::InvalidOtp
      | Error::OtpExpired
      | Error::NotVerified => ErrorKind::Unauthorized,
      Error::ContentionExhausted(_) | Error::Hashing(_) | Error::Store(_) => ErrorKind::Internal,
    }
  }

  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }
}
