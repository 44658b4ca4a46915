//! Sign-up, verification, login and profile maintenance.
//!
//! A profile starts as a skeleton the first time a mobile number requests an
//! OTP, becomes verified when the OTP is confirmed, and is completed by
//! [`Registration::complete_registration`], which is also where a referral
//! code is redeemed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  ledger::Ledger,
  notify::NotifyError,
  profile::{Coordinates, Credentials, Profile, ProfileDetails},
  store::{CatalogStore, LedgerStore, ProfileStore},
};

/// How long an issued OTP stays valid.
pub const OTP_TTL_MINUTES: i64 = 5;

/// Wrong codes tolerated before an outstanding OTP is withdrawn.
pub const MAX_OTP_ATTEMPTS: u32 = 5;

const MIN_PASSWORD_LEN: usize = 6;

// ─── Collaborators ───────────────────────────────────────────────────────────

/// Delivers OTP codes (SMS gateway, etc.). Delivery is best-effort.
pub trait OtpSender: Send + Sync {
  fn send_otp(&self, country_code: &str, mobile_number: &str, code: &str) -> Result<(), NotifyError>;
}

/// Password hashing mechanics, supplied by the transport layer.
pub trait PasswordHashing: Send + Sync {
  fn hash(&self, password: &str) -> Result<String>;
  fn verify(&self, password: &str, hash: &str) -> bool;
}

// ─── Inputs & outputs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
  pub profile_id:  Uuid,
  pub is_verified: bool,
  pub expires_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
  pub mobile_number: String,
  pub email:         String,
  pub password:      String,
  pub referral_code: Option<String>,
  pub lat:           Option<f64>,
  pub lon:           Option<f64>,
  #[serde(flatten)]
  pub details:       ProfileDetails,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
  pub email:   Option<String>,
  pub lat:     Option<f64>,
  pub lon:     Option<f64>,
  #[serde(flatten)]
  pub details: ProfileDetails,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Registration<S> {
  store:  Arc<S>,
  ledger: Ledger<S>,
  otp:    Arc<dyn OtpSender>,
  hasher: Arc<dyn PasswordHashing>,
}

impl<S> Clone for Registration<S> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      ledger: self.ledger.clone(),
      otp:    self.otp.clone(),
      hasher: self.hasher.clone(),
    }
  }
}

impl<S> Registration<S>
where
  S: ProfileStore + CatalogStore + LedgerStore,
{
  pub fn new(
    store: Arc<S>,
    ledger: Ledger<S>,
    otp: Arc<dyn OtpSender>,
    hasher: Arc<dyn PasswordHashing>,
  ) -> Self {
    Self { store, ledger, otp, hasher }
  }

  // ── OTP ───────────────────────────────────────────────────────────────────

  /// Issue a fresh OTP for `mobile_number`, creating the skeleton profile on
  /// first contact.
  pub async fn generate_otp(&self, mobile_number: &str, country_code: &str) -> Result<OtpIssued> {
    let mobile_number = required("mobileNumber", mobile_number)?;
    let country_code = required("countryCode", country_code)?;
    let now = Utc::now();

    let profile = match self.store.find_by_mobile(mobile_number.clone()).await.map_err(Error::store)? {
      Some(p) => p,
      None => self.claim_mobile(&mobile_number, &country_code, now).await?,
    };
    let expires_at = self.issue_otp(&profile, now).await?;

    Ok(OtpIssued {
      profile_id: profile.profile_id,
      is_verified: profile.is_verified,
      expires_at,
    })
  }

  pub async fn verify_otp(&self, mobile_number: &str, country_code: &str, code: &str) -> Result<Profile> {
    self.verify_otp_at(mobile_number, country_code, code, Utc::now()).await
  }

  /// Confirm an OTP as of `at`. A confirmed code cannot be reused.
  pub async fn verify_otp_at(
    &self,
    mobile_number: &str,
    country_code: &str,
    code: &str,
    at: DateTime<Utc>,
  ) -> Result<Profile> {
    let mut profile = self
      .store
      .find_by_mobile(mobile_number.trim().to_owned())
      .await
      .map_err(Error::store)?
      .filter(|p| p.country_code == country_code.trim())
      .ok_or(Error::InvalidOtp)?;

    let credentials = self.redeem_otp(profile.profile_id, code, at).await?;
    self
      .store
      .set_credentials(profile.profile_id, credentials)
      .await
      .map_err(Error::store)?;

    if !profile.is_verified {
      profile.is_verified = true;
      profile.updated_at = at;
      self.store.save_profile(profile.clone()).await.map_err(Error::store)?;
      info!(profile_id = %profile.profile_id, "mobile number verified");
    }
    Ok(profile)
  }

  // ── Registration ──────────────────────────────────────────────────────────

  /// Fill in a verified skeleton and set its password.
  ///
  /// Every check, including the referral code, runs before anything is
  /// written. The profile and its password are then stored by one
  /// conditional write that only succeeds on an unregistered profile, so of
  /// two concurrent submissions exactly one completes and credits the
  /// referrer.
  pub async fn complete_registration(&self, form: RegistrationForm) -> Result<Profile> {
    let mut profile = self
      .store
      .find_by_mobile(form.mobile_number.trim().to_owned())
      .await
      .map_err(Error::store)?
      .filter(|p| p.is_verified)
      .ok_or(Error::NotVerified)?;
    if profile.registered {
      return Err(Error::AlreadyRegistered);
    }

    let details = form.details;
    required("firstName", details.first_name.as_deref().unwrap_or_default())?;
    required("lastName", details.last_name.as_deref().unwrap_or_default())?;
    if details.profile_for.is_none() {
      return Err(Error::Validation("profileFor is required".into()));
    }
    let email = required("email", &form.email)?.to_lowercase();
    check_password(&form.password)?;

    self.ensure_email_free(&email, profile.profile_id).await?;
    self.validate_catalog(&details).await?;
    let location = location(form.lat, form.lon)?;

    let referrer = match form.referral_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
      Some(code) => {
        let referrer = self
          .store
          .find_by_referral_code(code.to_ascii_uppercase())
          .await
          .map_err(Error::store)?
          .filter(|r| r.profile_id != profile.profile_id)
          .ok_or_else(|| Error::InvalidReferralCode(code.to_owned()))?;
        Some(referrer.profile_id)
      }
      None => None,
    };

    let password_hash = self.hasher.hash(&form.password)?;

    profile.email = Some(email);
    profile.details.merge(details);
    profile.location = location.or(profile.location);
    profile.registered = true;
    profile.updated_at = Utc::now();
    if !self
      .store
      .finish_registration(profile.clone(), password_hash)
      .await
      .map_err(Error::store)?
    {
      return Err(Error::AlreadyRegistered);
    }
    info!(profile_id = %profile.profile_id, referred = referrer.is_some(), "registration completed");

    if let Some(referrer_id) = referrer {
      let bonus = self.store.referral_bonus().await.map_err(Error::store)?;
      if bonus > 0
        && let Err(e) = self.ledger.apply_referral_bonus(referrer_id, bonus).await
      {
        error!(%referrer_id, bonus, error = %e, "referral bonus was not credited");
      }
    }

    Ok(profile)
  }

  /// Authenticate with a mobile number or email and a password.
  pub async fn login(&self, mobile_or_email: &str, password: &str) -> Result<Profile> {
    let profile = self
      .find_by_login(mobile_or_email)
      .await?
      .ok_or(Error::InvalidCredentials)?;

    let credentials = self.credentials(profile.profile_id).await?;
    match credentials.password_hash {
      Some(hash) if self.hasher.verify(password, &hash) => Ok(profile),
      _ => Err(Error::InvalidCredentials),
    }
  }

  // ── Passwords ─────────────────────────────────────────────────────────────

  /// Replace a member's password after re-checking the current one.
  pub async fn change_password(&self, profile_id: Uuid, current: &str, new_password: &str) -> Result<()> {
    let mut credentials = self.credentials(profile_id).await?;
    match credentials.password_hash.as_deref() {
      Some(hash) if self.hasher.verify(current, hash) => {}
      _ => return Err(Error::InvalidCredentials),
    }
    check_password(new_password)?;
    credentials.password_hash = Some(self.hasher.hash(new_password)?);
    self
      .store
      .set_credentials(profile_id, credentials)
      .await
      .map_err(Error::store)?;
    info!(%profile_id, "password changed");
    Ok(())
  }

  /// Send a reset OTP to the registered owner of a mobile number or email.
  pub async fn request_password_reset(&self, mobile_or_email: &str) -> Result<OtpIssued> {
    let profile = self.registered_by_login(mobile_or_email).await?;
    let expires_at = self.issue_otp(&profile, Utc::now()).await?;
    Ok(OtpIssued {
      profile_id: profile.profile_id,
      is_verified: profile.is_verified,
      expires_at,
    })
  }

  pub async fn reset_password(&self, mobile_or_email: &str, code: &str, new_password: &str) -> Result<()> {
    self
      .reset_password_at(mobile_or_email, code, new_password, Utc::now())
      .await
  }

  /// Set a new password with a reset OTP as of `at`. The new password is
  /// validated before the code is spent.
  pub async fn reset_password_at(
    &self,
    mobile_or_email: &str,
    code: &str,
    new_password: &str,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let profile = self.registered_by_login(mobile_or_email).await?;
    check_password(new_password)?;
    let mut credentials = self.redeem_otp(profile.profile_id, code, at).await?;
    credentials.password_hash = Some(self.hasher.hash(new_password)?);
    self
      .store
      .set_credentials(profile.profile_id, credentials)
      .await
      .map_err(Error::store)?;
    info!(profile_id = %profile.profile_id, "password reset");
    Ok(())
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  pub async fn update_profile(&self, profile_id: Uuid, update: ProfileUpdate) -> Result<Profile> {
    let mut profile = self.profile(profile_id).await?;

    if let Some(email) = update.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
      let email = email.to_lowercase();
      self.ensure_email_free(&email, profile_id).await?;
      profile.email = Some(email);
    }

    let mut details = profile.details.clone();
    details.merge(update.details);
    // A new religion invalidates a community that belonged to the old one.
    if details.religion_id != profile.details.religion_id
      && details.community_id == profile.details.community_id
    {
      details.community_id = None;
    }
    self.validate_catalog(&details).await?;
    profile.details = details;

    if let Some(loc) = location(update.lat, update.lon)? {
      profile.location = Some(loc);
    }
    profile.updated_at = Utc::now();
    self.store.save_profile(profile.clone()).await.map_err(Error::store)?;
    Ok(profile)
  }

  /// Append already-stored photo paths to the profile.
  pub async fn add_photos(&self, profile_id: Uuid, paths: Vec<String>) -> Result<Profile> {
    let paths: Vec<String> = paths
      .into_iter()
      .map(|p| p.trim().to_owned())
      .filter(|p| !p.is_empty())
      .collect();
    if paths.is_empty() {
      return Err(Error::Validation("at least one photo path is required".into()));
    }
    let mut profile = self.profile(profile_id).await?;
    profile.photos.extend(paths);
    profile.updated_at = Utc::now();
    self.store.save_profile(profile.clone()).await.map_err(Error::store)?;
    Ok(profile)
  }

  pub async fn remove_photo(&self, profile_id: Uuid, path: &str) -> Result<Profile> {
    let mut profile = self.profile(profile_id).await?;
    let index = profile
      .photos
      .iter()
      .position(|p| p == path)
      .ok_or_else(|| Error::Validation(format!("photo not found on profile: {path}")))?;
    profile.photos.remove(index);
    profile.updated_at = Utc::now();
    self.store.save_profile(profile.clone()).await.map_err(Error::store)?;
    Ok(profile)
  }

  pub async fn profile(&self, profile_id: Uuid) -> Result<Profile> {
    self
      .store
      .get_profile(profile_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProfileNotFound(profile_id))
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  /// Create the skeleton for a number seen for the first time. When a
  /// concurrent request claimed the number first, its profile is used.
  async fn claim_mobile(&self, mobile_number: &str, country_code: &str, now: DateTime<Utc>) -> Result<Profile> {
    let skeleton = Profile::skeleton(mobile_number.to_owned(), country_code.to_owned(), now);
    if self.store.insert_profile(skeleton.clone()).await.map_err(Error::store)? {
      info!(profile_id = %skeleton.profile_id, "skeleton profile created");
      return Ok(skeleton);
    }
    self
      .store
      .find_by_mobile(mobile_number.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::Validation(format!("mobile number {mobile_number} is unavailable")))
  }

  /// Store a fresh OTP challenge for `profile` and hand the code to the
  /// sender. Returns the expiry.
  async fn issue_otp(&self, profile: &Profile, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let code = format!("{:04}", 1000 + OsRng.next_u32() % 9000);
    let expires_at = now + Duration::minutes(OTP_TTL_MINUTES);
    let mut credentials = self.credentials(profile.profile_id).await?;
    credentials.otp_digest = Some(otp_digest(&code));
    credentials.otp_expires_at = Some(expires_at);
    credentials.otp_attempts = 0;
    self
      .store
      .set_credentials(profile.profile_id, credentials)
      .await
      .map_err(Error::store)?;

    if let Err(e) = self.otp.send_otp(&profile.country_code, &profile.mobile_number, &code) {
      warn!(profile_id = %profile.profile_id, error = %e, "otp delivery failed");
    }
    Ok(expires_at)
  }

  /// Check `code` against the outstanding challenge. On success the
  /// challenge is cleared in the returned credentials, which the caller
  /// stores. A wrong code counts towards [`MAX_OTP_ATTEMPTS`].
  async fn redeem_otp(&self, profile_id: Uuid, code: &str, at: DateTime<Utc>) -> Result<Credentials> {
    let mut credentials = self.credentials(profile_id).await?;
    let Some(expected) = credentials.otp_digest.as_deref() else {
      return Err(Error::InvalidOtp);
    };
    if expected != otp_digest(code.trim()) {
      if self
        .store
        .record_otp_miss(profile_id, MAX_OTP_ATTEMPTS)
        .await
        .map_err(Error::store)?
      {
        warn!(%profile_id, "otp withdrawn after repeated wrong codes");
      }
      return Err(Error::InvalidOtp);
    }
    if credentials.otp_expires_at.is_none_or(|exp| at > exp) {
      return Err(Error::OtpExpired);
    }
    credentials.clear_otp();
    Ok(credentials)
  }

  async fn find_by_login(&self, mobile_or_email: &str) -> Result<Option<Profile>> {
    let login = mobile_or_email.trim();
    if login.is_empty() {
      return Ok(None);
    }
    match self.store.find_by_mobile(login.to_owned()).await.map_err(Error::store)? {
      Some(p) => Ok(Some(p)),
      None => self
        .store
        .find_by_email(login.to_lowercase())
        .await
        .map_err(Error::store),
    }
  }

  async fn registered_by_login(&self, mobile_or_email: &str) -> Result<Profile> {
    self
      .find_by_login(mobile_or_email)
      .await?
      .filter(|p| p.registered)
      .ok_or(Error::InvalidCredentials)
  }

  async fn credentials(&self, profile_id: Uuid) -> Result<Credentials> {
    Ok(
      self
        .store
        .credentials(profile_id)
        .await
        .map_err(Error::store)?
        .unwrap_or_default(),
    )
  }

  async fn ensure_email_free(&self, email: &str, owner: Uuid) -> Result<()> {
    match self.store.find_by_email(email.to_owned()).await.map_err(Error::store)? {
      Some(other) if other.profile_id != owner => Err(Error::EmailInUse),
      _ => Ok(()),
    }
  }

  /// Religion must exist; a community must belong to that religion.
  async fn validate_catalog(&self, details: &ProfileDetails) -> Result<()> {
    match (details.religion_id, details.community_id) {
      (None, None) => Ok(()),
      (None, Some(_)) => Err(Error::Validation("community requires a religion".into())),
      (Some(religion_id), community) => {
        let religion = self
          .store
          .get_religion(religion_id)
          .await
          .map_err(Error::store)?
          .ok_or(Error::ReligionNotFound(religion_id))?;
        match community {
          Some(c) if !religion.has_community(c) => {
            Err(Error::CommunityNotFound { religion: religion_id, community: c })
          }
          _ => Ok(()),
        }
      }
    }
  }
}

fn required(field: &str, value: &str) -> Result<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(Error::Validation(format!("{field} is required")));
  }
  Ok(value.to_owned())
}

fn check_password(password: &str) -> Result<()> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::Validation(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  Ok(())
}

fn location(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinates>> {
  match (lat, lon) {
    (Some(lat), Some(lon)) => Coordinates::new(lat, lon).map(Some),
    (None, None) => Ok(None),
    _ => Err(Error::Validation("lat and lon must be given together".into())),
  }
}

/// Hex SHA-256 of an OTP code; the code itself is never stored.
pub fn otp_digest(code: &str) -> String { hex::encode(Sha256::digest(code.as_bytes())) }
