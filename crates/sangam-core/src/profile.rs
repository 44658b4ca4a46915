//! A person's matchable record.
//!
//! The profile document carries identity, verification flags and the
//! free-form [`ProfileDetails`]. Like and block edges are not embedded: they
//! live in the store as directed edges and are loaded per viewer as
//! [`Edges`], with the reverse direction answered by a store query.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
  Male,
  Female,
  Other,
}

impl Gender {
  /// The binary counterpart used for preference matching. `Other` has none.
  pub fn opposite(self) -> Option<Gender> {
    match self {
      Gender::Male => Some(Gender::Female),
      Gender::Female => Some(Gender::Male),
      Gender::Other => None,
    }
  }
}

/// Who the profile was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileFor {
  MySelf,
  MySon,
  MyDaughter,
  MyBrother,
  MySister,
  MyFriend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaritalStatus {
  Single,
  Married,
  Divorced,
  Widowed,
}

// ─── Location ────────────────────────────────────────────────────────────────

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub lat: f64,
  pub lon: f64,
}

impl Coordinates {
  /// Build a position, rejecting values outside the valid degree ranges.
  pub fn new(lat: f64, lon: f64) -> crate::Result<Self> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
      return Err(crate::Error::Validation(format!("latitude out of range: {lat}")));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
      return Err(crate::Error::Validation(format!("longitude out of range: {lon}")));
    }
    Ok(Self { lat, lon })
  }
}

// ─── Details ─────────────────────────────────────────────────────────────────

/// Descriptive profile fields, all optional until registration completes.
///
/// The same type doubles as a partial update: [`ProfileDetails::merge`]
/// overwrites only the fields present in the update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
  pub profile_for:           Option<ProfileFor>,
  pub first_name:            Option<String>,
  pub last_name:             Option<String>,
  pub gender:                Option<Gender>,
  pub dob:                   Option<NaiveDate>,
  /// Stored as text; coerced to a number when filtering by age.
  pub age:                   Option<String>,
  pub religion_id:           Option<Uuid>,
  pub community_id:          Option<Uuid>,
  pub height:                Option<f64>,
  pub weight:                Option<f64>,
  pub address:               Option<String>,
  pub city:                  Option<String>,
  pub state:                 Option<String>,
  pub pincode:               Option<String>,
  pub marital_status:        Option<MaritalStatus>,
  pub highest_qualification: Option<String>,
  pub your_work:             Option<String>,
  pub annual_income:         Option<String>,
  pub bio:                   Option<String>,
  pub father_name:           Option<String>,
  pub father_occupation:     Option<String>,
  pub mother_name:           Option<String>,
  pub no_of_sisters:         Option<u32>,
  pub no_of_brothers:        Option<u32>,
}

macro_rules! merge_fields {
  ($dst:ident, $src:ident; $($field:ident),* $(,)?) => {
    $( if $src.$field.is_some() { $dst.$field = $src.$field; } )*
  };
}

impl ProfileDetails {
  /// Apply every field that is set in `update`.
  pub fn merge(&mut self, update: ProfileDetails) {
    merge_fields!(self, update;
      profile_for, first_name, last_name, gender, dob, age, religion_id,
      community_id, height, weight, address, city, state, pincode,
      marital_status, highest_qualification, your_work, annual_income, bio,
      father_name, father_occupation, mother_name, no_of_sisters,
      no_of_brothers,
    );
  }

  /// Age in whole years as of `today`.
  ///
  /// The stored `age` text wins when it parses as a non-negative number;
  /// otherwise the age is derived from `dob`.
  pub fn age_years(&self, today: NaiveDate) -> Option<u32> {
    let stored = self
      .age
      .as_deref()
      .and_then(|a| a.trim().parse::<f64>().ok())
      .filter(|a| a.is_finite() && *a >= 0.0)
      .map(|a| a.trunc() as u32);

    stored.or_else(|| {
      let dob = self.dob?;
      let mut years = today.year() - dob.year();
      if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
      }
      u32::try_from(years).ok()
    })
  }

  pub fn full_name(&self) -> String {
    [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ")
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub profile_id:    Uuid,
  pub mobile_number: String,
  pub country_code:  String,
  pub email:         Option<String>,
  /// Code other people quote at registration to credit this profile.
  pub referral_code: String,
  /// Phone ownership confirmed through an OTP.
  pub is_verified:   bool,
  /// Approved by a moderator.
  pub admin_verify:  bool,
  /// Registration completed (details filled in, password set).
  pub registered:    bool,
  pub details:       ProfileDetails,
  pub location:      Option<Coordinates>,
  pub photos:        Vec<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Profile {
  /// The unverified record created the first time a mobile number asks for
  /// an OTP.
  pub fn skeleton(mobile_number: String, country_code: String, at: DateTime<Utc>) -> Self {
    let profile_id = Uuid::new_v4();
    Self {
      profile_id,
      mobile_number,
      country_code,
      email: None,
      referral_code: referral_code_for(profile_id),
      is_verified: false,
      admin_verify: false,
      registered: false,
      details: ProfileDetails::default(),
      location: None,
      photos: Vec::new(),
      created_at: at,
      updated_at: at,
    }
  }

  /// Both verification gates passed.
  pub fn is_approved(&self) -> bool { self.is_verified && self.admin_verify }

  /// The subset of the record other members are allowed to see.
  pub fn public(&self) -> PublicProfile {
    PublicProfile {
      profile_id: self.profile_id,
      details:    self.details.clone(),
      photos:     self.photos.clone(),
      created_at: self.created_at,
    }
  }
}

/// Referral codes are the first eight hex digits of the profile id,
/// upper-cased.
fn referral_code_for(profile_id: Uuid) -> String {
  profile_id.simple().to_string()[..8].to_ascii_uppercase()
}

/// What one member sees of another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
  pub profile_id: Uuid,
  pub details:    ProfileDetails,
  pub photos:     Vec<String>,
  pub created_at: DateTime<Utc>,
}

// ─── Edges & secrets ─────────────────────────────────────────────────────────

/// The outgoing like and block edges of one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edges {
  pub liked:   BTreeSet<Uuid>,
  pub blocked: BTreeSet<Uuid>,
}

/// Secret material kept next to a profile but never serialised with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
  /// PHC string produced by the configured password hasher.
  pub password_hash:  Option<String>,
  /// Hex SHA-256 of the outstanding OTP code.
  pub otp_digest:     Option<String>,
  pub otp_expires_at: Option<DateTime<Utc>>,
  /// Wrong codes entered against the outstanding OTP.
  pub otp_attempts:   u32,
}

impl Credentials {
  /// Withdraw the outstanding OTP challenge.
  pub fn clear_otp(&mut self) {
    self.otp_digest = None;
    self.otp_expires_at = None;
    self.otp_attempts = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  #[test]
  fn stored_age_is_coerced() {
    let details = ProfileDetails { age: Some(" 29 ".into()), ..Default::default() };
    assert_eq!(details.age_years(date(2024, 1, 1)), Some(29));

    let details = ProfileDetails { age: Some("27.9".into()), ..Default::default() };
    assert_eq!(details.age_years(date(2024, 1, 1)), Some(27));
  }

  #[test]
  fn age_falls_back_to_dob() {
    let details = ProfileDetails {
      age: Some("unknown".into()),
      dob: Some(date(1995, 6, 15)),
      ..Default::default()
    };
    assert_eq!(details.age_years(date(2024, 6, 14)), Some(28));
    assert_eq!(details.age_years(date(2024, 6, 15)), Some(29));
  }

  #[test]
  fn no_age_information() {
    assert_eq!(ProfileDetails::default().age_years(date(2024, 1, 1)), None);
  }

  #[test]
  fn merge_only_overwrites_present_fields() {
    let mut details = ProfileDetails {
      first_name: Some("Asha".into()),
      city: Some("Pune".into()),
      ..Default::default()
    };
    details.merge(ProfileDetails { city: Some("Mumbai".into()), ..Default::default() });
    assert_eq!(details.first_name.as_deref(), Some("Asha"));
    assert_eq!(details.city.as_deref(), Some("Mumbai"));
  }

  #[test]
  fn coordinates_are_range_checked() {
    assert!(Coordinates::new(18.52, 73.85).is_ok());
    assert!(Coordinates::new(91.0, 0.0).is_err());
    assert!(Coordinates::new(0.0, -180.5).is_err());
    assert!(Coordinates::new(f64::NAN, 0.0).is_err());
  }

  #[test]
  fn skeleton_has_referral_code() {
    let p = Profile::skeleton("9990001111".into(), "+91".into(), Utc::now());
    assert_eq!(p.referral_code.len(), 8);
    assert!(!p.is_approved());
    assert!(p.referral_code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
  }

  #[test]
  fn gender_opposites() {
    assert_eq!(Gender::Male.opposite(), Some(Gender::Female));
    assert_eq!(Gender::Female.opposite(), Some(Gender::Male));
    assert_eq!(Gender::Other.opposite(), None);
  }
}
