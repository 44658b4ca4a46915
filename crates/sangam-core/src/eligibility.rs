//! The predicate chain deciding whether a candidate may be shown to a viewer.
//!
//! Checks run cheapest first and stop at the first failure:
//!
//! 1. candidate is OTP-verified and moderator-approved;
//! 2. candidate is not the viewer;
//! 3. genders are compatible (see [`OtherGenderPolicy`]);
//! 4. both share the same religion;
//! 5. neither has blocked the other.

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::profile::{Edges, Gender, Profile};

/// How profiles whose gender is `Other` (or unset) take part in matching.
///
/// The binary rule (Male ↔ Female) says nothing about them, so the behaviour
/// is a deployment decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherGenderPolicy {
  /// `Other` profiles neither see nor are seen by anyone.
  #[default]
  Exclude,
  /// `Other` profiles match each other only.
  MatchOther,
}

/// Why a candidate was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  NotApproved,
  SelfMatch,
  GenderMismatch,
  ReligionMismatch,
  Blocked,
}

/// The viewer side of the predicate: the profile plus both directions of its
/// block relation.
#[derive(Debug, Clone)]
pub struct Viewer {
  pub profile:    Profile,
  /// Outgoing edges (who the viewer likes and has blocked).
  pub edges:      Edges,
  /// Reverse lookup: who has blocked the viewer.
  pub blocked_by: HashSet<Uuid>,
}

impl Viewer {
  pub fn id(&self) -> Uuid { self.profile.profile_id }
}

pub fn genders_compatible(
  viewer: Option<Gender>,
  candidate: Option<Gender>,
  policy: OtherGenderPolicy,
) -> bool {
  match (viewer, candidate) {
    (Some(Gender::Other), Some(Gender::Other)) => policy == OtherGenderPolicy::MatchOther,
    (Some(v), Some(c)) => v.opposite() == Some(c),
    _ => false,
  }
}

/// Run the full chain for one candidate.
pub fn check(viewer: &Viewer, candidate: &Profile, policy: OtherGenderPolicy) -> Result<(), Rejection> {
  if !candidate.is_approved() {
    return Err(Rejection::NotApproved);
  }
  if candidate.profile_id == viewer.id() {
    return Err(Rejection::SelfMatch);
  }
  if !genders_compatible(viewer.profile.details.gender, candidate.details.gender, policy) {
    return Err(Rejection::GenderMismatch);
  }
  match (viewer.profile.details.religion_id, candidate.details.religion_id) {
    (Some(v), Some(c)) if v == c => {}
    _ => return Err(Rejection::ReligionMismatch),
  }
  if viewer.edges.blocked.contains(&candidate.profile_id)
    || viewer.blocked_by.contains(&candidate.profile_id)
  {
    return Err(Rejection::Blocked);
  }
  Ok(())
}

pub fn is_eligible(viewer: &Viewer, candidate: &Profile, policy: OtherGenderPolicy) -> bool {
  check(viewer, candidate, policy).is_ok()
}

/// Keep the eligible part of `population`.
pub fn filter(
  viewer: &Viewer,
  population: impl IntoIterator<Item = Profile>,
  policy: OtherGenderPolicy,
) -> Vec<Profile> {
  population
    .into_iter()
    .filter(|c| is_eligible(viewer, c, policy))
    .collect()
}
