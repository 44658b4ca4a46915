//! Catalog records: religions with their communities, and membership plans.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Religion ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
  pub community_id: Uuid,
  pub name:         String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Religion {
  pub religion_id:   Uuid,
  pub religion_name: String,
  pub communities:   Vec<Community>,
}

impl Religion {
  pub fn has_community(&self, community_id: Uuid) -> bool {
    self.communities.iter().any(|c| c.community_id == community_id)
  }
}

// ─── Membership plans ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
  #[serde(rename = "monthly")]
  Monthly,
  #[serde(rename = "6months")]
  SixMonths,
}

impl PlanType {
  pub fn months(self) -> u32 {
    match self {
      PlanType::Monthly => 1,
      PlanType::SixMonths => 6,
    }
  }

  /// End of a grant starting at `start`.
  ///
  /// Calendar-month arithmetic: the same day N months later, clamped to the
  /// length of the target month (Jan 31 + 1 month = Feb 28 or 29).
  pub fn end_from(self, start: DateTime<Utc>) -> Result<DateTime<Utc>> {
    start
      .checked_add_months(Months::new(self.months()))
      .ok_or_else(|| Error::Validation(format!("membership end date out of range for {start}")))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
  pub membership_id: Uuid,
  pub plan_type:     PlanType,
  pub price:         i64,
  /// Inactive plans stay listed for admins but cannot be bought.
  pub active:        bool,
}

/// Admin input for creating or replacing a plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
  /// Existing plan to replace; a new id is assigned when absent.
  pub membership_id: Option<Uuid>,
  pub plan_type:     PlanType,
  pub price:         i64,
  #[serde(default = "default_active")]
  pub active:        bool,
}

fn default_active() -> bool { true }

impl PlanInput {
  pub fn into_plan(self) -> Result<MembershipPlan> {
    if self.price <= 0 {
      return Err(Error::Validation(format!("plan price must be positive: {}", self.price)));
    }
    Ok(MembershipPlan {
      membership_id: self.membership_id.unwrap_or_else(Uuid::new_v4),
      plan_type:     self.plan_type,
      price:         self.price,
      active:        self.active,
    })
  }
}
