//! Admin routes. Every handler requires [`AdminAuth`].

use axum::{
  Json,
  extract::{Path, State},
};
use sangam_core::{
  catalog::{Community, MembershipPlan, PlanInput, Religion},
  ledger::{Reconciliation, Transaction},
  profile::Profile,
  store::Backend,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::AdminAuth, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
  pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
  pub amount:      i64,
  pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReligionRequest {
  pub religion_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CommunityRequest {
  pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralBonus {
  pub amount: i64,
}

/// `PUT /admin/profiles/{id}/verify`
pub async fn set_verified<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Path(profile_id): Path<Uuid>,
  Json(req): Json<VerifyRequest>,
) -> Result<Json<Profile>, ApiError> {
  Ok(Json(state.admin.set_admin_verify(profile_id, req.approved).await?))
}

/// `POST /admin/profiles/{id}/wallet`: record a completed top-up.
pub async fn credit_wallet<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Path(profile_id): Path<Uuid>,
  Json(req): Json<CreditRequest>,
) -> Result<Json<Transaction>, ApiError> {
  let tx = state
    .admin
    .credit_wallet(profile_id, req.amount, req.description.as_deref())
    .await?;
  Ok(Json(tx))
}

/// `GET /admin/profiles/{id}/audit`
pub async fn audit<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Path(profile_id): Path<Uuid>,
) -> Result<Json<Reconciliation>, ApiError> {
  Ok(Json(state.ledger.audit(profile_id).await?))
}

/// `GET /admin/plans`, including retired plans.
pub async fn list_plans<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
) -> Result<Json<Vec<MembershipPlan>>, ApiError> {
  Ok(Json(state.admin.list_plans().await?))
}

/// `POST /admin/plans`
pub async fn upsert_plan<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Json(input): Json<PlanInput>,
) -> Result<Json<MembershipPlan>, ApiError> {
  Ok(Json(state.admin.upsert_plan(input).await?))
}

/// `POST /admin/religions`
pub async fn add_religion<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Json(req): Json<ReligionRequest>,
) -> Result<Json<Religion>, ApiError> {
  Ok(Json(state.admin.add_religion(&req.religion_name).await?))
}

/// `POST /admin/religions/{id}/communities`
pub async fn add_community<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Path(religion_id): Path<Uuid>,
  Json(req): Json<CommunityRequest>,
) -> Result<Json<Community>, ApiError> {
  Ok(Json(state.admin.add_community(religion_id, &req.name).await?))
}

/// `PUT /admin/referral-bonus`
pub async fn set_referral_bonus<S: Backend>(
  State(state): State<AppState<S>>,
  _: AdminAuth,
  Json(req): Json<ReferralBonus>,
) -> Result<Json<ReferralBonus>, ApiError> {
  state.admin.set_referral_bonus(req.amount).await?;
  Ok(Json(req))
}
