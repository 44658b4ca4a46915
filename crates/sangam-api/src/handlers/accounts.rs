//! Wallet and membership handlers.

use axum::{
  Json,
  extract::{Path, State},
};
use sangam_core::{
  Error,
  catalog::MembershipPlan,
  ledger::{MembershipGrant, Transaction, WalletView},
  store::{Backend, CatalogStore},
};
use uuid::Uuid;

use crate::{AppState, auth::Member, error::ApiError, handlers::admin::CreditRequest};

/// `GET /wallet`
pub async fn wallet<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
) -> Result<Json<WalletView>, ApiError> {
  Ok(Json(state.ledger.wallet(me.profile_id).await?))
}

/// `POST /wallet/credit`: a member's own top-up.
pub async fn add_money<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Json(req): Json<CreditRequest>,
) -> Result<Json<Transaction>, ApiError> {
  let tx = state
    .ledger
    .add_money(me.profile_id, req.amount, req.description.as_deref())
    .await?;
  Ok(Json(tx))
}

/// `GET /plans`: plans currently on sale.
pub async fn plans<S: Backend>(
  State(state): State<AppState<S>>,
  Member(_): Member,
) -> Result<Json<Vec<MembershipPlan>>, ApiError> {
  let plans = state.store.list_plans(false).await.map_err(Error::store)?;
  Ok(Json(plans))
}

/// `POST /plans/{id}/purchase`
pub async fn purchase<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Path(membership_id): Path<Uuid>,
) -> Result<Json<MembershipGrant>, ApiError> {
  let grant = state
    .ledger
    .purchase_membership(me.profile_id, membership_id)
    .await?;
  Ok(Json(grant))
}
