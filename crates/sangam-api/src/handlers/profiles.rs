//! Sign-up, login-backed profile access and the member inbox.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use sangam_core::{
  Error,
  notify::Notification,
  profile::Profile,
  registration::{OtpIssued, ProfileUpdate, RegistrationForm},
  store::{Backend, NotificationStore},
};
use serde::Deserialize;

use crate::{AppState, auth::Member, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
  pub mobile_number: String,
  pub country_code:  String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
  pub mobile_number: String,
  pub country_code:  String,
  pub otp:           String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
  pub current_password: String,
  pub new_password:     String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOtpRequest {
  pub mobile_or_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
  pub mobile_or_email:  String,
  pub otp:              String,
  pub new_password:     String,
  pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct PhotosRequest {
  pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoParams {
  pub path: String,
}

/// `POST /auth/otp`
pub async fn generate_otp<S: Backend>(
  State(state): State<AppState<S>>,
  Json(req): Json<OtpRequest>,
) -> Result<Json<OtpIssued>, ApiError> {
  let issued = state
    .registration
    .generate_otp(&req.mobile_number, &req.country_code)
    .await?;
  Ok(Json(issued))
}

/// `POST /auth/otp/verify`
pub async fn verify_otp<S: Backend>(
  State(state): State<AppState<S>>,
  Json(req): Json<VerifyRequest>,
) -> Result<Json<Profile>, ApiError> {
  let profile = state
    .registration
    .verify_otp(&req.mobile_number, &req.country_code, &req.otp)
    .await?;
  Ok(Json(profile))
}

/// `POST /auth/register`
pub async fn register<S: Backend>(
  State(state): State<AppState<S>>,
  Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
  let profile = state.registration.complete_registration(form).await?;
  Ok((StatusCode::CREATED, Json(profile)))
}

/// `POST /auth/password/otp`: send a reset code to a registered member.
pub async fn request_password_reset<S: Backend>(
  State(state): State<AppState<S>>,
  Json(req): Json<ResetOtpRequest>,
) -> Result<Json<OtpIssued>, ApiError> {
  Ok(Json(state.registration.request_password_reset(&req.mobile_or_email).await?))
}

/// `POST /auth/password/reset`
pub async fn reset_password<S: Backend>(
  State(state): State<AppState<S>>,
  Json(req): Json<ResetRequest>,
) -> Result<StatusCode, ApiError> {
  if req.new_password != req.confirm_password {
    return Err(ApiError::BadRequest("passwords do not match".into()));
  }
  state
    .registration
    .reset_password(&req.mobile_or_email, &req.otp, &req.new_password)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /me`
pub async fn me<S: Backend>(Member(me): Member) -> Json<Profile> { Json(me) }

/// `PATCH /me`
pub async fn update<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
  Ok(Json(state.registration.update_profile(me.profile_id, update).await?))
}

/// `PUT /me/password`
pub async fn change_password<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Json(req): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
  state
    .registration
    .change_password(me.profile_id, &req.current_password, &req.new_password)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /me/photos` with paths of already-uploaded files.
pub async fn add_photos<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Json(req): Json<PhotosRequest>,
) -> Result<Json<Profile>, ApiError> {
  Ok(Json(state.registration.add_photos(me.profile_id, req.paths).await?))
}

/// `DELETE /me/photos?path=..`
pub async fn remove_photo<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Query(params): Query<PhotoParams>,
) -> Result<Json<Profile>, ApiError> {
  Ok(Json(state.registration.remove_photo(me.profile_id, &params.path).await?))
}

/// `GET /me/notifications`, newest first.
pub async fn notifications<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
) -> Result<Json<Vec<Notification>>, ApiError> {
  let inbox = state
    .store
    .notifications(me.profile_id)
    .await
    .map_err(Error::store)?;
  Ok(Json(inbox))
}
