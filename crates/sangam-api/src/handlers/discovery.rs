//! Discovery and social-graph handlers.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use sangam_core::{
  matching::{Page, ProfileCard, SearchCriteria},
  social::LikeState,
  store::Backend,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Member, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct NearParams {
  pub lat:    Option<f64>,
  pub lon:    Option<f64>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// Query string of `GET /profiles/search`; field names follow
/// [`SearchCriteria`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
  pub text:         Option<String>,
  pub min_age:      Option<u32>,
  pub max_age:      Option<u32>,
  pub community_id: Option<Uuid>,
  pub lat:          Option<f64>,
  pub lon:          Option<f64>,
  pub radius:       Option<f64>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

impl SearchParams {
  fn split(self) -> (SearchCriteria, Page) {
    let criteria = SearchCriteria {
      text:         self.text,
      min_age:      self.min_age,
      max_age:      self.max_age,
      community_id: self.community_id,
      lat:          self.lat,
      lon:          self.lon,
      radius:       self.radius,
    };
    (criteria, Page { limit: self.limit, offset: self.offset })
  }
}

/// `GET /profiles[?limit=..][&offset=..]`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Query(page): Query<Page>,
) -> Result<Json<Vec<ProfileCard>>, ApiError> {
  Ok(Json(state.matching.list_profiles(me.profile_id, page).await?))
}

/// `GET /profiles/near?lat=..&lon=..`
pub async fn near<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Query(params): Query<NearParams>,
) -> Result<Json<Vec<ProfileCard>>, ApiError> {
  let page = Page { limit: params.limit, offset: params.offset };
  let cards = state
    .matching
    .list_near_profiles(me.profile_id, params.lat, params.lon, page)
    .await?;
  Ok(Json(cards))
}

/// `GET /profiles/search[?text=..][&minAge=..][&maxAge=..][&communityId=..][&lat=..&lon=..&radius=..]`
pub async fn search<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProfileCard>>, ApiError> {
  let (criteria, page) = params.split();
  let cards = state
    .matching
    .search_profiles(me.profile_id, criteria, page)
    .await?;
  Ok(Json(cards))
}

/// `GET /profiles/liked`
pub async fn liked<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
) -> Result<Json<Vec<ProfileCard>>, ApiError> {
  Ok(Json(state.matching.liked_profiles(me.profile_id).await?))
}

/// `POST /profiles/{id}/like`: like, or withdraw an existing like.
pub async fn toggle_like<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Path(target): Path<Uuid>,
) -> Result<Json<LikeState>, ApiError> {
  Ok(Json(state.social.toggle_like(me.profile_id, target).await?))
}

pub async fn block<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Path(target): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  state.social.block(me.profile_id, target).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn unblock<S: Backend>(
  State(state): State<AppState<S>>,
  Member(me): Member,
  Path(target): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  state.social.unblock(me.profile_id, target).await?;
  Ok(StatusCode::NO_CONTENT)
}
