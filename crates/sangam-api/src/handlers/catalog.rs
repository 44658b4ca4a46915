//! Handler for `GET /religions`.

use axum::{Json, extract::State};
use sangam_core::{
  Error,
  catalog::Religion,
  store::{Backend, CatalogStore},
};

use crate::{AppState, error::ApiError};

/// Religions with their communities; public, used by the sign-up form.
pub async fn religions<S: Backend>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Religion>>, ApiError> {
  let religions = state.store.list_religions().await.map_err(Error::store)?;
  Ok(Json(religions))
}
