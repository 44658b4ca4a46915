//! Profile discovery: listing, nearby listing and search.
//!
//! Every query starts from the viewer's eligible population (see
//! [`crate::eligibility`]) and narrows it further. Results are decorated with
//! the viewer's like edge, the candidate's incoming-like count and whether the
//! candidate holds an active membership.

use std::{cmp::Reverse, collections::HashSet, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  eligibility::{self, OtherGenderPolicy, Viewer},
  geo::{self, NEARBY_RADIUS_M},
  profile::{Coordinates, Profile, PublicProfile},
  store::{LedgerStore, ProfileStore},
};

// ─── Query types ─────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Offset pagination applied after filtering.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl Page {
  fn apply<T>(self, items: Vec<T>) -> Vec<T> {
    let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    items.into_iter().skip(self.offset.unwrap_or(0)).take(limit).collect()
  }
}

/// Parameters for [`Matching::search_profiles`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
  /// Case-insensitive substring over name, city, work, bio and contact fields.
  pub text:         Option<String>,
  /// Inclusive lower age bound.
  pub min_age:      Option<u32>,
  /// Inclusive upper age bound.
  pub max_age:      Option<u32>,
  pub community_id: Option<Uuid>,
  pub lat:          Option<f64>,
  pub lon:          Option<f64>,
  /// Metres. The geo filter only applies when `lat`, `lon` and `radius` are
  /// all present.
  pub radius:       Option<f64>,
}

impl SearchCriteria {
  fn text_needle(&self) -> Option<String> {
    self
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(str::to_lowercase)
  }

  fn geo(&self) -> Option<(f64, f64, f64)> {
    Some((self.lat?, self.lon?, self.radius?))
  }

  /// True when no usable filter was supplied.
  pub fn is_empty(&self) -> bool {
    self.text_needle().is_none()
      && self.min_age.is_none()
      && self.max_age.is_none()
      && self.community_id.is_none()
      && self.geo().is_none()
  }

  /// Non-geographic part of the criteria.
  pub fn matches(&self, candidate: &Profile, today: chrono::NaiveDate) -> bool {
    let details = &candidate.details;

    if let Some(community) = self.community_id
      && details.community_id != Some(community)
    {
      return false;
    }

    if let Some(needle) = self.text_needle() {
      let hit = [
        details.first_name.as_deref(),
        details.last_name.as_deref(),
        details.city.as_deref(),
        details.your_work.as_deref(),
        details.bio.as_deref(),
        Some(candidate.mobile_number.as_str()),
        candidate.email.as_deref(),
      ]
      .into_iter()
      .flatten()
      .any(|field| field.to_lowercase().contains(&needle));
      if !hit {
        return false;
      }
    }

    if self.min_age.is_some() || self.max_age.is_some() {
      let Some(age) = details.age_years(today) else {
        return false;
      };
      if self.min_age.is_some_and(|min| age < min) || self.max_age.is_some_and(|max| age > max) {
        return false;
      }
    }

    true
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCard {
  #[serde(flatten)]
  pub profile:    PublicProfile,
  /// The viewer has liked this profile.
  pub is_liked:   bool,
  /// Incoming likes of this profile.
  pub like_count: u64,
  /// Holds an active membership.
  pub is_premium: bool,
  /// Metres from the query origin, for geographic queries.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub distance_m: Option<f64>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Matching<S> {
  store:  Arc<S>,
  policy: OtherGenderPolicy,
}

impl<S> Clone for Matching<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone(), policy: self.policy } }
}

impl<S> Matching<S>
where
  S: ProfileStore + LedgerStore,
{
  pub fn new(store: Arc<S>, policy: OtherGenderPolicy) -> Self { Self { store, policy } }

  /// Load the viewer with both directions of its edges.
  pub async fn viewer(&self, viewer_id: Uuid) -> Result<Viewer> {
    let profile = self
      .store
      .get_profile(viewer_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProfileNotFound(viewer_id))?;
    let edges = self.store.edges(viewer_id).await.map_err(Error::store)?;
    let blocked_by = self.store.blockers_of(viewer_id).await.map_err(Error::store)?;
    Ok(Viewer { profile, edges, blocked_by })
  }

  /// Everyone the viewer may see.
  pub async fn list_profiles(&self, viewer_id: Uuid, page: Page) -> Result<Vec<ProfileCard>> {
    let viewer = self.viewer(viewer_id).await?;
    let eligible = self.eligible(&viewer).await?;
    self
      .decorate(&viewer, eligible.into_iter().map(|p| (p, None)).collect(), page)
      .await
  }

  /// Eligible profiles within 30 km of the given point.
  pub async fn list_near_profiles(
    &self,
    viewer_id: Uuid,
    lat: Option<f64>,
    lon: Option<f64>,
    page: Page,
  ) -> Result<Vec<ProfileCard>> {
    let (Some(lat), Some(lon)) = (lat, lon) else {
      return Err(Error::LocationRequired);
    };
    let origin = Coordinates::new(lat, lon)?;

    let viewer = self.viewer(viewer_id).await?;
    let nearby = self
      .eligible(&viewer)
      .await?
      .into_iter()
      .filter_map(|p| geo::within(origin, p.location, NEARBY_RADIUS_M).map(|d| (p, Some(d))))
      .collect();
    self.decorate(&viewer, nearby, page).await
  }

  /// Eligible profiles narrowed by `criteria`. No criteria, no results.
  pub async fn search_profiles(
    &self,
    viewer_id: Uuid,
    criteria: SearchCriteria,
    page: Page,
  ) -> Result<Vec<ProfileCard>> {
    if criteria.is_empty() {
      return Ok(Vec::new());
    }
    let origin = match criteria.geo() {
      Some((lat, lon, radius)) => {
        if !radius.is_finite() || radius < 0.0 {
          return Err(Error::Validation(format!("radius must be non-negative: {radius}")));
        }
        Some((Coordinates::new(lat, lon)?, radius))
      }
      None => None,
    };

    let viewer = self.viewer(viewer_id).await?;
    let today = Utc::now().date_naive();
    let hits = self
      .eligible(&viewer)
      .await?
      .into_iter()
      .filter(|p| criteria.matches(p, today))
      .filter_map(|p| match origin {
        Some((origin, radius)) => geo::within(origin, p.location, radius).map(|d| (p, Some(d))),
        None => Some((p, None)),
      })
      .collect();
    self.decorate(&viewer, hits, page).await
  }

  /// Profiles the viewer has liked that are still approved and not blocked
  /// in either direction.
  pub async fn liked_profiles(&self, viewer_id: Uuid) -> Result<Vec<ProfileCard>> {
    let viewer = self.viewer(viewer_id).await?;
    let mut liked = Vec::with_capacity(viewer.edges.liked.len());
    for id in &viewer.edges.liked {
      if viewer.edges.blocked.contains(id) || viewer.blocked_by.contains(id) {
        continue;
      }
      if let Some(p) = self.store.get_profile(*id).await.map_err(Error::store)?
        && p.is_approved()
      {
        liked.push((p, None));
      }
    }
    let page = Page { limit: Some(MAX_PAGE_SIZE), offset: None };
    self.decorate(&viewer, liked, page).await
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn eligible(&self, viewer: &Viewer) -> Result<Vec<Profile>> {
    let Some(religion_id) = viewer.profile.details.religion_id else {
      return Ok(Vec::new());
    };
    let population = self
      .store
      .matchable_profiles(religion_id)
      .await
      .map_err(Error::store)?;
    Ok(eligibility::filter(viewer, population, self.policy))
  }

  /// Order newest first, paginate, then attach like and membership flags.
  async fn decorate(
    &self,
    viewer: &Viewer,
    mut hits: Vec<(Profile, Option<f64>)>,
    page: Page,
  ) -> Result<Vec<ProfileCard>> {
    hits.sort_by_key(|(p, _)| (Reverse(p.created_at), p.profile_id));
    let hits = page.apply(hits);

    let ids: Vec<Uuid> = hits.iter().map(|(p, _)| p.profile_id).collect();
    let counts = self.store.like_counts(ids.clone()).await.map_err(Error::store)?;
    let premium: HashSet<Uuid> = self
      .store
      .active_members(ids, Utc::now())
      .await
      .map_err(Error::store)?;

    Ok(
      hits
        .into_iter()
        .map(|(p, distance_m)| ProfileCard {
          is_liked: viewer.edges.liked.contains(&p.profile_id),
          like_count: counts.get(&p.profile_id).copied().unwrap_or(0),
          is_premium: premium.contains(&p.profile_id),
          distance_m,
          profile: p.public(),
        })
        .collect(),
    )
  }
}
