//! JSON HTTP surface for Sangam.
//!
//! Exposes an axum [`Router`] backed by any [`Backend`]. Members authenticate
//! with HTTP Basic on every request; the handlers pass the authenticated
//! profile id to the `sangam-core` services as the trusted viewer.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notify;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use sangam_core::{
  admin::Admin,
  eligibility::OtherGenderPolicy,
  ledger::Ledger,
  matching::Matching,
  notify::Notifier,
  registration::{OtpSender, PasswordHashing, Registration},
  social::Social,
  store::Backend,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AdminCredentials, Argon2Hashing};
use handlers::{accounts, admin, catalog, discovery, profiles};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SANGAM_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
  #[serde(default)]
  pub other_gender_policy: OtherGenderPolicy,
  /// Capacity of the notification queue.
  #[serde(default = "default_queue")]
  pub notification_queue:  usize,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_queue() -> usize { 1024 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:             Arc<S>,
  pub config:            Arc<ServerConfig>,
  pub admin_credentials: Arc<AdminCredentials>,
  pub ledger:            Ledger<S>,
  pub matching:          Matching<S>,
  pub social:            Social<S>,
  pub registration:      Registration<S>,
  pub admin:             Admin<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:             self.store.clone(),
      config:            self.config.clone(),
      admin_credentials: self.admin_credentials.clone(),
      ledger:            self.ledger.clone(),
      matching:          self.matching.clone(),
      social:            self.social.clone(),
      registration:      self.registration.clone(),
      admin:             self.admin.clone(),
    }
  }
}

impl<S: Backend> AppState<S> {
  /// Wire the services over one store, hashing passwords with argon2.
  pub fn new(
    store: Arc<S>,
    config: ServerConfig,
    notifier: Arc<dyn Notifier>,
    otp: Arc<dyn OtpSender>,
  ) -> Self {
    Self::with_hasher(store, config, notifier, otp, Arc::new(Argon2Hashing))
  }

  pub fn with_hasher(
    store: Arc<S>,
    config: ServerConfig,
    notifier: Arc<dyn Notifier>,
    otp: Arc<dyn OtpSender>,
    hasher: Arc<dyn PasswordHashing>,
  ) -> Self {
    let ledger = Ledger::new(store.clone(), notifier.clone());
    Self {
      admin_credentials: Arc::new(AdminCredentials {
        username:      config.admin_username.clone(),
        password_hash: config.admin_password_hash.clone(),
      }),
      matching: Matching::new(store.clone(), config.other_gender_policy),
      social: Social::new(store.clone(), notifier),
      registration: Registration::new(store.clone(), ledger.clone(), otp, hasher),
      admin: Admin::new(store.clone(), ledger.clone()),
      config: Arc::new(config),
      ledger,
      store,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API router with request tracing.
pub fn router<S: Backend>(state: AppState<S>) -> Router {
  Router::new()
    // Sign-up
    .route("/auth/otp", post(profiles::generate_otp::<S>))
    .route("/auth/otp/verify", post(profiles::verify_otp::<S>))
    .route("/auth/register", post(profiles::register::<S>))
    .route("/auth/password/otp", post(profiles::request_password_reset::<S>))
    .route("/auth/password/reset", post(profiles::reset_password::<S>))
    // Own profile
    .route("/me", get(profiles::me::<S>).patch(profiles::update::<S>))
    .route(
      "/me/photos",
      post(profiles::add_photos::<S>).delete(profiles::remove_photo::<S>),
    )
    .route("/me/password", put(profiles::change_password::<S>))
    .route("/me/notifications", get(profiles::notifications::<S>))
    // Discovery
    .route("/profiles", get(discovery::list::<S>))
    .route("/profiles/near", get(discovery::near::<S>))
    .route("/profiles/search", get(discovery::search::<S>))
    .route("/profiles/liked", get(discovery::liked::<S>))
    .route("/profiles/{id}/like", post(discovery::toggle_like::<S>))
    .route(
      "/profiles/{id}/block",
      post(discovery::block::<S>).delete(discovery::unblock::<S>),
    )
    // Wallet & membership
    .route("/wallet", get(accounts::wallet::<S>))
    .route("/wallet/credit", post(accounts::add_money::<S>))
    .route("/plans", get(accounts::plans::<S>))
    .route("/plans/{id}/purchase", post(accounts::purchase::<S>))
    // Catalog
    .route("/religions", get(catalog::religions::<S>))
    // Admin
    .route("/admin/profiles/{id}/verify", put(admin::set_verified::<S>))
    .route("/admin/profiles/{id}/wallet", post(admin::credit_wallet::<S>))
    .route("/admin/profiles/{id}/audit", get(admin::audit::<S>))
    .route("/admin/plans", get(admin::list_plans::<S>).post(admin::upsert_plan::<S>))
    .route("/admin/religions", post(admin::add_religion::<S>))
    .route("/admin/religions/{id}/communities", post(admin::add_community::<S>))
    .route("/admin/referral-bonus", put(admin::set_referral_bonus::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
