//! HTTP Basic-auth extractors and the argon2 password hasher.
//!
//! Members authenticate as `mobile-or-email:password` against their stored
//! hash; the admin surface uses one configured username and argon2 hash.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use sangam_core::{profile::Profile, registration::PasswordHashing, store::Backend};

use crate::{AppState, error::ApiError};

/// Credentials accepted for the admin routes.
#[derive(Clone)]
pub struct AdminCredentials {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// The authenticated member making the request.
pub struct Member(pub Profile);

/// Zero-size marker: present in the handler means the admin authenticated.
pub struct AdminAuth;

/// Split a `Basic` authorization header into user and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (user, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((user.to_owned(), password.to_owned()))
}

pub fn verify_admin(headers: &HeaderMap, config: &AdminCredentials) -> Result<(), ApiError> {
  let (username, password) = basic_credentials(headers)?;
  if username != config.username {
    return Err(ApiError::Unauthorized);
  }
  if !verify_phc(&password, &config.password_hash) {
    return Err(ApiError::Unauthorized);
  }
  Ok(())
}

fn verify_phc(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    .unwrap_or(false)
}

impl<S: Backend> FromRequestParts<AppState<S>> for Member {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
    let (login, password) = basic_credentials(&parts.headers)?;
    state
      .registration
      .login(&login, &password)
      .await
      .map(Member)
      .map_err(|e| match e.kind() {
        sangam_core::ErrorKind::Internal => ApiError::Core(e),
        _ => ApiError::Unauthorized,
      })
  }
}

impl<S: Backend> FromRequestParts<AppState<S>> for AdminAuth {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
    verify_admin(&parts.headers, &state.admin_credentials)?;
    Ok(AdminAuth)
  }
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// [`PasswordHashing`] backed by argon2id with default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hashing;

impl Argon2Hashing {
  pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
  }
}

impl PasswordHashing for Argon2Hashing {
  fn hash(&self, password: &str) -> sangam_core::Result<String> {
    Self::hash_password(password).map_err(|e| sangam_core::Error::Hashing(e.to_string()))
  }

  fn verify(&self, password: &str, hash: &str) -> bool { verify_phc(password, hash) }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let encoded = B64.encode(format!("{user}:{pass}"));
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Basic {encoded}")).unwrap());
    headers
  }

  fn admin() -> AdminCredentials {
    AdminCredentials {
      username:      "admin".into(),
      password_hash: Argon2Hashing::hash_password("s3cret").unwrap(),
    }
  }

  #[test]
  fn admin_credentials_are_checked() {
    let config = admin();
    assert!(verify_admin(&basic("admin", "s3cret"), &config).is_ok());
    assert!(matches!(verify_admin(&basic("admin", "nope"), &config), Err(ApiError::Unauthorized)));
    assert!(matches!(verify_admin(&basic("root", "s3cret"), &config), Err(ApiError::Unauthorized)));
  }

  #[test]
  fn malformed_headers_are_unauthorized() {
    assert!(matches!(basic_credentials(&HeaderMap::new()), Err(ApiError::Unauthorized)));

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(matches!(basic_credentials(&headers), Err(ApiError::Unauthorized)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert!(matches!(basic_credentials(&headers), Err(ApiError::Unauthorized)));
  }

  #[test]
  fn password_may_contain_colons() {
    let (user, pass) = basic_credentials(&basic("9876543210", "a:b:c")).unwrap();
    assert_eq!((user.as_str(), pass.as_str()), ("9876543210", "a:b:c"));
  }

  #[test]
  fn hashing_round_trip() {
    let hasher = Argon2Hashing;
    let hash = hasher.hash("hunter22").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(hasher.verify("hunter22", &hash));
    assert!(!hasher.verify("hunter23", &hash));
    assert!(!hasher.verify("hunter22", "not a phc string"));
  }
}
