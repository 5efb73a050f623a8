use anyrun_core::UserConfig;
use axum::{
	body::Body,
	extract::State,
	http::{header, Request, StatusCode},
	middleware::Next,
	response::Response,
};
use sha2::{Digest, Sha256};

use super::api::AppState;

pub fn hash_password(password: &str) -> String {
	hex::encode(Sha256::digest(password.as_bytes()))
}

/// Checks a login attempt. A user still on first login with no password set
/// accepts any password.
pub fn authenticate(user: Option<&UserConfig>, username: &str, password: &str) -> bool {
	let Some(user) = user else {
		return false;
	};
	if user.username != username {
		return false;
	}
	if user.first_login && user.password_hash.is_empty() {
		return true;
	}
	user.password_hash == hash_password(password)
}

/// Whether API requests must carry the session token.
pub fn auth_required(user: Option<&UserConfig>) -> bool {
	match user {
		None => false,
		Some(user) => !(user.password_hash.is_empty() && !user.first_login),
	}
}

pub fn generate_token() -> String {
	uuid::Uuid::new_v4().to_string()
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
	request
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
}

pub async fn auth_middleware(
	State(state): State<AppState>,
	request: Request<Body>,
	next: Next,
) -> Result<Response, StatusCode> {
	let required = {
		let config = state.config.read().await;
		auth_required(config.user.as_ref())
	};
	if !required {
		return Ok(next.run(request).await);
	}

	match bearer_token(&request) {
		Some(token) if token == state.token.as_str() => Ok(next.run(request).await),
		Some(_) => {
			tracing::debug!("rejected {}: bad session token", request.uri().path());
			Err(StatusCode::UNAUTHORIZED)
		}
		None => Err(StatusCode::UNAUTHORIZED),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn user(hash: &str, first_login: bool) -> UserConfig {
		UserConfig {
			username: "admin".into(),
			password_hash: hash.into(),
			first_login,
		}
	}

	#[test]
	fn hash_is_lowercase_sha256_hex() {
		assert_eq!(
			hash_password("secret"),
			"2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
		);
	}

	#[test]
	fn first_login_without_password_accepts_anything() {
		let u = user("", true);
		assert!(authenticate(Some(&u), "admin", ""));
		assert!(authenticate(Some(&u), "admin", "whatever"));
		assert!(!authenticate(Some(&u), "root", "whatever"));
	}

	#[test]
	fn stored_hash_must_match() {
		let u = user(&hash_password("hunter2"), false);
		assert!(authenticate(Some(&u), "admin", "hunter2"));
		assert!(!authenticate(Some(&u), "admin", "hunter3"));
	}

	#[test]
	fn no_user_never_authenticates() {
		assert!(!authenticate(None, "admin", ""));
	}

	#[test]
	fn auth_is_skipped_only_for_passwordless_configured_user() {
		assert!(!auth_required(None));
		assert!(!auth_required(Some(&user("", false))));
		assert!(auth_required(Some(&user("", true))));
		assert!(auth_required(Some(&user(&hash_password("x"), false))));
	}

	#[test]
	fn tokens_are_unique() {
		assert_ne!(generate_token(), generate_token());
	}
}
