//! Session and navigation types.
//!
//! The session replaces ambient browser storage: it is built once by the caller
//! and handed to the data-access layer, which attaches the token to every call.
//! Authentication failures come back as a [`Navigation::Redirect`] instead of
//! being acted upon deep inside a request.

use serde::{Deserialize, Serialize};

use crate::SecretString;

/// Minimal information about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub role: Option<String>,
}

/// Credentials and user information for backend calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
	token: Option<SecretString>,
	user: Option<UserInfo>,
}

impl Session {
	/// A session without credentials; every call goes out unauthenticated.
	pub fn anonymous() -> Self {
		Self::default()
	}

	pub fn new(token: Option<SecretString>, user: Option<UserInfo>) -> Self {
		Self {
			token: token.filter(|t| !t.is_empty()),
			user,
		}
	}

	pub fn with_token(token: impl Into<SecretString>) -> Self {
		Self::new(Some(token.into()), None)
	}

	pub fn user(&self) -> Option<&UserInfo> {
		self.user.as_ref()
	}

	pub fn is_authenticated(&self) -> bool {
		self.token.is_some()
	}

	/// Value of the `Authorization` header, if the session carries a token.
	pub fn authorization_header(&self) -> Option<String> {
		self.token
			.as_ref()
			.map(|token| token.with_exposed(|t| format!("Bearer {}", t)))
	}
}

/// Result of a call that may require the caller to navigate elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation<T> {
	Ok(T),
	/// The caller should navigate to the given path, typically the login page.
	Redirect { to: String },
}

impl<T> Navigation<T> {
	pub fn map<U, F>(self, f: F) -> Navigation<U>
	where
		F: FnOnce(T) -> U,
	{
		match self {
			Navigation::Ok(value) => Navigation::Ok(f(value)),
			Navigation::Redirect { to } => Navigation::Redirect { to },
		}
	}

	pub fn ok(self) -> Option<T> {
		match self {
			Navigation::Ok(value) => Some(value),
			Navigation::Redirect { .. } => None,
		}
	}

	pub fn redirect_target(&self) -> Option<&str> {
		match self {
			Navigation::Ok(_) => None,
			Navigation::Redirect { to } => Some(to),
		}
	}
}
