//! Authorization schemes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    /// Lets the transport pick the scheme. Without a challenge round-trip
    /// this is sent as basic credentials.
    Auto { username: String, password: String },
    Bearer(String),
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn auto(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Auto {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer(token.into())
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Auth::Basic { username, password } | Auth::Auto { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
            Auth::Bearer(token) => format!("Bearer {token}"),
        }
    }
}
