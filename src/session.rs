use std::collections::BTreeMap;

use actix_web::{
    cookie::{Cookie, SameSite},
    HttpRequest,
};
use log::debug;

use crate::crypto;

pub const SESSION_COOKIE: &str = "session";

/// Client-held key/value store, signed so the server can trust that its
/// contents were not tampered with.
///
/// Wire format: `BASE64URL(json map) . BASE64URL(HMACSHA256_SIGN(payload, SECRET_KEY))`
///
/// A missing or badly signed cookie yields a fresh empty session. The
/// session tracks whether it was mutated so the request scope only writes
/// the cookie back when something changed.
#[derive(Debug, Default)]
pub struct Session {
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_request(req: &HttpRequest, secret: &[u8]) -> Self {
        match req.cookie(SESSION_COOKIE) {
            Some(cookie) => Self::decode(cookie.value(), secret).unwrap_or_else(|| {
                debug!("discarding session cookie with a bad signature");
                Self::new()
            }),
            None => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_owned(), value.into());
        self.dirty = true;
    }

    /// Removes and returns a value. Only marks the session dirty when the
    /// key was actually present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Parses and verifies a serialized session. `None` means the payload
    /// was malformed or the signature did not check out.
    pub fn decode(raw: &str, secret: &[u8]) -> Option<Self> {
        let (payload, signature) = raw.split_once('.')?;
        let signature = base64_url::decode(signature).ok()?;

        if !crypto::verify_signature(secret, payload.as_bytes(), &signature) {
            return None;
        }

        let payload = base64_url::decode(payload).ok()?;
        let values = serde_json::from_slice(&payload).ok()?;

        Some(Self {
            values,
            dirty: false,
        })
    }

    /// Serializes and signs the session.
    pub fn encode(&self, secret: &[u8]) -> String {
        // a map of strings cannot fail to serialize
        let payload = serde_json::to_vec(&self.values).unwrap();
        let payload = base64_url::encode(&payload);
        let signature = base64_url::encode(&crypto::sign(secret, payload.as_bytes()));

        format!("{}.{}", payload, signature)
    }

    pub fn to_cookie(&self, secret: &[u8]) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, self.encode(secret))
            // send on every route
            .path("/")
            // disallow js access
            .http_only(true)
            // allow the cookie when the user is coming from another site
            .same_site(SameSite::Lax)
            .finish()
    }
}
