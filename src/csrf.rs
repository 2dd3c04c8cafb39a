use rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{HResult, HandlerError};
use crate::session::Session;
use crate::util::constant_time_compare;

/// Session key the live token is stored under.
pub const CSRF_SESSION_KEY: &str = "_csrf_token";
/// Form field a mutating request must carry.
pub const CSRF_FORM_FIELD: &str = "_csrf_token";

const TOKEN_SEED_LEN: usize = 40;

/// Returns the session's live token, minting one on first access.
///
/// Rendering code embeds this in every form that posts back. In test mode
/// no token is minted and the accessor returns an empty string.
pub fn token<R: Rng + CryptoRng>(session: &mut Session, config: &Config, rng: &mut R) -> String {
    if config.testing {
        return String::new();
    }

    if let Some(existing) = session.get(CSRF_SESSION_KEY) {
        return existing.to_owned();
    }

    let minted = mint(rng);
    session.insert(CSRF_SESSION_KEY, minted.clone());
    minted
}

/// Checks a submitted token against the one on file in the session.
///
/// The stored token is popped before the comparison, so a failed check
/// leaves the session without any token until the next render mints a new
/// one. A client that resubmits a stale form after a rejection keeps being
/// rejected until it reloads a page. This mirrors the site's long-standing
/// behavior and is kept as is rather than fixed here.
pub fn validate(session: &mut Session, submitted: Option<&str>) -> HResult<()> {
    let expected = session.remove(CSRF_SESSION_KEY);

    match (expected, submitted) {
        (Some(expected), Some(submitted)) if constant_time_compare(&expected, submitted) => Ok(()),
        _ => Err(HandlerError::from(403)),
    }
}

/// Fixed-length opaque token: 40 bytes from the caller's CSPRNG, pushed
/// through SHA-256 and hex encoded.
fn mint<R: Rng + CryptoRng>(rng: &mut R) -> String {
    let mut seed = [0u8; TOKEN_SEED_LEN];
    rng.fill(&mut seed[..]);
    hex::encode(Sha256::digest(seed))
}
