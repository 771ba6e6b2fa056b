use http::{header::AUTHORIZATION, HeaderMap};

use crate::{Error, Result};

const BEARER_PREFIX: &str = "Bearer ";

/// Checks `Authorization: Bearer <token>` against the pre-shared webhook token.
pub fn authorize(headers: &HeaderMap, token: &str) -> Result<()> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match header.strip_prefix(BEARER_PREFIX) {
        None => Err(Error::MissingToken),
        Some(presented) if presented == token => Ok(()),
        Some(_) => Err(Error::Unauthorized),
    }
}
