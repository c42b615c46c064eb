// src/trackers/magnet.rs

//! Magnet locators: validation and the repeatable `tr` endpoint fields.

use std::collections::HashSet;

use url::Url;

use crate::error::SessionError;

const MAGNET_PREFIX: &str = "magnet:?";
const BTIH_PREFIX: &str = "urn:btih:";

fn is_btih(hash: &str) -> bool {
    match hash.len() {
        40 => hash.chars().all(|c| c.is_ascii_hexdigit()),
        32 => hash
            .chars()
            .all(|c| c.is_ascii_alphabetic() || ('2'..='7').contains(&c)),
        _ => false,
    }
}

/// Accepts `magnet:?xt=urn:btih:<40 hex | 32 base32>` with any further fields.
pub fn validate_magnet(locator: &str) -> Result<Url, SessionError> {
    let trimmed = locator.trim();
    if !trimmed.starts_with(MAGNET_PREFIX) {
        return Err(SessionError::InvalidLocator(
            "locator must start with magnet:?".to_string(),
        ));
    }
    let url = Url::parse(trimmed).map_err(|e| SessionError::InvalidLocator(e.to_string()))?;

    let has_btih = url.query_pairs().any(|(key, value)| {
        key == "xt"
            && value
                .strip_prefix(BTIH_PREFIX)
                .map(is_btih)
                .unwrap_or(false)
    });
    if !has_btih {
        return Err(SessionError::InvalidLocator(
            "missing or malformed xt=urn:btih field".to_string(),
        ));
    }
    Ok(url)
}

/// Decoded `tr` values already embedded in the locator, or `None` when the
/// locator is not a valid magnet.
pub fn existing_trackers(locator: &str) -> Option<HashSet<String>> {
    let url = validate_magnet(locator).ok()?;
    Some(
        url.query_pairs()
            .filter(|(key, _)| key == "tr")
            .map(|(_, value)| value.into_owned())
            .collect(),
    )
}

/// Append each endpoint as a percent-encoded `tr` field, leaving the existing
/// text untouched.
pub fn append_trackers(locator: &str, endpoints: &[String]) -> String {
    let mut out = locator.to_string();
    for endpoint in endpoints {
        if !out.ends_with('&') {
            out.push('&');
        }
        out.push_str("tr=");
        out.push_str(&urlencoding::encode(endpoint));
    }
    out
}
