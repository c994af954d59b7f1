use serde::Deserialize;

/// Prefix shared by every cookie the auth provider issues for this platform.
pub const AUTH_COOKIE_PREFIX: &str = "tp-";

/// Cookie names from earlier releases that must still be cleared when a
/// session is invalidated, even though new sessions no longer set them.
pub const LEGACY_AUTH_COOKIES: [&str; 3] =
    ["tp-access-token", "tp-refresh-token", "tp-provider-token"];

/// Session token pair issued by the auth provider.
///
/// At most one valid pair exists per browser session; a refresh failure
/// invalidates both tokens together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JSON payload stored inside a combined `auth-token` cookie.
#[derive(Debug, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
}

impl SessionTokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }

    /// Extract the session pair from request cookies.
    ///
    /// Two layouts are supported: the legacy pair of `tp-access-token` /
    /// `tp-refresh-token` cookies, and the combined `tp-<project>-auth-token`
    /// cookie holding a JSON session, possibly split into `.0`, `.1`, ...
    /// chunks when the session exceeds the per-cookie size limit. The legacy
    /// pair wins when both are present.
    pub fn from_cookies(cookies: &[(String, String)]) -> Option<Self> {
        let find = |name: &str| {
            cookies.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
        };

        if let (Some(access), Some(refresh)) = (find("tp-access-token"), find("tp-refresh-token")) {
            if !access.is_empty() && !refresh.is_empty() {
                return Some(Self::new(access, refresh));
            }
        }

        let combined = reassemble_combined_cookie(cookies)?;
        let stored: StoredSession = serde_json::from_str(&combined).ok()?;
        if stored.access_token.is_empty() || stored.refresh_token.is_empty() {
            return None;
        }
        Some(Self::new(stored.access_token, stored.refresh_token))
    }
}

/// Whether a cookie belongs to the auth provider and must be cleared when the
/// session is invalidated: one of the fixed legacy names, or any cookie whose
/// name starts with the platform prefix and contains `auth-token`.
pub fn is_auth_cookie(name: &str) -> bool {
    LEGACY_AUTH_COOKIES.contains(&name)
        || (name.starts_with(AUTH_COOKIE_PREFIX) && name.contains("auth-token"))
}

/// Reassemble the combined session cookie value, joining `.N`-suffixed chunks
/// in index order.
fn reassemble_combined_cookie(cookies: &[(String, String)]) -> Option<String> {
    let mut chunks: Vec<(u32, &str)> = Vec::new();
    let mut whole: Option<&str> = None;

    for (name, value) in cookies {
        if !(name.starts_with(AUTH_COOKIE_PREFIX) && name.contains("auth-token")) {
            continue;
        }
        if LEGACY_AUTH_COOKIES.contains(&name.as_str()) {
            continue;
        }
        match chunk_index(name) {
            Some(index) => chunks.push((index, value)),
            None => whole = Some(value),
        }
    }

    if !chunks.is_empty() {
        chunks.sort_by_key(|(index, _)| *index);
        return Some(chunks.into_iter().map(|(_, v)| v).collect::<String>());
    }

    whole.map(String::from)
}

/// Parse the trailing chunk index of a cookie name, e.g. `tp-x-auth-token.1`.
fn chunk_index(name: &str) -> Option<u32> {
    let (_, suffix) = name.rsplit_once('.')?;
    suffix.parse().ok()
}
