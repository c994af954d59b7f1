use axum::{
    extract::{Request, State},
    http::{
        header::{InvalidHeaderValue, SET_COOKIE, USER_AGENT},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error, warn};

use crate::domain::security_event::{detect_events, RequestSignals};
use crate::domain::session::{is_auth_cookie, SessionTokenPair, LEGACY_AUTH_COOKIES};
use crate::infrastructure::auth::AuthClient;
use crate::presentation::handlers::AppState;

/// Header the edge proxy uses to forward the failed-auth counter
const AUTH_FAILURES_HEADER: &str = "x-auth-failures";

/// Paths the pipeline never runs on: static assets and images are served
/// without session handling.
const EXCLUDED_PREFIXES: [&str; 3] = ["/_assets/", "/static/", "/images/"];

const EXCLUDED_EXTENSIONS: [&str; 9] =
    ["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js"];

/// Whether the middleware chain skips this path entirely.
pub fn is_excluded_path(path: &str) -> bool {
    if EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    match path.rsplit_once('.') {
        Some((_, extension)) => EXCLUDED_EXTENSIONS.contains(&extension.to_lowercase().as_str()),
        None => false,
    }
}

/// Cookie rewrites produced by one session-refresh pass.
///
/// The refresher computes changes as data; the HTTP layer applies them to
/// the outgoing response. Nothing here touches a response directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieChanges {
    /// Cookies to (re)issue, as name/value pairs
    pub issued: Vec<(String, String)>,
    /// Cookie names to expire on the client
    pub removed: Vec<String>,
}

impl CookieChanges {
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty() && self.removed.is_empty()
    }

    /// Render the changes as `Set-Cookie` headers on a response.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        for (name, value) in &self.issued {
            let cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
            headers.append(SET_COOKIE, HeaderValue::from_str(&cookie)?);
        }
        for name in &self.removed {
            let cookie = format!("{name}=; Path=/; Max-Age=0");
            headers.append(SET_COOKIE, HeaderValue::from_str(&cookie)?);
        }
        Ok(())
    }
}

/// Validate/refresh the caller's session against the auth provider.
///
/// Pure with respect to the response: the outcome is a `CookieChanges`
/// value. Outcomes:
/// - no session cookies, or a valid session: no changes
/// - expired access token with a live refresh token: new pair issued
/// - dead refresh token: every auth cookie purged
/// - any other provider failure: logged and swallowed, no changes, so the
///   route handler's own auth checks take over
pub async fn refresh_session_cookies(
    auth: &AuthClient,
    cookies: &[(String, String)],
) -> CookieChanges {
    let mut changes = CookieChanges::default();

    let Some(pair) = SessionTokenPair::from_cookies(cookies) else {
        return changes;
    };

    match auth.get_user(&pair.access_token).await {
        Ok(user) => {
            debug!(user_id = %user.id, "session valid");
            changes
        }
        Err(err) if err.is_invalid_refresh() => {
            warn!("refresh token invalid; purging auth cookies");
            purge_auth_cookies(cookies, &mut changes);
            changes
        }
        Err(get_user_err) => {
            debug!("access token rejected, attempting refresh: {get_user_err}");
            match auth.refresh_session(&pair.refresh_token).await {
                Ok(new_pair) => {
                    changes.issued.push(("tp-access-token".to_string(), new_pair.access_token));
                    changes.issued.push(("tp-refresh-token".to_string(), new_pair.refresh_token));
                    changes
                }
                Err(err) if err.is_invalid_refresh() => {
                    warn!("refresh token invalid; purging auth cookies");
                    purge_auth_cookies(cookies, &mut changes);
                    changes
                }
                Err(err) => {
                    // Swallowed: the response passes through unmodified
                    warn!("session refresh failed, continuing unauthenticated: {err}");
                    changes
                }
            }
        }
    }
}

/// Mark every auth cookie for removal: the fixed legacy names plus any
/// request cookie matching the auth prefix and `auth-token` pattern.
fn purge_auth_cookies(cookies: &[(String, String)], changes: &mut CookieChanges) {
    for name in LEGACY_AUTH_COOKIES {
        changes.removed.push(name.to_string());
    }
    for (name, _) in cookies {
        if is_auth_cookie(name) && !changes.removed.iter().any(|r| r == name) {
            changes.removed.push(name.clone());
        }
    }
}

/// The per-request pipeline: exclusion matcher, security event detection,
/// session refresh, then the route handler.
///
/// Detected events are logged and the request always continues. An internal
/// failure while rewriting cookies yields a bare 500 with an empty body;
/// every other failure mode passes the original response through.
pub async fn pipeline_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_excluded_path(&path) {
        return next.run(request).await;
    }

    let signals = RequestSignals {
        path: &path,
        query: request.uri().query(),
        user_agent: request.headers().get(USER_AGENT).and_then(|v| v.to_str().ok()),
        auth_failures: request
            .headers()
            .get(AUTH_FAILURES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()),
    };
    for event in detect_events(&signals) {
        warn!(
            kind = event.kind.as_str(),
            path = %event.path,
            detail = %event.detail,
            "security event detected"
        );
    }

    let Some(auth) = state.auth.clone() else {
        warn!("auth provider not configured; skipping session refresh");
        return next.run(request).await;
    };

    let cookies: Vec<(String, String)> =
        jar.iter().map(|c| (c.name().to_string(), c.value().to_string())).collect();
    let changes = refresh_session_cookies(&auth, &cookies).await;

    let mut response = next.run(request).await;
    if let Err(err) = changes.apply(response.headers_mut()) {
        error!("failed to apply session cookie changes: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    response
}
