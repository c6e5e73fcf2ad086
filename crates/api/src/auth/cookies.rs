//! Cookie helpers for session credentials.
//!
//! Two cookies carry a session: `refresh_token` holds the long-lived opaque
//! secret, `access_token` holds the short-lived signed token.

use std::time::Duration;

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

pub const REFRESH_COOKIE: &str = "refresh_token";
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie carrying a pending-verification identity token.
pub const PENDING_COOKIE: &str = "verify_pedding";

/// Attributes for one `Set-Cookie` header.
#[derive(Debug, Clone, Copy)]
pub struct CookieSpec<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub max_age: Option<Duration>,
    pub path: Option<&'a str>,
    pub http_only: bool,
    pub secure: bool,
}

impl CookieSpec<'_> {
    /// Render the `Set-Cookie` header value.
    pub fn to_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{}={}", self.name, self.value);

        if let Some(age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
        }
        if let Some(path) = self.path {
            cookie.push_str(&format!("; Path={path}"));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=Lax");

        HeaderValue::from_str(&cookie)
    }
}

/// `refresh_token`: HTTP-only, no path restriction, `Secure` on HTTPS deployments.
pub fn refresh_cookie(
    secret: &str,
    lifetime_days: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    CookieSpec {
        name: REFRESH_COOKIE,
        value: secret,
        max_age: Some(lifetime(lifetime_days, 24 * 60 * 60)),
        path: None,
        http_only: true,
        secure,
    }
    .to_header()
}

/// `access_token`: readable by scripts, scoped to `path`, never `Secure`.
pub fn access_cookie(
    token: &str,
    lifetime_mins: i64,
    path: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    CookieSpec {
        name: ACCESS_COOKIE,
        value: token,
        max_age: Some(lifetime(lifetime_mins, 60)),
        path: Some(path),
        http_only: false,
        secure: false,
    }
    .to_header()
}

/// `count` units of `unit_secs` each; negatives clamp to zero, overflow saturates.
fn lifetime(count: i64, unit_secs: u64) -> Duration {
    Duration::from_secs(u64::try_from(count).unwrap_or(0).saturating_mul(unit_secs))
}

/// A cookie that tells the browser to drop `name` immediately.
pub fn expired_cookie(name: &str, path: Option<&str>) -> Result<HeaderValue, InvalidHeaderValue> {
    CookieSpec {
        name,
        value: "",
        max_age: Some(Duration::ZERO),
        path,
        http_only: true,
        secure: false,
    }
    .to_header()
}

/// Find a cookie value by name across every `Cookie` header.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
}
