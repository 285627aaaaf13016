//! Minimal cookie handling for the session and guest-cart cookies.

use axum::http::{header, HeaderMap, HeaderValue};
use std::time::Duration;

/// Session JWT cookie
pub const SESSION_COOKIE: &str = "token";
/// Guest cart identifier cookie
pub const GUEST_CART_COOKIE: &str = "guest_cart";

/// Returns the value of cookie `name` from the `Cookie` request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
        }
    }
}

/// `Set-Cookie` builder for HttpOnly cookies scoped to `/`.
#[derive(Debug, Clone)]
pub struct CookieBuilder {
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
    same_site: SameSite,
}

impl CookieBuilder {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
            max_age: Duration::ZERO,
            secure: false,
            same_site: SameSite::Strict,
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Expires the cookie immediately.
    pub fn removal(name: &'static str, secure: bool) -> Self {
        Self::new(name, "").secure(secure)
    }

    pub fn build(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            self.name,
            self.value,
            self.max_age.as_secs(),
            self.same_site.as_str()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.build()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; guest_cart=xyz"),
        );
        assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, GUEST_CART_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = CookieBuilder::new(SESSION_COOKIE, "jwt")
            .max_age(Duration::from_secs(604_800))
            .secure(true)
            .build();
        assert_eq!(
            cookie,
            "token=jwt; Path=/; Max-Age=604800; HttpOnly; SameSite=Strict; Secure"
        );
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = CookieBuilder::removal(SESSION_COOKIE, false).build();
        assert!(cookie.starts_with("token=; Path=/; Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }
}
