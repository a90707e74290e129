//! Cookie jar shared by every request an `Agent` creates.
//!
//! Requests complete concurrently, so every access goes through one mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    /// Set when the cookie carried no `Domain` attribute.
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
}

impl Cookie {
    /// Parse one `Set-Cookie` value received from `url`. Returns the cookie
    /// and whether it asked to be deleted (`Max-Age` of zero or less).
    fn parse(header: &str, url: &Url) -> Option<(Cookie, bool)> {
        let mut attributes = header.split(';');
        let (name, value) = attributes.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let host = url.host_str()?.to_ascii_lowercase();
        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: host.clone(),
            host_only: true,
            path: default_path(url),
            secure: false,
        };
        let mut expired = false;

        for attribute in attributes {
            let (key, value) = match attribute.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (attribute.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" if !value.is_empty() => {
                    let domain = value.trim_start_matches('.').to_ascii_lowercase();
                    if !domain_matches(&host, &domain) {
                        return None;
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "path" if value.starts_with('/') => cookie.path = value.to_string(),
                "secure" => cookie.secure = true,
                "max-age" => expired = value.parse::<i64>().map(|age| age <= 0).unwrap_or(false),
                _ => {}
            }
        }
        Some((cookie, expired))
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let host_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };
        host_ok && path_matches(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/')))
}

fn default_path(url: &Url) -> String {
    match url.path().rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => url.path()[..index].to_string(),
    }
}

#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<Vec<Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the `Set-Cookie` headers of a response received from `url`.
    pub fn store<'a>(&self, url: &Url, set_cookie: impl IntoIterator<Item = &'a str>) {
        let mut cookies = self.lock();
        for header in set_cookie {
            let Some((cookie, expired)) = Cookie::parse(header, url) else {
                debug!(header, "ignoring malformed Set-Cookie");
                continue;
            };
            cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
            if expired {
                debug!(name = %cookie.name, "cookie removed");
            } else {
                debug!(name = %cookie.name, domain = %cookie.domain, "cookie stored");
                cookies.push(cookie);
            }
        }
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let cookies = self.lock();
        let pairs: Vec<String> = cookies
            .iter()
            .filter(|cookie| cookie.matches(url))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    pub fn cookies(&self) -> Vec<Cookie> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn stored_cookies_are_sent_back() {
        let jar = CookieJar::new();
        jar.store(&url("http://api.test/login"), ["session=abc; Path=/", "theme=dark"]);
        assert_eq!(jar.header_for(&url("http://api.test/profile")).as_deref(), Some("session=abc; theme=dark"));
    }

    #[test]
    fn host_only_cookies_stay_on_their_host() {
        let jar = CookieJar::new();
        jar.store(&url("http://api.test/"), ["a=1"]);
        assert_eq!(jar.header_for(&url("http://other.api.test/")), None);
    }

    #[test]
    fn domain_cookies_cover_subdomains() {
        let jar = CookieJar::new();
        jar.store(&url("http://www.test.com/"), ["name1=value1; Domain=.test.com; Path=/"]);
        assert_eq!(jar.header_for(&url("http://api.test.com/x")).as_deref(), Some("name1=value1"));
    }

    #[test]
    fn foreign_domains_are_rejected() {
        let jar = CookieJar::new();
        jar.store(&url("http://www.test.com/"), ["evil=1; Domain=other.com"]);
        assert!(jar.cookies().is_empty());
    }

    #[test]
    fn path_scopes_cookies() {
        let jar = CookieJar::new();
        jar.store(&url("http://api.test/"), ["admin=1; Path=/admin"]);
        assert_eq!(jar.header_for(&url("http://api.test/admin/users")).as_deref(), Some("admin=1"));
        assert_eq!(jar.header_for(&url("http://api.test/administrator")), None);
    }

    #[test]
    fn zero_max_age_deletes() {
        let jar = CookieJar::new();
        let origin = url("http://api.test/");
        jar.store(&origin, ["session=abc"]);
        jar.store(&origin, ["session=; Max-Age=0"]);
        assert_eq!(jar.header_for(&origin), None);
    }

    #[test]
    fn secure_cookies_need_https() {
        let jar = CookieJar::new();
        jar.store(&url("https://api.test/"), ["token=t; Secure"]);
        assert_eq!(jar.header_for(&url("http://api.test/")), None);
        assert_eq!(jar.header_for(&url("https://api.test/")).as_deref(), Some("token=t"));
    }

    #[test]
    fn later_cookie_replaces_earlier() {
        let jar = CookieJar::new();
        let origin = url("http://api.test/");
        jar.store(&origin, ["theme=dark"]);
        jar.store(&origin, ["theme=light"]);
        assert_eq!(jar.header_for(&origin).as_deref(), Some("theme=light"));
    }
}
