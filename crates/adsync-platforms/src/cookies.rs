//! Cookie jar loaded from a Netscape `cookies.txt` export.
//!
//! The jar is supplied from outside (a browser export); adsync only reads it
//! and builds `Cookie` headers for the hosts it talks to.

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    domain: String,
    include_subdomains: bool,
    path: String,
    expires: i64,
    name: String,
    value: String,
}

impl Cookie {
    fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        if host.eq_ignore_ascii_case(domain) {
            return true;
        }
        (self.include_subdomains || self.domain.starts_with('.'))
            && host.len() > domain.len()
            && host.to_ascii_lowercase().ends_with(&format!(".{}", domain.to_ascii_lowercase()))
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires < now
    }
}

/// Read-only set of session cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a jar from `path`; a missing file yields an empty jar.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file exists but cannot be read.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "cookie file not found; using an empty jar");
            return Ok(Self::empty());
        }
        let content = std::fs::read_to_string(path)?;
        let jar = Self::parse(&content);
        tracing::debug!(path = %path.display(), count = jar.len(), "cookies loaded");
        Ok(jar)
    }

    /// Parses Netscape `cookies.txt` content. Malformed lines are skipped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let cookies = content
            .lines()
            .filter_map(|line| {
                let line = line.trim_end_matches('\r');
                let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
                if line.trim().is_empty() || line.starts_with('#') {
                    return None;
                }
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() != 7 {
                    tracing::debug!(fields = fields.len(), "skipping malformed cookie line");
                    return None;
                }
                Some(Cookie {
                    domain: fields[0].to_string(),
                    include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
                    path: fields[2].to_string(),
                    expires: fields[4].parse().unwrap_or(0),
                    name: fields[5].to_string(),
                    value: fields[6].to_string(),
                })
            })
            .collect();
        Self { cookies }
    }

    /// Builds the `Cookie` header value for `host`, or `None` when no
    /// unexpired cookie applies.
    #[must_use]
    pub fn header_for(&self, host: &str) -> Option<String> {
        let now = chrono::Utc::now().timestamp();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches_host(host) && !c.is_expired(now) && c.path.starts_with('/'))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAR: &str = "# Netscape HTTP Cookie File\n\
.example.com\tTRUE\t/\tTRUE\t0\tsid\tabc123\n\
#HttpOnly_.example.com\tTRUE\t/\tTRUE\t0\tcsrftoken\txyz\n\
ads.other.test\tFALSE\t/\tFALSE\t0\tsession\tonly-exact\n\
.example.com\tTRUE\t/\tTRUE\t1\texpired\tgone\n\
broken line without tabs\n";

    #[test]
    fn parses_lines_and_http_only_prefix() {
        let jar = CookieJar::parse(JAR);
        assert_eq!(jar.len(), 4);
    }

    #[test]
    fn header_matches_subdomains_and_skips_expired() {
        let jar = CookieJar::parse(JAR);
        let header = jar.header_for("business.example.com").unwrap();
        assert_eq!(header, "sid=abc123; csrftoken=xyz");
    }

    #[test]
    fn exact_host_cookie_does_not_leak_to_subdomains() {
        let jar = CookieJar::parse(JAR);
        assert_eq!(
            jar.header_for("ads.other.test").as_deref(),
            Some("session=only-exact")
        );
        assert!(jar.header_for("x.ads.other.test").is_none());
    }

    #[test]
    fn unrelated_host_gets_no_header() {
        let jar = CookieJar::parse(JAR);
        assert!(jar.header_for("notexample.com").is_none());
    }
}
