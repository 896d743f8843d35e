//! Token and id extraction from platform HTML pages.
//!
//! These pages are not APIs and change without notice, so the parsing is
//! kept in small pure functions that can be tested against saved markup.

use std::sync::LazyLock;

use regex::Regex;

static ACCESS_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.__accessToken\s*=\s*"([^"]+)";"#).expect("valid access token regex")
});
static SESSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{"sessionID":"([a-z0-9]{16})"\}"#).expect("valid session id regex")
});
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<html\b[^>]*>").expect("valid html tag regex"));
static GA_USER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdata-ga-userid\s*=\s*["']([^"']+)["']"#).expect("valid userid regex")
});

/// Token pair scraped from the Social-Graph ads manager page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub access_token: String,
    pub session_id: String,
}

/// Extracts the access token and session id embedded in the ads manager
/// page. Returns `None` unless both are present.
#[must_use]
pub fn extract_session_token(html: &str) -> Option<SessionToken> {
    let access_token = ACCESS_TOKEN_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())?;
    let session_id = SESSION_ID_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())?;
    Some(SessionToken {
        access_token,
        session_id,
    })
}

/// Extracts the numeric internal client id the Native-Mobile dashboard
/// stores on its root `<html>` element.
#[must_use]
pub fn extract_internal_client_id(html: &str) -> Option<String> {
    let tag = HTML_TAG_RE.find(html)?;
    GA_USER_ID_RE
        .captures(tag.as_str())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANAGER_PAGE: &str = r#"<html><head><script>
        window.__accessToken="EAABsbCS1iHgBAKZCz";
        require("ServerJS").handle({"define":[["SessionConfig",[],{"sessionID":"0a1b2c3d4e5f6789"},12]]});
        </script></head></html>"#;

    #[test]
    fn extracts_token_and_session_id() {
        let token = extract_session_token(MANAGER_PAGE).unwrap();
        assert_eq!(token.access_token, "EAABsbCS1iHgBAKZCz");
        assert_eq!(token.session_id, "0a1b2c3d4e5f6789");
    }

    #[test]
    fn missing_session_id_yields_none() {
        let html = r#"<script>window.__accessToken="EAAB";</script>"#;
        assert!(extract_session_token(html).is_none());
    }

    #[test]
    fn login_page_yields_none() {
        assert!(extract_session_token("<html><body>Log in</body></html>").is_none());
    }

    #[test]
    fn extracts_internal_id_from_html_tag() {
        let html = "<!DOCTYPE html>\n<html lang=\"ru\" class=\"no-js\" data-ga-userid=\"9876543\">\n<head></head></html>";
        assert_eq!(extract_internal_client_id(html).as_deref(), Some("9876543"));
    }

    #[test]
    fn ignores_userid_outside_html_tag() {
        let html = "<html lang=\"ru\"><body><div data-ga-userid=\"111\"></div></body></html>";
        assert!(extract_internal_client_id(html).is_none());
    }

    #[test]
    fn rejects_non_numeric_internal_id() {
        let html = "<html data-ga-userid=\"anonymous\"></html>";
        assert!(extract_internal_client_id(html).is_none());
    }
}
