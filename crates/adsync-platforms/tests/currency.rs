//! Integration tests for `CbrRateProvider` using wiremock HTTP mocks.

use adsync_platforms::{CbrRateProvider, HttpSettings, PlatformError, RateProvider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DAILY: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs Date="16.10.2026" name="Foreign Currency Market">
<Valute ID="R01235"><NumCode>840</NumCode><CharCode>USD</CharCode><Nominal>1</Nominal><Name>US Dollar</Name><Value>92,1234</Value></Valute>
<Valute ID="R01239"><NumCode>978</NumCode><CharCode>EUR</CharCode><Nominal>1</Nominal><Name>Euro</Name><Value>100,5000</Value></Valute>
</ValCurs>"#;

fn settings() -> HttpSettings {
    HttpSettings {
        timeout_secs: 5,
        user_agent: "adsync-test".to_string(),
        max_retries: 0,
        backoff_base_ms: 0,
    }
}

fn provider(server: &MockServer, code: &str) -> CbrRateProvider {
    CbrRateProvider::with_url(&settings(), code, &format!("{}/scripts/XML_daily.asp", server.uri()))
        .expect("provider construction should not fail")
}

#[tokio::test]
async fn parses_decimal_comma_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scripts/XML_daily.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DAILY))
        .mount(&server)
        .await;

    let rate = provider(&server, "usd").get_rate().await.unwrap();
    assert!((rate - 92.1234).abs() < 1e-9);
}

#[tokio::test]
async fn missing_currency_is_rate_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scripts/XML_daily.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DAILY))
        .mount(&server)
        .await;

    let err = provider(&server, "GBP").get_rate().await.unwrap_err();
    assert!(matches!(err, PlatformError::RateUnavailable(_)));
}

#[tokio::test]
async fn server_error_is_rate_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server, "USD").get_rate().await.unwrap_err();
    assert!(err.is_fatal());
}
