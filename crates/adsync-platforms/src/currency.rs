//! Official daily currency rate used to normalize foreign-currency spend.
//!
//! The central bank publishes an XML document of `<Valute>` entries whose
//! values use a decimal comma (`92,1234`). Every failure to obtain a usable
//! number is reported as [`PlatformError::RateUnavailable`].

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;

use crate::error::PlatformError;
use crate::http::HttpSettings;

const DEFAULT_RATE_URL: &str = "http://www.cbr.ru/scripts/XML_daily.asp";

/// Source of the conversion rate from a foreign currency into the
/// reference currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Returns units of reference currency per one unit of foreign currency.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::RateUnavailable`] if no rate can be produced.
    async fn get_rate(&self) -> Result<f64, PlatformError>;
}

/// Rate provider backed by the central bank's daily XML feed.
pub struct CbrRateProvider {
    client: Client,
    url: String,
    currency_code: String,
}

impl CbrRateProvider {
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings, currency_code: &str) -> Result<Self, PlatformError> {
        Self::with_url(settings, currency_code, DEFAULT_RATE_URL)
    }

    /// Creates a provider reading from a custom URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the HTTP client cannot be built.
    pub fn with_url(
        settings: &HttpSettings,
        currency_code: &str,
        url: &str,
    ) -> Result<Self, PlatformError> {
        Ok(Self {
            client: settings.build_client()?,
            url: url.to_owned(),
            currency_code: currency_code.to_uppercase(),
        })
    }
}

#[async_trait]
impl RateProvider for CbrRateProvider {
    async fn get_rate(&self) -> Result<f64, PlatformError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PlatformError::RateUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PlatformError::RateUnavailable(format!(
                "unexpected HTTP status {}",
                response.status()
            )));
        }

        // The feed is windows-1251; only ASCII codes and digits are needed.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlatformError::RateUnavailable(format!("body read failed: {e}")))?;
        let document = String::from_utf8_lossy(&bytes);

        let rate = parse_rate_document(&document, &self.currency_code)?;
        tracing::info!(currency = %self.currency_code, rate, "official conversion rate fetched");
        Ok(rate)
    }
}

/// Finds `currency_code` in the daily rate document and returns its rate
/// per single unit (`Value / Nominal`).
///
/// # Errors
///
/// Returns [`PlatformError::RateUnavailable`] if the document is malformed,
/// the currency is absent, or its value is not a usable number.
pub fn parse_rate_document(xml: &str, currency_code: &str) -> Result<f64, PlatformError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_valute = false;
    let mut current_tag = String::new();
    let mut char_code = String::new();
    let mut value = String::new();
    let mut nominal = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                if name == "Valute" {
                    in_valute = true;
                    char_code.clear();
                    value.clear();
                    nominal.clear();
                }
                current_tag = name;
            }
            Ok(Event::Text(e)) => {
                if in_valute {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    match current_tag.as_str() {
                        "CharCode" => char_code = text,
                        "Value" => value = text,
                        "Nominal" => nominal = text,
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let raw = e.name();
                let name = std::str::from_utf8(raw.as_ref()).unwrap_or("");
                if name == "Valute" && in_valute {
                    in_valute = false;
                    if char_code.trim().eq_ignore_ascii_case(currency_code) {
                        return rate_from_parts(currency_code, &value, &nominal);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PlatformError::RateUnavailable(format!(
                    "malformed rate document: {e}"
                )))
            }
            _ => {}
        }
    }

    Err(PlatformError::RateUnavailable(format!(
        "currency {currency_code} not found in rate document"
    )))
}

fn rate_from_parts(currency_code: &str, value: &str, nominal: &str) -> Result<f64, PlatformError> {
    if value.trim().is_empty() {
        return Err(PlatformError::RateUnavailable(format!(
            "currency {currency_code} has no value"
        )));
    }
    let value = parse_decimal_comma(value).ok_or_else(|| {
        PlatformError::RateUnavailable(format!(
            "currency {currency_code} value '{value}' is not a number"
        ))
    })?;
    let nominal = if nominal.trim().is_empty() {
        1.0
    } else {
        parse_decimal_comma(nominal).ok_or_else(|| {
            PlatformError::RateUnavailable(format!(
                "currency {currency_code} nominal '{nominal}' is not a number"
            ))
        })?
    };
    Ok(value / nominal)
}

/// Parses a numeral that may use a decimal comma (`"92,1234"`) and spaces
/// as group separators. Returns `None` for anything that is not a positive,
/// finite number.
#[must_use]
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned.matches('.').count() > 1 {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs Date="16.10.2026" name="Foreign Currency Market">
  <Valute ID="R01010"><NumCode>036</NumCode><CharCode>AUD</CharCode><Nominal>1</Nominal><Name>AUD</Name><Value>61,2345</Value></Valute>
  <Valute ID="R01235"><NumCode>840</NumCode><CharCode>USD</CharCode><Nominal>1</Nominal><Name>USD</Name><Value>92,1234</Value></Valute>
  <Valute ID="R01335"><NumCode>398</NumCode><CharCode>KZT</CharCode><Nominal>100</Nominal><Name>KZT</Name><Value>18,5000</Value></Valute>
</ValCurs>"#;

    #[test]
    fn parses_decimal_comma() {
        assert_eq!(parse_decimal_comma("92,1234"), Some(92.1234));
        assert_eq!(parse_decimal_comma(" 1 234,5 "), Some(1234.5));
        assert_eq!(parse_decimal_comma("92.5"), Some(92.5));
    }

    #[test]
    fn rejects_bad_numerals() {
        assert_eq!(parse_decimal_comma(""), None);
        assert_eq!(parse_decimal_comma("n/a"), None);
        assert_eq!(parse_decimal_comma("1,2,3"), None);
        assert_eq!(parse_decimal_comma("0,0"), None);
    }

    #[test]
    fn finds_requested_currency() {
        let rate = parse_rate_document(DAILY, "USD").unwrap();
        assert!((rate - 92.1234).abs() < 1e-9);
    }

    #[test]
    fn divides_by_nominal() {
        let rate = parse_rate_document(DAILY, "KZT").unwrap();
        assert!((rate - 0.185).abs() < 1e-9);
    }

    #[test]
    fn missing_currency_is_rate_unavailable() {
        let err = parse_rate_document(DAILY, "EUR").unwrap_err();
        assert!(matches!(err, PlatformError::RateUnavailable(ref m) if m.contains("EUR")));
    }

    #[test]
    fn missing_value_node_is_rate_unavailable() {
        let xml = "<ValCurs><Valute><CharCode>USD</CharCode><Nominal>1</Nominal></Valute></ValCurs>";
        assert!(matches!(
            parse_rate_document(xml, "USD"),
            Err(PlatformError::RateUnavailable(_))
        ));
    }
}
