use crate::api::snippet;
use crate::catalog::{Catalog, Quote};
use crate::error::{ShortsError, ShortsResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const ZENQUOTES_URL: &str = "https://zenquotes.io/api/random";
const SERVICE: &str = "ZenQuotes";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ZenQuote {
    q: String,
    a: String,
}

/// Extracts the quote from a `/api/random` body.
pub fn parse_random(body: &str) -> ShortsResult<Quote> {
    let items: Vec<ZenQuote> = serde_json::from_str(body).map_err(|err| {
        ShortsError::upstream(SERVICE, format!("unexpected response ({err}): {}", snippet(body, 200)))
    })?;

    let first = items
        .into_iter()
        .next()
        .ok_or_else(|| ShortsError::upstream(SERVICE, "empty response"))?;

    // Rate-limited responses come back as a pseudo-quote attributed to the service.
    if first.a.trim() == "zenquotes.io" {
        return Err(ShortsError::upstream(SERVICE, format!("rate limited: {}", first.q)));
    }

    let content = first.q.trim();
    if content.is_empty() {
        return Err(ShortsError::upstream(SERVICE, "quote without content"));
    }
    Ok(Quote::new(content, first.a.trim()))
}

pub struct ZenQuotesCatalog {
    client: Client,
    url: String,
}

impl ZenQuotesCatalog {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: ZENQUOTES_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Catalog for ZenQuotesCatalog {
    type Item = Quote;

    async fn fetch(&mut self, _attempt: u32) -> ShortsResult<Vec<Quote>> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| ShortsError::upstream(SERVICE, err))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ShortsError::upstream(SERVICE, format!("HTTP {}", status.as_u16())));
        }

        let body = resp.text().await.map_err(|err| ShortsError::upstream(SERVICE, err))?;
        Ok(vec![parse_random(&body)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_item() {
        let body = r#"[{"q":"Stay curious. ","a":"Unknown","h":"<blockquote>...</blockquote>"}]"#;
        assert_eq!(parse_random(body).unwrap(), Quote::new("Stay curious.", "Unknown"));
    }

    #[test]
    fn rate_limit_is_upstream_error() {
        let body = r#"[{"q":"Too many requests. Obtain an auth key for unlimited access.","a":"zenquotes.io"}]"#;
        let err = parse_random(body).unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn malformed_bodies_are_upstream_errors() {
        for body in ["[]", "{}", "<html>", r#"[{"q":"  ","a":"x"}]"#] {
            assert!(matches!(
                parse_random(body),
                Err(ShortsError::Upstream { service: "ZenQuotes", .. })
            ));
        }
    }
}
