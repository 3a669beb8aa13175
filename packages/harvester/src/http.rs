//! Blocking page downloads with backoff on transient failures.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{HarvesterError, Result};

const USER_AGENT: &str = concat!("verse-harvester/", env!("CARGO_PKG_VERSION"));

/// Attempts per page before giving up on transient failures.
pub const MAX_RETRIES: u32 = 3;

/// Delay before the second attempt; doubles for every further one.
const FIRST_BACKOFF_MS: u64 = 500;

/// Build the client shared by all page fetches of a source.
pub fn create_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Result of a single request.
enum Fetched {
    /// Final answer: the page body, or `None` when it does not exist.
    Done(Option<String>),
    /// Worth another attempt.
    Transient(String),
}

fn backoff_ms(attempt: u32) -> u64 {
    FIRST_BACKOFF_MS << attempt.saturating_sub(1)
}

/// Fetch a page body.
///
/// A 404 yields `Ok(None)`. Server errors, refused connections and timeouts
/// are retried up to [`MAX_RETRIES`] times; any other client error fails at
/// once with [`HarvesterError::PageDownload`].
pub fn download_text(client: &Client, url: &str) -> Result<Option<String>> {
    let mut last_failure = String::from("no attempt made");

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay_ms = backoff_ms(attempt);
            tracing::debug!(url, attempt, delay_ms, "backing off");
            thread::sleep(Duration::from_millis(delay_ms));
        }

        match fetch_once(client, url)? {
            Fetched::Done(page) => return Ok(page),
            Fetched::Transient(reason) => {
                tracing::warn!(
                    url,
                    attempt = attempt + 1,
                    of = MAX_RETRIES,
                    reason = %reason,
                    "transient fetch failure"
                );
                last_failure = reason;
            }
        }
    }

    Err(HarvesterError::RetriesExhausted {
        attempts: MAX_RETRIES,
        message: last_failure,
    })
}

fn fetch_once(client: &Client, url: &str) -> Result<Fetched> {
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) if e.is_connect() || e.is_timeout() => return Ok(Fetched::Transient(e.to_string())),
        Err(e) => return Err(HarvesterError::Http(e)),
    };

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        tracing::debug!(url, "page absent");
        return Ok(Fetched::Done(None));
    }
    if status.is_server_error() {
        return Ok(Fetched::Transient(format!("server answered {status}")));
    }

    let body = response
        .error_for_status()
        .map_err(|source| HarvesterError::PageDownload {
            url: url.to_string(),
            source,
        })?
        .text()?;
    Ok(Fetched::Done(Some(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let client = create_client();
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_ms(1), 500);
        assert_eq!(backoff_ms(2), 1000);
    }

    #[test]
    fn test_invalid_url_is_not_retried() {
        let client = create_client().unwrap();
        let result = download_text(&client, "not a url");
        assert!(matches!(result, Err(HarvesterError::Http(_))));
    }
}
