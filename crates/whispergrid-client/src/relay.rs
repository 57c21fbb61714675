//! Best-effort HTTP relay delivery.
//!
//! Relays are dumb mailboxes: a push is `POST {url}` with the raw token as
//! the body, a poll is `GET {url}/json?since=all&poll=1` answering
//! newline-delimited JSON objects with a `message` field holding one token
//! each. Everything here is fire-and-forget; a relay failure is logged and
//! never reaches protocol state, which only ever advances through
//! [`Client::append_thread`](crate::Client::append_thread).

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct RelayEntry {
    message: String,
}

/// Push a token to a relay. Returns whether the relay accepted it.
pub fn push(url: &str, token: &str) -> bool {
    let client = match reqwest::blocking::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            warn!(url = %url, error = %err, "relay client construction failed");
            return false;
        }
    };

    match client.post(url).body(token.to_string()).send() {
        Ok(response) if response.status().is_success() => {
            debug!(url = %url, "pushed token to relay");
            true
        }
        Ok(response) => {
            warn!(url = %url, status = %response.status(), "relay rejected push");
            false
        }
        Err(err) => {
            warn!(url = %url, error = %err, "relay push failed");
            false
        }
    }
}

/// Poll a relay for pending tokens. Unreachable relays and unparseable
/// lines read as empty; the caller feeds whatever arrives through
/// ingestion, which is idempotent.
pub fn poll(url: &str) -> Vec<String> {
    let client = match reqwest::blocking::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            warn!(url = %url, error = %err, "relay client construction failed");
            return Vec::new();
        }
    };

    let body = match client
        .get(format!("{url}/json"))
        .query(&[("since", "all"), ("poll", "1")])
        .send()
        .and_then(reqwest::blocking::Response::text)
    {
        Ok(body) => body,
        Err(err) => {
            warn!(url = %url, error = %err, "relay poll failed");
            return Vec::new();
        }
    };

    let tokens: Vec<String> = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<RelayEntry>(line) {
            Ok(entry) => Some(entry.message),
            Err(err) => {
                warn!(url = %url, error = %err, "skipping unparseable relay entry");
                None
            }
        })
        .collect();
    debug!(url = %url, count = tokens.len(), "polled relay");
    tokens
}
