//! Walking paginated REST endpoints.

use std::vec::IntoIter;

use failure::{Error, ResultExt};
use failure_derive::Fail;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// An iterator which lazily fetches one page of results at a time,
/// following RFC 5988 `Link` headers until there is no `rel="next"`.
pub(crate) struct Paginated<I> {
    client: Client,
    headers: HeaderMap,
    next_endpoint: Option<String>,
    items: IntoIter<I>,
}

impl<I: DeserializeOwned> Paginated<I> {
    pub fn new(client: &Client, endpoint: String, headers: HeaderMap) -> Paginated<I> {
        Paginated {
            client: client.clone(),
            headers,
            next_endpoint: Some(endpoint),
            items: Vec::new().into_iter(),
        }
    }

    fn send_request(&mut self, endpoint: &str) -> Result<Vec<I>, Error> {
        debug!("Sending request to {}", endpoint);

        let response = self
            .client
            .get(endpoint)
            .headers(self.headers.clone())
            .send()
            .context("Unable to send the request")?;

        let status = response.status();
        debug!("Received response ({})", status);

        self.next_endpoint = response
            .headers()
            .get(LINK)
            .and_then(|raw| raw.to_str().ok())
            .and_then(next_link);

        if !status.is_success() {
            warn!("Request to {} failed with {}", endpoint, status);
            return Err(FailedRequest {
                status,
                url: endpoint.to_string(),
            }
            .into());
        }

        let items = response
            .json()
            .context("Unable to deserialize the response")?;
        Ok(items)
    }
}

impl<I: DeserializeOwned> Iterator for Paginated<I> {
    type Item = Result<I, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(next_item) = self.items.next() {
                return Some(Ok(next_item));
            }

            // A page may legitimately be empty; keep following links until
            // an item or the last page turns up.
            let next_endpoint = self.next_endpoint.take()?;
            match self.send_request(&next_endpoint) {
                Ok(values) => self.items = values.into_iter(),
                Err(e) => {
                    self.next_endpoint = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// The server responded with a non-successful status code.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "request to {} failed with {}", url, status)]
pub struct FailedRequest {
    pub url: String,
    pub status: StatusCode,
}

fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|value| {
        let mut pieces = value.split(';');
        let url = pieces
            .next()?
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');

        if pieces.any(|param| param.trim() == r#"rel="next""#) {
            Some(url.to_string())
        } else {
            None
        }
    })
}
