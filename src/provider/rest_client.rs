// SPDX-License-Identifier: Apache-2.0

//! Shared bearer-token REST helper for cloud-provider REST profiles.
//!
//! Every non-fake [`super::Provider`] implementation talks to its cloud over plain HTTPS
//! with a bearer token, so the request/response plumbing (auth header, JSON (de)serialize,
//! status-code-to-`ProviderError` classification, retry) lives here once instead of being
//! duplicated per vendor.

use crate::errors::ProviderError;
use crate::reconcilers::retry::{http_backoff, is_retryable_http_status, ExponentialBackoff};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Thin wrapper around a shared [`reqwest::Client`] and the base URL/bearer token for one
/// cloud account. Cheap to clone; safe to share across concurrent `Provider` calls.
#[derive(Clone)]
pub struct RestClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl RestClient {
    #[must_use]
    pub fn new(http: HttpClient, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), token: token.into() }
    }

    /// Issue `method path` with an optional JSON body, retrying transient failures with
    /// [`http_backoff`], and decode the JSON response as `R`. `reason` is the terminal
    /// error reason mirrored into `Machine.status.errorReason` if the request turns out to
    /// be a non-retryable rejection (e.g. `"CreateMachineError"` for a create call).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Terminal`] for a non-retryable (4xx, non-429) response, or
    /// [`ProviderError::Transient`] if every retry attempt failed or the response could not
    /// be decoded.
    pub async fn request<B: Serialize, R: DeserializeOwned>(
        &self,
        machine: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
        reason: &str,
    ) -> Result<R, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut backoff = http_backoff();

        loop {
            debug!(method = %method, url = %url, "provider REST request");
            let mut req = self.http.request(method.clone(), &url).bearer_auth(&self.token);
            if let Some(body) = body {
                req = req.json(body);
            }

            let outcome = req.send().await;
            let response = match outcome {
                Ok(response) => response,
                Err(source) => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(%url, error = %source, "provider REST request failed, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        return Err(ProviderError::Transient {
                            machine: machine.to_string(),
                            source: source.to_string(),
                        })
                    }
                },
            };

            let status = response.status();
            if status.is_success() {
                return response.json::<R>().await.map_err(|source| ProviderError::Transient {
                    machine: machine.to_string(),
                    source: source.to_string(),
                });
            }

            let text = response.text().await.unwrap_or_default();
            if is_retryable_http_status(status) {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(%url, %status, body = %text, "provider REST request returned retryable status");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            return Err(classify_failure(machine, status, &text, reason));
        }
    }

    /// `request` with no response body expected (DELETE/action endpoints that return 204).
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub async fn request_no_body<B: Serialize>(
        &self,
        machine: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
        reason: &str,
    ) -> Result<(), ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut backoff: ExponentialBackoff = http_backoff();

        loop {
            let mut req = self.http.request(method.clone(), &url).bearer_auth(&self.token);
            if let Some(body) = body {
                req = req.json(body);
            }

            let outcome = req.send().await;
            let response = match outcome {
                Ok(response) => response,
                Err(source) => match backoff.next_backoff() {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        return Err(ProviderError::Transient {
                            machine: machine.to_string(),
                            source: source.to_string(),
                        })
                    }
                },
            };

            let status = response.status();
            if status.is_success() || status == StatusCode::NOT_FOUND {
                return Ok(());
            }

            let text = response.text().await.unwrap_or_default();
            if is_retryable_http_status(status) {
                if let Some(delay) = backoff.next_backoff() {
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            return Err(classify_failure(machine, status, &text, reason));
        }
    }
}

/// Classify a non-2xx, non-retryable response into a [`ProviderError::Terminal`] carrying
/// `reason` (the caller's operation-specific status reason, e.g. `"CreateMachineError"`),
/// or a [`ProviderError::Transient`] for a server-side failure that is not a client
/// rejection at all.
fn classify_failure(machine: &str, status: StatusCode, body: &str, reason: &str) -> ProviderError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::Terminal {
            machine: machine.to_string(),
            reason: reason.to_string(),
            message: format!("provider rejected credentials ({status}): {body}"),
        };
    }
    if status.is_client_error() {
        return ProviderError::Terminal {
            machine: machine.to_string(),
            reason: reason.to_string(),
            message: format!("provider rejected request ({status}): {body}"),
        };
    }
    ProviderError::Transient {
        machine: machine.to_string(),
        source: format!("provider request failed ({status}): {body}"),
    }
}

#[cfg(test)]
#[path = "rest_client_tests.rs"]
mod rest_client_tests;

#[cfg(test)]
#[path = "rest_client_wiremock_tests.rs"]
mod rest_client_wiremock_tests;
