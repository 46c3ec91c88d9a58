//! HttpBindingClient: the reqwest-backed [`BindingClient`].
//!
//! Talks to the three authorization-session endpoints:
//!
//! ```text
//! GET  {base}/api/authorization-session/bind     → BindSessionResponse
//! POST {base}/api/authorization-session/verify   VerifyMemberRequest → VerifyMemberResponse
//! POST {base}/api/authorization-session/cancel   CancelSessionRequest
//! ```
//!
//! # Status code mapping
//!
//! | Operation | Status        | Result                               |
//! |-----------|---------------|--------------------------------------|
//! | bind      | non-2xx       | `BindingError::Rejected`             |
//! | verify    | 410 Gone      | `VerificationError::TokenExpired`    |
//! | verify    | other non-2xx | `VerificationError::Rejected`        |
//! | cancel    | 404 / 410     | `Ok(())` (session already gone)      |
//! | cancel    | other non-2xx | `CancelSessionError::Rejected`       |
//!
//! # Cancellation
//!
//! Every operation races the request against the [`CancellationToken`] it is
//! given.  When the token fires first, the request future is dropped (which
//! aborts the HTTP exchange) and `Aborted` is returned.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cardauth_core::protocol::{
    endpoints, BindSessionResponse, CancelSessionRequest, VerifyMemberRequest,
    VerifyMemberResponse,
};
use cardauth_core::{
    BindingError, CancelSessionError, HardwareClaim, SessionToken, VerificationError,
    VerifiedMember,
};
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::BindingClient;

/// Error type for constructing the HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

#[derive(Clone)]
pub struct HttpBindingClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBindingClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::Build`] if the TLS backend cannot be
    /// initialised.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, HttpClientError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(request_timeout)
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        endpoints::join(&self.base_url, path)
    }

    async fn request_bind(&self) -> Result<HardwareClaim, BindingError> {
        let resp = self
            .client
            .get(self.url(endpoints::BIND))
            .send()
            .await
            .map_err(|e| BindingError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BindingError::Rejected {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let body: BindSessionResponse = resp
            .json()
            .await
            .map_err(|e| BindingError::Malformed(e.to_string()))?;
        body.into_claim()
    }

    async fn request_verify(
        &self,
        token: &SessionToken,
        hardware_name: &str,
    ) -> Result<VerifiedMember, VerificationError> {
        let request = VerifyMemberRequest {
            token: token.as_str().to_string(),
            hardware_name: hardware_name.to_string(),
        };
        let resp = self
            .client
            .post(self.url(endpoints::VERIFY))
            .json(&request)
            .send()
            .await
            .map_err(|e| VerificationError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::GONE {
            return Err(VerificationError::TokenExpired);
        }
        if !status.is_success() {
            return Err(VerificationError::Rejected {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let body: VerifyMemberResponse = resp
            .json()
            .await
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;
        body.into_member()
    }

    async fn request_cancel(&self, token: &SessionToken) -> Result<(), CancelSessionError> {
        let request = CancelSessionRequest {
            token: token.as_str().to_string(),
        };
        let resp = self
            .client
            .post(self.url(endpoints::CANCEL))
            .json(&request)
            .send()
            .await
            .map_err(|e| CancelSessionError::Transport(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!(%token, "backend session already gone");
                Ok(())
            }
            status => Err(CancelSessionError::Rejected {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl BindingClient for HttpBindingClient {
    async fn bind(&self, cancel: &CancellationToken) -> Result<HardwareClaim, BindingError> {
        until_cancelled(cancel, self.request_bind(), BindingError::Aborted).await
    }

    async fn verify(
        &self,
        token: &SessionToken,
        hardware_name: &str,
        cancel: &CancellationToken,
    ) -> Result<VerifiedMember, VerificationError> {
        until_cancelled(
            cancel,
            self.request_verify(token, hardware_name),
            VerificationError::Aborted,
        )
        .await
    }

    async fn cancel_session(
        &self,
        token: &SessionToken,
        cancel: &CancellationToken,
    ) -> Result<(), CancelSessionError> {
        until_cancelled(cancel, self.request_cancel(token), CancelSessionError::Aborted).await
    }
}

async fn until_cancelled<T, E, F>(cancel: &CancellationToken, request: F, aborted: E) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(aborted),
        result = request => result,
    }
}
