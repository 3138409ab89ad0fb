//! HTTP client for the reward backend.
//!
//! Implements [`engine::RewardBackend`] and [`engine::AddressLookup`] over
//! JSON POST requests. Every non-2xx response carries an
//! [`api_types::ErrorBody`]; bodies with a failure code become
//! [`BackendError::Rejected`], the rest [`BackendError::Server`].

use std::time::Duration;

use api_types::{
    ErrorBody,
    customer::{Customer, CustomerUpsert},
    play::{PlayRequest, PlayResult},
    prize::{Prize, PrizeList},
    quota::{CountSelector, SpinCount, SpinCountQuery},
    review::{ReviewClick, ReviewQuery, ReviewStatus},
    session::{BranchSession, SessionValidate, TokenIssue, TokenIssued},
    share::VoucherShare,
};
use base64::Engine;
use engine::{AddressLookup, BackendError, RewardBackend};
use reqwest::{Client, Response, Url, header};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("invalid credentials header: {0}")]
    InvalidCredentials(String),
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
    admin_auth: Option<header::HeaderValue>,
}

impl HttpBackend {
    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder::default()
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| BackendError::Transport(format!("invalid url: {err}")))
    }

    async fn post_json<TReq, TResp>(&self, path: &str, body: &TReq) -> Result<TResp, BackendError>
    where
        TReq: serde::Serialize + ?Sized,
        TResp: for<'de> serde::Deserialize<'de>,
    {
        let resp = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        parse_json(resp).await
    }

    async fn post_json_unit<TReq: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<(), BackendError> {
        let resp = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(error_from(resp).await)
    }

    /// Issue a new single-use token for a branch. Needs admin credentials.
    pub async fn issue_token(&self, branch_id: Uuid) -> Result<TokenIssued, BackendError> {
        let mut req = self
            .http
            .post(self.url("/tokens")?)
            .json(&TokenIssue { branch_id });
        if let Some(auth) = &self.admin_auth {
            req = req.header(header::AUTHORIZATION, auth.clone());
        }
        let resp = req.send().await.map_err(transport)?;
        parse_json(resp).await
    }
}

impl RewardBackend for HttpBackend {
    async fn validate_session(&self, token: &str) -> Result<BranchSession, BackendError> {
        self.post_json(
            "/session/validate",
            &SessionValidate {
                token: token.to_string(),
            },
        )
        .await
    }

    async fn upsert_customer(&self, customer: &CustomerUpsert) -> Result<Customer, BackendError> {
        self.post_json("/customers", customer).await
    }

    async fn daily_spin_count(&self, selector: &CountSelector) -> Result<u32, BackendError> {
        let count: SpinCount = self
            .post_json(
                "/spins/count",
                &SpinCountQuery {
                    selector: selector.clone(),
                },
            )
            .await?;
        Ok(count.count)
    }

    async fn has_reviewed_today(
        &self,
        customer_id: Uuid,
        branch_id: Uuid,
    ) -> Result<bool, BackendError> {
        let status: ReviewStatus = self
            .post_json(
                "/reviews/today",
                &ReviewQuery {
                    customer_id,
                    branch_id,
                },
            )
            .await?;
        Ok(status.reviewed_today)
    }

    async fn log_review_click(&self, click: &ReviewClick) -> Result<(), BackendError> {
        self.post_json_unit("/reviews/click", click).await
    }

    async fn active_prizes(&self) -> Result<Vec<Prize>, BackendError> {
        let resp = self
            .http
            .get(self.url("/prizes")?)
            .send()
            .await
            .map_err(transport)?;
        let list: PrizeList = parse_json(resp).await?;
        Ok(list.prizes)
    }

    async fn play(&self, request: &PlayRequest) -> Result<PlayResult, BackendError> {
        self.post_json("/play", request).await
    }

    async fn log_voucher_share(&self, share: &VoucherShare) -> Result<(), BackendError> {
        self.post_json_unit("/vouchers/share", share).await
    }
}

#[derive(Default, Debug)]
pub struct HttpBackendBuilder {
    base_url: String,
    timeout: Option<Duration>,
    admin: Option<(String, String)>,
}

impl HttpBackendBuilder {
    pub fn base_url(mut self, base_url: &str) -> HttpBackendBuilder {
        self.base_url = base_url.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> HttpBackendBuilder {
        self.timeout = Some(timeout);
        self
    }

    pub fn admin(mut self, username: &str, password: &str) -> HttpBackendBuilder {
        self.admin = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn build(self) -> Result<HttpBackend, ClientError> {
        // Joined paths are relative, so the base must end with a slash.
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;

        let admin_auth = match self.admin {
            Some((username, password)) => Some(basic_auth(&username, &password)?),
            None => None,
        };

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        tracing::debug!("reward backend at {base_url}");
        Ok(HttpBackend {
            http,
            base_url,
            admin_auth,
        })
    }
}

/// Resolves the public address through an `{ "ip": "…" }` JSON endpoint.
#[derive(Clone, Debug)]
pub struct HttpAddressLookup {
    http: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

impl HttpAddressLookup {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let url = Url::parse(url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }
}

impl AddressLookup for HttpAddressLookup {
    async fn lookup(&self) -> Result<String, BackendError> {
        let resp = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(transport)?;
        let body: IpResponse = parse_json(resp).await?;
        Ok(body.ip)
    }
}

fn basic_auth(username: &str, password: &str) -> Result<header::HeaderValue, ClientError> {
    // Basic authorization is "Basic `secret`" where `secret` is the base64 of
    // "username:password".
    let secret = format!("{username}:{password}");
    let secret = format!("Basic {}", base64::prelude::BASE64_STANDARD.encode(secret));
    let mut auth = header::HeaderValue::try_from(secret)
        .map_err(|err| ClientError::InvalidCredentials(err.to_string()))?;
    auth.set_sensitive(true);
    Ok(auth)
}

fn transport(err: reqwest::Error) -> BackendError {
    tracing::debug!("request failed: {err}");
    BackendError::Transport(err.to_string())
}

async fn parse_json<T: for<'de> serde::Deserialize<'de>>(resp: Response) -> Result<T, BackendError> {
    if resp.status().is_success() {
        return resp.json::<T>().await.map_err(transport);
    }
    Err(error_from(resp).await)
}

async fn error_from(resp: Response) -> BackendError {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(ErrorBody {
            error,
            code: Some(code),
        }) => BackendError::Rejected {
            code,
            message: error,
        },
        Ok(ErrorBody { error, code: None }) => BackendError::Server {
            status: status.as_u16(),
            message: error,
        },
        Err(_) => BackendError::Server {
            status: status.as_u16(),
            message: "server error".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let backend = HttpBackend::builder()
            .base_url("http://127.0.0.1:3000/api")
            .build()
            .unwrap();
        assert_eq!(
            backend.url("/play").unwrap().as_str(),
            "http://127.0.0.1:3000/api/play"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = HttpBackend::builder().base_url("not a url").build().unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[test]
    fn basic_auth_is_base64() {
        let header = basic_auth("admin", "secret").unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header.to_str().unwrap(), "Basic YWRtaW46c2VjcmV0");
    }
}
