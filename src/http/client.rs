use super::coordinator::{AuthCoordinator, RefreshTicket};
use super::error::{server_message, ApiError, RefreshError};
use super::request::ApiRequest;
use super::routes::{is_public_route, REFRESH_ROUTE};
use crate::navigation::Navigator;
use crate::redact::redact_secrets;
use crate::settings::Settings;
use crate::state::TokenManager;
use crate::types::{TokenPair, TokenResponse};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared request pipeline. Cheap to clone; clones share tokens, navigation and
/// refresh state.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenManager,
    navigator: Arc<dyn Navigator>,
    auth: Arc<AuthCoordinator>,
    refresh_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        settings: &Settings,
        tokens: TokenManager,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: reqwest::Client::builder()
                .default_headers(headers)
                .timeout(settings.request_timeout)
                .connect_timeout(settings.connect_timeout)
                .build()?,
            base_url: settings.api_base_url.clone(),
            tokens,
            navigator,
            auth: Arc::new(AuthCoordinator::default()),
            refresh_timeout: settings.refresh_timeout,
        })
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn is_refreshing(&self) -> bool {
        self.auth.is_refreshing()
    }

    /// Runs `request` through both stages. Only 2xx responses come back as `Ok`.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let sent_under = self.auth.generation();
        let bearer = self.outbound_bearer(&request).await;
        let response = self.send(&request, bearer.as_deref()).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = status_error(response).await;
        // A public route carried no token, so a refresh cannot change its outcome.
        if status != StatusCode::UNAUTHORIZED
            || request.is_retried()
            || is_public_route(request.path())
        {
            return Err(error);
        }

        self.recover_unauthorized(request.into_retry(), sent_under, error)
            .await
    }

    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// For calls whose response body is not needed.
    pub async fn execute_unit(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await?;
        Ok(())
    }

    /// Records a freshly issued session as the shared default header.
    pub(crate) fn adopt_session(&self, pair: &TokenPair) {
        self.auth.adopt(pair.access_token.clone());
    }

    /// Drops credentials and the shared header, then sends the screen layer to login.
    pub async fn sign_out(&self) {
        self.auth.reset();
        if let Err(e) = self.tokens.clear_tokens().await {
            tracing::warn!(error = %e, "credentials could not be fully cleared");
        }
        self.navigator.redirect_to_login();
    }

    /// Access token of the current session as last issued by login or refresh,
    /// for callers that build requests outside this pipeline. Outbound requests
    /// here always read the stored token instead.
    pub fn default_authorization(&self) -> Option<String> {
        self.auth.default_authorization()
    }

    async fn recover_unauthorized(
        &self,
        request: ApiRequest,
        sent_under: u64,
        original: ApiError,
    ) -> Result<Response, ApiError> {
        let guard = match self.auth.begin_or_wait(sent_under) {
            RefreshTicket::Waiter(rx) => {
                tracing::debug!(
                    path = request.path(),
                    queued = self.auth.queued(),
                    "waiting for in-flight token refresh"
                );
                let token = match rx.await {
                    Ok(Ok(token)) => token,
                    Ok(Err(e)) => return Err(ApiError::Refresh(e)),
                    Err(_) => return Err(ApiError::Refresh(RefreshError::Abandoned)),
                };
                return self.replay(&request, &token).await;
            }
            RefreshTicket::Refreshed(token) => {
                tracing::debug!(
                    path = request.path(),
                    "session renewed while request was in flight; replaying"
                );
                return self.replay(&request, &token).await;
            }
            RefreshTicket::Leader(guard) => guard,
        };

        let refresh_token = match self.tokens.refresh_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "refresh token unreadable; treating as absent");
                None
            }
        };
        let Some(refresh_token) = refresh_token else {
            let rejected = guard.complete(Err(RefreshError::MissingRefreshToken));
            tracing::info!(rejected, "no refresh token stored; signing out");
            self.sign_out().await;
            return Err(original);
        };

        match self.refresh_session(&refresh_token).await {
            Ok(pair) => {
                self.auth
                    .set_default_authorization(Some(pair.access_token.clone()));
                let released = guard.complete(Ok(pair.access_token.clone()));
                tracing::info!(released, "access token refreshed");
                self.replay(&request, &pair.access_token).await
            }
            Err(e) => {
                let rejected = guard.complete(Err(e.clone()));
                tracing::warn!(error = %e, rejected, "token refresh failed; signing out");
                self.sign_out().await;
                Err(ApiError::Refresh(e))
            }
        }
    }

    /// Calls the refresh endpoint and persists the new pair, bounded by
    /// `refresh_timeout`.
    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let attempt = async {
            let request =
                ApiRequest::post(REFRESH_ROUTE).json(json!({ "refreshToken": refresh_token }));
            let response = self.send(&request, None).await.map_err(|e| {
                RefreshError::Transport(redact_secrets(&e.to_string()).into_owned())
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RefreshError::Rejected {
                    status: status.as_u16(),
                    message: server_message(&body),
                });
            }

            let body: TokenResponse = response
                .json()
                .await
                .map_err(|_| RefreshError::MalformedResponse)?;
            let pair = body.into_pair().ok_or(RefreshError::MalformedResponse)?;

            self.tokens
                .save_tokens(&pair.access_token, &pair.refresh_token, None)
                .await
                .map_err(|e| RefreshError::Storage(e.to_string()))?;
            Ok(pair)
        };

        tokio::time::timeout(self.refresh_timeout, attempt)
            .await
            .map_err(|_| RefreshError::TimedOut(self.refresh_timeout))?
    }

    /// Re-issues an already-retried request with `token`; its errors surface as-is.
    async fn replay(&self, request: &ApiRequest, token: &str) -> Result<Response, ApiError> {
        let response = self.send(request, Some(token)).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    /// Outbound stage: the stored access token for private routes, nothing otherwise.
    async fn outbound_bearer(&self, request: &ApiRequest) -> Option<String> {
        if is_public_route(request.path()) {
            return None;
        }
        match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "access token unreadable; sending unauthenticated");
                None
            }
        }
    }

    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Response, ApiError> {
        let url = self.endpoint_url(request)?;
        let mut builder = self.http.request(request.method().clone(), url);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        let bearer = bearer.filter(|_| !is_public_route(request.path()));
        if let Some(bearer) = bearer {
            builder = builder.bearer_auth(bearer);
        }

        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            authenticated = bearer.is_some(),
            retried = request.is_retried(),
            "sending request"
        );
        Ok(builder.send().await?)
    }

    fn endpoint_url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), request.path());
        url.set_path(&joined);
        url.set_query(None);
        if !request.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.query_pairs() {
                pairs.append_pair(key, value);
            }
        }
        if url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(url.to_string()));
        }
        Ok(url)
    }
}

async fn status_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ApiError::Status {
        status,
        message: server_message(&body),
        body,
    }
}
