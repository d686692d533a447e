use crate::http::{ApiClient, ApiError, ApiRequest, LOGIN_ROUTE};
use crate::types::{NewDriver, NewUser, TokenPair, TokenResponse, UserRole};
use serde::Serialize;

#[derive(Serialize)]
struct LoginPayload<'a> {
    #[serde(rename = "type")]
    kind: UserRole,
    username: &'a str,
    password: &'a str,
}

/// Signs in and persists the session, caching `role` next to the tokens.
pub async fn login(
    client: &ApiClient,
    role: UserRole,
    username: &str,
    password: &str,
) -> Result<TokenPair, ApiError> {
    let payload = serde_json::to_value(LoginPayload {
        kind: role,
        username,
        password,
    })?;
    let body: TokenResponse = client
        .execute_json(ApiRequest::post(LOGIN_ROUTE).json(payload))
        .await?;
    let pair = body.into_pair().ok_or_else(|| {
        ApiError::UnexpectedResponse("login response did not contain a token pair".to_string())
    })?;

    client
        .tokens()
        .save_tokens(&pair.access_token, &pair.refresh_token, Some(role))
        .await?;
    client.adopt_session(&pair);
    tracing::info!(%role, "signed in");
    Ok(pair)
}

pub async fn logout(client: &ApiClient) {
    client.sign_out().await;
    tracing::info!("signed out");
}

pub async fn register_user(client: &ApiClient, user: &NewUser) -> Result<(), ApiError> {
    let payload = serde_json::to_value(user)?;
    client
        .execute_unit(ApiRequest::post("/users").json(payload))
        .await
}

pub async fn register_driver(client: &ApiClient, driver: &NewDriver) -> Result<(), ApiError> {
    let payload = serde_json::to_value(driver)?;
    client
        .execute_unit(ApiRequest::post("/drivers").json(payload))
        .await
}
