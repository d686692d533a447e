use crate::http::{ApiClient, ApiError, ApiRequest};
use crate::types::{Profile, UserRole};

const USER_PROFILE_ROUTE: &str = "/users/my-profile";
const DRIVER_PROFILE_ROUTE: &str = "/drivers/my-profile";

/// Profile of the signed-in account. The cached role decides which endpoint is
/// asked first; a 404 there means the account is the other kind.
pub async fn my_profile(client: &ApiClient) -> Result<Profile, ApiError> {
    let order = match cached_role(client).await {
        Some(UserRole::Driver) => [DRIVER_PROFILE_ROUTE, USER_PROFILE_ROUTE],
        _ => [USER_PROFILE_ROUTE, DRIVER_PROFILE_ROUTE],
    };

    let profile = match client.execute_json::<Profile>(ApiRequest::get(order[0])).await {
        Ok(profile) => profile,
        Err(e) if e.is_not_found() => {
            tracing::debug!(route = order[1], "profile not found; trying the other account kind");
            client
                .execute_json::<Profile>(ApiRequest::get(order[1]))
                .await?
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = client.tokens().save_role(profile.role()).await {
        tracing::warn!(error = %e, "could not cache user role");
    }
    Ok(profile)
}

/// Role cached at login, if any. Storage failures read as "unknown".
pub async fn cached_role(client: &ApiClient) -> Option<UserRole> {
    match client.tokens().user_role().await {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!(error = %e, "could not read cached user role");
            None
        }
    }
}
