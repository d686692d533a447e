use crate::http::{ApiClient, ApiError, ApiRequest};
use crate::types::{NewPackageTour, PackageTour, TouristPoint};

pub async fn package_tours(client: &ApiClient) -> Result<Vec<PackageTour>, ApiError> {
    client.execute_json(ApiRequest::get("/package-tours")).await
}

/// Drivers only; the server rejects other accounts.
pub async fn create_package_tour(
    client: &ApiClient,
    package: &NewPackageTour,
) -> Result<(), ApiError> {
    let payload = serde_json::to_value(package)?;
    client
        .execute_unit(ApiRequest::post("/package-tours").json(payload))
        .await
}

pub async fn tourist_points(client: &ApiClient) -> Result<Vec<TouristPoint>, ApiError> {
    client.execute_json(ApiRequest::get("/tourist-points")).await
}
