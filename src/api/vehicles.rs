use crate::http::{ApiClient, ApiError, ApiRequest};
use crate::types::{Vehicle, VehicleInput};

fn vehicle_route(vehicle_id: &str) -> String {
    format!("/vehicles/{}", urlencoding::encode(vehicle_id))
}

pub async fn my_vehicles(client: &ApiClient) -> Result<Vec<Vehicle>, ApiError> {
    client.execute_json(ApiRequest::get("/vehicles")).await
}

pub async fn create_vehicle(client: &ApiClient, vehicle: &VehicleInput) -> Result<(), ApiError> {
    let payload = serde_json::to_value(vehicle)?;
    client
        .execute_unit(ApiRequest::post("/vehicles").json(payload))
        .await
}

pub async fn update_vehicle(
    client: &ApiClient,
    vehicle_id: &str,
    vehicle: &VehicleInput,
) -> Result<(), ApiError> {
    let payload = serde_json::to_value(vehicle)?;
    client
        .execute_unit(ApiRequest::patch(vehicle_route(vehicle_id)).json(payload))
        .await
}

pub async fn delete_vehicle(client: &ApiClient, vehicle_id: &str) -> Result<(), ApiError> {
    client
        .execute_unit(ApiRequest::delete(vehicle_route(vehicle_id)))
        .await
}
