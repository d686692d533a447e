use crate::http::{ApiClient, ApiError, ApiRequest};
use crate::types::{Booking, NewBooking};

pub async fn my_bookings(client: &ApiClient) -> Result<Vec<Booking>, ApiError> {
    client.execute_json(ApiRequest::get("/bookings")).await
}

pub async fn create_booking(
    client: &ApiClient,
    package_tour_id: &str,
    seats: u32,
) -> Result<(), ApiError> {
    let payload = serde_json::to_value(NewBooking {
        package_tour_id: package_tour_id.to_string(),
        seats,
    })?;
    client
        .execute_unit(ApiRequest::post("/bookings").json(payload))
        .await
}

pub async fn cancel_booking(client: &ApiClient, booking_id: &str) -> Result<(), ApiError> {
    let route = format!("/bookings/{}/cancel", urlencoding::encode(booking_id));
    client.execute_unit(ApiRequest::patch(route)).await
}
