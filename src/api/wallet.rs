use crate::http::{ApiClient, ApiError, ApiRequest};
use crate::types::{TransactionPage, Wallet};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub async fn wallet(client: &ApiClient) -> Result<Wallet, ApiError> {
    client.execute_json(ApiRequest::get("/wallet")).await
}

/// One page of wallet history; pages start at 1.
pub async fn transactions(
    client: &ApiClient,
    page: u32,
    limit: u32,
) -> Result<TransactionPage, ApiError> {
    client
        .execute_json(
            ApiRequest::get("/wallet/transactions")
                .query("page", page.max(1))
                .query("limit", limit.max(1)),
        )
        .await
}
