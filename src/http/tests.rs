use super::*;
use crate::navigation::{NavigationBus, NavigationEvent};
use crate::settings::Settings;
use crate::state::{
    MemorySecretStore, SecretStore, TokenManager, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN,
    KEY_USER_ROLE,
};
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    client: ApiClient,
    store: Arc<MemorySecretStore>,
    nav: UnboundedReceiver<NavigationEvent>,
}

async fn harness() -> Harness {
    harness_with(|settings| settings).await
}

async fn harness_with(adjust: impl FnOnce(Settings) -> Settings) -> Harness {
    let server = MockServer::start().await;
    let settings = adjust(Settings::for_base_url(&server.uri()).unwrap());
    let store = Arc::new(MemorySecretStore::new());
    let (bus, nav) = NavigationBus::new();
    let client = ApiClient::new(
        &settings,
        TokenManager::new(store.clone()),
        Arc::new(bus),
    )
    .unwrap();
    Harness {
        server,
        client,
        store,
        nav,
    }
}

fn seed(store: &MemorySecretStore, access: &str, refresh: Option<&str>) {
    store.set(KEY_ACCESS_TOKEN, access).unwrap();
    if let Some(refresh) = refresh {
        store.set(KEY_REFRESH_TOKEN, refresh).unwrap();
    }
    store.set(KEY_USER_ROLE, "driver").unwrap();
}

async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_ROUTE))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

fn new_pair() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "NEW",
        "refresh_token": "R2"
    }))
}

#[tokio::test]
async fn attaches_stored_token_to_private_routes() {
    let h = harness().await;
    seed(&h.store, "A1", Some("R1"));

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let bookings: Vec<Value> = h
        .client
        .execute_json(ApiRequest::get("/bookings"))
        .await
        .unwrap();
    assert!(bookings.is_empty());
}

#[tokio::test]
async fn sends_unauthenticated_when_no_token_is_stored() {
    let h = harness().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;

    h.client
        .execute_unit(ApiRequest::get("/wallet"))
        .await
        .unwrap();

    let requests = h.server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn public_routes_never_carry_authorization() {
    let h = harness().await;
    seed(&h.store, "A1", Some("R1"));
    h.client.adopt_session(&crate::types::TokenPair {
        access_token: "A1".to_string(),
        refresh_token: "R1".to_string(),
    });

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;

    for route in PUBLIC_ROUTES {
        h.client.execute(ApiRequest::get(route)).await.unwrap();
    }

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), PUBLIC_ROUTES.len());
    for request in requests {
        assert!(
            !request.headers.contains_key("authorization"),
            "{} carried a token",
            request.url.path()
        );
    }
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let h = harness().await;
    seed(&h.store, "OLD", Some("R1"));

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .and(header("authorization", "Bearer NEW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .with_priority(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, new_pair().set_delay(Duration::from_millis(300)), 1).await;

    let results = join_all(
        (0..5).map(|_| h.client.execute_json::<Value>(ApiRequest::get("/bookings"))),
    )
    .await;

    for result in results {
        assert_eq!(result.unwrap(), json!({ "ok": true }));
    }
    assert_eq!(hits(&h.server, REFRESH_ROUTE).await, 1);
    assert_eq!(hits(&h.server, "/bookings").await, 10);
    assert!(!h.client.is_refreshing());

    let tokens = h.client.tokens();
    assert_eq!(tokens.access_token().await.unwrap().as_deref(), Some("NEW"));
    assert_eq!(tokens.refresh_token().await.unwrap().as_deref(), Some("R2"));
    assert_eq!(
        tokens.user_role().await.unwrap(),
        Some(crate::types::UserRole::Driver)
    );
    assert_eq!(h.client.default_authorization().as_deref(), Some("NEW"));
}

#[tokio::test]
async fn unauthorized_arriving_after_refresh_replays_without_refreshing_again() {
    let h = harness().await;
    seed(&h.store, "OLD", Some("R1"));

    for route in ["/bookings", "/wallet"] {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", "Bearer NEW"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "route": route })))
            .with_priority(1)
            .mount(&h.server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    // Answers with the old token's 401 only after the refresh has finished.
    Mock::given(method("GET"))
        .and(path("/wallet"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(400)))
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, new_pair().set_delay(Duration::from_millis(100)), 1).await;

    let (fast, slow) = tokio::join!(
        h.client.execute_json::<Value>(ApiRequest::get("/bookings")),
        h.client.execute_json::<Value>(ApiRequest::get("/wallet")),
    );

    assert_eq!(fast.unwrap(), json!({ "route": "/bookings" }));
    assert_eq!(slow.unwrap(), json!({ "route": "/wallet" }));
    assert_eq!(hits(&h.server, REFRESH_ROUTE).await, 1);
    assert_eq!(hits(&h.server, "/wallet").await, 2);
}

#[tokio::test]
async fn cleared_tokens_send_unauthenticated_even_with_shared_header() {
    let h = harness().await;
    seed(&h.store, "A1", Some("R1"));
    h.client.adopt_session(&crate::types::TokenPair {
        access_token: "A1".to_string(),
        refresh_token: "R1".to_string(),
    });
    h.client.tokens().clear_tokens().await.unwrap();

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;

    h.client
        .execute_unit(ApiRequest::get("/wallet"))
        .await
        .unwrap();

    let requests = h.server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
    assert_eq!(h.client.default_authorization().as_deref(), Some("A1"));
}

#[tokio::test]
async fn second_unauthorized_after_refresh_is_surfaced() {
    let h = harness().await;
    seed(&h.store, "OLD", Some("R1"));

    Mock::given(method("GET"))
        .and(path("/wallet"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Unauthorized" })))
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, new_pair(), 1).await;

    let err = h
        .client
        .execute(ApiRequest::get("/wallet"))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.user_message(), Some("Unauthorized"));
    assert_eq!(hits(&h.server, "/wallet").await, 2);
    assert_eq!(hits(&h.server, REFRESH_ROUTE).await, 1);
}

#[tokio::test]
async fn missing_refresh_token_signs_out_without_calling_refresh() {
    let mut h = harness().await;
    seed(&h.store, "OLD", None);

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, new_pair(), 0).await;

    let err = h
        .client
        .execute(ApiRequest::get("/bookings"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(h.store.is_empty());
    assert_eq!(h.nav.try_recv(), Ok(NavigationEvent::Login));
    assert_eq!(hits(&h.server, REFRESH_ROUTE).await, 0);
}

#[tokio::test]
async fn refresh_failure_rejects_every_queued_request() {
    let mut h = harness().await;
    seed(&h.store, "OLD", Some("R1"));

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(401)
            .set_body_json(json!({ "message": "Refresh token expired" }))
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;

    let results =
        join_all((0..4).map(|_| h.client.execute(ApiRequest::get("/bookings")))).await;

    for result in results {
        match result {
            Err(ApiError::Refresh(RefreshError::Rejected { status, message })) => {
                assert_eq!(status, 401);
                assert_eq!(message.as_deref(), Some("Refresh token expired"));
            }
            other => panic!("expected refresh rejection, got {other:?}"),
        }
    }
    assert!(h.store.is_empty());
    assert_eq!(h.client.default_authorization(), None);
    assert_eq!(h.nav.try_recv(), Ok(NavigationEvent::Login));
    assert!(h.nav.try_recv().is_err());
    assert_eq!(hits(&h.server, "/bookings").await, 4);
}

#[tokio::test]
async fn malformed_refresh_response_counts_as_failure() {
    let mut h = harness().await;
    seed(&h.store, "OLD", Some("R1"));

    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "NEW" })),
        1,
    )
    .await;

    let err = h
        .client
        .execute(ApiRequest::get("/vehicles"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Refresh(RefreshError::MalformedResponse)
    ));
    assert!(h.store.is_empty());
    assert_eq!(h.nav.try_recv(), Ok(NavigationEvent::Login));
}

#[tokio::test]
async fn hung_refresh_times_out_and_signs_out() {
    let mut h = harness_with(|mut settings| {
        settings.refresh_timeout = Duration::from_millis(200);
        settings
    })
    .await;
    seed(&h.store, "OLD", Some("R1"));

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, new_pair().set_delay(Duration::from_secs(3)), 1).await;

    let err = h
        .client
        .execute(ApiRequest::get("/bookings"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Refresh(RefreshError::TimedOut(_))));
    assert!(!h.client.is_refreshing());
    assert!(h.store.is_empty());
    assert_eq!(h.nav.try_recv(), Ok(NavigationEvent::Login));
}

#[tokio::test]
async fn domain_errors_pass_through_untouched() {
    let mut h = harness().await;
    seed(&h.store, "A1", Some("R1"));

    Mock::given(method("POST"))
        .and(path("/bookings"))
        .and(body_json(json!({ "packageTourId": "p1", "seats": 9 })))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "message": "Seats unavailable" })),
        )
        .mount(&h.server)
        .await;

    let err = h
        .client
        .execute(ApiRequest::post("/bookings").json(json!({ "packageTourId": "p1", "seats": 9 })))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(err.user_message(), Some("Seats unavailable"));
    assert_eq!(hits(&h.server, REFRESH_ROUTE).await, 0);
    assert_eq!(h.store.len(), 3);
    assert!(h.nav.try_recv().is_err());
}

#[tokio::test]
async fn unauthorized_on_public_route_is_not_refreshed() {
    let mut h = harness().await;
    seed(&h.store, "A1", Some("R1"));

    Mock::given(method("POST"))
        .and(path(LOGIN_ROUTE))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, new_pair(), 0).await;

    let err = h
        .client
        .execute(ApiRequest::post(LOGIN_ROUTE).json(json!({
            "type": "user",
            "username": "ana",
            "password": "wrong"
        })))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), Some("Invalid credentials"));
    assert_eq!(h.store.len(), 3);
    assert!(h.nav.try_recv().is_err());
}

#[tokio::test]
async fn query_and_base_path_are_preserved() {
    let server = MockServer::start().await;
    let settings = Settings::for_base_url(&format!("{}/api/", server.uri())).unwrap();
    let store = Arc::new(MemorySecretStore::new());
    let client = ApiClient::new(
        &settings,
        TokenManager::new(store),
        Arc::new(crate::navigation::NoopNavigator),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/wallet/transactions"))
        .and(wiremock::matchers::query_param("page", "2"))
        .and(wiremock::matchers::query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .execute_unit(
            ApiRequest::get("/wallet/transactions")
                .query("page", 2)
                .query("limit", 10),
        )
        .await
        .unwrap();
}
