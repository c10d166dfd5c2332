//! Panics inside the full middleware stack are contained per request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use axum::Router;
use serde_json::json;

use foods_api::data::{
    Filters, Food, FoodFilter, FoodStore, Metadata, NewFood, SqliteStore, StoreError,
};
use foods_api::http::response::SERVER_ERROR_MESSAGE;
use foods_api::lifecycle::ShutdownCoordinator;
use foods_api::security::identity::{FOODS_READ, FOODS_WRITE};
use foods_api::security::{Identity, IdentityResolver};
use foods_api::ApiServer;

mod common;

use common::{request, send_to, test_config};

/// Food id whose lookup panics.
const CURSED_ID: i64 = 13;
/// Token whose verification panics.
const CURSED_TOKEN: &str = "ffffffffffffffffffffffffffffffff";

/// SQLite store that panics on two specific inputs.
struct TrappedStore {
    inner: SqliteStore,
}

#[async_trait]
impl FoodStore for TrappedStore {
    async fn get(&self, id: i64) -> Result<Food, StoreError> {
        if id == CURSED_ID {
            panic!("food {id} is cursed");
        }
        self.inner.get(id).await
    }

    async fn insert(&self, food: NewFood) -> Result<Food, StoreError> {
        self.inner.insert(food).await
    }

    async fn conditional_update(&self, food: &Food) -> Result<i32, StoreError> {
        self.inner.conditional_update(food).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn list(
        &self,
        filter: &FoodFilter,
        filters: &Filters,
    ) -> Result<(Vec<Food>, Metadata), StoreError> {
        self.inner.list(filter, filters).await
    }
}

#[async_trait]
impl IdentityResolver for TrappedStore {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, StoreError> {
        if token == CURSED_TOKEN {
            panic!("token verification blew up");
        }
        self.inner.resolve(token).await
    }
}

async fn app() -> (Router, String) {
    let store = Arc::new(TrappedStore {
        inner: SqliteStore::open_in_memory(Duration::from_secs(3)).unwrap(),
    });
    let token = store
        .inner
        .issue_token(
            1,
            Duration::from_secs(3600),
            vec![FOODS_READ.into(), FOODS_WRITE.into()],
        )
        .await
        .unwrap();
    let config = test_config();
    let coordinator = ShutdownCoordinator::new(config.timeouts.shutdown_drain());
    let server = ApiServer::new(config, store, coordinator);
    (server.router(), token)
}

#[tokio::test]
async fn handler_panic_is_a_500_and_the_service_recovers() {
    let (router, token) = app().await;

    let created = send_to(
        &router,
        request(Method::POST, "/v1/foods")
            .bearer(&token)
            .json(json!({"title": "Plum", "types": ["fruit"]}))
            .build(),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let crashed = send_to(
        &router,
        request(Method::GET, &format!("/v1/foods/{CURSED_ID}"))
            .bearer(&token)
            .build(),
    )
    .await;
    assert_eq!(crashed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(crashed.headers[header::CONNECTION], "close");
    assert!(crashed.headers.contains_key("x-request-id"));
    assert_eq!(crashed.body["error"], SERVER_ERROR_MESSAGE);

    let next = send_to(
        &router,
        request(Method::GET, "/v1/foods/1").bearer(&token).build(),
    )
    .await;
    assert_eq!(next.status, StatusCode::OK);
    assert_eq!(next.body["food"]["title"], "Plum");
    assert!(next.headers.get(header::CONNECTION).is_none());
}

#[tokio::test]
async fn authentication_panic_is_caught_above_the_resolver() {
    let (router, _) = app().await;

    let crashed = send_to(
        &router,
        request(Method::GET, "/v1/foods").bearer(CURSED_TOKEN).build(),
    )
    .await;
    assert_eq!(crashed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(crashed.headers[header::CONNECTION], "close");
    assert!(crashed.headers.contains_key("x-request-id"));

    let health = send_to(&router, request(Method::GET, "/v1/healthcheck").build()).await;
    assert_eq!(health.status, StatusCode::OK);
}
