//! Food resource handlers.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    Json,
};
use validator::ValidationErrors;

use crate::data::{optimistic, FoodFilter, FoodPatch, Filters, NewFood};
use crate::http::context::CurrentIdentity;
use crate::http::request::{
    read_csv, read_expected_version, read_id_param, read_int, read_json, read_string,
};
use crate::http::response::{ApiError, FoodEnvelope, FoodsEnvelope, MessageEnvelope};
use crate::http::server::AppState;
use crate::security::identity::{FOODS_READ, FOODS_WRITE};

pub async fn list_foods(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<FoodsEnvelope>, ApiError> {
    identity.require(FOODS_READ)?;

    let mut errors = ValidationErrors::new();
    let filter = FoodFilter {
        title: read_string(&query, "title", ""),
        types: read_csv(&query, "types"),
    };
    let filters = Filters {
        page: read_int(&query, "page", 1, &mut errors),
        page_size: read_int(&query, "page_size", 20, &mut errors),
        sort: read_string(&query, "sort", "id"),
    };
    if !errors.is_empty() {
        return Err(ApiError::FailedValidation(errors));
    }
    filters.validate().map_err(ApiError::FailedValidation)?;

    let (foods, metadata) = state.foods.list(&filter, &filters).await?;
    Ok(Json(FoodsEnvelope { foods, metadata }))
}

pub async fn create_food(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(FOODS_WRITE)?;

    let input: NewFood = read_json(body, state.config.security.max_body_size).await?;
    input.validate().map_err(ApiError::FailedValidation)?;

    let food = state.foods.insert(input).await?;
    tracing::info!(id = food.id, "Food created");

    let location = format!("/v1/foods/{}", food.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(FoodEnvelope { food }),
    ))
}

pub async fn show_food(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(raw_id): Path<String>,
) -> Result<Json<FoodEnvelope>, ApiError> {
    identity.require(FOODS_READ)?;
    let id = read_id_param(&raw_id)?;

    let food = state.foods.get(id).await?;
    Ok(Json(FoodEnvelope { food }))
}

/// Partial update. Only fields present in the body change; the write is
/// version-checked and a concurrent change yields 409.
pub async fn update_food(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<FoodEnvelope>, ApiError> {
    identity.require(FOODS_WRITE)?;
    let id = read_id_param(&raw_id)?;
    let expected_version = read_expected_version(&headers)?;

    let patch: FoodPatch = read_json(body, state.config.security.max_body_size).await?;
    let food = optimistic::update(state.foods.as_ref(), id, expected_version, move |food| {
        patch.apply(food)
    })
    .await?;

    tracing::info!(id, version = food.version, "Food updated");
    Ok(Json(FoodEnvelope { food }))
}

pub async fn delete_food(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(raw_id): Path<String>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    identity.require(FOODS_WRITE)?;
    let id = read_id_param(&raw_id)?;

    state.foods.delete(id).await?;
    tracing::info!(id, "Food deleted");
    Ok(Json(MessageEnvelope {
        message: "food successfully deleted".to_string(),
    }))
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
