use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use matchday_data_management::RECENT_LOCATION_LIMIT;
use matchday_lib::{
    location::LocationObservation,
    place::{Place, PlaceDraft},
    traffic::{TrafficRequest, TrafficResponse},
};
use serde_json::{json, Value};

use crate::{advisor::fixture::clubs_for, error::AppError, server_state::ServerState};

type AppState = State<Arc<ServerState>>;

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/places", get(get_places).post(create_place))
        .route("/places/{place_id}", get(get_place).put(update_place).delete(delete_place))
        .route("/places/category/{category}", get(get_places_in_category))
        .route("/locations", get(get_locations))
        .route("/traffic_advice", post(traffic_advice))
        .fallback(unknown_route)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn unknown_route(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{method} is not allowed on {}", uri.path()))
}

async fn liveness(State(state): AppState) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "advisor_ready": state.advisor.is_ready(),
    }))
}

async fn get_places(State(state): AppState) -> Result<Json<Vec<Place>>, AppError> {
    Ok(Json(state.data_manager.get_places().await?))
}

async fn create_place(
    State(state): AppState,
    WithRejection(Json(draft), _): WithRejection<Json<PlaceDraft>, AppError>,
) -> Result<(StatusCode, Json<Place>), AppError> {
    let place = state.data_manager.create_place(draft).await?;
    Ok((StatusCode::CREATED, Json(place)))
}

async fn get_place(
    State(state): AppState,
    WithRejection(Path(place_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Place>, AppError> {
    Ok(Json(state.data_manager.get_place(place_id).await?))
}

async fn get_places_in_category(
    State(state): AppState,
    WithRejection(Path(category), _): WithRejection<Path<String>, AppError>,
) -> Result<Json<Vec<Place>>, AppError> {
    Ok(Json(state.data_manager.get_places_in_category(&category).await?))
}

async fn update_place(
    State(state): AppState,
    WithRejection(Path(place_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(draft), _): WithRejection<Json<PlaceDraft>, AppError>,
) -> Result<Json<Place>, AppError> {
    Ok(Json(state.data_manager.update_place(place_id, draft).await?))
}

async fn delete_place(
    State(state): AppState,
    WithRejection(Path(place_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Value>, AppError> {
    state.data_manager.delete_place(place_id).await?;
    Ok(Json(json!({ "message": format!("Place {place_id} deleted") })))
}

async fn get_locations(State(state): AppState) -> Result<Json<Vec<LocationObservation>>, AppError> {
    Ok(Json(state.data_manager.get_locations().await?))
}

async fn traffic_advice(
    State(state): AppState,
    WithRejection(Json(mut request), _): WithRejection<Json<TrafficRequest>, AppError>,
) -> Result<Json<TrafficResponse>, AppError> {
    if let Some(fixture) = &state.fixture {
        fixture.apply(&mut request);
    }

    let clubs = clubs_for(&request, state.fixture.as_ref());
    let historical = state.data_manager.get_recent_locations(&clubs, RECENT_LOCATION_LIMIT).await?;
    tracing::debug!(clubs = ?clubs, history = historical.len(), "Requesting traffic advice");

    let advice = state.advisor.analyze(&request, &historical).await;
    Ok(Json(TrafficResponse::from_advice(&advice)))
}
