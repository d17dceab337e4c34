//! # Web API
//!
//! HTTP and WebSocket interface for web clients:
//!
//! - `GET /routes`: names of all stored routes
//! - `GET /route/:name`: waypoints of a route
//! - `POST /route`: add or replace a route
//! - `DELETE /route/:name`: remove a route
//! - `POST /set_goal`: send a waypoint of a route to the planner as a goal
//! - `GET /map`: latest occupancy grid
//! - `GET /pose`: latest localised pose
//! - `GET /status`: bridge status
//! - `WS /ws`: telemetry stream
//!
//! Anything else is served from the static directory, if one is configured.

pub mod error;
pub mod ws;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{path::Path, sync::Arc, time::Instant};

use axum::{
    extract::{rejection::JsonRejection, Path as UrlPath, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use comms_if::{
    nav::{Pose, Waypoint},
    telem::OccupancyGrid,
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{
    conn_mgr::ConnectionManager,
    goal_dispatcher::GoalDispatcher,
    route_catalog::{Route, RouteCatalog},
    telem_store::TelemetryStore,
};

use self::error::ApiError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Shared state of the web server.
pub struct AppState {
    pub catalog: Arc<RouteCatalog>,
    pub store: Arc<TelemetryStore>,
    pub dispatcher: Arc<GoalDispatcher>,
    pub conns: ConnectionManager,
    pub start_time: Instant,
}

#[derive(Debug, Deserialize)]
struct SetGoalReq {
    route: String,
    index: i64,
}

#[derive(Debug, Deserialize)]
struct AddRouteReq {
    name: String,
    coordinates: Vec<Waypoint>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the router.
///
/// `static_dir` is the directory of the web client. If `None` only the API is served.
pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/routes", get(list_routes))
        .route("/route", post(add_route))
        .route("/route/:name", get(get_route).delete(delete_route))
        .route("/set_goal", post(set_goal))
        .route("/map", get(get_map))
        .route("/pose", get(get_pose))
        .route("/status", get(get_status))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state);

    if let Some(path) = static_dir {
        if path.exists() {
            info!("Serving web client from {:?}", path);
            app = app.fallback_service(ServeDir::new(path).append_index_html_on_directories(true));
        } else {
            warn!(
                "Static directory {:?} does not exist, the web client won't be served",
                path
            );
        }
    }

    app
}

/// GET /routes
async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "Stored routes",
        "routes": state.catalog.list_names(),
    }))
}

/// GET /route/:name
async fn get_route(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let coordinates = state
        .catalog
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("No route named \"{}\"", name)))?;

    Ok(Json(json!({
        "routeName": name,
        "coordinates": coordinates,
    })))
}

/// POST /route
async fn add_route(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddRouteReq>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        ApiError::BadRequest(format!(
            "Expected a route name and an array of waypoints: {}",
            e.body_text()
        ))
    })?;

    let name = req.name.clone();
    state.catalog.insert(Route {
        name: req.name,
        waypoints: req.coordinates,
    })?;
    info!("Route \"{}\" added", name);

    Ok(Json(json!({
        "message": format!("Route '{}' added", name),
        "routes": state.catalog.list_names(),
    })))
}

/// DELETE /route/:name
async fn delete_route(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    state.catalog.remove(&name)?;
    info!("Route \"{}\" deleted", name);

    Ok(Json(json!({
        "message": format!("Route '{}' deleted", name),
        "routes": state.catalog.list_names(),
    })))
}

/// POST /set_goal
async fn set_goal(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetGoalReq>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        ApiError::BadRequest(format!(
            "Expected a route name and waypoint index: {}",
            e.body_text()
        ))
    })?;

    // Publishing may block on the zmq socket
    let dispatcher = state.dispatcher.clone();
    let route = req.route.clone();
    let index = req.index;
    let goal = tokio::task::spawn_blocking(move || dispatcher.submit_goal(&route, index))
        .await
        .map_err(|e| ApiError::Unavailable(format!("Goal submission failed: {}", e)))??;

    Ok(Json(json!({
        "message": format!("Goal set to waypoint {} of route '{}'", req.index, req.route),
        "goal": goal,
    })))
}

/// GET /map
async fn get_map(State(state): State<Arc<AppState>>) -> Result<Json<Arc<OccupancyGrid>>, ApiError> {
    state
        .store
        .map()
        .map(Json)
        .ok_or_else(|| ApiError::Unavailable(String::from("No map has been received yet")))
}

/// GET /pose
async fn get_pose(State(state): State<Arc<AppState>>) -> Result<Json<Pose>, ApiError> {
    state
        .store
        .pose()
        .map(Json)
        .ok_or_else(|| ApiError::Unavailable(String::from("No pose has been received yet")))
}

/// GET /status
async fn get_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "clients": state.conns.num_open(),
        "uptime_s": state.start_time.elapsed().as_secs(),
        "routes": state.catalog.len(),
    }))
}

/// WS /ws
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let id = match state.conns.connect() {
        Ok(id) => id,
        Err(e) => return ApiError::Unavailable(e.to_string()).into_response(),
    };

    let conns = state.conns.clone();
    let failed_conns = state.conns.clone();

    ws.on_failed_upgrade(move |e| {
        warn!("WebSocket upgrade for connection {} failed: {}", id, e);
        failed_conns.close(id).ok();
    })
    .on_upgrade(move |socket| ws::handle_ws(socket, conns, id))
}
