//! HTTP handler functions for the flow map API.

use actix_web::{HttpResponse, web};
use flowmap_server_models::{
    ApiError, ApiHealth, ApiQueryString, LoadRequest, LoadResponse, ViewportQueryParams,
};
use flowmap_state::{encode, reduce};
use flowmap_state_models::{Action, FlowMapState};
use flowmap_worker::WorkerError;
use serde::Serialize;

use crate::AppState;

fn worker_unavailable(e: &WorkerError) -> HttpResponse {
    log::error!("Worker request failed: {e}");
    HttpResponse::ServiceUnavailable().json(ApiError::new(e.to_string()))
}

/// 200 with the value, or 404 while the data it needs is not loaded.
fn loaded<T: Serialize>(result: Result<Option<T>, WorkerError>) -> HttpResponse {
    match result {
        Ok(Some(value)) => HttpResponse::Ok().json(value),
        Ok(None) => HttpResponse::NotFound().json(ApiError::new("Data not loaded")),
        Err(e) => worker_unavailable(&e),
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/locations`
///
/// Replaces the location dataset. Load failures are reported in the
/// returned status, not as an HTTP error.
pub async fn load_locations(
    state: web::Data<AppState>,
    body: web::Json<LoadRequest>,
) -> HttpResponse {
    match state.worker.load_locations(&body.url, body.format).await {
        Ok(status) => HttpResponse::Ok().json(LoadResponse { status }),
        Err(e) => worker_unavailable(&e),
    }
}

/// `POST /api/flows`
///
/// Replaces the flow dataset. Load failures are reported in the returned
/// status, not as an HTTP error.
pub async fn load_flows(state: web::Data<AppState>, body: web::Json<LoadRequest>) -> HttpResponse {
    match state.worker.load_flows(&body.url, body.format).await {
        Ok(status) => HttpResponse::Ok().json(LoadResponse { status }),
        Err(e) => worker_unavailable(&e),
    }
}

/// `GET /api/state`
pub async fn get_state(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.state())
}

/// `PUT /api/state`
pub async fn put_state(state: web::Data<AppState>, body: web::Json<FlowMapState>) -> HttpResponse {
    let next = body.into_inner();
    HttpResponse::Ok().json(state.update_state(|_| next))
}

/// `POST /api/state/dispatch`
///
/// Applies one action to the current state and returns the result.
pub async fn dispatch(state: web::Data<AppState>, action: web::Json<Action>) -> HttpResponse {
    let action = action.into_inner();
    log::debug!("Dispatching {action}");
    HttpResponse::Ok().json(state.update_state(|current| reduce(current, action)))
}

/// `GET /api/state/query`
pub async fn state_query(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiQueryString {
        query: encode(&state.state()),
    })
}

/// `GET /api/layers`
pub async fn layers(state: web::Data<AppState>) -> HttpResponse {
    loaded(state.worker.get_layers_data().await)
}

/// `GET /api/viewport?width=&height=`
pub async fn viewport(
    state: web::Data<AppState>,
    params: web::Query<ViewportQueryParams>,
) -> HttpResponse {
    loaded(
        state
            .worker
            .get_viewport_for_locations([params.width, params.height])
            .await,
    )
}

/// `GET /api/totals`
pub async fn totals(state: web::Data<AppState>) -> HttpResponse {
    loaded(state.worker.get_flow_totals().await)
}

/// `DELETE /api/data`
pub async fn clear_data(state: web::Data<AppState>) -> HttpResponse {
    match state.worker.clear_data().await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => worker_unavailable(&e),
    }
}
