#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the flow map pipeline.
//!
//! The server plays the foreground: it owns the current [`FlowMapState`],
//! applies dispatched actions to it, and forwards every change to a
//! background worker through a throttled [`StateSync`]. Datasets are
//! loaded, and layers, viewports and totals computed, by the worker.

mod handlers;

use std::sync::{Mutex, MutexGuard, PoisonError};

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use flowmap_server_models::LoadRequest;
use flowmap_state_models::FlowMapState;
use flowmap_worker::{
    DEFAULT_THROTTLE, FlowMapService, StateSync, WorkerError, WorkerHandle, spawn_worker,
};

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or running the HTTP server failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker could not be started or stopped answering.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Shared application state.
pub struct AppState {
    /// Client of the background worker.
    pub worker: WorkerHandle,
    /// Throttled forwarding of state changes to the worker.
    pub sync: StateSync,
    state: Mutex<FlowMapState>,
}

impl AppState {
    /// Wraps `worker` and pushes `state` as the first foreground state.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(worker: WorkerHandle, state: FlowMapState) -> Self {
        let sync = StateSync::spawn(worker.clone(), DEFAULT_THROTTLE);
        sync.push(state.clone());
        Self {
            worker,
            sync,
            state: Mutex::new(state),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FlowMapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current foreground state.
    #[must_use]
    pub fn state(&self) -> FlowMapState {
        self.lock_state().clone()
    }

    /// Replaces the state with `f(state)` and forwards the result.
    pub fn update_state(&self, f: impl FnOnce(FlowMapState) -> FlowMapState) -> FlowMapState {
        let mut guard = self.lock_state();
        let next = f(guard.clone());
        *guard = next.clone();
        drop(guard);
        self.sync.push(next.clone());
        next
    }
}

/// What to serve and where.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub bind_addr: String,
    pub port: u16,
    /// Initial foreground state.
    pub state: FlowMapState,
    /// Location dataset loaded before the server starts accepting requests.
    pub locations: Option<LoadRequest>,
    /// Flow dataset loaded before the server starts accepting requests.
    pub flows: Option<LoadRequest>,
}

impl ServerOptions {
    /// Options with the address read from `BIND_ADDR` (default
    /// `127.0.0.1`) and `PORT` (default `8080`).
    #[must_use]
    pub fn from_env(state: FlowMapState) -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        Self {
            bind_addr,
            port,
            state,
            locations: None,
            flows: None,
        }
    }
}

/// Registers every `/api` route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/locations", web::post().to(handlers::load_locations))
            .route("/flows", web::post().to(handlers::load_flows))
            .route("/state", web::get().to(handlers::get_state))
            .route("/state", web::put().to(handlers::put_state))
            .route("/state/dispatch", web::post().to(handlers::dispatch))
            .route("/state/query", web::get().to(handlers::state_query))
            .route("/layers", web::get().to(handlers::layers))
            .route("/viewport", web::get().to(handlers::viewport))
            .route("/totals", web::get().to(handlers::totals))
            .route("/data", web::delete().to(handlers::clear_data)),
    );
}

/// Starts a worker, loads the configured datasets, and serves the API
/// until shut down. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if the worker cannot be started or the HTTP
/// server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server(options: ServerOptions) -> Result<(), ServerError> {
    let worker = spawn_worker(FlowMapService::new())?;

    if let Some(request) = &options.locations {
        let status = worker.load_locations(&request.url, request.format).await?;
        log::info!("Locations from {}: {status}", request.url);
    }
    if let Some(request) = &options.flows {
        let status = worker.load_flows(&request.url, request.format).await?;
        log::info!("Flows from {}: {status}", request.url);
    }

    let state = web::Data::new(AppState::new(worker, options.state));

    log::info!("Starting server on {}:{}", options.bind_addr, options.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((options.bind_addr, options.port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use flowmap_flow_models::{FlowTotals, LoadingStatus};
    use flowmap_layers::LayersData;
    use flowmap_server_models::{ApiHealth, ApiQueryString, LoadResponse};
    use flowmap_state::default_viewport;
    use flowmap_state_models::ViewState;

    use super::*;

    fn write_fixture(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "flowmap_server_{}_{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn app_state() -> web::Data<AppState> {
        let worker = spawn_worker(FlowMapService::new()).unwrap();
        web::Data::new(AppState::new(
            worker,
            FlowMapState::with_viewport(default_viewport()),
        ))
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let health: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(health.healthy);
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn data_endpoints_are_not_found_before_loading() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;
        for uri in ["/api/layers", "/api/totals", "/api/viewport?width=800&height=600"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[actix_web::test]
    async fn loads_data_and_serves_pipeline_outputs() {
        let locations = write_fixture("locations.csv", "id,name,lat,lon\nA,A,0,0\nB,B,10,10\n");
        let flows = write_fixture("flows.csv", "origin,dest,count\nA,B,3\nB,A,1\nA,X,9\n");
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;

        for (uri, url) in [("/api/locations", &locations), ("/api/flows", &flows)] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(serde_json::json!({ "url": url }))
                .to_request();
            let resp: LoadResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(resp.status, LoadingStatus::Done, "{uri}");
        }
        std::fs::remove_file(&locations).ok();
        std::fs::remove_file(&flows).ok();

        let req = test::TestRequest::get().uri("/api/layers").to_request();
        let layers: LayersData = test::call_and_read_body_json(&app, req).await;
        assert_eq!(layers.circle_attributes.length, 2);
        assert_eq!(layers.line_attributes.length, 2);
        assert_eq!(layers.skipped_flows, 1);

        let req = test::TestRequest::get().uri("/api/totals").to_request();
        let totals: FlowTotals = test::call_and_read_body_json(&app, req).await;
        assert!((totals.unfiltered_count - 13.0).abs() < 1e-9);

        let req = test::TestRequest::get()
            .uri("/api/viewport?width=800&height=600")
            .to_request();
        let viewport: ViewState = test::call_and_read_body_json(&app, req).await;
        assert!((viewport.width - 800.0).abs() < 1e-9);

        let req = test::TestRequest::delete().uri("/api/data").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let req = test::TestRequest::get().uri("/api/layers").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn failed_load_reports_error_status() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/flows")
            .set_json(serde_json::json!({ "url": "/nonexistent/flowmap.csv" }))
            .to_request();
        let resp: LoadResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.status, LoadingStatus::Error);
    }

    #[actix_web::test]
    async fn dispatch_reduces_the_foreground_state() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/state/dispatch")
            .set_json(serde_json::json!({ "type": "SET_DARK_MODE", "darkMode": false }))
            .to_request();
        let state: FlowMapState = test::call_and_read_body_json(&app, req).await;
        assert!(!state.settings_state.dark_mode);

        let req = test::TestRequest::get().uri("/api/state").to_request();
        let state: FlowMapState = test::call_and_read_body_json(&app, req).await;
        assert!(!state.settings_state.dark_mode);

        let req = test::TestRequest::get().uri("/api/state/query").to_request();
        let query: ApiQueryString = test::call_and_read_body_json(&app, req).await;
        assert!(query.query.contains("&d=0&"), "{}", query.query);
    }

    #[actix_web::test]
    async fn put_replaces_the_state() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;
        let mut next = FlowMapState::with_viewport(default_viewport());
        next.settings_state.fade_amount = 10.0;

        let req = test::TestRequest::put()
            .uri("/api/state")
            .set_json(&next)
            .to_request();
        let state: FlowMapState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(state, next);
    }

    #[actix_web::test]
    async fn malformed_action_is_a_bad_request() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/state/dispatch")
            .set_json(serde_json::json!({ "darkMode": false }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
