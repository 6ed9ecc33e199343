//! The worker context and its async client.
//!
//! [`spawn_worker`] moves a [`FlowMapService`] onto a dedicated thread
//! running a single-threaded runtime. Requests reach it over an mpsc
//! channel and answer through a oneshot, so calls are handled strictly one
//! at a time. Results, including [`LayersData`] buffers, are moved back to
//! the caller rather than copied.

use flowmap_flow_models::{DataFormat, FlowTotals, LoadingStatus};
use flowmap_layers::LayersData;
use flowmap_state_models::{FlowMapState, ViewState};
use tokio::sync::{mpsc, oneshot};

use crate::service::FlowMapService;

const REQUEST_BUFFER: usize = 64;

/// Errors a worker client can observe.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread has stopped.
    #[error("Worker is no longer running")]
    Disconnected,

    /// The worker thread could not be started.
    #[error("Failed to start worker: {0}")]
    Spawn(#[from] std::io::Error),
}

enum Request {
    LoadLocations {
        url: String,
        format: DataFormat,
        reply: oneshot::Sender<LoadingStatus>,
    },
    LoadFlows {
        url: String,
        format: DataFormat,
        reply: oneshot::Sender<LoadingStatus>,
    },
    SetFlowMapState {
        state: Box<FlowMapState>,
        reply: oneshot::Sender<()>,
    },
    GetFlowMapState {
        reply: oneshot::Sender<Option<FlowMapState>>,
    },
    GetLayersData {
        reply: oneshot::Sender<Option<LayersData>>,
    },
    GetViewportForLocations {
        dims: [f64; 2],
        reply: oneshot::Sender<Option<ViewState>>,
    },
    GetFlowTotals {
        reply: oneshot::Sender<Option<FlowTotals>>,
    },
    ClearData {
        reply: oneshot::Sender<()>,
    },
}

impl Request {
    const fn name(&self) -> &'static str {
        match self {
            Self::LoadLocations { .. } => "loadLocations",
            Self::LoadFlows { .. } => "loadFlows",
            Self::SetFlowMapState { .. } => "setFlowMapState",
            Self::GetFlowMapState { .. } => "getFlowMapState",
            Self::GetLayersData { .. } => "getLayersData",
            Self::GetViewportForLocations { .. } => "getViewportForLocations",
            Self::GetFlowTotals { .. } => "getFlowTotals",
            Self::ClearData { .. } => "clearData",
        }
    }
}

/// Cloneable client of a running worker.
///
/// The worker stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    requests: mpsc::Sender<Request>,
}

/// Starts a worker thread that owns `service`.
///
/// # Errors
///
/// Returns [`WorkerError::Spawn`] if the thread or its runtime cannot be
/// created.
pub fn spawn_worker(service: FlowMapService) -> Result<WorkerHandle, WorkerError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (requests, rx) = mpsc::channel(REQUEST_BUFFER);

    std::thread::Builder::new()
        .name("flowmap-worker".to_owned())
        .spawn(move || {
            log::info!("Flow map worker started");
            runtime.block_on(run(service, rx));
            log::info!("Flow map worker stopped");
        })?;

    Ok(WorkerHandle { requests })
}

async fn run(mut service: FlowMapService, mut rx: mpsc::Receiver<Request>) {
    while let Some(request) = rx.recv().await {
        log::debug!("Worker request {}", request.name());
        // A send error only means the caller stopped waiting for the reply.
        match request {
            Request::LoadLocations { url, format, reply } => {
                let status = service.load_locations(&url, format).await;
                let _ = reply.send(status);
            }
            Request::LoadFlows { url, format, reply } => {
                let status = service.load_flows(&url, format).await;
                let _ = reply.send(status);
            }
            Request::SetFlowMapState { state, reply } => {
                service.set_flow_map_state(*state);
                let _ = reply.send(());
            }
            Request::GetFlowMapState { reply } => {
                let _ = reply.send(service.flow_map_state().cloned());
            }
            Request::GetLayersData { reply } => {
                let _ = reply.send(service.get_layers_data());
            }
            Request::GetViewportForLocations { dims, reply } => {
                let _ = reply.send(service.get_viewport_for_locations(dims));
            }
            Request::GetFlowTotals { reply } => {
                let _ = reply.send(service.get_flow_totals());
            }
            Request::ClearData { reply } => {
                service.clear_data();
                let _ = reply.send(());
            }
        }
    }
}

impl WorkerHandle {
    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, WorkerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| WorkerError::Disconnected)?;
        response.await.map_err(|_| WorkerError::Disconnected)
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn load_locations(
        &self,
        url: &str,
        format: DataFormat,
    ) -> Result<LoadingStatus, WorkerError> {
        let url = url.to_owned();
        self.call(|reply| Request::LoadLocations { url, format, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn load_flows(
        &self,
        url: &str,
        format: DataFormat,
    ) -> Result<LoadingStatus, WorkerError> {
        let url = url.to_owned();
        self.call(|reply| Request::LoadFlows { url, format, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn set_flow_map_state(&self, state: FlowMapState) -> Result<(), WorkerError> {
        let state = Box::new(state);
        self.call(|reply| Request::SetFlowMapState { state, reply })
            .await
    }

    /// The state last pushed with [`Self::set_flow_map_state`].
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn get_flow_map_state(&self) -> Result<Option<FlowMapState>, WorkerError> {
        self.call(|reply| Request::GetFlowMapState { reply }).await
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn get_layers_data(&self) -> Result<Option<LayersData>, WorkerError> {
        self.call(|reply| Request::GetLayersData { reply }).await
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn get_viewport_for_locations(
        &self,
        dims: [f64; 2],
    ) -> Result<Option<ViewState>, WorkerError> {
        self.call(|reply| Request::GetViewportForLocations { dims, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn get_flow_totals(&self) -> Result<Option<FlowTotals>, WorkerError> {
        self.call(|reply| Request::GetFlowTotals { reply }).await
    }

    /// # Errors
    ///
    /// Returns [`WorkerError::Disconnected`] if the worker has stopped.
    pub async fn clear_data(&self) -> Result<(), WorkerError> {
        self.call(|reply| Request::ClearData { reply }).await
    }
}
