//! Throttled forwarding of foreground state changes to the worker.
//!
//! State changes can arrive once per input event. [`StateSync`] pushes the
//! first change right away, then at most one more per interval carrying
//! only the latest state; anything in between is dropped. After each push
//! the layers are recomputed and published on a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flowmap_layers::LayersData;
use flowmap_state_models::FlowMapState;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::handle::{WorkerError, WorkerHandle};

pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// Leading and trailing throttle between a foreground and a worker.
#[derive(Debug)]
pub struct StateSync {
    states: watch::Sender<Option<FlowMapState>>,
    layers: watch::Receiver<Option<LayersData>>,
    pushed: Arc<AtomicUsize>,
}

impl StateSync {
    /// Starts the forwarding task on the current runtime.
    ///
    /// The task ends when this value is dropped or the worker stops.
    #[must_use]
    pub fn spawn(worker: WorkerHandle, interval: Duration) -> Self {
        let (states, states_rx) = watch::channel(None);
        let (layers_tx, layers) = watch::channel(None);
        let pushed = Arc::new(AtomicUsize::new(0));

        tokio::spawn(forward(
            worker,
            interval,
            states_rx,
            layers_tx,
            Arc::clone(&pushed),
        ));

        Self {
            states,
            layers,
            pushed,
        }
    }

    /// Queues `state`, replacing any state not yet sent.
    pub fn push(&self, state: FlowMapState) {
        self.states.send_replace(Some(state));
    }

    /// Layers computed after the most recent push.
    #[must_use]
    pub fn layers(&self) -> watch::Receiver<Option<LayersData>> {
        self.layers.clone()
    }

    /// Number of states actually sent to the worker.
    #[must_use]
    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }
}

async fn forward(
    worker: WorkerHandle,
    interval: Duration,
    mut states: watch::Receiver<Option<FlowMapState>>,
    layers: watch::Sender<Option<LayersData>>,
    pushed: Arc<AtomicUsize>,
) {
    while states.changed().await.is_ok() {
        let mut deadline = Instant::now() + interval;
        let state = states.borrow_and_update().clone();
        if let Err(e) = send(&worker, state, &layers, &pushed).await {
            log::warn!("Stopping state sync: {e}");
            return;
        }

        loop {
            tokio::time::sleep_until(deadline).await;
            if !matches!(states.has_changed(), Ok(true)) {
                break;
            }
            deadline = Instant::now() + interval;
            let state = states.borrow_and_update().clone();
            if let Err(e) = send(&worker, state, &layers, &pushed).await {
                log::warn!("Stopping state sync: {e}");
                return;
            }
        }
    }
    log::debug!("State sync finished");
}

async fn send(
    worker: &WorkerHandle,
    state: Option<FlowMapState>,
    layers: &watch::Sender<Option<LayersData>>,
    pushed: &AtomicUsize,
) -> Result<(), WorkerError> {
    let Some(state) = state else {
        return Ok(());
    };
    worker.set_flow_map_state(state).await?;
    pushed.fetch_add(1, Ordering::Relaxed);
    layers.send_replace(worker.get_layers_data().await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use flowmap_flow_models::{Location, RawFlowRow};
    use flowmap_state::default_viewport;

    use super::*;
    use crate::service::FlowMapService;
    use crate::spawn_worker;

    fn worker() -> WorkerHandle {
        let mut service = FlowMapService::new();
        service.replace_locations(vec![Location {
            id: "A".to_owned(),
            lon: 1.0,
            lat: 1.0,
            name: "A".to_owned(),
        }]);
        service.replace_flows(&[RawFlowRow::new("A", "A", 1.0)]);
        spawn_worker(service).unwrap()
    }

    fn state_with_zoom(zoom: f64) -> FlowMapState {
        let mut state = FlowMapState::with_viewport(default_viewport());
        state.viewport.zoom = zoom;
        state
    }

    #[tokio::test]
    async fn first_change_is_sent_immediately() {
        let sync = StateSync::spawn(worker(), Duration::from_secs(60));
        let mut layers = sync.layers();
        sync.push(state_with_zoom(3.0));

        tokio::time::timeout(Duration::from_secs(5), layers.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(layers.borrow().is_some());
        assert_eq!(sync.pushed(), 1);
    }

    #[tokio::test]
    async fn bursts_are_coalesced_to_the_latest_state() {
        let handle = worker();
        let sync = StateSync::spawn(handle.clone(), Duration::from_millis(20));
        for i in 0..50 {
            sync.push(state_with_zoom(f64::from(i) / 10.0));
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        let state = handle.get_flow_map_state().await.unwrap().unwrap();
        assert!((state.viewport.zoom - 4.9).abs() < 1e-9);
        assert!(sync.pushed() <= 2, "pushed {}", sync.pushed());
    }
}
