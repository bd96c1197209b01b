//! HTTP ingress workers.
//!
//! # Responsibilities
//! - Bind the plaintext ingress port once and share it across workers
//! - Accept events on `POST /{namespace}/{name}` and forward them to the bus
//! - Answer `GET /healthz` for readiness checks
//!
//! # Design Decisions
//! - Every worker serves a duplicate of the same socket
//! - Event type lookup is skipped entirely when no lister was acquired

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::bus::{BusError, EventBus, Message};
use crate::capability::Lister;
use crate::config::ServerOptions;
use crate::ingress::deploy::{WorkerError, WorkerFactory};
use crate::lifecycle::resource::{CloseError, ResourceHandle};

/// Address the backend producers consume ingress events from.
pub const INGRESS_ADDRESS: &str = "receiver.ingress";

/// Header naming the target namespace on forwarded messages.
pub const NAMESPACE_HEADER: &str = "ingress-namespace";

/// Header naming the target broker or channel on forwarded messages.
pub const NAME_HEADER: &str = "ingress-name";

const CE_TYPE_HEADER: &str = "ce-type";

#[derive(Clone)]
struct IngressState {
    bus: EventBus,
    event_types: Option<Lister>,
}

/// Builds ingress workers over one bound socket.
pub struct IngressFactory {
    listener: StdTcpListener,
    local_addr: SocketAddr,
    body_limit: Option<usize>,
    state: IngressState,
}

impl IngressFactory {
    /// Bind `options.host:options.port`.
    pub fn bind(
        options: &ServerOptions,
        bus: EventBus,
        event_types: Option<Lister>,
    ) -> io::Result<Self> {
        let listener = StdTcpListener::bind((options.host.as_str(), options.port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            event_types = event_types.is_some(),
            "Ingress listener bound"
        );

        Ok(Self {
            listener,
            local_addr,
            body_limit: options.max_body_size(),
            state: IngressState { bus, event_types },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn router(&self) -> Router {
        let router = Router::new()
            .route("/healthz", get(healthz))
            .route("/{namespace}/{name}", post(receive))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        match self.body_limit {
            Some(limit) => router.layer(DefaultBodyLimit::max(limit)),
            None => router,
        }
    }

    fn spawn_worker(&self, instance: usize) -> io::Result<IngressWorker> {
        let listener = TcpListener::from_std(self.listener.try_clone()?)?;
        let app = self.router();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await;
            match served {
                Ok(()) => tracing::debug!(instance, "Ingress worker stopped"),
                Err(e) => tracing::error!(instance, error = %e, "Ingress worker failed"),
            }
        });

        Ok(IngressWorker {
            name: format!("ingress-worker-{instance}"),
            stop: Some(stop_tx),
            task,
        })
    }
}

impl WorkerFactory for IngressFactory {
    fn create(
        &self,
        instance: usize,
    ) -> BoxFuture<'_, Result<Box<dyn ResourceHandle>, WorkerError>> {
        Box::pin(async move {
            let worker = self.spawn_worker(instance)?;
            Ok(Box::new(worker) as Box<dyn ResourceHandle>)
        })
    }
}

/// A running ingress worker.
pub struct IngressWorker {
    name: String,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ResourceHandle for IngressWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            (&mut self.task)
                .await
                .map_err(|e| CloseError::new(format!("ingress worker task failed: {e}")))
        })
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn receive(
    State(state): State<IngressState>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ce_type = headers.get(CE_TYPE_HEADER).and_then(|v| v.to_str().ok());

    if let (Some(lister), Some(ce_type)) = (&state.event_types, ce_type) {
        if lister.find_type(&namespace, ce_type).is_none() {
            tracing::debug!(
                namespace = %namespace,
                ce_type,
                "Event type not registered, eligible for auto-creation"
            );
        }
    }

    let mut message = Message::new(INGRESS_ADDRESS, body.to_vec())
        .with_header(NAMESPACE_HEADER, namespace.as_str())
        .with_header(NAME_HEADER, name.as_str());
    for (key, value) in headers.iter() {
        let key = key.as_str();
        if key.starts_with("ce-") || key == "content-type" {
            if let Ok(value) = value.to_str() {
                message = message.with_header(key, value);
            }
        }
    }

    match state.bus.send(message) {
        Ok(0) => {
            tracing::warn!(
                namespace = %namespace,
                name = %name,
                "No producer attached, event rejected"
            );
            (StatusCode::SERVICE_UNAVAILABLE, "no producer available").into_response()
        }
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(BusError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response(),
    }
}
