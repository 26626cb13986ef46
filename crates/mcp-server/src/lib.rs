use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::StreamExt;
use mcp_core::protocol::{ErrorData, JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_service::Service;
use tracing::Instrument;

mod errors;
pub use errors::{BoxError, RegistryError, RouterError, ServerError, TransportError};

pub mod dispatch;
pub mod registry;
pub mod router;
pub mod schema;
pub mod template;
pub mod transport;

pub use dispatch::Dispatcher;
pub use registry::{CapabilityClass, Registry};
pub use router::{Router, RouterService};
use transport::Transport;

/// The main server type that processes incoming requests
///
/// Each request runs as its own task; responses are funnelled back through a
/// channel so only the loop writes to the transport.
pub struct Server<S> {
    service: S,
    in_flight: Arc<AtomicUsize>,
}

/// Counts a spawned request until its task finishes.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S> Server<S>
where
    S: Service<JsonRpcRequest, Response = JsonRpcResponse> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    pub fn new(service: S) -> Self {
        Self {
            service,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve until the transport reaches end of input and every in-flight
    /// request has been answered.
    pub async fn run<T>(self, mut transport: T) -> Result<(), ServerError>
    where
        T: Transport + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcMessage>();
        let mut tx = Some(tx);

        tracing::info!("Server started");
        loop {
            tokio::select! {
                msg = transport.next(), if tx.is_some() => {
                    match msg {
                        Some(Ok(JsonRpcMessage::Request(request))) => {
                            if let Some(tx) = &tx {
                                self.spawn_request(request, tx.clone());
                            }
                        }
                        Some(Ok(JsonRpcMessage::Notification(notification))) => {
                            tracing::debug!(method = %notification.method, "ignoring notification");
                        }
                        Some(Ok(JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_))) => {
                            tracing::debug!("ignoring unsolicited response");
                        }
                        Some(Err(e)) if e.is_recoverable() => {
                            tracing::warn!(error = %e, "rejected incoming message");
                            let error = JsonRpcError::new(None, e.into_error_data());
                            transport.write_message(JsonRpcMessage::Error(error)).await?;
                        }
                        Some(Err(e)) => {
                            tracing::error!(
                                error = %e,
                                in_flight = self.in_flight.load(Ordering::SeqCst),
                                "transport failed, abandoning in-flight requests"
                            );
                            return Err(ServerError::Transport(e));
                        }
                        None => {
                            tracing::info!("end of input, draining in-flight requests");
                            tx = None;
                        }
                    }
                }
                response = rx.recv() => {
                    // None once input has ended and every request task is done.
                    let Some(response) = response else { break };
                    transport.write_message(response).await?;
                }
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    fn spawn_request(&self, request: JsonRpcRequest, tx: mpsc::UnboundedSender<JsonRpcMessage>) {
        let span = tracing::info_span!("request", id = %request.id, method = %request.method);
        let service = self.service.clone();
        let guard = InFlight::enter(&self.in_flight);

        tokio::spawn(
            async move {
                let _guard = guard;
                tracing::debug!(params = ?request.params, "received request");
                let id = request.id.clone();
                let response = match service.oneshot(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        let error: BoxError = e.into();
                        let error_msg = error.to_string();
                        tracing::error!(error = %error_msg, "request processing failed");
                        JsonRpcResponse::error(id, ErrorData::internal_error(error_msg, None))
                    }
                };
                match &response.error {
                    Some(error) => tracing::info!(code = error.code, message = %error.message, "request failed"),
                    None => tracing::info!("request succeeded"),
                }
                if tx.send(JsonRpcMessage::Response(response)).is_err() {
                    tracing::warn!("server loop gone, dropping response");
                }
            }
            .instrument(span),
        );
    }
}
