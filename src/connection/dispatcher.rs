//! Maps classified inbound frames to local actions.
//!
//! The dispatcher is the sole consumer of [`ClassifyResult`]s. Requests and
//! events run their service handlers on spawned tasks so a slow handler
//! never stalls the receive loop; responses complete outstanding entries
//! directly; protocol-level dispositions feed the error strata described in
//! the crate docs.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::connection::outstanding::{OutstandingRequests, ResponseOutcome};
use crate::protocol::{
    build_message_frame, build_protocol_error_frame, ClassifyResult, FrameDisposition, Headers,
    PayloadKind,
};
use crate::service::ServiceRegistry;
use crate::writer::{OutboundFrame, WriterHandle};

/// Per-connection dispatcher; cheap to clone into spawned handler tasks.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    outstanding: Arc<OutstandingRequests>,
    writer: WriterHandle,
    cancel: CancellationToken,
    peer_error: Arc<Mutex<Option<i32>>>,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<ServiceRegistry>,
        outstanding: Arc<OutstandingRequests>,
        writer: WriterHandle,
        cancel: CancellationToken,
        peer_error: Arc<Mutex<Option<i32>>>,
    ) -> Self {
        Self {
            registry,
            outstanding,
            writer,
            cancel,
            peer_error,
        }
    }

    /// Act on one classified frame.
    pub(crate) async fn dispatch(&self, result: ClassifyResult) {
        match result.disposition {
            FrameDisposition::DeliverRequestToService => self.deliver_request(result),
            FrameDisposition::DeliverResponseToProxy => self.deliver_response(result),
            FrameDisposition::DeliverEventToService => self.deliver_event(result),
            FrameDisposition::ProcessConfig => {
                tracing::debug!("config frame accepted");
            }
            FrameDisposition::HandleProtocolError => {
                let code = result.error.map(|e| e.error_code).unwrap_or_default();
                tracing::warn!("peer reported protocol error (code {code}); closing");
                *self.peer_error.lock().expect("peer error lock") = Some(code);
                self.cancel.cancel();
            }
            FrameDisposition::SendProtocolError => {
                let Some(code) = result.error_code else {
                    tracing::error!("SendProtocolError without a code; closing");
                    self.cancel.cancel();
                    return;
                };
                tracing::warn!("rejecting malformed frame (code {:?})", code);
                match build_protocol_error_frame(code) {
                    Ok(frame) => {
                        if let Err(e) = self.writer.send(OutboundFrame::encode(&frame)).await {
                            tracing::debug!("could not send protocol error: {e}");
                        }
                    }
                    Err(e) => tracing::error!("could not build protocol error frame: {e}"),
                }
            }
            FrameDisposition::HangUp => {
                self.cancel.cancel();
            }
            FrameDisposition::Indeterminate => {
                tracing::error!("indeterminate classification; closing connection");
                self.cancel.cancel();
            }
        }
    }

    fn deliver_request(&self, result: ClassifyResult) {
        let Some(headers) = result.headers else {
            tracing::error!("request disposition without headers; dropping");
            return;
        };
        let payload = result.payload.unwrap_or_default();

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let response = match dispatcher.registry.lookup(&headers.method_name) {
                Some(service) => service.invoke(&headers.method_name, payload).await,
                None => Err(crate::service::MethodError::new(
                    crate::service::ERROR_METHOD_NOT_FOUND,
                    format!("method not found: {}", headers.method_name),
                )),
            };
            dispatcher.respond(&headers, response).await;
        });
    }

    async fn respond(&self, request: &Headers, response: crate::service::MethodResult) {
        let (error_code, payload) = match response {
            Ok(payload) => (0, payload),
            Err(e) => {
                let detail = crate::codec::RecordCodec::encode(&e.message)
                    .map(Bytes::from)
                    .unwrap_or_default();
                (e.code, detail)
            }
        };

        let headers = Headers::new(
            request.request_id,
            PayloadKind::Response,
            &request.method_name,
            error_code,
        );
        let frame = match build_message_frame(&headers, None, payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("could not build response frame: {e}");
                return;
            }
        };
        if let Err(e) = self.writer.send(OutboundFrame::encode(&frame)).await {
            tracing::debug!("could not send response: {e}");
        }
    }

    fn deliver_response(&self, result: ClassifyResult) {
        let Some(headers) = result.headers else {
            tracing::error!("response disposition without headers; dropping");
            return;
        };
        let outcome = ResponseOutcome {
            error_code: headers.error_code,
            payload: result.payload.unwrap_or_default(),
        };
        if !self.outstanding.complete(headers.request_id, Ok(outcome)) {
            tracing::debug!(
                "dropping late or duplicate response for request {}",
                headers.request_id
            );
        }
    }

    fn deliver_event(&self, result: ClassifyResult) {
        let Some(headers) = result.headers else {
            tracing::error!("event disposition without headers; dropping");
            return;
        };
        let payload = result.payload.unwrap_or_default();

        match self.registry.lookup(&headers.method_name) {
            Some(service) => {
                let method = headers.method_name;
                tokio::spawn(async move {
                    service.notify(&method, payload).await;
                });
            }
            None => {
                tracing::debug!("dropping event for unknown method {}", headers.method_name);
            }
        }
    }
}
