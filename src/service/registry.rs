//! Service registry and typed method handlers.
//!
//! A [`Service`] exposes named methods (request/response) and event sinks
//! (fire-and-forget). The [`ServiceRegistry`] maps each method name to the
//! service that registered it; lookups happen on every inbound request, so
//! the map is a concurrent read-mostly structure.
//!
//! [`MethodTable`] is the convenience implementation: closures with
//! serde-typed inputs and outputs, payloads decoded and encoded with the
//! record codec.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::RecordCodec;

/// Application error code: no handler registered for the method.
pub const ERROR_METHOD_NOT_FOUND: i32 = 1;
/// Application error code: the request payload did not decode.
pub const ERROR_INVALID_PAYLOAD: i32 = 2;
/// Application error code: the handler failed without a specific code.
pub const ERROR_INTERNAL: i32 = 3;

/// Application-level failure produced by a method handler.
///
/// `code` must be nonzero; it travels in the response headers, while
/// `message` is encoded into the response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodError {
    pub code: i32,
    pub message: String,
}

impl MethodError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// An internal failure with the catch-all code.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ERROR_INTERNAL, message)
    }
}

/// Result type for method invocations: serialized response payload or a
/// coded failure.
pub type MethodResult = Result<Bytes, MethodError>;

/// Boxed future for method invocations.
pub type MethodFuture = Pin<Box<dyn Future<Output = MethodResult> + Send + 'static>>;

/// Boxed future for event deliveries.
pub type EventFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A dispatchable service: a named set of methods and event sinks.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Service name; identifies the service for deregistration.
    fn name(&self) -> &str;

    /// Names of the methods and event sinks this service exposes.
    fn method_names(&self) -> Vec<String>;

    /// Invoke a request method with its raw payload.
    async fn invoke(&self, method: &str, payload: Bytes) -> MethodResult;

    /// Deliver an event; no response is produced.
    async fn notify(&self, method: &str, payload: Bytes);
}

trait RequestHandler: Send + Sync + 'static {
    fn call(&self, payload: Bytes) -> MethodFuture;
}

trait EventHandler: Send + Sync + 'static {
    fn call(&self, payload: Bytes) -> EventFuture;
}

/// Wrapper that decodes the payload before calling a typed closure and
/// encodes whatever it returns.
struct TypedRequestHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, R, Fut> RequestHandler for TypedRequestHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
{
    fn call(&self, payload: Bytes) -> MethodFuture {
        let parsed: T = match RecordCodec::decode(&payload) {
            Ok(value) => value,
            Err(e) => {
                let error = MethodError::new(ERROR_INVALID_PAYLOAD, e.to_string());
                return Box::pin(async move { Err(error) });
            }
        };

        let fut = (self.handler)(parsed);
        Box::pin(async move {
            let response = fut.await?;
            RecordCodec::encode(&response)
                .map(Bytes::from)
                .map_err(|e| MethodError::internal(e.to_string()))
        })
    }
}

struct TypedEventHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> EventHandler for TypedEventHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, payload: Bytes) -> EventFuture {
        let parsed: T = match RecordCodec::decode(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("dropping event with undecodable payload: {e}");
                return Box::pin(async {});
            }
        };
        Box::pin((self.handler)(parsed))
    }
}

/// A service assembled from typed closures.
pub struct MethodTable {
    name: String,
    methods: HashMap<String, Box<dyn RequestHandler>>,
    events: HashMap<String, Box<dyn EventHandler>>,
}

impl MethodTable {
    /// Create an empty table for a named service.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            methods: HashMap::new(),
            events: HashMap::new(),
        }
    }

    /// Register a request/response method.
    ///
    /// The closure receives the decoded payload and returns the response
    /// value or a [`MethodError`].
    pub fn handle<F, T, R, Fut>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
    {
        self.methods.insert(
            method.to_string(),
            Box::new(TypedRequestHandler {
                handler,
                _phantom: PhantomData,
            }),
        );
        self
    }

    /// Register an event sink.
    pub fn on_event<F, T, Fut>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.events.insert(
            method.to_string(),
            Box::new(TypedEventHandler {
                handler,
                _phantom: PhantomData,
            }),
        );
        self
    }
}

#[async_trait]
impl Service for MethodTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn method_names(&self) -> Vec<String> {
        self.methods
            .keys()
            .chain(self.events.keys())
            .cloned()
            .collect()
    }

    async fn invoke(&self, method: &str, payload: Bytes) -> MethodResult {
        match self.methods.get(method) {
            Some(handler) => handler.call(payload).await,
            None => Err(MethodError::new(
                ERROR_METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            )),
        }
    }

    async fn notify(&self, method: &str, payload: Bytes) {
        match self.events.get(method) {
            Some(handler) => handler.call(payload).await,
            None => tracing::debug!("dropping event for unregistered sink: {method}"),
        }
    }
}

/// Registry mapping method names to the services that own them.
#[derive(Default)]
pub struct ServiceRegistry {
    methods: DashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every method the service exposes.
    ///
    /// A method name already claimed by another service is taken over; the
    /// replacement is logged.
    pub fn register(&self, service: Arc<dyn Service>) {
        for method in service.method_names() {
            if let Some(previous) = self.methods.insert(method.clone(), service.clone()) {
                if previous.name() != service.name() {
                    tracing::warn!(
                        "method {method} moved from service {} to {}",
                        previous.name(),
                        service.name()
                    );
                }
            }
        }
    }

    /// Remove every method owned by the named service.
    pub fn deregister(&self, service_name: &str) {
        self.methods
            .retain(|_, service| service.name() != service_name);
    }

    /// Find the service owning a method.
    pub fn lookup(&self, method: &str) -> Option<Arc<dyn Service>> {
        self.methods.get(method).map(|entry| entry.value().clone())
    }

    /// Number of registered method names.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
