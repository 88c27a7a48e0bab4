//! Service module - method registration and invocation.
//!
//! Provides:
//! - [`Service`] - the trait a dispatchable service implements
//! - [`MethodTable`] - a typed-closure service built with a fluent API
//! - [`ServiceRegistry`] - maps method names to registered services
//!
//! # Example
//!
//! ```ignore
//! let calc = MethodTable::new("calc")
//!     .handle("add", |input: (i64, i64)| async move {
//!         Ok(input.0 + input.1)
//!     })
//!     .on_event("reset", |_: ()| async move {});
//!
//! connection.register_service(Arc::new(calc));
//! ```

mod registry;

pub use registry::{
    EventFuture, MethodError, MethodFuture, MethodResult, MethodTable, Service, ServiceRegistry,
    ERROR_INTERNAL, ERROR_INVALID_PAYLOAD, ERROR_METHOD_NOT_FOUND,
};
