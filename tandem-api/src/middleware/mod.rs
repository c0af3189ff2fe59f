//! Middleware modules for TANDEM API
//!
//! - `idempotency`: idempotency key handling for safe create retries
//!
//! The principal is read from trusted headers inside the middleware itself,
//! so no auth layer has to run first.

pub mod idempotency;

pub use idempotency::{idempotency_middleware, IdempotencyState};
