//! REST API: envelope responses, error mapping, router and handlers.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
