//! Async disposal (spec.md §3 "Lifecycles", §6 `dispose`).
//!
//! The core resolution engine is synchronous throughout; this is the one
//! seam where a service may need an async runtime to tear itself down
//! (closing a pooled connection, flushing a socket). Modeled as a trait
//! rather than a boxed-future field so implementers write ordinary
//! `async fn` bodies.

use async_trait::async_trait;

use crate::error::DiResult;

#[async_trait]
pub trait AsyncDisposable: Send + Sync {
    async fn dispose_async(&self) -> DiResult<()>;
}
