//! Per-request execution context.
//!
//! The context is an explicit parameter handed through the call chain,
//! not ambient state: handlers receive a `RequestContext` built from
//! the shared config handle at the start of the request and drop it at
//! the end. The view inside it is fabricated on the first config
//! operation of the request.

pub mod view;

use std::sync::Arc;
use uuid::Uuid;

use crate::snapshot::shared::SharedConfig;

pub use view::RequestView;

/// Mutable per-request slot holding the request's config view.
pub struct RequestContext {
    shared: Arc<SharedConfig>,
    request_id: Uuid,
    view: Option<RequestView>,
}

impl RequestContext {
    /// Create a context for one inbound request.
    pub fn new(shared: Arc<SharedConfig>) -> Self {
        Self {
            shared,
            request_id: Uuid::new_v4(),
            view: None,
        }
    }

    /// Correlation id for log events of this request.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The shared config handle this context was built from.
    pub fn shared(&self) -> &Arc<SharedConfig> {
        &self.shared
    }

    /// The request's config view, fabricated on first use.
    pub fn view(&mut self) -> &mut RequestView {
        let shared = self.shared.clone();
        let request_id = self.request_id;
        self.view.get_or_insert_with(|| {
            tracing::debug!(request_id = %request_id, "fabricating request config view");
            RequestView::new(shared)
        })
    }
}
