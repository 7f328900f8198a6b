//! Inbound HTTP front-end: thin `axum` adapters translating requests into
//! calls against the query planner, index store, and notification queue
//! ports. Typed request/response structs, `State<Arc<AppState>>`, one
//! handler function per route.

mod handlers;

pub use handlers::{build_router, AppState};
