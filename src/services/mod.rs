/// OpenAPI documentation generation.
pub mod documentation;
/// Game documents and share links.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events streaming of table views.
pub mod sse_service;
/// Document store reconnection and degraded mode.
pub mod storage_supervisor;
/// Domain-level access to the shared game document.
pub mod sync_adapter;
/// Mounted viewer sessions keyed by viewer id.
pub mod table_service;
/// Per-viewer table runtime.
pub mod table_session;
