use serde::Serialize;
use utoipa::ToSchema;

/// Payload returned by `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: &'static str,
    /// Whether a document store is installed and answered its last ping.
    pub storage_reachable: bool,
    /// Table sessions currently mounted on this server.
    pub mounted_tables: usize,
}

impl HealthResponse {
    /// Build the payload from the storage probe result.
    pub fn new(storage_reachable: bool, degraded: bool, mounted_tables: usize) -> Self {
        Self {
            status: if degraded || !storage_reachable {
                "degraded"
            } else {
                "ok"
            },
            storage_reachable,
            mounted_tables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_storage_reports_degraded() {
        assert_eq!(HealthResponse::new(true, false, 0).status, "ok");
        assert_eq!(HealthResponse::new(false, false, 2).status, "degraded");
        assert_eq!(HealthResponse::new(true, true, 0).status, "degraded");
    }
}
