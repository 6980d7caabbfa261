use crate::HealthRes;
use std::time::Instant;

/// Health service shared by every Acervo server.
///
/// Reports liveness and the number of seconds since the service was created, which is the
/// start of the process for the servers in this workspace.
#[derive(Clone, Debug)]
pub struct HealthService {
    started: Instant,
}

impl HealthService {
    /// Creates a new instance of HealthService, starting the uptime clock now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Current health status.
    pub fn check_health(&self) -> HealthRes {
        HealthRes {
            ok: true,
            uptime: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
