use std::sync::Arc;

use crate::errors::AppError;
use crate::services::daraja_service::DarajaService;

/// Shared handler state. The gateway service is optional so the API can boot
/// (and answer health checks) even when the Daraja credentials are absent.
#[derive(Clone, Default)]
pub struct AppState {
    pub daraja: Option<Arc<DarajaService>>,
}

impl AppState {
    pub fn new() -> Self {
        AppState { daraja: None }
    }

    pub fn with_daraja(mut self, daraja: Arc<DarajaService>) -> Self {
        self.daraja = Some(daraja);
        self
    }

    pub fn daraja(&self) -> Result<&Arc<DarajaService>, AppError> {
        self.daraja
            .as_ref()
            .ok_or_else(|| AppError::service_unavailable("M-Pesa gateway service is not configured"))
    }
}
