use std::sync::Arc;
use crate::application::dto::ServiceInfo;
use crate::application::lifecycle::AppContext;

/// Estado compartido para los manejadores HTTP de Axum.
#[derive(Clone)]
pub struct HttpState {
    /// Ciclo de vida y detector; de aquí sale la puerta de readiness.
    pub app: Arc<AppContext>,
    pub info: Arc<ServiceInfo>,
}

impl HttpState {
    pub fn new(app: Arc<AppContext>) -> Self {
        Self { app, info: Arc::new(ServiceInfo::default()) }
    }
}
