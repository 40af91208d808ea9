use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    application::{
        ports::{ModelCatalogPort, ModelLoaderPort},
        services::DetectorService,
    },
    domain::{
        errors::{DomainError, DomainResult},
        lifecycle::ServiceState,
        settings::AppConfig,
    },
};

/// Contexto de aplicación compartido por todos los manejadores.
/// Sustituye al estado global: cada instancia es independiente (útil en tests).
pub struct AppContext {
    state: watch::Sender<ServiceState>,
    detector: OnceLock<Arc<DetectorService>>,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ServiceState::Initializing);
        Self { state, detector: OnceLock::new() }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    pub fn install_detector(&self, detector: Arc<DetectorService>) -> DomainResult<()> {
        self.detector
            .set(detector)
            .map_err(|_| DomainError::Internal("el detector ya estaba instalado".into()))
    }

    fn transition(&self, next: ServiceState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Initializing -> Ready. Exige un detector instalado con el modelo cargado.
    pub fn mark_ready(&self) -> DomainResult<()> {
        match self.detector.get() {
            Some(detector) if detector.is_loaded() => {}
            Some(_) => return Err(DomainError::Internal("el modelo no está cargado".into())),
            None => return Err(DomainError::Internal("no hay detector instalado".into())),
        }
        if !self.transition(ServiceState::Ready) {
            return Err(DomainError::Internal(format!(
                "transición ilegal {:?} -> Ready",
                self.state()
            )));
        }
        info!("Servicio listo para recibir tráfico");
        Ok(())
    }

    /// Cualquier estado -> ShuttingDown. Idempotente.
    pub fn begin_shutdown(&self) {
        if self.transition(ServiceState::ShuttingDown) {
            info!("Servicio en apagado: se rechaza tráfico nuevo");
        }
    }

    /// Puerta de readiness: devuelve el detector solo si el servicio está listo.
    pub fn ready_detector(&self) -> Option<Arc<DetectorService>> {
        match self.state() {
            ServiceState::Ready => self.detector.get().cloned(),
            ServiceState::Initializing | ServiceState::ShuttingDown => None,
        }
    }

    /// Resuelve cuando el servicio entra en ShuttingDown.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.subscribe();
        // El emisor vive en `self`, así que el canal no puede cerrarse aquí.
        let _ = rx.wait_for(|state| *state == ServiceState::ShuttingDown).await;
    }

    /// Primera fase del apagado: cierra la puerta y espera a que los sondeos
    /// de readiness lo detecten antes de dejar que el servidor termine.
    pub async fn drain(&self, grace: Duration) {
        self.begin_shutdown();
        info!("Esperando {:.1}s de gracia antes de cerrar el servidor", grace.as_secs_f32());
        tokio::time::sleep(grace).await;
    }
}

/// Arranque: construye el detector, carga y calienta el modelo, y marca Ready.
/// Si algo falla el estado se queda en Initializing.
pub async fn bootstrap(
    ctx: &AppContext,
    config: &AppConfig,
    loader: Arc<dyn ModelLoaderPort>,
    catalog: Arc<dyn ModelCatalogPort>,
) -> DomainResult<Arc<DetectorService>> {
    info!("Inicializando detector...");
    let detector = Arc::new(DetectorService::new(
        &config.model,
        &config.inference,
        config.classes_to_detect.clone(),
        loader,
        catalog,
    )?);

    detector.ensure_loaded().await?;
    ctx.install_detector(detector.clone())?;

    if ctx.state() == ServiceState::ShuttingDown {
        warn!("Apagado solicitado durante el arranque; no se pasa a Ready");
        return Ok(detector);
    }
    ctx.mark_ready()?;
    Ok(detector)
}

/// Como [`bootstrap`], pero abandona la espera si llega un apagado mientras
/// el modelo se está cargando. `Ok(None)` indica que el arranque se canceló.
pub async fn bootstrap_unless_shutdown(
    ctx: &AppContext,
    config: &AppConfig,
    loader: Arc<dyn ModelLoaderPort>,
    catalog: Arc<dyn ModelCatalogPort>,
) -> DomainResult<Option<Arc<DetectorService>>> {
    tokio::select! {
        result = bootstrap(ctx, config, loader, catalog) => result.map(Some),
        _ = ctx.shutdown_requested() => {
            warn!("Apagado solicitado durante la carga del modelo; se abandona el arranque");
            Ok(None)
        }
    }
}

/// Espera Ctrl-C o SIGTERM y ejecuta el drenaje. Pensado para
/// `axum::serve(..).with_graceful_shutdown(..)`.
pub async fn shutdown_signal(ctx: Arc<AppContext>, grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("No se pudo instalar el manejador de Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Recibido Ctrl-C"),
        _ = terminate => info!("Recibido SIGTERM"),
    }

    ctx.drain(grace).await;
}
