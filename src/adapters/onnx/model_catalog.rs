use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::ports::ModelCatalogPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::settings::ModelConfig;

/// Catálogo local de pesos ONNX. Si falta el fichero y la descarga está
/// habilitada, lo trae de `download_base_url/<nombre>`.
pub struct OnnxModelCatalog {
    download_enabled: bool,
    base_url: Option<String>,
    client: reqwest::Client,
}

impl OnnxModelCatalog {
    pub fn new(download_enabled: bool, base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { download_enabled, base_url, client }
    }

    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self::new(cfg.download_on_startup, cfg.download_base_url.clone())
    }

    async fn download(&self, base_url: &str, model_path: &Path) -> anyhow::Result<()> {
        let file_name = model_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("ruta de modelo sin nombre de fichero"))?
            .to_string_lossy();
        let url = format!("{}/{}", base_url.trim_end_matches('/'), file_name);
        info!("⬇️  Descargando modelo desde {}", url);

        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        // Se escribe a un temporal y se renombra para no dejar pesos a medias.
        let partial = model_path.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, model_path).await?;
        info!("Modelo guardado en {} ({} bytes)", model_path.display(), bytes.len());
        Ok(())
    }
}

#[async_trait]
impl ModelCatalogPort for OnnxModelCatalog {
    async fn ensure_available(&self, model_path: &Path) -> DomainResult<()> {
        if model_path.as_os_str().is_empty() {
            return Err(DomainError::ModelLoad("ruta de modelo vacía".into()));
        }
        if model_path.is_file() {
            return Ok(());
        }

        if !self.download_enabled {
            return Err(DomainError::ModelLoad(format!(
                "no existe {} y la descarga está desactivada",
                model_path.display()
            )));
        }
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(DomainError::ModelLoad(format!(
                "no existe {} y no hay download_base_url configurado",
                model_path.display()
            )));
        };

        if let Some(dir) = model_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| DomainError::ModelLoad(format!("no se pudo crear {}: {e}", dir.display())))?;
        }

        self.download(base_url, model_path).await.map_err(|e| {
            warn!("Descarga del modelo fallida: {:#}", e);
            DomainError::ModelLoad(format!("descarga fallida: {e:#}"))
        })
    }
}
