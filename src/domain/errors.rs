use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuración no encontrada: {0}")]
    ConfigNotFound(String),
    #[error("Configuración inválida: {0}")]
    ConfigInvalid(String),
    #[error("Error cargando el modelo: {0}")]
    ModelLoad(String),
    #[error("Imagen no decodificable: {0}")]
    ImageDecode(String),
    #[error("Error de inferencia: {0}")]
    InferenceRuntime(String),
    #[error("Error interno: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
