use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use person_detector::adapters::{
    config::{load_config, CONFIG_ENV_VAR},
    http::{router, state::HttpState},
    onnx::{model_catalog::OnnxModelCatalog, yolo_engine::OnnxModelLoader},
};
use person_detector::application::lifecycle::{bootstrap_unless_shutdown, shutdown_signal, AppContext};

#[derive(Parser, Debug)]
#[command(name = "person-detector", version, about = "API HTTP de detección de personas")]
struct Cli {
    /// Fichero YAML de configuración (por defecto $CONFIG_PATH o config/configuration.yaml).
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logs (RUST_LOG=info por defecto)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // 2. Configuración: sin ella no se sirve nada.
    let config = load_config(cli.config.as_deref()).map_err(|e| {
        error!("No se pudo cargar la configuración (ver {}): {}", CONFIG_ENV_VAR, e);
        e
    })?;
    if config.server.reload {
        warn!("server.reload está activo pero la recarga en caliente no está soportada; se ignora");
    }

    // 3. Contexto de aplicación y adaptadores
    let ctx = Arc::new(AppContext::new());
    let loader = Arc::new(OnnxModelLoader::new());
    let catalog = Arc::new(OnnxModelCatalog::from_config(&config.model));

    // 4. El servidor escucha desde el principio: /livez responde y /readyz da 503
    //    mientras el modelo se carga.
    let app = router(HttpState::new(ctx.clone()), config.server.max_upload_bytes);
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Servidor de detección escuchando en http://{}", addr);

    let shutdown = shutdown_signal(ctx.clone(), config.server.shutdown_grace());
    let mut server = tokio::spawn(async move { axum::serve(listener, app).with_graceful_shutdown(shutdown).await });

    // 5. Cargar el modelo y abrir la puerta. Una señal durante la carga no espera a que termine,
    //    y si el servidor cae antes de estar listo el proceso sale.
    tokio::select! {
        startup = bootstrap_unless_shutdown(&ctx, &config, loader, catalog) => match startup {
            Ok(Some(_)) => {}
            Ok(None) => exit_during_startup(server.await),
            Err(e) => {
                error!("Arranque fallido, el servicio no pasará a Ready: {}", e);
                server.abort();
                return Err(e.into());
            }
        },
        served = &mut server => exit_during_startup(served),
    }

    server.await??;
    info!("Servidor detenido");
    Ok(())
}

/// Salida cuando el servidor termina antes de que el modelo esté listo. La carga
/// sigue en un hilo bloqueante que no se puede interrumpir, así que no se espera
/// al runtime.
fn exit_during_startup(served: Result<std::io::Result<()>, JoinError>) -> ! {
    let code = match served {
        Ok(Ok(())) => {
            info!("Servidor detenido antes de completar el arranque");
            0
        }
        Ok(Err(e)) => {
            error!("El servidor falló durante el arranque: {}", e);
            1
        }
        Err(e) => {
            error!("La tarea del servidor terminó de forma anómala: {}", e);
            1
        }
    };
    std::process::exit(code)
}
