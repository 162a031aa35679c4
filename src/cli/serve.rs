use std::future::Future;
use std::io::IsTerminal;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ServeOptions, ServerConfig};
use crate::engine::{MockEngine, OpenApiEngine};
use crate::error::ServerError;
use crate::recovery;
use crate::server::{LifecycleController, ShutdownCause, ShutdownSignal};

use super::output::{format_example, print_banner, print_shutdown_failure, print_shutting_down};

/// Validate options, serve the spec, and block until interrupted.
pub async fn run_serve(opts: ServeOptions) -> Result<(), ServerError> {
    let config = ServerConfig::from_options(opts)?;
    let mut signals = ShutdownSignal::register()?;
    serve(config, signals.recv()).await
}

/// Serve `config` until `shutdown` resolves.
///
/// A graceful-shutdown timeout is reported on stderr but is not an error:
/// the remaining connections were closed and the server did stop.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ShutdownCause>,
{
    let document = OpenApiEngine::load(&config.spec_path, &config.bind_address(), &config.base_path)?;
    info!(title = document.title(), spec = %config.spec_path.display(), "OpenAPI document loaded");
    let engine: Arc<dyn MockEngine> = Arc::new(document);

    let mut controller = LifecycleController::new(config.timeouts);
    let local_addr = controller
        .start(&config.bind_address(), recovery::router(Some(Arc::clone(&engine))))
        .await?;

    warm_up(engine.as_ref());
    print_banner(&config, local_addr, std::io::stdout().is_terminal());

    let cause = controller.wait_for_shutdown(shutdown).await;
    info!(?cause, "shutdown requested");
    print_shutting_down();

    let result = controller.shutdown().await;
    engine.close().await;

    match result {
        Err(e) if e.is_recoverable() => {
            print_shutdown_failure(&e, std::io::stderr().is_terminal());
            Ok(())
        }
        other => other,
    }
}

fn warm_up(engine: &dyn MockEngine) {
    match engine.response_examples() {
        Ok(examples) => {
            for example in &examples {
                debug!("example ready: {}", format_example(example));
            }
            info!(operations = examples.len(), "response examples prepared");
        }
        Err(e) => warn!("could not prepare every response example: {e}"),
    }
}
