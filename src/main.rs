use clap::Parser;
use openapi_mock_server::config::types::{DEFAULT_BASE_PATH, DEFAULT_HOST, DEFAULT_PORT};
use openapi_mock_server::ServeOptions;

#[derive(Parser)]
#[command(name = "openapi-mock-server", version, about = "Start an OpenAPI-based mock server")]
struct Cli {
    /// Path to OpenAPI specification file (required)
    #[arg(short = 'f', long)]
    spec: Option<String>,

    /// Host to bind the server to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind the server to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Base path for the mock server
    #[arg(long, visible_alias = "base-url", default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Graceful shutdown timeout in milliseconds
    #[arg(long, env = "OPENAPI_MOCK_SHUTDOWN_TIMEOUT_MS")]
    shutdown_timeout: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OPENAPI_MOCK_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let opts = ServeOptions {
        spec: cli.spec,
        host: cli.host,
        port: cli.port,
        base_path: cli.base_path,
        shutdown_timeout_ms: cli.shutdown_timeout,
    };

    if let Err(e) = openapi_mock_server::cli::run_serve(opts).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
