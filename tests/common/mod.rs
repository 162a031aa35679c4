use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use openapi_mock_server::{
    recovery, LifecycleController, MockEngine, OpenApiEngine, ServerTimeouts,
};

/// Path to the bundled petstore document.
pub fn petstore_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join("petstore.yaml")
}

/// Default timeouts with a short shutdown window.
#[allow(dead_code)]
pub fn timeouts(shutdown: Duration) -> ServerTimeouts {
    ServerTimeouts {
        shutdown,
        ..ServerTimeouts::default()
    }
}

/// Start a controller on an ephemeral port serving `engine`.
#[allow(dead_code)]
pub async fn start_with_engine(
    engine: Arc<dyn MockEngine>,
    timeouts: ServerTimeouts,
) -> (LifecycleController, SocketAddr) {
    let mut controller = LifecycleController::new(timeouts);
    let addr = controller
        .start("127.0.0.1:0", recovery::router(Some(engine)))
        .await
        .unwrap();
    (controller, addr)
}

/// Start a controller serving the petstore under `base_path`.
#[allow(dead_code)]
pub async fn start_petstore(base_path: &str) -> (LifecycleController, SocketAddr) {
    start_petstore_with(base_path, timeouts(Duration::from_secs(5))).await
}

#[allow(dead_code)]
pub async fn start_petstore_with(
    base_path: &str,
    timeouts: ServerTimeouts,
) -> (LifecycleController, SocketAddr) {
    let engine = OpenApiEngine::load(&petstore_path(), "127.0.0.1:0", base_path).unwrap();
    start_with_engine(Arc::new(engine), timeouts).await
}

/// Write a keep-alive `GET` on a raw socket.
#[allow(dead_code)]
pub async fn send_get(stream: &mut TcpStream, path: &str) {
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
}

/// Read one `Content-Length` framed response from a raw socket.
///
/// Returns `None` if the server closed the connection before answering.
#[allow(dead_code)]
pub async fn read_response(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < head_end + length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    Some(String::from_utf8_lossy(&buf[..head_end + length]).into_owned())
}

/// True once the peer has closed the socket.
#[allow(dead_code)]
pub async fn is_closed(stream: &mut TcpStream) -> bool {
    let mut byte = [0u8; 1];
    matches!(stream.read(&mut byte).await, Ok(0) | Err(_))
}

#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
