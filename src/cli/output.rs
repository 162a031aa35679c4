use std::net::SocketAddr;

use colored::Colorize;

use crate::config::ServerConfig;
use crate::engine::ResponseExample;
use crate::error::ServerError;

/// URL the mock answers on. Uses the bound port, which differs from the
/// configured one when port 0 was requested.
pub fn server_url(config: &ServerConfig, local_addr: SocketAddr) -> String {
    format!("http://{}:{}{}", config.host, local_addr.port(), config.base_path)
}

pub fn banner_lines(config: &ServerConfig, local_addr: SocketAddr, is_tty: bool) -> Vec<String> {
    let url = server_url(config, local_addr);
    let url = if is_tty {
        url.green().bold().to_string()
    } else {
        url
    };
    vec![
        format!("Mock server started at {url}"),
        format!("OpenAPI spec: {}", config.spec_path.display()),
        "Press Ctrl+C to stop the server".to_string(),
    ]
}

pub fn print_banner(config: &ServerConfig, local_addr: SocketAddr, is_tty: bool) {
    for line in banner_lines(config, local_addr, is_tty) {
        println!("{line}");
    }
}

pub fn print_shutting_down() {
    println!("\nShutting down server...");
}

pub fn format_example(example: &ResponseExample) -> String {
    match &example.content_type {
        Some(ct) => format!("{} {} -> {} ({ct})", example.method, example.path, example.status),
        None => format!("{} {} -> {}", example.method, example.path, example.status),
    }
}

pub fn print_shutdown_failure(err: &ServerError, is_tty: bool) {
    let label = if is_tty {
        "graceful shutdown failed".yellow().to_string()
    } else {
        "graceful shutdown failed".to_string()
    };
    eprintln!("{label}: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerTimeouts;
    use std::path::PathBuf;

    fn config(base_path: &str) -> ServerConfig {
        ServerConfig {
            spec_path: PathBuf::from("testdata/petstore.yaml"),
            host: "localhost".into(),
            port: 8080,
            base_path: base_path.into(),
            timeouts: ServerTimeouts::default(),
        }
    }

    #[test]
    fn banner_plain_text() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let lines = banner_lines(&config("/"), addr, false);
        assert_eq!(
            lines,
            vec![
                "Mock server started at http://localhost:8080/",
                "OpenAPI spec: testdata/petstore.yaml",
                "Press Ctrl+C to stop the server",
            ]
        );
    }

    #[test]
    fn server_url_uses_bound_port() {
        let addr: SocketAddr = "127.0.0.1:49152".parse().unwrap();
        assert_eq!(
            server_url(&config("/api"), addr),
            "http://localhost:49152/api"
        );
    }

    #[test]
    fn format_example_with_and_without_content_type() {
        let mut example = ResponseExample {
            method: "GET".into(),
            path: "/pets".into(),
            status: 200,
            content_type: Some("application/json".into()),
        };
        assert_eq!(format_example(&example), "GET /pets -> 200 (application/json)");
        example.content_type = None;
        assert_eq!(format_example(&example), "GET /pets -> 200");
    }
}
