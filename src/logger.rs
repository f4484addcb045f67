use crate::config::Config;
use hyper::{Method, StatusCode, Uri, Version};
use std::net::SocketAddr;

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    println!("======================================");
    println!("Calculation server started successfully");
    println!("Listening on: http://{addr}");
    println!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        println!("Worker threads: {workers}");
    }
    println!("Endpoints:");
    println!("  - GET  /health");
    println!("  - GET  /");
    println!("  - POST /calculate/sum");
    println!("  - POST /calculate/product");
    println!("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    println!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    eprintln!("[Error] Failed to serve connection: {err:?}");
}

pub fn log_request(method: &Method, uri: &Uri, version: Version) {
    println!("[Request] {method} {uri} {version:?}");
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        println!("[Headers] Count: {count}");
    }
}

pub fn log_response(status: StatusCode) {
    println!("[Response] {status}\n");
}

pub fn log_warning(message: &str) {
    eprintln!("[Warn] {message}");
}

pub fn log_error(message: &str) {
    eprintln!("[Error] {message}");
}
