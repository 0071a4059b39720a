//! Local HTTP endpoints for exercising the provider clients.

use std::time::Duration;

use axum::Router;
use reqwest::Client;
use tokio::net::TcpListener;

use super::HttpProviderConfig;

/// Serves `router` on an ephemeral loopback port and returns its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a loopback port with nothing listening on it.
pub(crate) async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub(crate) fn client() -> Client {
    HttpProviderConfig::default()
        .with_timeout(Duration::from_secs(5))
        .build_client()
        .unwrap()
}
