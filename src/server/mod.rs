pub mod routes;

/// Serves a fixed response on every path from `127.0.0.1:<ephemeral>` and
/// returns its base URL. Stands in for upstream HTTP services in tests.
#[cfg(test)]
pub async fn spawn_stub(status: axum::http::StatusCode, body: &'static str) -> String {
    let app = axum::Router::new().fallback(move || async move { (status, body) });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
