#[tokio::main]
async fn main() {
    gasflow_observability::init();

    let config = gasflow_api::config::Config::from_env();

    let app = gasflow_api::app::build_app(&config).await;

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.addr));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
