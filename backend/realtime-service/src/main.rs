use actix_web::{middleware, web, App, HttpServer};
use realtime_service::{
    handlers::{self, register_publish, register_websocket},
    metrics, AppState, Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config);
    let addr = config.bind_addr();

    tracing::info!(
        push_gateway = %config.push_gateway_url,
        push_batch_size = config.push_batch_size,
        peer_send_timeout_ms = ?config.peer_send_timeout_ms,
        "Starting realtime service on {}",
        addr
    );

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(handlers::json_config())
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(|cfg| {
                register_websocket(cfg);
                register_publish(cfg);
            })
    })
    .bind(&addr)?
    .run()
    .await?;

    tracing::info!("Realtime service stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
