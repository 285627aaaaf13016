use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use shopfront_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::errors::set_expose_details(cfg.is_development());

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Redis is only needed for the shared rate limiter store
    let redis_client = if cfg.rate_limit_use_redis {
        Some(Arc::new(
            redis::Client::open(cfg.redis_url.clone()).context("invalid redis url")?,
        ))
    } else {
        None
    };

    // Init events
    let (event_sender, event_rx) = api::events::EventSender::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(event_sender);
    tokio::spawn(api::events::process_events(event_rx));

    let auth_service = Arc::new(api::auth::AuthService::new(
        api::auth::AuthConfig::from(&cfg),
        db_arc.clone(),
    ));

    let gateway: Option<Arc<dyn api::payments::PaymentGateway>> =
        match api::payments::razorpay::RazorpayClient::from_config(&cfg) {
            Some(Ok(client)) => {
                info!("Payment gateway configured");
                Some(Arc::new(client))
            }
            Some(Err(e)) => {
                error!("Payment gateway client could not be built; payments disabled: {}", e);
                None
            }
            None => {
                warn!("Payment gateway credentials not configured; payments disabled");
                None
            }
        };

    let notifier = api::notifications::Notifier::from_config(&cfg);

    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        &cfg,
        event_sender.clone(),
        auth_service.clone(),
        notifier,
        gateway,
    );

    let rate_limit = api::rate_limit_layer(&cfg, redis_client.clone(), auth_service);
    tokio::spawn(api::rate_limiter::start_cleanup_task(
        rate_limit.limiter().clone(),
        Duration::from_secs(60),
    ));

    let cfg = Arc::new(cfg);
    let app_state = api::AppState::new(db_arc, cfg.clone(), event_sender, services, redis_client);
    let app = api::build_router(app_state, rate_limit).context("failed to build router")?;

    // Bind and serve
    let ip = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address: {}", cfg.host))?;
    let addr = SocketAddr::new(ip, cfg.port);
    info!("shopfront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shopfront-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
