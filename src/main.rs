use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use marketplace_backend::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    middleware::cors::frontend_cors,
    routes, AppState,
};
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn start_scheduler(state: AppState) -> anyhow::Result<JobScheduler> {
    let sched = JobScheduler::new().await?;
    let job = Job::new_async("0 0 * * * *", move |_uuid, _l| {
        let auth = state.auth_service.clone();
        Box::pin(async move {
            match auth.purge_expired_resets().await {
                Ok(removed) => info!(removed, "purged expired password reset tokens"),
                Err(e) => error!(error = %e, "password reset purge failed"),
            }
        })
    })?;
    sched.add(job).await?;
    sched.start().await?;
    Ok(sched)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(pool)?;
    let _scheduler = start_scheduler(app_state.clone()).await?;

    tokio::fs::create_dir_all(&config.uploads_dir).await?;
    info!(path = %config.uploads_dir, "serving uploads");

    let app = routes::app(app_state)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .layer(frontend_cors(&config.frontend_url))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
