use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc, time::Duration};

use hearth::{
    application::{
        error::AppError,
        repos::{HealthRepo, PostsRepo, SessionsRepo, UsersRepo},
    },
    config::{self, StorageBackend},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState, SessionCookie},
        memory::MemoryRepositories,
        telemetry,
    },
};
use metrics::gauge;
use tokio::{signal, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = match settings.storage {
        StorageBackend::Postgres => {
            let repositories = Arc::new(init_postgres(&settings).await?);
            build_state(repositories, &settings)
        }
        StorageBackend::Memory => {
            warn!(
                target = "hearth::startup",
                "using in-memory storage; data is lost on shutdown"
            );
            build_state(Arc::new(MemoryRepositories::new()), &settings)
        }
    };

    let maintenance = spawn_maintenance(state.clone());
    let result = serve_http(&settings, state).await;

    maintenance.abort();
    let _ = maintenance.await;

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "hearth::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn init_postgres(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let pool = connect_pool(settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(PostgresRepositories::new(pool))
}

fn build_state<R>(repositories: Arc<R>, settings: &config::Settings) -> ApiState
where
    R: UsersRepo + PostsRepo + SessionsRepo + HealthRepo + 'static,
{
    let rate_limiter = ApiRateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    );
    let cookie = SessionCookie {
        name: settings.session.cookie_name.clone(),
        production: settings.server.production,
    };
    ApiState::from_repositories(repositories, settings.session.ttl, cookie, rate_limiter)
}

/// Hourly sweep of expired sessions and idle rate-limit buckets.
fn spawn_maintenance(state: ApiState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            match state.sessions.purge_expired().await {
                Ok(purged) => {
                    gauge!("hearth_sessions_purged").set(purged as f64);
                    if purged > 0 {
                        info!(target = "hearth::maintenance", purged, "expired sessions purged");
                    }
                }
                Err(err) => {
                    warn!(target = "hearth::maintenance", error = %err, "session purge failed");
                }
            }
            state.rate_limiter.prune();
        }
    })
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state, &settings.server.cors_origins);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "hearth::startup",
        addr = %settings.server.addr,
        production = settings.server.production,
        "listening"
    );

    let draining = Arc::new(Notify::new());
    let shutdown = {
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    };

    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "hearth::shutdown",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "hearth::shutdown", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(target = "hearth::shutdown", error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!(target = "hearth::shutdown", "received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(target = "hearth::shutdown", "received terminate signal, shutting down");
            }
            Err(err) => {
                error!(target = "hearth::shutdown", error = %err, "failed to install signal handler");
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
}
