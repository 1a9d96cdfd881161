use std::future::{Future, IntoFuture};

use anyhow::{self, Error as AnyhowError};
use chrono::Utc;
use db::{
    DbErr,
    models::{idempotency, user::User},
    types::UserRole,
};
use deployment::{Deployment, DeploymentError};
use server::{
    DeploymentImpl, http,
    routes::idempotency::{
        DEFAULT_IDEMPOTENCY_IN_PROGRESS_TTL_SECS, IDEMPOTENCY_IN_PROGRESS_TTL_ENV,
    },
};
use services::services::auth::RegisterRequest;
use strip_ansi_escapes::strip;
use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::assets::asset_dir;

const GRACEFUL_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const IDEMPOTENCY_PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);
const DEFAULT_IDEMPOTENCY_COMPLETED_TTL_SECS: i64 = 60 * 60 * 24 * 7;
const IDEMPOTENCY_COMPLETED_TTL_ENV: &str = "PAWBOOK_IDEMPOTENCY_COMPLETED_TTL_SECS";
const ADMIN_EMAIL_ENV: &str = "PAWBOOK_ADMIN_EMAIL";
const ADMIN_PASSWORD_ENV: &str = "PAWBOOK_ADMIN_PASSWORD";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum PawBookError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

fn spawn_background<F>(task: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(task)
}

#[tokio::main]
async fn main() -> Result<(), PawBookError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},deployment={level},local_deployment={level},utils={level},utils_jwt={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).unwrap_or_else(|err| {
        eprintln!("Invalid RUST_LOG level ({err}); falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }

    let deployment = DeploymentImpl::new().await?;
    bootstrap_admin(&deployment).await?;

    let retention = IdempotencyRetention::from_env();
    tracing::info!(
        in_progress_ttl_secs = retention.in_progress.map_or(0, |ttl| ttl.num_seconds()),
        completed_ttl_secs = retention.completed.map_or(0, |ttl| ttl.num_seconds()),
        "Starting idempotency key retention job"
    );
    let idempotency_pool = deployment.db().pool.clone();
    spawn_background(async move {
        let mut ticker = tokio::time::interval(IDEMPOTENCY_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = retention.prune(&idempotency_pool).await {
                tracing::warn!(error = %err, "Failed to prune idempotency keys");
            }
        }
    });

    let sla_config = deployment.config().read().await.sla.clone();
    if sla_config.enabled {
        let deployment_for_sla = deployment.clone();
        let interval = std::time::Duration::from_secs(sla_config.sweep_interval_secs.max(1));
        tracing::info!(sweep_interval_secs = interval.as_secs(), "Starting SLA sweep job");
        spawn_background(async move {
            loop {
                tokio::time::sleep(interval).await;
                // The sweep logs its own summary.
                if let Err(err) = deployment_for_sla
                    .sla()
                    .sweep(Utc::now(), deployment_for_sla.automation())
                    .await
                {
                    tracing::warn!(error = %err, "SLA sweep failed");
                }
            }
        });
    } else {
        tracing::info!("SLA sweep job disabled");
    }

    let app_router = http::router(deployment.clone());

    let port = std::env::var("BACKEND_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|s| {
            // remove any ANSI codes before parsing
            let cleaned = String::from_utf8_lossy(&strip(s.as_bytes())).into_owned();
            cleaned.trim().parse::<u16>().ok()
        })
        .unwrap_or_else(|| {
            tracing::info!("No PORT environment variable set, using {DEFAULT_PORT}");
            DEFAULT_PORT
        });

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();

    let business_name = deployment.config().read().await.business.name.clone();
    tracing::info!("{business_name} backend listening on http://{host}:{actual_port}");

    let signals = ShutdownSignals::install();

    let server = axum::serve(
        listener,
        app_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(raised(signals.graceful.clone()))
    .into_future();
    tokio::pin!(server);

    let serve_result = tokio::select! {
        res = &mut server => res,
        _ = raised(signals.forced.clone()) => {
            tracing::warn!("Second shutdown signal received, exiting without draining");
            std::process::exit(130);
        }
        _ = async {
            raised(signals.graceful.clone()).await;
            tokio::time::sleep(GRACEFUL_SHUTDOWN_TIMEOUT).await;
        } => {
            tracing::warn!(
                "Connections still open {:?} after shutdown began, exiting",
                GRACEFUL_SHUTDOWN_TIMEOUT
            );
            std::process::exit(130);
        }
    };

    serve_result?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Creates the first admin account from the environment when none exists.
async fn bootstrap_admin(deployment: &DeploymentImpl) -> Result<(), PawBookError> {
    let (Ok(email), Ok(password)) = (
        std::env::var(ADMIN_EMAIL_ENV),
        std::env::var(ADMIN_PASSWORD_ENV),
    ) else {
        return Ok(());
    };

    let pool = &deployment.db().pool;
    if !User::find_by_role(pool, UserRole::Admin).await?.is_empty() {
        tracing::debug!("Admin account already present; skipping bootstrap");
        return Ok(());
    }

    let admin = deployment
        .auth()
        .create_account(
            pool,
            &RegisterRequest {
                email,
                password,
                full_name: "Administrator".to_string(),
                phone: None,
            },
            UserRole::Admin,
        )
        .await
        .map_err(AnyhowError::from)?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "Bootstrapped admin account");
    Ok(())
}

/// How long idempotency records are kept. `None` disables pruning for that
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdempotencyRetention {
    in_progress: Option<chrono::Duration>,
    completed: Option<chrono::Duration>,
}

impl IdempotencyRetention {
    fn from_env() -> Self {
        Self {
            in_progress: ttl_from_env(
                IDEMPOTENCY_IN_PROGRESS_TTL_ENV,
                DEFAULT_IDEMPOTENCY_IN_PROGRESS_TTL_SECS,
            ),
            completed: ttl_from_env(
                IDEMPOTENCY_COMPLETED_TTL_ENV,
                DEFAULT_IDEMPOTENCY_COMPLETED_TTL_SECS,
            ),
        }
    }

    async fn prune(&self, pool: &db::DbPool) -> Result<(), DbErr> {
        let now = Utc::now();
        let removed_in_progress = match self.in_progress {
            Some(ttl) => idempotency::prune_in_progress_before(pool, now - ttl).await?,
            None => 0,
        };
        let removed_completed = match self.completed {
            Some(ttl) => idempotency::prune_completed_before(pool, now - ttl).await?,
            None => 0,
        };

        if removed_in_progress + removed_completed > 0 {
            tracing::info!(
                removed_in_progress,
                removed_completed,
                "Pruned idempotency keys"
            );
        }
        Ok(())
    }
}

fn ttl_from_env(name: &str, default_secs: i64) -> Option<chrono::Duration> {
    parse_ttl(name, std::env::var(name).ok().as_deref(), default_secs)
}

/// Zero or negative disables the TTL; unreadable values fall back to the
/// default.
fn parse_ttl(name: &str, raw: Option<&str>, default_secs: i64) -> Option<chrono::Duration> {
    let secs = match raw.map(str::trim) {
        None | Some("") => default_secs,
        Some(value) => match value.parse::<i64>() {
            Ok(secs) => secs,
            Err(err) => {
                tracing::warn!(value, error = %err, "Invalid {name}; using default");
                default_secs
            }
        },
    };
    (secs > 0).then(|| chrono::Duration::seconds(secs))
}

/// First signal starts a graceful shutdown, the second forces exit.
struct ShutdownSignals {
    graceful: watch::Receiver<bool>,
    forced: watch::Receiver<bool>,
}

impl ShutdownSignals {
    fn install() -> Self {
        let (graceful_tx, graceful) = watch::channel(false);
        let (forced_tx, forced) = watch::channel(false);

        tokio::spawn(async move {
            if let Err(err) = next_signal().await {
                tracing::error!("Failed to install shutdown signal handler: {err}");
                return;
            }
            tracing::info!("Shutdown requested, draining connections (repeat to force)");
            let _ = graceful_tx.send(true);

            match next_signal().await {
                Ok(()) => {
                    let _ = forced_tx.send(true);
                }
                Err(err) => tracing::error!("Failed to listen for a second signal: {err}"),
            }
        });

        Self { graceful, forced }
    }
}

#[cfg(unix)]
async fn next_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Resolves once the flag is set; never resolves if the sender is gone.
async fn raised(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::{oneshot, watch};

    use super::{parse_ttl, raised, spawn_background};

    #[tokio::test]
    async fn spawn_background_returns_immediately() {
        let (tx, rx) = oneshot::channel::<()>();

        let start = std::time::Instant::now();
        let handle = spawn_background(async move {
            let _ = rx.await;
        });
        assert!(start.elapsed() < Duration::from_millis(50));

        let _ = tx.send(());
        let _ = handle.await;
    }

    #[test]
    fn ttl_parsing_falls_back_and_disables() {
        let name = "PAWBOOK_TEST_TTL";
        assert_eq!(parse_ttl(name, None, 60), Some(chrono::Duration::seconds(60)));
        assert_eq!(parse_ttl(name, Some("  "), 60), Some(chrono::Duration::seconds(60)));
        assert_eq!(parse_ttl(name, Some("abc"), 60), Some(chrono::Duration::seconds(60)));
        assert_eq!(parse_ttl(name, Some(" 15 "), 60), Some(chrono::Duration::seconds(15)));
        assert_eq!(parse_ttl(name, Some("0"), 60), None);
        assert_eq!(parse_ttl(name, Some("-5"), 60), None);
    }

    #[tokio::test]
    async fn raised_waits_for_the_flag() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(raised(rx));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
