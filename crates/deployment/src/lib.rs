use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    auth::{AuthError, AuthService},
    automation::{AutomationEngine, AutomationService},
    config::{Config, ConfigError},
    notification::NotificationService,
    sla::SlaService,
    uploads::UploadService,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler or background job needs from the running
/// application.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn auth(&self) -> &AuthService;

    /// Fire-and-forget handle for triggers and incident closing.
    fn automation(&self) -> &AutomationService;

    /// Synchronous access to workflow matching, used by manual replays.
    fn automation_engine(&self) -> &AutomationEngine;

    fn notifications(&self) -> &NotificationService;

    fn sla(&self) -> &SlaService;

    fn uploads(&self) -> &UploadService;
}
