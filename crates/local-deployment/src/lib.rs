use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    auth::AuthService,
    automation::{AutomationEngine, AutomationService},
    config::{Config, load_config_from_file, save_config_to_file},
    notification::NotificationService,
    sla::SlaService,
    uploads::UploadService,
};
use tokio::sync::RwLock;
use utils::assets::{config_path, uploads_dir};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    auth: AuthService,
    automation: AutomationService,
    automation_engine: AutomationEngine,
    notifications: NotificationService,
    sla: SlaService,
    uploads: UploadService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Self::load_runtime_config().await?;
        let db = DBService::new().await?;
        let engine = AutomationEngine::new(db.clone(), &config.automation);
        let automation = AutomationService::start(engine);
        Self::from_parts(config, db, uploads_dir(), automation)
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn automation(&self) -> &AutomationService {
        &self.automation
    }

    fn automation_engine(&self) -> &AutomationEngine {
        &self.automation_engine
    }

    fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    fn sla(&self) -> &SlaService {
        &self.sla
    }

    fn uploads(&self) -> &UploadService {
        &self.uploads
    }
}

impl LocalDeployment {
    /// Loads the config file, generating and persisting a signing secret on
    /// first start.
    async fn load_runtime_config() -> Result<Config, DeploymentError> {
        let path = config_path();
        let mut config = load_config_from_file(&path).await;
        if config.ensure_jwt_secret() {
            tracing::info!("Generated a new token signing secret");
        }
        save_config_to_file(&config, &path).await?;
        Ok(config)
    }

    /// Assembles a deployment from already-built parts. `automation` may be a
    /// detached handle.
    pub fn from_parts(
        mut config: Config,
        db: DBService,
        uploads_root: PathBuf,
        automation: AutomationService,
    ) -> Result<Self, DeploymentError> {
        config.ensure_jwt_secret();
        let auth = AuthService::new(&config.auth)?;
        let automation_engine = AutomationEngine::new(db.clone(), &config.automation);
        let uploads = UploadService::new(uploads_root, config.uploads.max_bytes);

        tracing::info!(
            business = %config.business.name,
            utc_offset_minutes = config.business.utc_offset_minutes,
            uploads = %uploads.root().display(),
            "Deployment ready"
        );

        Ok(Self {
            notifications: NotificationService::new(db.clone()),
            sla: SlaService::new(db.clone()),
            config: Arc::new(RwLock::new(config)),
            db,
            auth,
            automation,
            automation_engine,
            uploads,
        })
    }
}
