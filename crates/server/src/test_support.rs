use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
};

use uuid::Uuid;

const ASSET_DIR_ENV: &str = "PAWBOOK_ASSET_DIR";
const DATABASE_URL_ENV: &str = "DATABASE_URL";

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// A throwaway asset directory with its own SQLite database, exported through
/// the environment until dropped. Holds a global lock so env-mutating tests
/// never overlap.
pub struct TestEnvGuard {
    root: PathBuf,
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl TestEnvGuard {
    pub fn fresh() -> Self {
        let lock = env_lock().lock().unwrap_or_else(|err| err.into_inner());
        let root = std::env::temp_dir().join(format!("pawbook-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            root.join("pawbook.sqlite").to_string_lossy()
        );

        let saved = [ASSET_DIR_ENV, DATABASE_URL_ENV]
            .into_iter()
            .map(|name| (name, std::env::var(name).ok()))
            .collect();

        // SAFETY: every test that touches these variables holds env_lock.
        unsafe {
            std::env::set_var(ASSET_DIR_ENV, &root);
            std::env::set_var(DATABASE_URL_ENV, db_url);
        }

        Self {
            root,
            saved,
            _lock: lock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: env_lock is still held; it is released after this body.
        unsafe {
            for (name, previous) in &self.saved {
                match previous {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
