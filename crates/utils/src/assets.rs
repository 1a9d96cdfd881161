use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "PAWBOOK_ASSET_DIR";

fn ensure_dir(path: PathBuf) -> PathBuf {
    if !path.exists()
        && let Err(err) = std::fs::create_dir_all(&path)
    {
        tracing::error!(path = %path.display(), "Failed to create directory: {err}");
    }
    path
}

/// Root for the database file, config and uploads.
///
/// `PAWBOOK_ASSET_DIR` wins when set. Debug builds otherwise use
/// `dev_assets/` at the workspace root; release builds use the platform data
/// directory.
pub fn asset_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(ASSET_DIR_ENV) {
        let override_dir = override_dir.trim();
        if !override_dir.is_empty() {
            return ensure_dir(PathBuf::from(override_dir));
        }
    }

    let path = if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("com", "pawbook", "pawbook")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("pawbook-data"))
    };

    ensure_dir(path)
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

pub fn uploads_dir() -> PathBuf {
    ensure_dir(asset_dir().join("uploads"))
}
