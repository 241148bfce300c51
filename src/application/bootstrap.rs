use crate::application::engine::TaskEngine;
use crate::infrastructure::config::{ensure_default_configs, load_app_config, AppConfig};
use crate::infrastructure::display_surface::{JsonFileDisplaySurface, SurfaceCapability};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_store::FileSettingsStore;
use crate::infrastructure::sqlite_task_repository::SqliteTaskRepository;
use crate::infrastructure::storage::initialize_database;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
    pub user_state_path: PathBuf,
    pub activity_path: PathBuf,
    pub config: AppConfig,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("focusday.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load_app_config(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
        database_path,
        user_state_path: state_dir.join("user_state.json"),
        activity_path: state_dir.join("activity.json"),
        config,
    })
}

/// Prepares the workspace and wires an engine over its SQLite store.
pub fn open_engine(workspace_root: &Path) -> Result<TaskEngine, InfraError> {
    let workspace = bootstrap_workspace(workspace_root)?;
    let config = &workspace.config;

    let surface = Arc::new(JsonFileDisplaySurface::new(&workspace.activity_path));
    let capability = SurfaceCapability::resolve(config.live_activity_enabled, surface);
    info!(
        "event=engine_opened workspace={} timezone={} surface={:?}",
        workspace.workspace_root.display(),
        config.timezone,
        capability
    );

    Ok(TaskEngine::builder(Arc::new(SqliteTaskRepository::new(&workspace.database_path)))
        .with_calendar(config.calendar()?)
        .with_surface(capability)
        .with_all_completed_policy(config.all_completed_policy)
        .with_surface_timeout(config.surface_timeout())
        .with_completion_delay(config.completion_delay())
        .with_settings_store(Arc::new(FileSettingsStore::new(&workspace.user_state_path)))
        .build())
}
