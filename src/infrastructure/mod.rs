pub mod config;
pub mod display_surface;
pub mod error;
pub mod settings_store;
pub mod sqlite_task_repository;
pub mod storage;
pub mod task_repository;
