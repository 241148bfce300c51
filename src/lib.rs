pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use application::bootstrap::{bootstrap_workspace, open_engine, BootstrapResult};
pub use application::completion_buffer::SettledCallback;
pub use application::engine::{
    CompletionToggle, EngineError, EngineView, RefreshReport, TaskEngine, TaskEngineBuilder,
};
pub use application::history::{count_description, HistoryService};
pub use domain::calendar::{system_now, DayCalendar, NowProvider};
pub use domain::models::{
    ActivityEndReason, Celebration, DisplaySnapshot, DisplayTask, EncouragementMessage,
    HistorySection, Task, WidgetEntry, WidgetState,
};
pub use domain::policy::{DAILY_LIMIT, MAX_CONTENT_CHARS};
pub use infrastructure::config::{AllCompletedPolicy, AppConfig};
pub use infrastructure::display_surface::{DisplaySurface, SurfaceCapability};
pub use infrastructure::error::InfraError;
pub use infrastructure::task_repository::TaskRepository;
pub use logging::init_logging;
