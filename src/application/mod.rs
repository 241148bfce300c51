pub mod activity_sync;
pub mod bootstrap;
pub mod completion_buffer;
pub mod engine;
pub mod growth;
pub mod history;
pub mod rollover;
pub mod widget;
