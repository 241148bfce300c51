pub mod calendar;
pub mod messages;
pub mod models;
pub mod policy;
