pub mod auth;
pub mod automation;
pub mod booking;
pub mod config;
pub mod notification;
pub mod sla;
pub mod uploads;
