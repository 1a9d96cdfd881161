pub mod appointments;
pub mod auth;
pub mod automation;
pub mod catalog;
pub mod conversations;
pub mod health;
pub mod idempotency;
pub mod notifications;
pub mod payments;
pub mod pets;
pub mod sla;
pub mod staff;
pub mod uploads;
pub mod users;
