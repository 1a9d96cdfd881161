pub mod appointment;
pub mod appointment_service;
pub mod conversation;
pub mod grooming_service;
pub mod idempotency_key;
pub mod message;
pub mod notification;
pub mod notification_preference;
pub mod payment;
pub mod pet;
pub mod sla_incident;
pub mod sla_target;
pub mod staff_availability;
pub mod user;
pub mod workflow;
pub mod workflow_run;
