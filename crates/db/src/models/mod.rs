pub mod appointment;
pub mod conversation;
pub mod grooming_service;
pub mod idempotency;
pub mod notification;
pub mod payment;
pub mod pet;
pub mod sla;
pub mod staff_availability;
pub mod user;
pub mod workflow;
pub mod workflow_run;
