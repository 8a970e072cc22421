//! HTTP adapter over the notification dispatcher and read-side service.
//!
//! Endpoints:
//! - GET  /health
//! - POST /notifications/demo — queue a demo notification for the first user
//! - GET  /notifications — unread notifications of the first user
//! - POST /notifications/{id}/read — mark one notification as read

pub mod routes;
pub mod state;
