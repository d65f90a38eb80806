//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Once;

static REGISTER: Once = Once::new();

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Relationship Metrics
    pub static ref RELATIONSHIP_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rustcircle_relationship_events_total", "Total number of relationship mutations"),
        &["action"]
    ).expect("metric can be created");

    // Reaction Metrics
    pub static ref REACTION_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rustcircle_reaction_transitions_total", "Total number of reaction ledger transitions"),
        &["transition"]
    ).expect("metric can be created");

    // Notification Metrics
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rustcircle_notifications_created_total", "Total number of notifications persisted"),
        &["type"]
    ).expect("metric can be created");
    pub static ref NOTIFICATION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rustcircle_notification_failures_total", "Total number of notifications that failed to persist"),
        &["type"]
    ).expect("metric can be created");
    pub static ref NOTIFICATIONS_PURGED_TOTAL: IntCounter = IntCounter::new(
        "rustcircle_notifications_purged_total",
        "Total number of notifications removed by retention"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rustcircle_http_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(RELATIONSHIP_EVENTS_TOTAL.clone()))
            .expect("RELATIONSHIP_EVENTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REACTION_TRANSITIONS_TOTAL.clone()))
            .expect("REACTION_TRANSITIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(NOTIFICATIONS_CREATED_TOTAL.clone()))
            .expect("NOTIFICATIONS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(NOTIFICATION_FAILURES_TOTAL.clone()))
            .expect("NOTIFICATION_FAILURES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(NOTIFICATIONS_PURGED_TOTAL.clone()))
            .expect("NOTIFICATIONS_PURGED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
