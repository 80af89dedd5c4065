//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `api` - Nuki Web API client (smartlocks, activity log, actions)
//! - `egress_channel` - Typed channel for event egress messages
//! - `egress` - Attributed event output to file (JSONL format)
//! - `mqtt_egress` - MQTT publisher for egress events
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod api;
pub mod egress;
pub mod egress_channel;
pub mod mqtt_egress;
pub mod prometheus;

// Re-export commonly used types
pub use api::NukiApi;
pub use egress::Egress;
pub use egress_channel::{
    create_egress_channel, EgressMessage, EgressSender, KeypadEventPayload, ManualEventPayload,
};
pub use mqtt_egress::MqttPublisher;
