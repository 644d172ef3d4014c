//! Output sinks for entity state.

pub mod mqtt;

pub use mqtt::MqttPublisher;
