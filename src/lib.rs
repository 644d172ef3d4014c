//! SimpliSafe bridge library.
//!
//! Maps SimpliSafe systems, sensors and cameras onto home automation
//! entities: passthrough binary sensors, push-driven motion and doorbell
//! sensors, and cameras with shutter-aware still images and MJPEG streams.

pub mod binary_sensor;
pub mod camera;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod input;
pub mod output;
pub mod session;
pub mod vendor;

#[cfg(test)]
mod test_support;
