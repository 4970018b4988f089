//! # Yeelight Control Library
//!
//! `yeelight-control-lib` finds Yeelight smart LED lights on the local network
//! and sends them commands over their JSON line protocol.
//!
//! ## Features
//!
//! - Multicast discovery with per-device deduplication
//! - A persistent command session per device that correlates concurrent
//!   requests with their responses
//! - Encoding rules for every command, with parameter clamping
//! - A high level control interface for common operations
//!
//! ## Example
//!
//! Discover lights and turn each one on:
//!
//! ```no_run
//! use std::time::Duration;
//! use yeelight_control_lib::control_interface::ControlInterface;
//! use yeelight_control_lib::util::discovery::{DiscoveryClient, DiscoveryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let devices =
//!         DiscoveryClient::find_devices(DiscoveryConfig::default(), Duration::from_secs(3)).await?;
//!
//!     for device in devices {
//!         println!("Found device: {}", device);
//!         let control = ControlInterface::from_descriptor(device);
//!         control.turn_on().await?;
//!         control.close();
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with Yeelight or its affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `command` module holds the wire encoding of every device method,
// including color-flow expressions.
//
// Example usage:
//
// ```
// use yeelight_control_lib::command::CommandBuilder;
//
// let command = CommandBuilder::set_rgb([250, 150, 120], "smooth", 500);
// assert_eq!(command.params[0], 16397176);
// ```
pub mod command;

// The `control_interface` module provides one async method per device
// operation on top of a command session.
//
// Example usage:
//
// ```
// use yeelight_control_lib::control_interface::{ControlInterface, Effect};
//
// #[tokio::main]
// async fn main() {
//     let control = ControlInterface::new("192.168.1.100", None);
//     control.set_brightness(40, Effect::Smooth, 500).await.unwrap();
// }
// ```
pub mod control_interface;

pub mod error;

// The `session` module owns the TCP connection to a device and matches
// responses to requests by correlation id.
pub mod session;

// The `util` module contains discovery, advertisement parsing, parameter
// constraints and response types.
pub mod util;

pub use error::SessionError;
