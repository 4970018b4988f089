use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::command::flow::FlowStep;
use crate::command::{Command, CommandBuilder, DEFAULT_DURATION};
use crate::session::{CommandSession, ConnectionState, SessionEvent};
use crate::util::advertisement::{DeviceDescriptor, DEFAULT_COMMAND_PORT};
use crate::util::response::CommandResponse;

/// How a change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    Smooth,
    Sudden,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Smooth => write!(f, "smooth"),
            Effect::Sudden => write!(f, "sudden"),
        }
    }
}

/// The mode a light switches into when it is powered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerMode {
    #[default]
    Normal,
    ColorTemperature,
    Rgb,
    Hsv,
    ColorFlow,
    NightLight,
}

impl PowerMode {
    fn code(self) -> i64 {
        match self {
            PowerMode::Normal => 0,
            PowerMode::ColorTemperature => 1,
            PowerMode::Rgb => 2,
            PowerMode::Hsv => 3,
            PowerMode::ColorFlow => 4,
            PowerMode::NightLight => 5,
        }
    }
}

/// What a light does once a color flow ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowEnd {
    #[default]
    Recover,
    Stay,
    TurnOff,
}

impl FlowEnd {
    fn code(self) -> i64 {
        match self {
            FlowEnd::Recover => 0,
            FlowEnd::Stay => 1,
            FlowEnd::TurnOff => 2,
        }
    }
}

impl FromStr for FlowEnd {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recover" | "0" => Ok(FlowEnd::Recover),
            "stay" | "1" => Ok(FlowEnd::Stay),
            "off" | "2" => Ok(FlowEnd::TurnOff),
            _ => Err(anyhow!("Invalid flow end action")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl From<(u8, u8, u8)> for RGB {
    fn from(tuple: (u8, u8, u8)) -> Self {
        RGB {
            red: tuple.0,
            green: tuple.1,
            blue: tuple.2,
        }
    }
}

/**
High level control of one light.

Each method builds its command with [`CommandBuilder`] and sends it over the
device's [`CommandSession`], returning the device's answer. The session is
shared, so the interface can be cloned into several tasks.
*/
#[derive(Clone)]
pub struct ControlInterface {
    device: Option<DeviceDescriptor>,
    session: Arc<CommandSession>,
}

impl ControlInterface {
    pub fn new(host: &str, port: Option<u16>) -> Self {
        ControlInterface {
            device: None,
            session: Arc::new(CommandSession::new(
                0,
                host,
                port.unwrap_or(DEFAULT_COMMAND_PORT),
            )),
        }
    }

    /// Creates a [`ControlInterface`] for a discovered device.
    pub fn from_descriptor(device: DeviceDescriptor) -> Self {
        ControlInterface {
            session: Arc::new(CommandSession::from_descriptor(&device)),
            device: Some(device),
        }
    }

    /// The descriptor this interface was built from, if any.
    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn session(&self) -> &CommandSession {
        &self.session
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub fn close(&self) {
        self.session.close();
    }

    /// Sends a prepared command, refusing methods the device did not advertise.
    pub async fn send(&self, command: Command) -> anyhow::Result<CommandResponse> {
        if let Some(device) = &self.device {
            if !device.supported_methods.is_empty() && !device.supports(&command.method) {
                bail!(
                    "Device {:#x} does not support method {}",
                    device.id,
                    command.method
                );
            }
        }
        debug!("Sending {} {:?}", command.method, command.params);
        let method = command.method.clone();
        self.session
            .send(&command)
            .await
            .with_context(|| format!("Command {} failed", method))
    }

    pub async fn toggle(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::toggle()).await
    }

    pub async fn bg_toggle(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::bg_toggle()).await
    }

    pub async fn dev_toggle(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::dev_toggle()).await
    }

    pub async fn turn_on(&self) -> anyhow::Result<CommandResponse> {
        self.set_power(true, Effect::Smooth, DEFAULT_DURATION, PowerMode::Normal)
            .await
    }

    pub async fn turn_off(&self) -> anyhow::Result<CommandResponse> {
        self.set_power(false, Effect::Smooth, DEFAULT_DURATION, PowerMode::Normal)
            .await
    }

    pub async fn set_power(
        &self,
        on: bool,
        effect: Effect,
        duration_ms: u64,
        mode: PowerMode,
    ) -> anyhow::Result<CommandResponse> {
        let power = if on { "on" } else { "off" };
        self.send(CommandBuilder::set_power(
            power,
            &effect.to_string(),
            duration_ms,
            mode.code(),
        ))
        .await
    }

    pub async fn bg_set_power(
        &self,
        on: bool,
        effect: Effect,
        duration_ms: u64,
        mode: PowerMode,
    ) -> anyhow::Result<CommandResponse> {
        let power = if on { "on" } else { "off" };
        self.send(CommandBuilder::bg_set_power(
            power,
            &effect.to_string(),
            duration_ms,
            mode.code(),
        ))
        .await
    }

    /// Properties come back in the order they were asked for.
    pub async fn get_prop(&self, names: &[&str]) -> anyhow::Result<Vec<(String, String)>> {
        let (first, rest) = names
            .split_first()
            .context("At least one property name is required")?;
        let response = self.send(CommandBuilder::get_prop(first, rest)).await?;
        if let Some(error) = &response.error {
            bail!("Device error {}: {}", error.code, error.message);
        }
        Ok(names
            .iter()
            .map(|name| name.to_string())
            .zip(response.result_strings())
            .collect())
    }

    pub async fn set_brightness(
        &self,
        brightness: i64,
        effect: Effect,
        duration_ms: u64,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_bright(
            brightness,
            &effect.to_string(),
            duration_ms,
        ))
        .await
    }

    pub async fn bg_set_brightness(
        &self,
        brightness: i64,
        effect: Effect,
        duration_ms: u64,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::bg_set_bright(
            brightness,
            &effect.to_string(),
            duration_ms,
        ))
        .await
    }

    pub async fn set_color_temperature(
        &self,
        kelvin: i64,
        effect: Effect,
        duration_ms: u64,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_ct_abx(
            kelvin,
            &effect.to_string(),
            duration_ms,
        ))
        .await
    }

    pub async fn set_rgb(
        &self,
        rgb: RGB,
        effect: Effect,
        duration_ms: u64,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_rgb(
            [rgb.red, rgb.green, rgb.blue],
            &effect.to_string(),
            duration_ms,
        ))
        .await
    }

    pub async fn set_hsv(
        &self,
        hue: i64,
        saturation: i64,
        effect: Effect,
        duration_ms: u64,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_hsv(
            hue,
            saturation,
            &effect.to_string(),
            duration_ms,
        ))
        .await
    }

    pub async fn bg_set_hsv(
        &self,
        hue: i64,
        saturation: i64,
        effect: Effect,
        duration_ms: u64,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::bg_set_hsv(
            hue,
            saturation,
            &effect.to_string(),
            duration_ms,
        ))
        .await
    }

    /// Saves the current state as the power-on default.
    pub async fn set_default(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_default()).await
    }

    pub async fn bg_set_default(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::bg_set_default()).await
    }

    pub async fn start_flow(
        &self,
        count: u64,
        end: FlowEnd,
        flow: &[FlowStep],
    ) -> anyhow::Result<CommandResponse> {
        if flow.is_empty() {
            bail!("A color flow needs at least one step");
        }
        self.send(CommandBuilder::start_cf(count, end.code(), flow))
            .await
    }

    pub async fn stop_flow(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::stop_cf()).await
    }

    pub async fn set_scene(
        &self,
        class: &str,
        args: Vec<Value>,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_scene(class, args)).await
    }

    /// Turns the light off after `minutes`.
    pub async fn set_sleep_timer(&self, minutes: u64) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::cron_add(0, minutes)).await
    }

    pub async fn get_sleep_timer(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::cron_get(0)).await
    }

    pub async fn clear_sleep_timer(&self) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::cron_del(0)).await
    }

    pub async fn adjust(&self, action: &str, prop: &str) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_adjust(action, prop)).await
    }

    pub async fn set_music(
        &self,
        enabled: bool,
        host: &str,
        port: u16,
    ) -> anyhow::Result<CommandResponse> {
        self.send(CommandBuilder::set_music(i64::from(enabled), host, port))
            .await
    }

    /// Returns `Ok(None)` without touching the connection when `name` is empty or absent.
    pub async fn set_name(&self, name: Option<&str>) -> anyhow::Result<Option<CommandResponse>> {
        match CommandBuilder::set_name(name) {
            Some(command) => self.send(command).await.map(Some),
            None => Ok(None),
        }
    }
}
