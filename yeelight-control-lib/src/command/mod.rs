//! Wire encoding of every command a light understands.
//!
//! [`CommandBuilder`] turns loosely typed arguments into a [`Command`] whose
//! parameters have already been clamped or replaced by their defaults. The
//! correlation id is only attached when the command is serialized for a
//! session.

pub mod flow;

use serde::Serialize;
use serde_json::{json, Value};

use crate::command::flow::{flow_expression, FlowStep};
use crate::util::constraint::{clamp_numeric, first_if_allowed};

pub const EFFECTS: [&str; 2] = ["smooth", "sudden"];
pub const DEFAULT_EFFECT: &str = "smooth";
/// Transition duration in ms used when none is given.
pub const DEFAULT_DURATION: u64 = 500;

/// A method name and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Serialize)]
struct WireCommand<'a> {
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

impl Command {
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Command {
            method: method.to_string(),
            params,
        }
    }

    /// Serializes the command as a single CRLF terminated JSON line.
    pub fn to_line(&self, id: u64) -> serde_json::Result<String> {
        let wire = WireCommand {
            id,
            method: &self.method,
            params: &self.params,
        };
        Ok(format!("{}\r\n", serde_json::to_string(&wire)?))
    }
}

fn effect(effect: &str) -> Value {
    json!(first_if_allowed(effect, &EFFECTS, DEFAULT_EFFECT))
}

fn duration(duration: u64) -> Value {
    json!(if duration == 0 {
        DEFAULT_DURATION
    } else {
        duration
    })
}

/// Packs three channels into `r * 65536 + g * 256 + b`, clamping each to 0-255 first.
pub fn pack_rgb<V: Into<Value>>(red: V, green: V, blue: V) -> i64 {
    clamp_numeric(red, 0, 255) * 65536
        + clamp_numeric(green, 0, 255) * 256
        + clamp_numeric(blue, 0, 255)
}

/// Builds commands; one associated function per device method.
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn toggle() -> Command {
        Command::new("toggle", vec![])
    }

    pub fn bg_toggle() -> Command {
        Command::new("bg_toggle", vec![])
    }

    pub fn dev_toggle() -> Command {
        Command::new("dev_toggle", vec![])
    }

    pub fn set_default() -> Command {
        Command::new("set_default", vec![])
    }

    pub fn bg_set_default() -> Command {
        Command::new("bg_set_default", vec![])
    }

    pub fn stop_cf() -> Command {
        Command::new("stop_cf", vec![])
    }

    /// Requests the named properties, in the order given.
    pub fn get_prop(first: &str, rest: &[&str]) -> Command {
        let params = std::iter::once(first)
            .chain(rest.iter().copied())
            .map(|name| json!(name))
            .collect();
        Command::new("get_prop", params)
    }

    /// Color temperature in Kelvin, 1700-6500.
    pub fn set_ct_abx<V: Into<Value>>(ct_value: V, effect_name: &str, duration_ms: u64) -> Command {
        Command::new(
            "set_ct_abx",
            vec![
                json!(clamp_numeric(ct_value, 1700, 6500)),
                effect(effect_name),
                duration(duration_ms),
            ],
        )
    }

    pub fn set_rgb<V: Into<Value>>(rgb: [V; 3], effect_name: &str, duration_ms: u64) -> Command {
        let [red, green, blue] = rgb;
        Command::new(
            "set_rgb",
            vec![
                json!(pack_rgb(red, green, blue)),
                effect(effect_name),
                duration(duration_ms),
            ],
        )
    }

    pub fn set_hsv<V: Into<Value>>(
        hue: V,
        sat: V,
        effect_name: &str,
        duration_ms: u64,
    ) -> Command {
        Self::hsv("set_hsv", hue, sat, effect_name, duration_ms)
    }

    pub fn bg_set_hsv<V: Into<Value>>(
        hue: V,
        sat: V,
        effect_name: &str,
        duration_ms: u64,
    ) -> Command {
        Self::hsv("bg_set_hsv", hue, sat, effect_name, duration_ms)
    }

    fn hsv<V: Into<Value>>(
        method: &str,
        hue: V,
        sat: V,
        effect_name: &str,
        duration_ms: u64,
    ) -> Command {
        Command::new(
            method,
            vec![
                json!(clamp_numeric(hue, 0, 359)),
                json!(clamp_numeric(sat, 0, 100)),
                effect(effect_name),
                duration(duration_ms),
            ],
        )
    }

    pub fn set_bright<V: Into<Value>>(
        brightness: V,
        effect_name: &str,
        duration_ms: u64,
    ) -> Command {
        Self::bright("set_bright", brightness, effect_name, duration_ms)
    }

    pub fn bg_set_bright<V: Into<Value>>(
        brightness: V,
        effect_name: &str,
        duration_ms: u64,
    ) -> Command {
        Self::bright("bg_set_bright", brightness, effect_name, duration_ms)
    }

    fn bright<V: Into<Value>>(
        method: &str,
        brightness: V,
        effect_name: &str,
        duration_ms: u64,
    ) -> Command {
        Command::new(
            method,
            vec![
                json!(clamp_numeric(brightness, 1, 100)),
                effect(effect_name),
                duration(duration_ms),
            ],
        )
    }

    /// `mode`: 0 normal, 1 CT, 2 RGB, 3 HSV, 4 color flow, 5 night light.
    pub fn set_power(power: &str, effect_name: &str, duration_ms: u64, mode: i64) -> Command {
        Self::power("set_power", power, effect_name, duration_ms, mode)
    }

    pub fn bg_set_power(power: &str, effect_name: &str, duration_ms: u64, mode: i64) -> Command {
        Self::power("bg_set_power", power, effect_name, duration_ms, mode)
    }

    fn power(method: &str, power: &str, effect_name: &str, duration_ms: u64, mode: i64) -> Command {
        Command::new(
            method,
            vec![
                json!(first_if_allowed(power, &["on", "off"], "on")),
                effect(effect_name),
                duration(duration_ms),
                json!(first_if_allowed(mode, &[0, 1, 2, 3, 4, 5], 0)),
            ],
        )
    }

    /// Starts a color flow. `count` 0 runs forever; `action` after the flow
    /// stops is 0 revert, 1 stay, 2 turn off.
    pub fn start_cf(count: u64, action: i64, flow: &[FlowStep]) -> Command {
        Command::new(
            "start_cf",
            vec![
                json!(count),
                json!(first_if_allowed(action, &[0, 1, 2], 0)),
                json!(flow_expression(flow)),
            ],
        )
    }

    /// Changes a property without knowing its current value. `color` can only circle.
    pub fn set_adjust(action: &str, prop: &str) -> Command {
        let prop = first_if_allowed(prop, &["bright", "ct", "color"], "bright");
        let action = if prop == "color" {
            "circle"
        } else {
            first_if_allowed(action, &["increase", "decrease", "circle"], "circle")
        };
        Command::new("set_adjust", vec![json!(action), json!(prop)])
    }

    /// Sets the light straight into a state; `args` follow the scene class.
    pub fn set_scene(class: &str, args: Vec<Value>) -> Command {
        let class = first_if_allowed(
            class,
            &["color", "hsv", "ct", "cf", "auto_delay_off"],
            "color",
        );
        let mut params = vec![json!(class)];
        params.extend(args);
        Command::new("set_scene", params)
    }

    /// Schedules a power-off timer of `minutes`.
    pub fn cron_add(kind: i64, minutes: u64) -> Command {
        Command::new(
            "cron_add",
            vec![
                json!(first_if_allowed(kind, &[0], 0)),
                json!(if minutes == 0 { 1 } else { minutes }),
            ],
        )
    }

    pub fn cron_get(kind: i64) -> Command {
        Command::new("cron_get", vec![json!(first_if_allowed(kind, &[0], 0))])
    }

    pub fn cron_del(kind: i64) -> Command {
        Command::new("cron_del", vec![json!(first_if_allowed(kind, &[0], 0))])
    }

    /// Starts (1) or stops (0) music mode against a TCP server at `host:port`.
    pub fn set_music(action: i64, host: &str, port: u16) -> Command {
        Command::new(
            "set_music",
            vec![
                json!(first_if_allowed(action, &[0, 1], 0)),
                json!(host),
                json!(port),
            ],
        )
    }

    /// `None` when there is no name to set; nothing should be sent then.
    pub fn set_name(name: Option<&str>) -> Option<Command> {
        match name {
            Some(name) if !name.is_empty() => Some(Command::new("set_name", vec![json!(name)])),
            _ => None,
        }
    }
}
