use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use derivative::Derivative;
use serde::Serialize;
use url::Url;

/// Port devices accept commands on when the advertisement does not name one.
pub const DEFAULT_COMMAND_PORT: u16 = 55443;

/// Raw `Key: Value` pairs of one discovery datagram, keys kept as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvertisementHeaders {
    fields: HashMap<String, String>,
}

impl AdvertisementHeaders {
    /// Splits each line on its first colon. Lines without a colon (the status
    /// line, blank lines) are skipped.
    pub fn parse(message: &str) -> Self {
        let fields = message
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        AdvertisementHeaders { fields }
    }

    /// Looks up a header, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The color mode a light reported when it was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Rgb,
    ColorTemperature,
    Hsv,
    #[default]
    Unknown,
}

impl From<i64> for ColorMode {
    fn from(value: i64) -> Self {
        match value {
            1 => ColorMode::Rgb,
            2 => ColorMode::ColorTemperature,
            3 => ColorMode::Hsv,
            _ => ColorMode::Unknown,
        }
    }
}

/// Light state captured from the advertisement. Never refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub struct DeviceState {
    pub power: bool,
    /// 0-100
    pub brightness: u8,
    pub color_mode: ColorMode,
    /// Kelvin
    pub color_temperature: u32,
    /// Packed `r * 65536 + g * 256 + b`.
    pub rgb: u32,
    /// 0-359
    pub hue: u16,
    /// 0-100
    pub saturation: u8,
}

/**
A light found by discovery.

Two descriptors are equal when their `id` is, whatever state they carry:
the id is what identifies a device within a discovery session.
*/
#[derive(Derivative)]
#[derivative(Hash, PartialEq, Eq)]
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescriptor {
    pub id: u64,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub address: String,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub port: u16,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub display_name: String,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub model: String,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub firmware_version: String,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub supported_methods: BTreeSet<String>,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub state: DeviceState,
}

impl DeviceDescriptor {
    /// Builds a descriptor from an advertisement. Returns `None` when there is
    /// no `Location` header or its host cannot be read; every other missing or
    /// malformed field falls back to its zero value.
    pub fn from_headers(headers: &AdvertisementHeaders) -> Option<Self> {
        let (address, port) = parse_location(headers.get("Location")?)?;

        let number = |key: &str| -> i64 {
            headers
                .get(key)
                .and_then(|value| value.trim().parse::<i64>().ok())
                .unwrap_or(0)
        };
        let text = |key: &str| headers.get(key).unwrap_or_default().to_string();

        let state = DeviceState {
            power: headers
                .get("power")
                .map(|value| value.eq_ignore_ascii_case("on"))
                .unwrap_or(false),
            brightness: number("bright").clamp(0, 100) as u8,
            color_mode: ColorMode::from(number("color_mode")),
            color_temperature: number("ct").clamp(0, u32::MAX as i64) as u32,
            rgb: number("rgb").clamp(0, 0xFF_FF_FF) as u32,
            hue: number("hue").clamp(0, 359) as u16,
            saturation: number("sat").clamp(0, 100) as u8,
        };

        Some(DeviceDescriptor {
            id: headers.get("id").map(parse_hex_id).unwrap_or(0),
            address,
            port,
            display_name: headers.get("name").map(decode_name).unwrap_or_default(),
            model: text("model"),
            firmware_version: text("fw_ver"),
            supported_methods: headers
                .get("support")
                .map(|methods| methods.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            state,
        })
    }

    pub fn supports(&self, method: &str) -> bool {
        self.supported_methods.contains(method)
    }
}

impl Display for DeviceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#x} {} at {}:{}",
            self.id, self.model, self.address, self.port
        )
    }
}

fn parse_hex_id(value: &str) -> u64 {
    let digits = value
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u64::from_str_radix(digits, 16).unwrap_or(0)
}

// Names are advertised base64 encoded; fall back to the raw text when they are not.
fn decode_name(value: &str) -> String {
    STANDARD
        .decode(value.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| value.to_string())
}

fn parse_location(location: &str) -> Option<(String, u16)> {
    let url = Url::parse(location.trim()).ok()?;
    let host = url.host_str()?.trim_matches(|c| c == '[' || c == ']');
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), url.port().unwrap_or(DEFAULT_COMMAND_PORT)))
}
