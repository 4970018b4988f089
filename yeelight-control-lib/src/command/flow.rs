use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// What a single color-flow step changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowMode {
    Color,
    ColorTemperature,
    Sleep,
}

impl FlowMode {
    pub fn code(self) -> u8 {
        match self {
            FlowMode::Color => 1,
            FlowMode::ColorTemperature => 2,
            FlowMode::Sleep => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(FlowMode::Color),
            2 => Some(FlowMode::ColorTemperature),
            7 => Some(FlowMode::Sleep),
            _ => None,
        }
    }
}

/// One `[duration, mode, value, brightness]` tuple of a flow expression.
///
/// `value` is a packed RGB for [`FlowMode::Color`], Kelvin for
/// [`FlowMode::ColorTemperature`], and ignored for [`FlowMode::Sleep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub duration: u64,
    pub mode: FlowMode,
    pub value: i64,
    pub brightness: i64,
}

impl FlowStep {
    pub fn new(duration: u64, mode: FlowMode, value: i64, brightness: i64) -> Self {
        FlowStep {
            duration,
            mode,
            value,
            brightness,
        }
    }
}

impl Display for FlowStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.duration,
            self.mode.code(),
            self.value,
            self.brightness
        )
    }
}

/// Group size of a flow expression; tuple boundaries are not marked on the wire.
pub const FLOW_TUPLE_LEN: usize = 4;

/// Joins the steps into one flat comma separated string.
pub fn flow_expression(steps: &[FlowStep]) -> String {
    steps
        .iter()
        .map(FlowStep::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Reads a flat flow expression back into steps, four values at a time.
pub fn parse_flow_expression(expression: &str) -> Option<Vec<FlowStep>> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Some(Vec::new());
    }
    let values = expression
        .split(',')
        .map(|value| value.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if values.len() % FLOW_TUPLE_LEN != 0 {
        return None;
    }
    values
        .chunks(FLOW_TUPLE_LEN)
        .map(|chunk| {
            Some(FlowStep {
                duration: u64::try_from(chunk[0]).ok()?,
                mode: FlowMode::from_code(chunk[1])?,
                value: chunk[2],
                brightness: chunk[3],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sunrise() -> Vec<FlowStep> {
        vec![
            FlowStep::new(1000, FlowMode::ColorTemperature, 2700, 100),
            FlowStep::new(500, FlowMode::Color, 255, 10),
            FlowStep::new(5000, FlowMode::Sleep, 0, 0),
            FlowStep::new(500, FlowMode::ColorTemperature, 5000, 1),
        ]
    }

    #[test]
    fn test_flow_expression_is_flat() {
        assert_eq!(
            flow_expression(&sunrise()),
            "1000,2,2700,100,500,1,255,10,5000,7,0,0,500,2,5000,1"
        );
    }

    #[test]
    fn test_empty_flow_expression() {
        assert_eq!(flow_expression(&[]), "");
        assert_eq!(parse_flow_expression(""), Some(Vec::new()));
    }

    #[test]
    fn test_parse_flow_expression_regroups_by_four() {
        let parsed =
            parse_flow_expression("1000,2,2700,100,500,1,255,10,5000,7,0,0,500,2,5000,1").unwrap();
        assert_eq!(parsed, sunrise());
    }

    #[test]
    fn test_parse_flow_expression_rejects_partial_tuple() {
        assert!(parse_flow_expression("1000,2,2700").is_none());
        assert!(parse_flow_expression("1000,2,2700,x").is_none());
        assert!(parse_flow_expression("1000,3,2700,100").is_none());
    }
}
