use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};

use yeelight_control_lib::command::flow::{parse_flow_expression, FlowStep};
use yeelight_control_lib::control_interface::{ControlInterface, Effect, FlowEnd, PowerMode, RGB};
use yeelight_control_lib::util::discovery::{DiscoveryClient, DiscoveryConfig};
use yeelight_control_lib::util::response::CommandResponse;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "yeelight_control",
    about = "Discovers and controls Yeelight smart LED lights",
    version
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` command.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CliPower {
    On,
    Off,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CliEffect {
    Smooth,
    Sudden,
}

impl From<CliEffect> for Effect {
    fn from(effect: CliEffect) -> Self {
        match effect {
            CliEffect::Smooth => Effect::Smooth,
            CliEffect::Sudden => Effect::Sudden,
        }
    }
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Sends a command to one device
    #[clap(name = "device-call")]
    DeviceCall {
        /// Sets the IP address of the device
        #[clap(long)]
        ip: String,

        /// Sets the command port of the device
        #[clap(long, default_value_t = 55443)]
        port: u16,

        /// Transition effect
        #[clap(long, value_enum, default_value_t = CliEffect::Smooth)]
        effect: CliEffect,

        /// Transition duration in milliseconds
        #[clap(long, default_value_t = 500)]
        duration: u64,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Searches the local network for devices
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 3000)]
        timeout: u64,
    },
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Toggles the main light.
    #[clap(name = "toggle")]
    Toggle,
    /// Switches the light on or off.
    #[clap(name = "power")]
    Power {
        #[clap(value_enum)]
        power: CliPower,
    },
    /// Sets the brightness (1-100).
    #[clap(name = "bright")]
    Bright { brightness: i64 },
    /// Sets an RGB color.
    #[clap(name = "rgb")]
    Rgb { red: u8, green: u8, blue: u8 },
    /// Sets the color temperature in Kelvin (1700-6500).
    #[clap(name = "ct")]
    Ct { kelvin: i64 },
    /// Sets hue (0-359) and saturation (0-100).
    #[clap(name = "hsv")]
    Hsv { hue: i64, saturation: i64 },
    /// Reads device properties.
    #[clap(name = "get-prop")]
    GetProp {
        #[clap(required = true)]
        names: Vec<String>,
    },
    /// Starts a color flow from a flat expression such as `1000,2,2700,100,500,1,255,10`.
    #[clap(name = "flow")]
    Flow {
        /// Number of state changes before stopping, 0 runs forever
        #[clap(long, default_value_t = 0)]
        count: u64,

        /// What to do when the flow stops (recover, stay, off)
        #[clap(long, default_value = "recover")]
        end: FlowEnd,

        expression: String,
    },
    /// Stops a running color flow.
    #[clap(name = "stop-flow")]
    StopFlow,
    /// Stores the device name.
    #[clap(name = "name")]
    Name { name: Option<String> },
    /// Saves the current state as the power-on default.
    #[clap(name = "set-default")]
    SetDefault,
}

fn print_response(response: &CommandResponse) {
    match &response.error {
        Some(error) => println!("Device error {}: {}", error.code, error.message),
        None => println!("{}", response.raw),
    }
}

async fn handle_device_action(
    control: &ControlInterface,
    action: DeviceAction,
    effect: Effect,
    duration: u64,
) -> Result<()> {
    let response = match action {
        DeviceAction::Toggle => control.toggle().await?,
        DeviceAction::Power { power } => {
            control
                .set_power(power == CliPower::On, effect, duration, PowerMode::Normal)
                .await?
        }
        DeviceAction::Bright { brightness } => {
            control.set_brightness(brightness, effect, duration).await?
        }
        DeviceAction::Rgb { red, green, blue } => {
            let rgb: RGB = (red, green, blue).into();
            control.set_rgb(rgb, effect, duration).await?
        }
        DeviceAction::Ct { kelvin } => {
            control
                .set_color_temperature(kelvin, effect, duration)
                .await?
        }
        DeviceAction::Hsv { hue, saturation } => {
            control.set_hsv(hue, saturation, effect, duration).await?
        }
        DeviceAction::GetProp { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            for (name, value) in control.get_prop(&names).await? {
                println!("{}: {}", name, value);
            }
            return Ok(());
        }
        DeviceAction::Flow {
            count,
            end,
            expression,
        } => {
            let flow: Vec<FlowStep> = parse_flow_expression(&expression)
                .ok_or_else(|| anyhow!("Invalid flow expression: {}", expression))?;
            control.start_flow(count, end, &flow).await?
        }
        DeviceAction::StopFlow => control.stop_flow().await?,
        DeviceAction::Name { name } => match control.set_name(name.as_deref()).await? {
            Some(response) => response,
            None => {
                println!("No name given, nothing sent.");
                return Ok(());
            }
        },
        DeviceAction::SetDefault => control.set_default().await?,
    };
    print_response(&response);
    Ok(())
}

async fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Discover { output, timeout } => {
            let devices = DiscoveryClient::find_devices(
                DiscoveryConfig::default(),
                Duration::from_millis(timeout),
            )
            .await?;
            match output {
                OutputFormat::Plaintext => {
                    DiscoveryClient::pretty_print_devices(&devices);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&devices)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&devices)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::DeviceCall {
            ip,
            port,
            effect,
            duration,
            action,
        } => {
            let control = ControlInterface::new(&ip, Some(port));
            let result = handle_device_action(&control, action, effect.into(), duration).await;
            control.close();
            result?;
        }
    }

    Ok(())
}
