use std::str::FromStr;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod echo;
pub mod info;
pub mod list;
pub mod selftest;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover attached USB devices and print their negotiated limits.
    List(ListArgs),
    /// Show serial, limits and peripheral inventory of one device.
    Info(InfoArgs),
    /// Send bytes through the metadata echo function.
    Echo(EchoArgs),
    /// Issue a raw call and print the response payload.
    Call(CallArgs),
    /// Boot a simulated device and check both transports against it.
    Selftest(SelftestArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::List(args) => list::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Selftest(args) => selftest::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Which device to talk to.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Serial device path of a UART link.
    #[arg(long, value_name = "PATH", conflicts_with = "usb")]
    pub uart: Option<String>,
    /// Baud rate for --uart.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Index into the discovered USB device list (default 0).
    #[arg(long, value_name = "INDEX")]
    pub usb: Option<usize>,
}

/// Hex-encoded bytes; spaces and a leading `0x` are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = compact
            .strip_prefix("0x")
            .or_else(|| compact.strip_prefix("0X"))
            .unwrap_or(&compact);
        hex::decode(digits).map(HexBytes)
    }
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Text payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex payload.
    #[arg(long)]
    pub hex: Option<HexBytes>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Peripheral class id.
    #[arg(long)]
    pub id: u16,
    /// Instance index.
    #[arg(long, default_value_t = 0)]
    pub idx: u16,
    /// Function id.
    #[arg(long = "fn", value_name = "FN")]
    pub func: u16,
    /// Hex request payload.
    #[arg(long)]
    pub hex: Option<HexBytes>,
}

#[derive(Args, Debug)]
pub struct SelftestArgs {
    /// Max packet size of the simulated USB link.
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u16).range(8..=1024))]
    pub packet_size: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
