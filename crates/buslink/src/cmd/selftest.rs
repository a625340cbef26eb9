//! Boots the simulated firmware in-process and drives it over both
//! simulated links with the same host code used for real hardware.

use serde::Serialize;

use buslink::firmware::{Firmware, FirmwareConfig, PacketInterface};
use buslink::host::{negotiate, Device, Error};
use buslink::sim;
use buslink::transport::{PacketTransport, StreamTransport};
use buslink::wire::{DeviceError, NUM_PERIPHERALS};

use crate::cmd::SelftestArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SelftestOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: SelftestArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FirmwareConfig::default();
    let mut checks = Vec::new();

    let booted = sim::demo(&config)
        .map_err(|err| err.to_string())
        .and_then(|registry| Firmware::boot(registry).map_err(|err| err.to_string()));
    let firmware = match booted {
        Ok(firmware) => {
            checks.push(CheckResult::pass(
                "firmware_boot",
                format!(
                    "{} peripherals, {} locks",
                    firmware.dispatcher().registry().len(),
                    firmware.dispatcher().locks().len()
                ),
            ));
            firmware
        }
        Err(err) => {
            checks.push(CheckResult::fail("firmware_boot", err));
            return finish(checks, format);
        }
    };

    match usb_device(&firmware, &config, usize::from(args.packet_size)) {
        Ok(device) => link_checks("usb", &device, &mut checks),
        Err(err) => checks.push(CheckResult::fail("usb_link", err)),
    }
    match serial_device(&firmware, &config) {
        Ok(device) => link_checks("uart", &device, &mut checks),
        Err(err) => checks.push(CheckResult::fail("uart_link", err)),
    }

    checks.push(compiled_features_check());
    finish(checks, format)
}

fn usb_device(fw: &Firmware, config: &FirmwareConfig, mps: usize) -> Result<Device, String> {
    let (pipe, port) = sim::usb_link(mps);
    fw.spawn(PacketInterface::new("usb-sim", port, config))
        .map_err(|err| err.to_string())?;
    Ok(Device::new(Box::new(PacketTransport::new(pipe))))
}

fn serial_device(fw: &Firmware, config: &FirmwareConfig) -> Result<Device, String> {
    let (port, iface) = sim::serial_link(config);
    fw.spawn(iface).map_err(|err| err.to_string())?;
    let transport = StreamTransport::new(port).map_err(|err| err.to_string())?;
    Ok(Device::new(Box::new(transport)))
}

fn link_checks(link: &str, device: &Device, checks: &mut Vec<CheckResult>) {
    let name = format!("{link}_negotiate");
    checks.push(match negotiate(device) {
        Ok(limits) => CheckResult::pass(
            &name,
            format!("req {} / resp {}", limits.req_max_size, limits.resp_max_size),
        ),
        Err(err) => CheckResult::fail(&name, err.to_string()),
    });

    let name = format!("{link}_echo");
    let data: Vec<u8> = (0..=255u8).cycle().take(device.limits().req_max_size).collect();
    checks.push(match device.echo(&data) {
        Ok(reply) if reply.as_ref() == data.as_slice() => {
            CheckResult::pass(&name, format!("{} bytes round-tripped", data.len()))
        }
        Ok(reply) => CheckResult::fail(
            &name,
            format!("sent {} bytes, got {} different bytes", data.len(), reply.len()),
        ),
        Err(err) => CheckResult::fail(&name, err.to_string()),
    });

    let name = format!("{link}_not_supported");
    checks.push(match device.call(NUM_PERIPHERALS, 0, 0, &[]) {
        Err(Error::Device(DeviceError::NotSupported)) => {
            CheckResult::pass(&name, format!("class {NUM_PERIPHERALS} rejected"))
        }
        Err(err) => CheckResult::fail(&name, format!("unexpected error: {err}")),
        Ok(_) => CheckResult::fail(&name, format!("class {NUM_PERIPHERALS} was accepted")),
    });
}

fn compiled_features_check() -> CheckResult {
    let mut features = vec!["cli"];
    if cfg!(feature = "usb") {
        features.push("usb");
    }
    if cfg!(feature = "serial") {
        features.push("serial");
    }
    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}

fn finish(checks: Vec<CheckResult>, format: OutputFormat) -> CliResult<i32> {
    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let output = SelftestOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };
    print_selftest(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_selftest(output: &SelftestOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => crate::output::print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("buslink selftest\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => println!("{}", output.overall),
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selftest_passes_against_demo_firmware() {
        let code = run(SelftestArgs { packet_size: 64 }, OutputFormat::Json).unwrap();
        assert_eq!(code, SUCCESS);
    }
}
