use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("buslink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: buslink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("BUSLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: usb={}, serial={}, cli=true",
        cfg!(feature = "usb"),
        cfg!(feature = "serial")
    );
    println!(
        "protocol: req_max={} resp_max={} classes={}",
        buslink::wire::MAX_REQ_PAYLOAD,
        buslink::wire::MAX_RESP_PAYLOAD,
        buslink::wire::NUM_PERIPHERALS
    );

    Ok(SUCCESS)
}
