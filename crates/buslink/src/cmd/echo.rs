use tracing::debug;

use crate::cmd::EchoArgs;
use crate::exit::{host_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_payload, OutputFormat};

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = match (args.data, args.hex) {
        (Some(text), _) => text.into_bytes(),
        (None, Some(bytes)) => bytes.0,
        (None, None) => Vec::new(),
    };

    let device = crate::target::open(&args.target)?;
    let reply = device
        .echo(&payload)
        .map_err(|err| host_error("echo", err))?;
    debug!(sent = payload.len(), received = reply.len(), "echo complete");

    if reply.as_ref() != payload.as_slice() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "echo mismatch: sent {} bytes, got {} back ({})",
                payload.len(),
                reply.len(),
                hex::encode(&reply)
            ),
        ));
    }

    print_payload("echo", &reply, format);
    Ok(SUCCESS)
}
