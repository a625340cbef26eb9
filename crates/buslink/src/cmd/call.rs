use tracing::debug;

use crate::cmd::CallArgs;
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_payload, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = args.hex.map(|bytes| bytes.0).unwrap_or_default();
    let device = crate::target::open(&args.target)?;

    debug!(
        periph_id = args.id,
        periph_idx = args.idx,
        periph_fn = args.func,
        len = payload.len(),
        "issuing call"
    );
    let response = device
        .call(args.id, args.idx, args.func, &payload)
        .map_err(|err| {
            host_error(
                &format!("call {}/{}/{}", args.id, args.idx, args.func),
                err,
            )
        })?;

    print_payload("call", &response, format);
    Ok(SUCCESS)
}
