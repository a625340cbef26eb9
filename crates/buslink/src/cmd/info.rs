use serde::Serialize;

use buslink::wire::PeriphId;

use crate::cmd::InfoArgs;
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct ClassRow {
    id: u16,
    name: &'static str,
    instances: u16,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    serial: String,
    transport: &'static str,
    req_max_size: usize,
    resp_max_size: usize,
    peripherals: Vec<ClassRow>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let device = crate::target::open(&args.target)?;
    let serial = device.serial().map_err(|err| host_error("serial", err))?;
    let limits = device.limits();

    let mut peripherals = Vec::with_capacity(PeriphId::ALL.len());
    for class in PeriphId::ALL {
        let instances = device
            .num_inst(class.id())
            .map_err(|err| host_error(&format!("num_inst {}", class.name()), err))?;
        peripherals.push(ClassRow {
            id: class.id(),
            name: class.name(),
            instances,
        });
    }

    let out = InfoOutput {
        serial,
        transport: device.transport_kind().name(),
        req_max_size: limits.req_max_size,
        resp_max_size: limits.resp_max_size,
        peripherals,
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => crate::output::print_json(out),
        OutputFormat::Table => {
            println!(
                "{} via {} (req {} / resp {})",
                out.serial, out.transport, out.req_max_size, out.resp_max_size
            );
            let mut table = crate::output::table(vec!["ID", "CLASS", "INSTANCES"]);
            for row in &out.peripherals {
                table.add_row(vec![
                    row.id.to_string(),
                    row.name.to_string(),
                    row.instances.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("serial:    {}", out.serial);
            println!("transport: {}", out.transport);
            println!("req max:   {}", out.req_max_size);
            println!("resp max:  {}", out.resp_max_size);
            for row in out.peripherals.iter().filter(|row| row.instances > 0) {
                println!("  {:<10} x{}", row.name, row.instances);
            }
        }
        OutputFormat::Raw => println!("{}", out.serial),
    }
}
