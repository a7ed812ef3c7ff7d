use std::process::ExitCode;

use dmg_host::{CartridgeHeader, Disassembly};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: dmg-host <rom> [start]";

/// Parse a start offset given as `$0150`, `0x150` or decimal.
fn parse_offset(arg: &str) -> Option<u32> {
    if let Some(hex) = arg.strip_prefix('$').or_else(|| arg.strip_prefix("0x")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        arg.parse().ok()
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let start = match args.next() {
        Some(arg) => match parse_offset(&arg) {
            Some(offset) => offset,
            None => {
                eprintln!("dmg-host: invalid start offset {arg:?}\n{USAGE}");
                return ExitCode::from(2);
            }
        },
        None => 0,
    };

    let rom = match std::fs::read(&path) {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("dmg-host: {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let header = match CartridgeHeader::parse(&rom) {
        Ok(header) => header,
        Err(err) => {
            eprintln!("dmg-host: {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(bytes = rom.len(), start, "disassembling");

    println!("{header}");
    println!();

    let listing = Disassembly::new(rom);
    let mut end = start;
    for instruction in listing.iter_from(start) {
        end = instruction.address + u32::from(instruction.len);
        println!("{instruction}");
    }
    if (end as usize) < listing.image().len() {
        println!("; stopped at ${end:04X}");
    }
    ExitCode::SUCCESS
}
