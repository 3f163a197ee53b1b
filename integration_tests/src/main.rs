//! Hardware checks for the UART console firmware.
//!
//! Flash the firmware, wire a USB serial adapter to UART0 (GPIO43/44) and
//! point this at the adapter. Every check sends lines and compares the
//! echoed `"> "` replies.

mod device;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use device::{resolve_port, DeviceClient};
use tests::{print_results, run_all_tests, EchoLimits};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Line-echo checks against a flashed UART console")]
struct Args {
    /// Serial adapter wired to the console UART ("auto" picks the first USB adapter)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Console baud rate
    #[arg(short, long, default_value_t = 115200)]
    baud: u32,

    /// Receive slot size the firmware was built with
    #[arg(long, default_value_t = 128)]
    slot_size: usize,

    /// Longest line the firmware assembles before discarding it
    #[arg(long, default_value_t = 256)]
    line_limit: usize,

    /// Milliseconds to let boot output drain before testing
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,
}

impl Args {
    fn limits(&self) -> anyhow::Result<EchoLimits> {
        if self.slot_size == 0 || self.slot_size >= self.line_limit {
            anyhow::bail!(
                "--slot-size ({}) must be non-zero and below --line-limit ({})",
                self.slot_size,
                self.line_limit
            );
        }
        Ok(EchoLimits {
            slot_size: self.slot_size,
            line_limit: self.line_limit,
        })
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let limits = args.limits()?;
    let port = resolve_port(&args.port)?;

    println!("{}", "UART console echo checks".bold());
    println!(
        "  {} @ {} baud, {} byte slots, {} byte lines\n",
        port, args.baud, limits.slot_size, limits.line_limit
    );

    let mut device = DeviceClient::new(&port, args.baud)?;
    std::thread::sleep(Duration::from_millis(args.settle_ms));
    device.clear_buffer()?;

    let results = run_all_tests(&mut device, &limits);
    print_results(&results);

    if results.iter().all(|r| r.passed) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
