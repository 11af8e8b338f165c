// Level measurement example
//
// Configures an SPM-15 behind a Prologix GPIB-USB controller, runs a number
// of triggered measurements and hands the instrument back to front panel
// control.

use clap::Parser;
use spm15_rs::{PollPolicy, PrologixBus, RangePolicy, Spm15, Spm15Config};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Measure levels with a W&G SPM-15 over a Prologix controller")]
struct Args {
    /// Serial port of the Prologix controller
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// GPIB address of the instrument
    #[arg(short, long, default_value_t = 7)]
    address: u8,

    /// Measurement frequency in Hz
    #[arg(short, long, default_value_t = 1_000)]
    frequency: u32,

    /// Generator level in dBm, enables the generator when given
    #[arg(long, allow_negative_numbers = true)]
    amplitude: Option<f64>,

    #[arg(long, default_value = "B1740")]
    bandwidth: String,

    #[arg(long, default_value = "BAL600_INF")]
    input_impedance: String,

    #[arg(long, default_value = "MEAS_LEVEL_FREQ")]
    output_value: String,

    /// Number of measurements to take
    #[arg(short, long, default_value_t = 5)]
    count: usize,

    /// Give up on a busy instrument after this many seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    println!("SPM-15 Level Measurement Example");
    println!("================================\n");

    let bus = PrologixBus::open(&args.port)?;
    let config = Spm15Config::default()
        .with_poll_policy(PollPolicy::default().with_deadline(Duration::from_secs(args.timeout)))
        .with_range_policy(RangePolicy::Reject);
    let mut meter = Spm15::with_config(bus, args.address, config)?;
    println!("Connected to {}\n", meter);

    meter.set_bandwidth(args.bandwidth.as_str())?;
    meter.set_input_impedance(args.input_impedance.as_str())?;
    meter.set_output_value(args.output_value.as_str())?;
    meter.set_frequency(args.frequency)?;

    match args.amplitude {
        Some(dbm) => {
            meter.set_amplitude(dbm)?;
            meter.enable_generator(true)?;
            println!("Generator on at {} Hz, {:+.1} dBm", args.frequency, dbm);
        }
        None => meter.enable_generator(false)?,
    }

    for i in 1..=args.count {
        match meter.measure()? {
            Ok(result) => {
                let levels = result
                    .levels()
                    .iter()
                    .map(|level| format!("{:+.2} dB", level))
                    .collect::<Vec<_>>()
                    .join(", ");
                match result.frequency() {
                    Some(hz) => println!("  {}. {} Hz: {}", i, hz, levels),
                    None => println!("  {}. {}", i, levels),
                }
            }
            Err(failure) => println!("  {}. Measurement failed: {}", i, failure),
        }
    }

    meter.enable_generator(false)?;
    meter.local()?;
    println!("\nInstrument returned to local control");

    Ok(())
}
