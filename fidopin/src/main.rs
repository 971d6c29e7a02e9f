use fidopin::{
    run, DeviceDescriptor, DeviceEnumerator, Error, Interaction, PinEntry, PinProtocol, PinStatus,
    SessionConfig, SessionOutcome,
};
use fidopin_transport::HidEnumerator;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use zeroize::Zeroizing;

const EXIT_FAILURE: u8 = 1;
const EXIT_UNKNOWN: u8 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "fidopin")]
#[command(about = "Change the PIN of a FIDO2 security key", version)]
struct Args {
    /// Use the N-th listed device instead of prompting
    #[arg(short, long, value_name = "N")]
    device: Option<usize>,

    /// PIN/UV auth protocol to prefer (negotiated when omitted)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
    protocol: Option<u8>,

    /// Per-command timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    timeout_ms: u64,

    /// List connected security keys and exit
    #[arg(short, long)]
    list: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

/// Prompts on the controlling terminal
struct Terminal;

impl Terminal {
    fn read_secret(prompt: &str) -> Option<Zeroizing<Vec<u8>>> {
        match rpassword::prompt_password(prompt) {
            Ok(pin) => Some(Zeroizing::new(pin.into_bytes())),
            Err(err) => {
                log::debug!("PIN prompt failed: {}", err);
                None
            }
        }
    }
}

impl Interaction for Terminal {
    fn devices_found(&mut self, devices: &[DeviceDescriptor]) {
        println!("Found {} security key(s).", devices.len());
    }

    fn device_selected(&mut self, device: &DeviceDescriptor) {
        println!("Using device: {}", device);
    }

    fn choose_device(&mut self, devices: &[DeviceDescriptor]) -> Option<String> {
        println!("Please select a device to use:");
        for (i, device) in devices.iter().enumerate() {
            println!("  {}: {}", i + 1, device);
        }
        print!("Enter number (1-{}): ", devices.len());
        io::stdout().flush().ok()?;

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn read_pins(&mut self, _device: &DeviceDescriptor) -> Option<PinEntry> {
        println!("\nChanging FIDO2 PIN...");
        println!("IMPORTANT: Entering the wrong current PIN multiple times may lock your key.");

        let current = Self::read_secret("Enter your CURRENT PIN: ")?;
        let new = Self::read_secret("Enter your NEW PIN: ")?;
        let confirm = Self::read_secret("Confirm your NEW PIN: ")?;
        Some(PinEntry {
            current,
            new,
            confirm,
        })
    }

    fn pin_retries(&mut self, retries: u8) {
        if retries <= 3 {
            println!("WARNING: only {} PIN attempt(s) remaining before the key locks.", retries);
        } else {
            println!("{} PIN attempts remaining.", retries);
        }
    }

    fn changing_pin(&mut self) {
        println!("\nAttempting to change PIN... Please touch your security key if it flashes.");
    }
}

fn report(outcome: &SessionOutcome) -> ExitCode {
    match outcome {
        SessionOutcome::Done => {
            println!("\nPIN successfully changed!");
            ExitCode::SUCCESS
        }
        SessionOutcome::Failed(err) => {
            match err {
                Error::Device(PinStatus::PinInvalid) => {
                    eprintln!("\nERROR: The CURRENT PIN you entered is incorrect.");
                }
                Error::Device(PinStatus::PinAuthBlocked) => {
                    eprintln!("\nERROR: PIN authentication is blocked due to too many failed attempts.");
                    eprintln!("Remove and reinsert your security key before trying again.");
                }
                Error::Device(PinStatus::PinBlocked) => {
                    eprintln!("\nERROR: The PIN is blocked.");
                    eprintln!("You may need to reset your security key.");
                }
                Error::Device(PinStatus::PinPolicyViolation) => {
                    eprintln!("\nERROR: The new PIN does not meet the key's policy (e.g., too short).");
                }
                other => eprintln!("\nERROR: {}", other),
            }
            ExitCode::from(EXIT_FAILURE)
        }
        SessionOutcome::Unknown(message) => {
            eprintln!("\n{}", message);
            ExitCode::from(EXIT_UNKNOWN)
        }
    }
}

fn try_main(args: Args) -> anyhow::Result<ExitCode> {
    let mut builder = SessionConfig::builder().timeout(Duration::from_millis(args.timeout_ms));
    if let Some(version) = args.protocol {
        builder = builder.protocol(PinProtocol::try_from(version)?);
    }
    if let Some(index) = args.device {
        builder = builder.device(index);
    }
    let config = builder.build();

    let mut enumerator =
        HidEnumerator::new(config.timeout).context("failed to initialise the HID API")?;

    if args.list {
        let devices = enumerator.list().context("failed to list HID devices")?;
        if devices.is_empty() {
            println!("No FIDO security key found. Make sure it's plugged in.");
        }
        for (i, device) in devices.iter().enumerate() {
            println!("{}: {}", i + 1, device);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = run(&mut enumerator, config, &mut Terminal);
    Ok(report(&outcome))
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(err) = ctrlc::set_handler(|| {
        println!("\nOperation cancelled by user.");
        std::process::exit(EXIT_INTERRUPTED);
    }) {
        log::warn!("Failed to install Ctrl+C handler: {}", err);
    }

    match try_main(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
