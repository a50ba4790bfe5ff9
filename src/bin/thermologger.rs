use clap::{value_t, App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::path::Path;
use std::time::Duration;
use thermologger::board::{BusOpener, LinuxI2c, MemoryBus, SmtcBoard};
use thermologger::buttons::DebounceEngine;
use thermologger::config::{AppConfig, SensorType, CHANNEL_COUNT};
use thermologger::conversion;
use thermologger::events::Event;
use thermologger::gpio;
use thermologger::runtime::{self, STOP_TIMEOUT};
use thermologger::AcquisitionLoop;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "settings.json";
const RECHECK_BUTTON: u8 = 1;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let matches = App::new("thermologger")
        .version(env!("CARGO_PKG_VERSION"))
        .about("🌡️  Eight-channel thermocouple logger for the SM-TC card")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Settings file")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("simulate-board")
                .long("simulate-board")
                .help("Talk to an in-memory card instead of /dev/i2c-N")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("📈 Acquire all channels until stopped")
                .long_about(
                    "Sweeps all eight channels every interval and prints each sweep. Falls back to \
                     synthetic data when no card answers. Button 1 requests a connectivity re-check.",
                )
                .arg(
                    Arg::with_name("duration")
                        .short("d")
                        .long("duration")
                        .value_name("SECONDS")
                        .help("Stop after this many seconds")
                        .takes_value(true)
                        .validator(|v| match v.parse::<f64>() {
                            Ok(s) if s > 0.0 => Ok(()),
                            _ => Err("Duration must be a positive number of seconds".into()),
                        }),
                )
                .arg(
                    Arg::with_name("no-buttons")
                        .long("no-buttons")
                        .help("Do not poll the front-panel buttons"),
                ),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("🔎 Read one channel once")
                .arg(channel_arg()),
        )
        .subcommand(
            SubCommand::with_name("convert")
                .about("🧮 Convert a K-type voltage to temperature")
                .arg(
                    Arg::with_name("millivolts")
                        .help("Thermocouple EMF in mV")
                        .required(true)
                        .allow_hyphen_values(true),
                ),
        )
        .subcommand(SubCommand::with_name("diag").about("🩺 Show card revision, supply and on-board sensors"))
        .subcommand(
            SubCommand::with_name("set-type")
                .about("🔧 Configure a channel's thermocouple type")
                .arg(channel_arg())
                .arg(
                    Arg::with_name("type")
                        .help("Thermocouple type")
                        .required(true)
                        .possible_values(&["B", "E", "J", "K", "N", "R", "S", "T"])
                        .case_insensitive(true),
                ),
        )
        .get_matches();

    let verbose = matches.is_present("verbose");
    init_logging(verbose);

    let format = matches.value_of("format").unwrap_or("table");
    let simulate = matches.is_present("simulate-board");
    let config_path = matches.value_of("config").unwrap_or(DEFAULT_CONFIG);
    let config = AppConfig::load(Path::new(config_path))?;

    match matches.subcommand() {
        ("run", Some(sub_matches)) => handle_run(sub_matches, &config, format, simulate).await?,
        ("read", Some(sub_matches)) => {
            let channel = value_t!(sub_matches, "channel", u8)?;
            with_board(&config, simulate, |board| handle_read(board, channel, format))?;
        }
        ("convert", Some(sub_matches)) => {
            let millivolts = value_t!(sub_matches, "millivolts", f64)?;
            handle_convert(millivolts, format)?;
        }
        ("diag", Some(_)) => with_board(&config, simulate, |board| handle_diag(board, format))?,
        ("set-type", Some(sub_matches)) => {
            let channel = value_t!(sub_matches, "channel", u8)?;
            let sensor_type = value_t!(sub_matches, "type", SensorType)?;
            with_board(&config, simulate, |board| handle_set_type(board, channel, sensor_type))?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
        }
    }

    Ok(())
}

fn channel_arg() -> Arg<'static, 'static> {
    Arg::with_name("channel")
        .help("Channel number (1-8)")
        .required(true)
        .validator(|v| match v.parse::<u8>() {
            Ok(ch) if ch >= 1 && usize::from(ch) <= CHANNEL_COUNT => Ok(()),
            _ => Err("Channel must be between 1 and 8".into()),
        })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Probe the card (real or simulated) and hand it to `f`.
fn with_board<F>(config: &AppConfig, simulate: bool, f: F) -> CliResult
where
    F: FnOnce(&dyn BoardOps) -> CliResult,
{
    if simulate {
        let board = SmtcBoard::probe(MemoryBus::populated(), config.board.stack)?;
        let ops: &dyn BoardOps = &board;
        f(ops)
    } else {
        let board = SmtcBoard::probe(LinuxI2c::new(config.board.i2c_bus), config.board.stack)?;
        let ops: &dyn BoardOps = &board;
        f(ops)
    }
}

/// The card operations the one-shot commands need, independent of bus type.
trait BoardOps {
    fn temperature(&self, channel: u8) -> thermologger::Result<f64>;
    fn millivolts(&self, channel: u8) -> thermologger::Result<f64>;
    fn sensor_type(&self, channel: u8) -> thermologger::Result<SensorType>;
    fn set_sensor_type(&self, channel: u8, sensor_type: SensorType) -> thermologger::Result<()>;
    fn revision(&self) -> String;
    fn diag_temperature(&self) -> thermologger::Result<f64>;
    fn supply_voltage(&self) -> thermologger::Result<f64>;
    fn thermistor(&self, channel: u8) -> thermologger::Result<f64>;
}

impl<B: BusOpener> BoardOps for SmtcBoard<B> {
    fn temperature(&self, channel: u8) -> thermologger::Result<f64> {
        self.read_temperature(channel)
    }
    fn millivolts(&self, channel: u8) -> thermologger::Result<f64> {
        self.read_millivolts(channel)
    }
    fn sensor_type(&self, channel: u8) -> thermologger::Result<SensorType> {
        self.read_sensor_type(channel)
    }
    fn set_sensor_type(&self, channel: u8, sensor_type: SensorType) -> thermologger::Result<()> {
        self.write_sensor_type(channel, sensor_type)
    }
    fn revision(&self) -> String {
        SmtcBoard::revision(self).to_string()
    }
    fn diag_temperature(&self) -> thermologger::Result<f64> {
        self.read_diag_temperature()
    }
    fn supply_voltage(&self) -> thermologger::Result<f64> {
        self.read_supply_voltage()
    }
    fn thermistor(&self, channel: u8) -> thermologger::Result<f64> {
        self.read_thermistor_temperature(channel)
    }
}

async fn handle_run(matches: &ArgMatches<'_>, config: &AppConfig, format: &str, simulate: bool) -> CliResult {
    let duration = match matches.value_of("duration") {
        Some(_) => Some(Duration::from_secs_f64(value_t!(matches, "duration", f64)?)),
        None => None,
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let acquisition = if simulate {
        runtime::spawn_acquisition(AcquisitionLoop::detect(config, MemoryBus::populated()), tx.clone())
    } else {
        runtime::spawn_acquisition(
            AcquisitionLoop::detect(config, LinuxI2c::new(config.board.i2c_bus)),
            tx.clone(),
        )
    };

    let buttons = if matches.is_present("no-buttons") {
        None
    } else {
        let engine = gpio::open_buttons(Path::new(&config.buttons.chip), &config.buttons.pins, config.buttons.invert)
            .and_then(|pins| DebounceEngine::new(config.buttons.debounce, pins));
        match engine {
            Ok(engine) => Some(runtime::spawn_buttons(engine, tx.clone())),
            Err(e) => {
                warn!(target: "gpio", "Buttons unavailable, continuing without them: {}", e);
                None
            }
        }
    };
    drop(tx);

    if format == "table" {
        println!("{}", "📈 Acquiring (Ctrl+C to stop)".bright_blue().bold());
        print_table_header();
    }

    let deadline = async {
        match duration {
            Some(d) => time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(Event::ButtonPressed { button }) if button == RECHECK_BUTTON => {
                    print_event(&Event::ButtonPressed { button }, format);
                    acquisition.request_recheck();
                }
                Some(event) => print_event(&event, format),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            _ = &mut deadline => break,
        }
    }

    if let Err(e) = acquisition.stop(STOP_TIMEOUT).await {
        warn!("{}", e);
    }
    if let Some(buttons) = buttons {
        if let Err(e) = buttons.stop(STOP_TIMEOUT).await {
            warn!(target: "gpio", "{}", e);
        }
    }
    Ok(())
}

fn print_table_header() {
    let mut header = format!("{:>6}", "#");
    for ch in 1..=CHANNEL_COUNT {
        header.push_str(&format!("{:>9}", format!("CH{}", ch)));
    }
    println!("{}", header.bright_white().bold());
}

fn print_event(event: &Event, format: &str) {
    match format {
        "json" => match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        },
        "compact" => print_event_compact(event),
        _ => print_event_table(event),
    }
}

fn print_event_compact(event: &Event) {
    match event {
        Event::ReadingsReady { sweep } => {
            let values: Vec<String> = sweep
                .values
                .iter()
                .map(|v| if v.is_finite() { format!("{:.1}", v) } else { "-".to_string() })
                .collect();
            println!("{} {}", sweep.timestamp_ms, values.join(","));
        }
        Event::SourceSelected { source, .. } => println!("source={}", source),
        Event::ConnectivityChanged { unplugged, .. } => println!("unplugged={:?}", unplugged.as_slice()),
        Event::ButtonPressed { button } => println!("button={}", button),
        _ => {}
    }
}

fn print_event_table(event: &Event) {
    match event {
        Event::SourceSelected { source, fallback_reason } => {
            println!("{} Source: {}", "✅".green(), source.to_string().bright_cyan());
            if let Some(reason) = fallback_reason {
                println!("{} No card: {}", "💡".yellow(), reason.dimmed());
            }
        }
        Event::SourceInfo { message } => println!("{} {}", "ℹ️".bright_blue(), message),
        Event::ReadingsReady { sweep } => {
            let mut row = format!("{:>6}", sweep.sequence);
            for value in sweep.values.iter() {
                let cell = if value.is_finite() {
                    format!("{:>8.1}°", value).normal()
                } else {
                    format!("{:>9}", "---").red()
                };
                row.push_str(&cell.to_string());
            }
            println!("{}", row);
        }
        Event::ReadingError { channel, message } => {
            println!("{} CH{} read failed: {}", "⚠️".yellow(), channel, message.bright_red());
        }
        Event::ConnectivityChanged { unplugged, connected, disconnected } => {
            for ch in connected {
                println!("{} CH{} connected", "🔌".green(), ch);
            }
            for ch in disconnected {
                println!("{} CH{} unplugged", "🔌".red(), ch);
            }
            println!("{} Unplugged: {:?}", "📋".bright_white(), unplugged.as_slice());
        }
        Event::CheckComplete => {}
        Event::ButtonPressed { button } => println!("{} Button {}", "🔘".bright_cyan(), button),
    }
}

fn handle_read(board: &dyn BoardOps, channel: u8, format: &str) -> CliResult {
    let celsius = board.temperature(channel)?;
    let millivolts = board.millivolts(channel)?;
    let sensor_type = board.sensor_type(channel)?;
    // Cross-check against the K-type table; meaningless for other types
    let k_type = if sensor_type == SensorType::K {
        conversion::mv_to_celsius(millivolts).ok()
    } else {
        None
    };

    match format {
        "json" => println!(
            "{}",
            serde_json::json!({
                "channel": channel,
                "type": sensor_type,
                "temperature_c": celsius,
                "millivolts": millivolts,
                "k_type_c": k_type,
                "unplugged": millivolts == 0.0,
            })
        ),
        "compact" => println!("CH{} {:.1} {:.2}", channel, celsius, millivolts),
        _ => {
            println!("{} {}", "🌡️".bright_blue(), format!("Channel {} (Type {})", channel, sensor_type).bright_blue().bold());
            println!("{} {:.1} °C", "Temperature:".bright_white(), celsius);
            println!("{} {:.2} mV", "Voltage:".bright_white(), millivolts);
            if let Some(k) = k_type {
                println!("{} {:.1} °C", "K-type from mV:".bright_white(), k);
            }
            if millivolts == 0.0 {
                println!("{} {}", "⚠️".yellow(), "Reads 0.00 mV, thermocouple looks unplugged".yellow());
            }
        }
    }
    Ok(())
}

fn handle_convert(millivolts: f64, format: &str) -> CliResult {
    let celsius = conversion::mv_to_celsius(millivolts)?;
    match format {
        "json" => println!("{}", serde_json::json!({ "millivolts": millivolts, "celsius": celsius })),
        "compact" => println!("{:.2}", celsius),
        _ => println!("{} {:.3} mV = {} °C", "✅".green(), millivolts, format!("{:.2}", celsius).bright_cyan()),
    }
    Ok(())
}

fn handle_diag(board: &dyn BoardOps, format: &str) -> CliResult {
    let diag_temperature = board.diag_temperature()?;
    let supply = board.supply_voltage()?;
    let mut channels = Vec::with_capacity(CHANNEL_COUNT);
    for ch in 1..=CHANNEL_COUNT as u8 {
        channels.push((ch, board.sensor_type(ch).ok(), board.thermistor(ch).ok()));
    }

    match format {
        "json" => {
            let channels: Vec<_> = channels
                .iter()
                .map(|(ch, t, th)| serde_json::json!({ "channel": ch, "type": t, "thermistor_c": th }))
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "revision": board.revision(),
                    "diag_temperature_c": diag_temperature,
                    "supply_v": supply,
                    "channels": channels,
                })
            );
        }
        "compact" => println!("rev={} temp={:.1} supply={:.2}", board.revision(), diag_temperature, supply),
        _ => {
            println!("{}", "🩺 SM-TC Diagnostics".bright_blue().bold());
            println!("{} {}", "Revision:".bright_white(), board.revision());
            println!("{} {:.1} °C", "Board temperature:".bright_white(), diag_temperature);
            let supply_str = format!("{:.2} V", supply);
            let supply_str = if (4.75..=5.25).contains(&supply) { supply_str.green() } else { supply_str.yellow() };
            println!("{} {}", "5V supply:".bright_white(), supply_str);
            for (ch, sensor_type, thermistor) in channels {
                let t = sensor_type.map(|t| t.to_string()).unwrap_or_else(|| "?".into());
                let th = thermistor.map(|v| format!("{:.1} °C", v)).unwrap_or_else(|| "n/a".into());
                println!("  CH{}  type {}  cold junction {}", ch, t, th);
            }
        }
    }
    Ok(())
}

fn handle_set_type(board: &dyn BoardOps, channel: u8, sensor_type: SensorType) -> CliResult {
    board.set_sensor_type(channel, sensor_type)?;
    println!("{} CH{} set to Type {}", "✅".green(), channel, sensor_type.to_string().bright_cyan());
    Ok(())
}
