use agvmon::classify::{Classifier, Severity};
use agvmon::config::MonitorConfig;
use agvmon::projector::{AgvView, BatteryLevel, ViewProjector};
use agvmon::record::CommunicationId;
use agvmon::server::decode_event;
use clap::{App, Arg};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "3001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("agvmon-view")
        .version(env!("CARGO_PKG_VERSION"))
        .about("📺 AGV Fleet Viewer - live per-vehicle status from an agvmon server")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Monitor host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Monitor port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .validator(|v| match v.parse::<u16>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Port must be a number in 0-65535".into()),
                }),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("agv")
                .short("a")
                .long("agv")
                .value_name("ID")
                .help("Communication id to display (repeatable)")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .validator(|v| match v.parse::<CommunicationId>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("AGV id must be a number".into()),
                }),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("TOML file with fault and location table overrides")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("once")
                .long("once")
                .help("Exit after the first snapshot"),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;
    let format = matches.value_of("format").unwrap_or("table");
    let once = matches.is_present("once");

    let vehicles: Vec<CommunicationId> = match matches.values_of("agv") {
        Some(values) => values.filter_map(|v| v.parse().ok()).collect(),
        None => vec![1, 2, 3],
    };

    let classifier = match matches.value_of("config") {
        Some(path) => MonitorConfig::from_file(path)?.classifier()?,
        None => Classifier::builtin(),
    };

    let stream = match TcpStream::connect((host, port)).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{} Failed to connect to agvmon at {}:{}", "❌".red(), host, port);
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "agvmon --config agvmon.toml".bright_cyan());
            }
            return Err(e.into());
        }
    };

    if format == "table" {
        println!("{}", "🚚 AGV Fleet Viewer".bright_blue().bold());
        println!("{} {}:{}", "Connected to".dimmed(), host, port);
    }

    let mut projector = ViewProjector::new(classifier, vehicles);
    let mut lines = BufReader::new(stream).lines();

    while let Some(line) = lines.next_line().await? {
        let snapshot = match decode_event(&line) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                eprintln!("{} {}", "⚠️".yellow(), e);
                continue;
            }
        };

        let views = projector.apply(&snapshot);
        match format {
            "json" => println!("{}", serde_json::to_string(&views)?),
            "compact" => {
                for view in &views {
                    print_compact(view);
                }
            }
            _ => print_table(&views),
        }

        if once {
            break;
        }
    }

    Ok(())
}

fn print_compact(view: &AgvView) {
    if !view.available {
        println!("AGV {} {}", view.communication_id, "UNKNOWN".dimmed());
        return;
    }
    println!(
        "AGV {} {} battery={} route={} point={} fault={}",
        view.communication_id,
        "AVAILABLE".bright_green(),
        view.battery,
        view.route,
        view.point,
        view.fault.severity
    );
}

fn print_table(views: &[AgvView]) {
    println!("{}", "┌──────┬───────────┬─────────┬───────────┬─────────┬───────┬───────┬──────────────┬──────────────────────────────────┐".bright_white());
    println!("{}", "│ AGV  │ State     │ Enabled │ Link      │ Battery │ Route │ Point │ Location     │ Fault                            │".bright_white());
    println!("{}", "├──────┼───────────┼─────────┼───────────┼─────────┼───────┼───────┼──────────────┼──────────────────────────────────┤".bright_white());

    for view in views {
        if !view.available {
            println!(
                "│ {:<4} │ {} │ {:<7} │ {:<9} │ {:<7} │ {:<5} │ {:<5} │ {:<12} │ {:<32} │",
                view.communication_id,
                format!("{:<9}", "UNKNOWN").dimmed(),
                "-",
                "-",
                "-",
                "-",
                "-",
                "-",
                "-"
            );
            continue;
        }

        let battery = format!("{:<7}", view.battery_text());
        let battery = match view.battery_level {
            BatteryLevel::High => battery.bright_green(),
            BatteryLevel::Medium => battery.yellow(),
            BatteryLevel::Low => battery.bright_red(),
            BatteryLevel::Unknown => battery.dimmed(),
        };

        let fault = format!("{:<32}", truncate(&view.fault.message, 32));
        let fault = match view.fault.severity {
            Severity::None => fault.normal(),
            Severity::Informative => fault.bright_blue(),
            Severity::Warning => fault.yellow(),
            Severity::Halting => fault.bright_red().bold(),
        };

        let link = if view.connected {
            format!("{:<9}", "connected").bright_green()
        } else {
            format!("{:<9}", "offline").bright_red()
        };

        println!(
            "│ {:<4} │ {} │ {:<7} │ {} │ {} │ {:<5} │ {:<5} │ {:<12} │ {} │",
            view.communication_id,
            format!("{:<9}", "AVAILABLE").bright_green(),
            if view.enabled { "yes" } else { "no" },
            link,
            battery,
            view.route.to_string(),
            view.point.to_string(),
            truncate(&view.location, 12),
            fault
        );
    }

    println!("{}", "└──────┴───────────┴─────────┴───────────┴─────────┴───────┴───────┴──────────────┴──────────────────────────────────┘".bright_white());
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
