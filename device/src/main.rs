use chrono::Local;
use clap::Parser;
use common::{Config, DiscoveryConfig, Result};
use device::commands::{self, Command};
use device::discovery::UdpAdapter;
use device::node::RoomNode;
use device::repository::JsonRepository;
use device::Role;
use env_logger::fmt::Color;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use room::RoomRepository;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const BANNER: &str = r#"
╔═══════════════════════════════════════════════════════════════════╗
║                                                                   ║
║    ██████╗  ██████╗  ██████╗ ███╗   ███╗                          ║
║    ██╔══██╗██╔═══██╗██╔═══██╗████╗ ████║                          ║
║    ██████╔╝██║   ██║██║   ██║██╔████╔██║                          ║
║    ██╔══██╗██║   ██║██║   ██║██║╚██╔╝██║                          ║
║    ██║  ██║╚██████╔╝╚██████╔╝██║ ╚═╝ ██║                          ║
║    ╚═╝  ╚═╝ ╚═════╝  ╚═════╝ ╚═╝     ╚═╝                          ║
║                                                                   ║
║    Assistance Room Device v0.1.0                                  ║
╚═══════════════════════════════════════════════════════════════════╝
"#;

fn setup_logger() {
    let mut builder = Builder::from_default_env();

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut target_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} [{}] {}",
                timestamp_style.set_color(Color::Rgb(100, 100, 100)).value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                target_style.set_color(Color::Blue).value(record.target()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[derive(Parser)]
struct Args {
    /// Name shown to the rooms this device listens to
    #[arg(long)]
    name: Option<String>,

    #[arg(long, value_enum, default_value = "both")]
    role: Role,

    #[arg(long)]
    port: Option<u16>,

    /// Path of the local data file
    #[arg(long)]
    data: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();

    println!("{}", BANNER);

    let args = Args::parse();
    let config = Config::load()?;
    let mut discovery_config = DiscoveryConfig::from_env()?;
    if let Some(port) = args.port {
        discovery_config.port = port;
    }
    let data_path = args.data.unwrap_or(config.data_path);
    info!("Configuration loaded, role {}", args.role.as_str());

    let repository = Arc::new(JsonRepository::open(&data_path, args.name.as_deref()).await?);
    let app_id = repository.current_app_id().await?;
    info!("App ID: {}", app_id);
    info!("Name: {}", repository.current_name().await?);

    let adapter = UdpAdapter::bind(&config.bind_address, app_id, &discovery_config).await?;
    let adapter = Arc::new(adapter);
    info!("Bound to {}", adapter.local_addr()?);

    let node = RoomNode::new(adapter, repository, discovery_config, args.role).await?;
    let running = node.start()?;
    println!("{}", commands::USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // stdin closed: keep serving until interrupted
                        let _ = tokio::signal::ctrl_c().await;
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(usage) => {
                        println!("{}", usage);
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                match commands::execute(running.store(), command).await {
                    Ok(output) => println!("{}", output),
                    Err(e) if e.is_configuration() => {
                        error!("Room service misconfigured: {}", e);
                        running.shutdown().await;
                        return Err(e);
                    }
                    Err(e) => error!("Command failed: {}", e),
                }
            }
        }
    }

    running.shutdown().await;
    Ok(())
}
