//! CI-V control utility
//! Sends one command to an Icom radio described by a JSON config file

use civ_rs::civ::{Filter, Mode, OperatingMode};
use civ_rs::core::{Bank, Channel, MemoryAddress, RadioConfig, TuningMode, Vfo};
use civ_rs::drivers::{list_models, CivRadio};
use civ_rs::serial::list_ports;
use std::env;
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <config.json> <command> [value]", program);
    eprintln!("       {} models | ports", program);
    eprintln!("\nCommands:");
    eprintln!("  power on|off");
    eprintln!("  vfo [a|b]             select VFO mode, optionally VFO A or B");
    eprintln!("  memory                select memory mode");
    eprintln!("  bank <A-E>");
    eprintln!("  channel <bank> <n>    n is 1-99 or 1A,1B,2A,2B,3A,3B,144-C1,144-C2,430-C1,430-C2");
    eprintln!("  freq [hz]             read, or set, the operating frequency");
    eprintln!("  mode [name [filter]]  read, or set, the operating mode");
    eprintln!("  tx [on|off]           read, or set, transmit");
    eprintln!("\nExample: {} ic7100.json freq 146520000", program);
    std::process::exit(1);
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_log::LogTracer::init()?;

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn parse_on_off(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        other => anyhow::bail!("Expected on or off, got {}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("civ-ctl");

    match args.get(1).map(String::as_str) {
        Some("models") => {
            for model in list_models() {
                let modes: Vec<String> = model.modes.iter().map(|m| m.to_string()).collect();
                println!("{:<8} {:#04x}  {}", model.name, model.address, modes.join(" "));
            }
            return Ok(());
        }
        Some("ports") => {
            for port in list_ports()? {
                println!("{}", port);
            }
            return Ok(());
        }
        Some(_) if args.len() >= 3 => {}
        _ => usage(program),
    }

    let config = RadioConfig::load(&args[1])?;
    let command = args[2].as_str();
    let values = &args[3..];

    tracing::info!("Radio: {} on {}", config.model, config.port);

    let mut radio = CivRadio::from_config(config)?;
    radio.connect()?;

    match (command, values) {
        ("power", [state]) => {
            let on = parse_on_off(state)?;
            radio.power(on).await?;
            println!("Power {}", radio.power_state());
        }
        ("vfo", []) => radio.select_vfo_or_memory(TuningMode::Vfo).await?,
        ("vfo", [vfo]) => {
            let vfo: Vfo = vfo.parse().map_err(anyhow::Error::msg)?;
            radio.select_vfo(vfo).await?;
        }
        ("memory", []) => radio.select_vfo_or_memory(TuningMode::Memory).await?,
        ("bank", [bank]) => radio.select_memory_bank(bank.parse::<Bank>()?).await?,
        ("channel", [bank, channel]) => {
            let addr = MemoryAddress::new(bank.parse::<Bank>()?, channel.parse::<Channel>()?)?;
            radio.select_memory_channel(addr).await?;
            println!("Memory {}", addr);
        }
        ("freq", []) => println!("{}", radio.get_frequency().await?),
        ("freq", [hz]) => radio.set_frequency(hz.parse()?).await?,
        ("mode", []) => println!("{}", radio.get_mode().await?),
        ("mode", [name, rest @ ..]) if rest.len() <= 1 => {
            let mode: Mode = name.parse().map_err(anyhow::Error::msg)?;
            let mode = match rest.first() {
                Some(filter) => OperatingMode::with_filter(mode, Filter::from_code(filter.parse()?)),
                None => OperatingMode::new(mode),
            };
            radio.set_mode(mode).await?;
        }
        ("tx", []) => {
            let on = radio.is_transmitting().await?;
            println!("{}", if on { "TX" } else { "RX" });
        }
        ("tx", [state]) => radio.transmit(parse_on_off(state)?).await?,
        _ => {
            radio.disconnect()?;
            usage(program);
        }
    }

    radio.disconnect()?;
    Ok(())
}
