//! Bench tool for MCP4728 DACs on a Linux board.
//!
//! ```text
//! $ mcp4728ctl scan
//! $ mcp4728ctl --dac dac1 bring-up
//! $ mcp4728ctl write 4095 2048 1024 0 --latch
//! $ RUST_LOG=debug mcp4728ctl sweep --points 128 --periods 10
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use linux_embedded_hal::{Delay, I2cdev};
use log::{debug, info};

use mcp4728_bench::control::latch_outputs;
use mcp4728_bench::linux::gpio::{self, Backend};
use mcp4728_bench::linux::{open_bus, parse_address, DacSettings, Settings};
use mcp4728_bench::scan::{probe, scan, scan_default, FIRST_ADDRESS, LAST_ADDRESS};
use mcp4728_bench::waveform::SineSweep;
use mcp4728_bench::{
    AddressChangeReport, AddressChangeTiming, Channel, ChannelRegisters, ChannelState, GainMode,
    OutputEnableMode, PowerDownMode, Presence, VoltageReferenceMode, DEFAULT_ADDRESS, MCP4728,
};

const LATCH_PULSE_US: u32 = 10;
const DEFAULT_DAC: &str = "dac0";

#[derive(Debug, Parser)]
#[command(name = "mcp4728ctl", version, about = "Probe an I2C bus and drive MCP4728 DACs")]
struct Cli {
    /// Board settings file (TOML).
    #[arg(long, env = "MCP4728_CONFIG")]
    config: Option<PathBuf>,
    /// I2C device, overriding the settings file.
    #[arg(long)]
    bus: Option<PathBuf>,
    /// GPIO backend, overriding the settings file.
    #[arg(long, value_enum)]
    backend: Option<GpioBackend>,
    /// Which DAC from the settings to talk to [default: dac0].
    #[arg(long)]
    dac: Option<String>,
    /// Talk to this address instead of the one in the settings.
    #[arg(long, value_parser = address_arg)]
    address: Option<u8>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print an i2cdetect-style map of the bus.
    Scan {
        #[arg(long, value_parser = address_arg, default_value_t = FIRST_ADDRESS)]
        first: u8,
        #[arg(long, value_parser = address_arg, default_value_t = LAST_ADDRESS)]
        last: u8,
    },
    /// Check whether a single address answers.
    Probe {
        #[arg(value_parser = address_arg)]
        address: u8,
    },
    /// Reprogram the address bits of the selected DAC.
    SetAddress {
        /// New address (0x60-0x67).
        #[arg(long, value_parser = address_arg)]
        to: u8,
        /// Current address; defaults to the selected DAC's address.
        #[arg(long, value_parser = address_arg)]
        from: Option<u8>,
        #[arg(long, default_value_t = 100)]
        ready_timeout_ms: u32,
    },
    /// Write all four channels at once (fast write).
    Write {
        #[arg(value_parser = clap::value_parser!(u16).range(0..=4095))]
        a: u16,
        #[arg(value_parser = clap::value_parser!(u16).range(0..=4095))]
        b: u16,
        #[arg(value_parser = clap::value_parser!(u16).range(0..=4095))]
        c: u16,
        #[arg(value_parser = clap::value_parser!(u16).range(0..=4095))]
        d: u16,
        /// Hold LDAC high during the write and pulse it afterwards.
        #[arg(long)]
        latch: bool,
    },
    /// Write one channel's configuration and value, to both input register and EEPROM.
    SetChannel {
        channel: Channel,
        #[arg(value_parser = clap::value_parser!(u16).range(0..=4095))]
        value: u16,
        #[arg(long, value_enum, default_value_t = Vref::Internal)]
        vref: Vref,
        #[arg(long, value_enum, default_value_t = Gain::X1)]
        gain: Gain,
        #[arg(long, value_enum, default_value_t = PowerDown::Normal)]
        power_down: PowerDown,
        /// Leave the analog output alone until LDAC or a software update.
        #[arg(long)]
        no_update: bool,
    },
    /// Dump input and EEPROM registers of every channel.
    Read,
    /// Stream a four-phase sine wave until interrupted.
    Sweep {
        /// Samples per period.
        #[arg(long, default_value_t = 64)]
        points: u32,
        /// Pause between frames.
        #[arg(long, default_value_t = 1000)]
        interval_us: u64,
        /// Stop after this many periods.
        #[arg(long)]
        periods: Option<u32>,
        #[arg(long, default_value_t = 2047)]
        amplitude: u16,
        #[arg(long, default_value_t = 2048)]
        midpoint: u16,
    },
    /// Send a general call command to every MCP4728 on the bus.
    GeneralCall {
        #[arg(value_enum)]
        kind: GeneralCall,
    },
    /// Scan, move a factory-default DAC to its configured address, and verify.
    ///
    /// Without `--dac`, the first DAC configured away from the default address is used.
    BringUp {
        /// Target address; defaults to the chosen DAC's address.
        #[arg(long, value_parser = address_arg)]
        to: Option<u8>,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum GpioBackend {
    Cdev,
    Sysfs,
    Rppal,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Vref {
    External,
    Internal,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Gain {
    X1,
    X2,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum PowerDown {
    Normal,
    #[value(name = "1k")]
    OneK,
    #[value(name = "100k")]
    OneHundredK,
    #[value(name = "500k")]
    FiveHundredK,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum GeneralCall {
    Reset,
    WakeUp,
    SoftwareUpdate,
}

fn address_arg(text: &str) -> std::result::Result<u8, String> {
    parse_address(text).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(bus) = cli.bus {
        settings.bus = bus;
    }
    if let Some(backend) = cli.backend {
        settings.gpio.backend = backend.into();
    }
    debug!("settings: {settings:?}");

    let dac_name = cli.dac.as_deref().unwrap_or(DEFAULT_DAC);
    let selected = || -> Result<(DacSettings, u8)> {
        let dac = settings.dac(dac_name)?.clone();
        let address = cli.address.unwrap_or(dac.address);
        Ok((dac, address))
    };
    let mut i2c = open_bus(&settings.bus)?;

    match cli.command {
        Command::Scan { first, last } => {
            println!("Scanning {}...", settings.bus.display());
            let map = scan(&mut i2c, first..=last);
            print!("{map}");
            let found: Vec<String> = map.present().map(|a| format!("{a:#04x}")).collect();
            println!("{} device(s) found: {}", map.len(), found.join(" "));
        }
        Command::Probe { address } => match probe(&mut i2c, address) {
            Presence::Present => println!("device found at {address:#04x}"),
            Presence::Absent => println!("no device at {address:#04x}"),
            Presence::Faulted(kind) => bail!("probe of {address:#04x} failed: {kind:?}"),
        },
        Command::SetAddress {
            to,
            from,
            ready_timeout_ms,
        } => {
            let (dac_settings, address) = selected()?;
            let timing = AddressChangeTiming {
                ready_timeout_ms,
                ..AddressChangeTiming::default()
            };
            let mut dac = MCP4728::new(i2c, from.unwrap_or(address));
            let report = change_address(&mut dac, to, &settings, &dac_settings, &timing)?;
            if !report.moved() {
                bail!("device did not move to {to:#04x}");
            }
        }
        Command::Write {
            a,
            b,
            c,
            d,
            latch,
        } => {
            let (dac_settings, address) = selected()?;
            let mut dac = MCP4728::new(i2c, address);
            if latch {
                let mut ldac = gpio::output(&settings.gpio, dac_settings.ldac_line()?)?;
                dac.fast_write(a, b, c, d)?;
                latch_outputs(&mut ldac, &mut Delay, LATCH_PULSE_US)?;
            } else {
                dac.fast_write(a, b, c, d)?;
            }
            info!("wrote [{a}, {b}, {c}, {d}] to {address:#04x}");
        }
        Command::SetChannel {
            channel,
            value,
            vref,
            gain,
            power_down,
            no_update,
        } => {
            let (_, address) = selected()?;
            let state = ChannelState::new()
                .voltage_reference_mode(vref.into())
                .gain_mode(gain.into())
                .power_down_mode(power_down.into())
                .value(value);
            let output_enable_mode = if no_update {
                OutputEnableMode::NoUpdate
            } else {
                OutputEnableMode::Update
            };
            MCP4728::new(i2c, address).single_write(channel, output_enable_mode, &state)?;
            info!("channel {channel} of {address:#04x} set to {state:?}");
        }
        Command::Read => {
            let (_, address) = selected()?;
            let registers = MCP4728::new(i2c, address).read()?;
            println!("MCP4728 at {address:#04x}");
            for channel in Channel::ALL {
                let (input, eeprom) = registers.channel(channel);
                println!("  {channel} input:  {}", describe(input));
                println!("  {channel} eeprom: {}", describe(eeprom));
            }
        }
        Command::Sweep {
            points,
            interval_us,
            periods,
            amplitude,
            midpoint,
        } => {
            let (_, address) = selected()?;
            sweep(
                MCP4728::new(i2c, address),
                SineSweep::new(points)
                    .amplitude(amplitude)
                    .midpoint(midpoint),
                Duration::from_micros(interval_us),
                periods,
            )?;
        }
        Command::GeneralCall { kind } => {
            let (_, address) = selected()?;
            let mut dac = MCP4728::new(i2c, address);
            match kind {
                GeneralCall::Reset => dac.general_call_reset()?,
                GeneralCall::WakeUp => dac.general_call_wake_up()?,
                GeneralCall::SoftwareUpdate => dac.general_call_software_update()?,
            }
            info!("general call {kind:?} sent");
        }
        Command::BringUp { to } => {
            let (dac_settings, to) = settings.bring_up_target(cli.dac.as_deref(), to)?;
            bring_up(i2c, to, &settings, dac_settings)?;
        }
    }
    Ok(())
}

fn change_address(
    dac: &mut MCP4728<I2cdev>,
    to: u8,
    settings: &Settings,
    dac_settings: &DacSettings,
    timing: &AddressChangeTiming,
) -> Result<AddressChangeReport> {
    let mut ldac = gpio::output(&settings.gpio, dac_settings.ldac_line()?)
        .context("requesting LDAC line")?;
    let mut rdy =
        gpio::input(&settings.gpio, dac_settings.rdy_line()?).context("requesting RDY line")?;
    let from = dac.address();
    let report = dac
        .change_address(to, &mut ldac, &mut rdy, &mut Delay, timing)
        .with_context(|| format!("changing address {from:#04x} -> {to:#04x}"))?;
    println!(
        "RDY before: {:?}, after: {:?}",
        report.ready_before, report.ready_after
    );
    println!(
        "old address {:#04x}: {}",
        report.old_address,
        if report.old_present { "still answers" } else { "free" }
    );
    println!(
        "new address {:#04x}: {}",
        report.new_address,
        if report.new_present { "answers" } else { "silent" }
    );
    Ok(report)
}

fn bring_up(
    mut i2c: I2cdev,
    to: u8,
    settings: &Settings,
    dac_settings: &DacSettings,
) -> Result<()> {
    let map = scan_default(&mut i2c);
    print!("{map}");
    println!("Scan completed.");

    let mut dac = MCP4728::new(i2c, DEFAULT_ADDRESS);
    if to == DEFAULT_ADDRESS {
        println!("target is the default address {to:#04x}, leaving the EEPROM alone");
    } else if map.is_present(DEFAULT_ADDRESS) {
        println!("MCP4728 found at {DEFAULT_ADDRESS:#04x}");
        let report = change_address(
            &mut dac,
            to,
            settings,
            dac_settings,
            &AddressChangeTiming::default(),
        )?;
        if report.moved() {
            println!("address changed to {to:#04x}");
        } else {
            println!("failed to change address to {to:#04x}");
        }
    } else {
        println!("no device at {DEFAULT_ADDRESS:#04x}");
    }

    if probe(dac.bus(), to).is_present() {
        println!("MCP4728 found at {to:#04x}");
        Ok(())
    } else {
        bail!("no device at {to:#04x}")
    }
}

fn sweep(
    mut dac: MCP4728<I2cdev>,
    waveform: SineSweep,
    interval: Duration,
    periods: Option<u32>,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))
        .context("installing SIGINT handler")?;

    let frames = periods.map_or(usize::MAX, |periods| {
        periods as usize * waveform.points() as usize
    });
    info!(
        "sweeping {} points per period at {:?} per frame, ctrl-c to stop",
        waveform.points(),
        interval
    );
    let mut written = 0usize;
    for frame in waveform.take(frames) {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        dac.write_frame(frame)?;
        written += 1;
        thread::sleep(interval);
    }
    info!("wrote {written} frames");
    Ok(())
}

fn describe(registers: &ChannelRegisters) -> String {
    let state = &registers.channel_state;
    format!(
        "value={:#06x} vref={:?} gain={:?} power-down={:?} rdy={:?} por={:?}",
        state.value,
        state.voltage_reference_mode,
        state.gain_mode,
        state.power_down_mode,
        registers.ready_state,
        registers.power_state
    )
}

impl From<GpioBackend> for Backend {
    fn from(backend: GpioBackend) -> Self {
        match backend {
            GpioBackend::Cdev => Backend::Cdev,
            GpioBackend::Sysfs => Backend::Sysfs,
            GpioBackend::Rppal => Backend::Rppal,
        }
    }
}

impl From<Vref> for VoltageReferenceMode {
    fn from(vref: Vref) -> Self {
        match vref {
            Vref::External => VoltageReferenceMode::External,
            Vref::Internal => VoltageReferenceMode::Internal,
        }
    }
}

impl From<Gain> for GainMode {
    fn from(gain: Gain) -> Self {
        match gain {
            Gain::X1 => GainMode::TimesOne,
            Gain::X2 => GainMode::TimesTwo,
        }
    }
}

impl From<PowerDown> for PowerDownMode {
    fn from(power_down: PowerDown) -> Self {
        match power_down {
            PowerDown::Normal => PowerDownMode::Normal,
            PowerDown::OneK => PowerDownMode::PowerDownOneK,
            PowerDown::OneHundredK => PowerDownMode::PowerDownOneHundredK,
            PowerDown::FiveHundredK => PowerDownMode::PowerDownFiveHundredK,
        }
    }
}
