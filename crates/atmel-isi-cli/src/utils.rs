// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use atmel_isi::{
    buffer::CompletedBuffer,
    device::{Isi, IsiConfig},
    format::MbusCode,
    fourcc::FourCC,
    sim::{SimSensor, SimulatedIsi},
};
use clap::Args as ClapArgs;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

/// Simulated sensor options shared by every subcommand.
#[derive(ClapArgs, Debug, Clone)]
pub struct SensorArgs {
    /// Media-bus codes the sensor offers, comma separated
    #[arg(long, default_value = "YUYV8_2X8,UYVY8_2X8,RGB565_2X8_LE,Y8_1X8")]
    pub codes: String,

    /// Largest sensor output in WxH format
    #[arg(long, default_value = "1280x960")]
    pub sensor_size: String,

    /// Sensor always answers with its largest output size
    #[arg(long)]
    pub fixed_size: bool,
}

impl SensorArgs {
    pub fn build(&self) -> Result<SimSensor, CliError> {
        let codes = parse_codes(&self.codes)?;
        let (width, height) = parse_resolution(&self.sensor_size)?;
        let sensor = SimSensor::new(codes, width, height);
        Ok(if self.fixed_size {
            sensor.with_fixed_size()
        } else {
            sensor
        })
    }
}

/// Simulated controller wired to a completion channel.
pub struct Controller {
    pub hw: Arc<SimulatedIsi>,
    pub isi: Arc<Isi<SimulatedIsi>>,
    pub done: mpsc::Receiver<CompletedBuffer>,
}

/// Brings up the simulated controller with `sensor` attached.
pub fn open_controller(sensor: SimSensor) -> Result<Controller, CliError> {
    let config = IsiConfig::default();
    let table = config.descriptor_table();
    let hw = Arc::new(SimulatedIsi::new(table.clone()));
    let (tx, done) = mpsc::channel();
    let isi = Arc::new(Isi::new(hw.clone(), table, config, tx)?);
    hw.connect(&isi);
    isi.attach(Box::new(sensor))?;
    log::debug!("Simulated ISI ready");
    Ok(Controller { hw, isi, done })
}

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a FOURCC string such as "YUYV" or "RGBP"
pub fn parse_fourcc(s: &str) -> Result<FourCC, CliError> {
    s.parse::<FourCC>().map_err(CliError::from)
}

/// Parse a comma separated list of media-bus code names
pub fn parse_codes(s: &str) -> Result<Vec<MbusCode>, CliError> {
    let codes = s
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            MbusCode::from_name(name)
                .ok_or_else(|| CliError::InvalidArgs(format!("Unknown media-bus code: {}", name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if codes.is_empty() {
        return Err(CliError::InvalidArgs(
            "Sensor needs at least one media-bus code".to_string(),
        ));
    }
    Ok(codes)
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_valid() {
        assert_eq!(parse_resolution("640x480").unwrap(), (640, 480));
        assert_eq!(parse_resolution("2048x2048").unwrap(), (2048, 2048));
        assert_eq!(parse_resolution("1280*960").unwrap(), (1280, 960));
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("640x").is_err());
        assert!(parse_resolution("x480").is_err());
        assert!(parse_resolution("640x480x2").is_err());
        assert!(parse_resolution("0x0").is_err());
        assert!(parse_resolution("-640x480").is_err());
    }

    #[test]
    fn test_parse_fourcc() {
        assert_eq!(parse_fourcc("YUYV").unwrap(), FourCC::YUYV);
        assert_eq!(parse_fourcc("RGBP").unwrap(), FourCC::RGB565);
        assert!(matches!(
            parse_fourcc("YUY"),
            Err(CliError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!(
            parse_codes("yuyv8_2x8, RGB565_2X8_LE").unwrap(),
            vec![MbusCode::YUYV8_2X8, MbusCode::RGB565_2X8_LE]
        );
        assert!(parse_codes("").is_err());
        assert!(parse_codes("YUYV8_2X8,BOGUS").is_err());
    }

    #[test]
    fn test_sensor_args_build() {
        let args = SensorArgs {
            codes: "UYVY8_2X8".to_string(),
            sensor_size: "800x600".to_string(),
            fixed_size: true,
        };
        let sensor = args.build().unwrap();
        assert_eq!(sensor.max_size(), (800, 600));
    }
}
