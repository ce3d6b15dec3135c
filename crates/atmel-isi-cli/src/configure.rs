// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils::{self, SensorArgs};
use atmel_isi::{
    device::{InterfaceConfig, PixFormat},
    regs::Register,
};
use clap::Args as ClapArgs;
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    sensor: SensorArgs,

    /// Requested output resolution in WxH format
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Requested output pixel format FOURCC
    #[arg(short, long, default_value = "YUYV")]
    format: String,

    /// Only adjust the format, do not program the controller
    #[arg(long)]
    try_only: bool,
}

#[derive(Debug, Serialize)]
struct ConfigureOutput {
    requested: String,
    format: FormatInfo,

    #[serde(skip_serializing_if = "Option::is_none")]
    interface: Option<InterfaceInfo>,
}

#[derive(Debug, Serialize)]
struct FormatInfo {
    width: u32,
    height: u32,
    fourcc: String,
    field: String,
    colorspace: String,
    bytes_per_line: u32,
    size_image: usize,
}

impl From<&PixFormat> for FormatInfo {
    fn from(pix: &PixFormat) -> Self {
        FormatInfo {
            width: pix.width,
            height: pix.height,
            fourcc: pix.fourcc.to_string(),
            field: pix.field.to_string(),
            colorspace: pix.colorspace.to_string(),
            bytes_per_line: pix.bytes_per_line,
            size_image: pix.size_image,
        }
    }
}

#[derive(Debug, Serialize)]
struct InterfaceInfo {
    path: String,
    sensor_code: String,
    sensor_width: u32,
    sensor_height: u32,
    ycc_swap: String,
    decimation: u32,
    bus_flags: String,
    registers: Vec<RegisterValue>,
}

#[derive(Debug, Serialize)]
struct RegisterValue {
    name: String,
    offset: u32,
    value: u32,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing configure command: {:?}", args);

    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let fourcc = utils::parse_fourcc(&args.format)?;
    let mut pix = PixFormat::new(width, height, fourcc);
    let requested = pix.to_string();

    let controller = utils::open_controller(args.sensor.build()?)?;
    let isi = &controller.isi;

    let interface = if args.try_only {
        isi.try_format(&mut pix)?;
        None
    } else {
        let flags = isi.set_bus_param()?;
        isi.set_format(&mut pix)?;
        let current = isi
            .current()
            .ok_or_else(|| CliError::General("format not applied".to_string()))?;
        Some(interface_info(&current, &flags.to_string(), |reg| {
            controller.hw.register(reg)
        }))
    };
    log::info!("Negotiated {} for requested {}", pix, requested);

    let output = ConfigureOutput {
        requested,
        format: FormatInfo::from(&pix),
        interface,
    };

    if json {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn interface_info<F: Fn(Register) -> u32>(
    current: &InterfaceConfig,
    bus_flags: &str,
    read: F,
) -> InterfaceInfo {
    let registers = [
        Register::Cfg1,
        Register::Cfg2,
        Register::Psize,
        Register::Pdecf,
    ]
    .into_iter()
    .map(|reg| RegisterValue {
        name: reg.name().to_string(),
        offset: reg.offset(),
        value: read(reg),
    })
    .collect();

    InterfaceInfo {
        path: current.path().to_string(),
        sensor_code: current.sensor.code.to_string(),
        sensor_width: current.sensor.width,
        sensor_height: current.sensor.height,
        ycc_swap: format!("{:?}", current.geometry.ycc_swap()),
        decimation: current.geometry.factor,
        bus_flags: bus_flags.to_string(),
        registers,
    }
}

fn print_text_output(output: &ConfigureOutput) {
    println!("Requested: {}", output.requested);

    let format = &output.format;
    println!(
        "Format:    {}x{} {}",
        format.width, format.height, format.fourcc
    );
    println!("  Field:          {}", format.field);
    println!("  Colorspace:     {}", format.colorspace);
    println!("  Bytes per line: {}", format.bytes_per_line);
    println!("  Image size:     {}", format.size_image);

    if let Some(ref interface) = output.interface {
        println!();
        println!("Datapath:  {}", interface.path);
        println!(
            "  Sensor:         {} {}x{}",
            interface.sensor_code, interface.sensor_width, interface.sensor_height
        );
        println!("  YCC swap:       {}", interface.ycc_swap);
        println!("  Decimation:     {}/16", interface.decimation);
        println!("  Bus flags:      {}", interface.bus_flags);
        println!();
        println!("Registers:");
        for reg in &interface.registers {
            println!("  {:<6} [{:#04x}] = {:#010x}", reg.name, reg.offset, reg.value);
        }
    }
}
