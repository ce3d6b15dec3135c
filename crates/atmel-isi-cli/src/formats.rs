// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Host format enumeration for a simulated sensor.

use crate::error::CliError;
use crate::utils::{self, SensorArgs};
use atmel_isi::{format::Translation, geometry::DataPath};
use clap::Args as ClapArgs;
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    sensor: SensorArgs,

    /// Group formats by sensor media-bus code
    #[arg(long)]
    by_code: bool,
}

#[derive(Debug, Serialize)]
struct FormatsOutput {
    sensor: String,
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Serialize)]
struct FormatInfo {
    fourcc: String,
    name: String,
    code: String,
    kind: String,
    path: String,
}

impl From<&Translation> for FormatInfo {
    fn from(xlate: &Translation) -> Self {
        FormatInfo {
            fourcc: xlate.fourcc().to_string(),
            name: xlate.host.name.to_string(),
            code: xlate.code.to_string(),
            kind: xlate.tag.to_string(),
            path: path_for(xlate).to_string(),
        }
    }
}

/// Datapath a translation streams through, RGB565 output always uses the
/// preview channel.
fn path_for(xlate: &Translation) -> DataPath {
    if xlate.is_output_rgb565() {
        DataPath::Preview
    } else {
        DataPath::Codec
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing formats command: {:?}", args);

    let sensor = args.sensor.build()?;
    let controller = utils::open_controller(sensor)?;
    let list = controller.isi.formats()?;

    let output = FormatsOutput {
        sensor: args.sensor.codes.clone(),
        formats: list.iter().map(FormatInfo::from).collect(),
    };

    if json {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text_output(&output, args.by_code);
    }

    Ok(())
}

fn print_text_output(output: &FormatsOutput, by_code: bool) {
    println!("ISI host formats ({} translations)\n", output.formats.len());

    if by_code {
        let mut codes: Vec<&str> = output.formats.iter().map(|f| f.code.as_str()).collect();
        codes.dedup();
        for code in codes {
            println!("{}:", code);
            for format in output.formats.iter().filter(|f| f.code == code) {
                println!(
                    "    {}  {:<22} {} path ({})",
                    format.fourcc, format.name, format.path, format.kind
                );
            }
        }
    } else {
        for format in &output.formats {
            println!(
                "  {}  {:<22} from {:<14} {} path",
                format.fourcc, format.name, format.code, format.path
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmel_isi::format::{translations, MbusCode};

    #[test]
    fn test_path_for_translation() {
        let list = translations(MbusCode::UYVY8_2X8);
        let paths: Vec<DataPath> = list.iter().map(path_for).collect();
        assert_eq!(
            paths,
            vec![DataPath::Codec, DataPath::Preview, DataPath::Codec]
        );

        let list = translations(MbusCode::RGB565_2X8_LE);
        assert_eq!(path_for(&list[0]), DataPath::Preview);
    }

    #[test]
    fn test_format_info() {
        let list = translations(MbusCode::YUYV8_2X8);
        let info = FormatInfo::from(&list[1]);
        assert_eq!(info.fourcc, "RGBP");
        assert_eq!(info.path, "preview");
        assert_eq!(info.code, "YUYV8_2X8");
    }
}
