// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use clap::Parser;
use serialport::{DataBits, Parity, StopBits};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use xmrecv::error::{Result, TransferError};
use xmrecv::logging;
use xmrecv::protocol::{ETB, NAK};
use xmrecv::serial::RealSerialPort;
use xmrecv::transfer::{self, TransferOptions, TransferSummary};
use xmrecv::ReceiverConfig;

#[derive(Parser)]
#[command(name = "xmrecv")]
#[command(about = "Receive a file over RS-232 with XMODEM-CRC", long_about = None)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name="BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name="BITS")]
    stop_bits: u8,

    /// Negative acknowledge byte (nak or etb)
    #[arg(long, default_value = "nak")]
    nak: String,

    /// Milliseconds between handshake bytes while waiting for the sender
    #[arg(long, default_value = "500", value_name = "MS")]
    handshake_interval: u64,

    /// Milliseconds of silence before asking for a retransmission
    #[arg(long, default_value = "1000", value_name = "MS")]
    retry_interval: u64,

    /// Consecutive errors tolerated before aborting
    #[arg(long, default_value = "10")]
    max_errors: u32,

    /// Remove trailing SUB (0x1A) padding from the end of the file
    #[arg(long)]
    strip_padding: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// File to write the received data to
    output: PathBuf,
}

fn parse_data_bits(bits: u8) -> std::result::Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> std::result::Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity)),
    }
}

fn parse_stop_bits(bits: u8) -> std::result::Result<StopBits, String> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(format!("Invalid stop bits: {}. Must be 1 or 2", bits)),
    }
}

fn parse_nak(nak: &str) -> std::result::Result<u8, String> {
    match nak.to_lowercase().as_str() {
        "nak" => Ok(NAK),
        "etb" => Ok(ETB),
        _ => Err(format!("Invalid NAK byte: {}. Must be 'nak' or 'etb'", nak)),
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let settings = parse_data_bits(cli.data_bits).and_then(|data_bits| {
        Ok((data_bits, parse_parity(&cli.parity)?, parse_stop_bits(cli.stop_bits)?, parse_nak(&cli.nak)?))
    });
    let (data_bits, parity, stop_bits, nak) = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let options = TransferOptions {
        config: ReceiverConfig::default()
            .with_nak(nak)
            .with_handshake_interval(cli.handshake_interval)
            .with_retry_interval(cli.retry_interval)
            .with_max_errors(cli.max_errors),
        strip_padding: cli.strip_padding,
        poll_interval: Duration::from_millis(10),
    };

    println!("Opening serial port: {}", cli.port);
    println!("Settings: {} baud, {:?}, {:?}, {:?}", cli.baud, data_bits, parity, stop_bits);

    let serial_port = match RealSerialPort::open(&cli.port, cli.baud, data_bits, parity, stop_bits) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };

    println!("\nReceiving to: {}", cli.output.display());
    match receive_to_file(serial_port, &cli.output, &options) {
        Ok(summary) => {
            println!("\nReceived {} blocks ({} bytes)", summary.blocks, summary.bytes);
        }
        Err(e) => {
            eprintln!("Receive failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn receive_to_file(serial_port: RealSerialPort, path: &Path, options: &TransferOptions) -> Result<TransferSummary> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if !dir.exists() {
            return Err(TransferError::OutputDir(dir.to_path_buf()));
        }
    }

    let mut output = BufWriter::new(File::create(path)?);
    info!("Writing to {}", path.display());

    transfer::receive_file(Box::new(serial_port), &mut output, options)
}
