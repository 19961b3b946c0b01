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

//! XMODEM-CRC receiver
//!
//! [`receiver::ReceiverFsm`] is a pure byte-driven state machine: feed it
//! bytes, tick it with a millisecond clock and pull out packets. It never
//! touches I/O itself; control bytes go to the [`receiver::ControlSink`] it
//! owns. [`transfer::receive_file`] wires it to a serial port.

pub mod config;
pub mod crc;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod receiver;
pub mod serial;
pub mod transfer;

pub use config::ReceiverConfig;
pub use error::{Result, TransferError};
pub use receiver::{ControlSink, Extracted, ReceiverFsm, State};
