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

use std::fmt;
use tracing::{debug, trace, warn};
use crate::config::ReceiverConfig;
use crate::crc::crc16;
use crate::protocol::*;

// ============================================================================
// Control Sink
// ============================================================================

/// Where the receiver sends its control bytes (handshake, ACK, NAK).
pub trait ControlSink {
    fn emit(&mut self, byte: u8);
}

impl ControlSink for Vec<u8> {
    fn emit(&mut self, byte: u8) {
        self.push(byte);
    }
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitHeader,
    BlockNum,
    BlockNumComplement,
    Data,
    CrcHigh,
    CrcLow,
    PacketReady,
    Success,
    Failure,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::AwaitHeader => "AwaitHeader",
            State::BlockNum => "BlockNum",
            State::BlockNumComplement => "BlockNumComplement",
            State::Data => "Data",
            State::CrcHigh => "CrcHigh",
            State::CrcLow => "CrcLow",
            State::PacketReady => "PacketReady",
            State::Success => "Success",
            State::Failure => "Failure",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, State::Success | State::Failure)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A packet handed over by [`ReceiverFsm::try_extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted {
    /// Zero-based index of the block within the transfer
    pub block: u32,
    /// Payload bytes copied into the destination
    pub len: usize,
}

// ============================================================================
// FSM Structure
// ============================================================================

pub struct ReceiverFsm<S: ControlSink> {
    state: State,
    config: ReceiverConfig,
    sink: S,
    packet_buffer: [u8; MAX_PACKET_SIZE],
    packet_size: usize,
    fill_position: usize,
    received_crc: u16,
    computed_crc: u16,
    block_on_wire: u8,
    is_duplicate_block: bool,
    expected_block: u32,
    progressed: bool,
    last_activity_ms: Option<u64>,
    last_handshake_ms: Option<u64>,
    error_count: u32,
}

impl<S: ControlSink> ReceiverFsm<S> {
    pub fn new(sink: S, config: ReceiverConfig) -> Self {
        ReceiverFsm {
            state: State::AwaitHeader,
            config,
            sink,
            packet_buffer: [0; MAX_PACKET_SIZE],
            packet_size: PACKET_SIZE,
            fill_position: 0,
            received_crc: 0,
            computed_crc: 0,
            block_on_wire: 0,
            is_duplicate_block: false,
            expected_block: 0,
            progressed: false,
            last_activity_ms: None,
            last_handshake_ms: None,
            error_count: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Number of blocks delivered so far, which is also the index the next
    /// new block will be reported under.
    pub fn expected_block(&self) -> u32 {
        self.expected_block
    }

    /// Payload size of the packet being assembled or awaiting extraction.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // ------------------------------------------------------------------------
    // Byte intake
    // ------------------------------------------------------------------------

    /// Push one received byte through the state machine.
    ///
    /// Returns true when a validated packet is waiting for
    /// [`try_extract`](Self::try_extract).
    pub fn feed_byte(&mut self, byte: u8) -> bool {
        let before = self.state;

        let progressed = match self.state {
            State::AwaitHeader => self.on_header(byte),
            State::BlockNum => self.on_block_num(byte),
            State::BlockNumComplement => self.on_block_complement(byte),
            State::Data => self.on_data(byte),
            State::CrcHigh => {
                self.received_crc = u16::from(byte) << 8;
                self.state = State::CrcLow;
                true
            }
            State::CrcLow => self.on_crc_low(byte),
            State::PacketReady | State::Success | State::Failure => {
                trace!("Ignored 0x{:02X} in state {}", byte, self.state);
                false
            }
        };

        if progressed {
            self.progressed = true;
        }
        if before != self.state {
            trace!("Byte 0x{:02X}: {} -> {}", byte, before, self.state);
        }

        self.state == State::PacketReady
    }

    fn on_header(&mut self, byte: u8) -> bool {
        if let Some(size) = packet_size(byte) {
            self.start_header(size);
            return true;
        }

        if byte == EOT {
            debug!("Received: EOT after {} blocks", self.expected_block);
            self.sink.emit(ACK);
            self.state = State::Success;
            return true;
        }

        false
    }

    fn start_header(&mut self, size: usize) {
        self.packet_size = size;
        self.state = State::BlockNum;
    }

    fn on_block_num(&mut self, byte: u8) -> bool {
        let last = self.expected_block as u8;
        let candidate = last.wrapping_add(1);

        if byte == candidate {
            self.is_duplicate_block = false;
        } else if byte == last && self.expected_block > 0 {
            self.is_duplicate_block = true;
        } else {
            self.resync(byte);
            return false;
        }

        self.block_on_wire = byte;
        self.state = State::BlockNumComplement;
        true
    }

    fn on_block_complement(&mut self, byte: u8) -> bool {
        if byte != 0xFF - self.block_on_wire {
            self.resync(byte);
            return false;
        }

        self.fill_position = 0;
        self.state = State::Data;
        true
    }

    /// Recover from a bad block number or complement by hunting for the
    /// next header marker.
    fn resync(&mut self, byte: u8) {
        match packet_size(byte) {
            Some(size) => self.start_header(size),
            None => self.state = State::AwaitHeader,
        }
        trace!("Resync on 0x{:02X}, now in {}", byte, self.state);
    }

    fn on_data(&mut self, byte: u8) -> bool {
        self.packet_buffer[self.fill_position] = byte;
        self.fill_position += 1;
        if !self.is_duplicate_block {
            self.error_count = 0;
        }

        if self.fill_position >= self.packet_size {
            self.state = State::CrcHigh;
        }
        true
    }

    fn on_crc_low(&mut self, byte: u8) -> bool {
        self.received_crc |= u16::from(byte);
        self.computed_crc = crc16(&self.packet_buffer[..self.packet_size]);

        if self.computed_crc != self.received_crc {
            warn!(
                "CRC mismatch on block {}: received 0x{:04X}, computed 0x{:04X}",
                self.block_on_wire, self.received_crc, self.computed_crc
            );
            self.state = State::AwaitHeader;
            if self.record_error() {
                self.sink.emit(self.config.nak);
            }
            return true;
        }

        debug!(
            "Block {} valid ({} bytes{})",
            self.block_on_wire,
            self.packet_size,
            if self.is_duplicate_block { ", duplicate" } else { "" }
        );
        self.state = State::PacketReady;
        true
    }

    // ------------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------------

    /// Hand over the ready packet, acknowledge it and start waiting for the
    /// next header.
    ///
    /// A retransmission of the block that was already delivered is
    /// acknowledged but not handed over again, so this returns `None` for it
    /// just as it does when nothing is ready.
    pub fn try_extract(&mut self, dest: &mut [u8; MAX_PACKET_SIZE]) -> Option<Extracted> {
        if self.state != State::PacketReady {
            return None;
        }

        self.sink.emit(ACK);
        self.state = State::AwaitHeader;
        self.error_count = 0;
        self.progressed = true;

        if self.is_duplicate_block {
            debug!("Re-acknowledged duplicate block {}", self.block_on_wire);
            return None;
        }

        let len = self.packet_size;
        dest[..len].copy_from_slice(&self.packet_buffer[..len]);
        let block = self.expected_block;
        self.expected_block = self.expected_block.wrapping_add(1);

        debug!("Delivered block {} ({} bytes)", block, len);
        Some(Extracted { block, len })
    }

    // ------------------------------------------------------------------------
    // Retry / Timeout
    // ------------------------------------------------------------------------

    /// Drive the handshake and stall detection from the caller's clock.
    pub fn tick(&mut self, now_ms: u64) {
        if self.state.is_terminal() || self.state == State::PacketReady {
            return;
        }

        if std::mem::take(&mut self.progressed) {
            self.last_activity_ms = Some(now_ms);
        }

        if self.state == State::AwaitHeader && self.expected_block == 0 {
            self.handshake(now_ms);
            return;
        }

        let last = *self.last_activity_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(last) <= self.config.retry_interval_ms {
            return;
        }

        warn!("No activity for {} ms in state {}", now_ms - last, self.state);
        if !self.record_error() {
            return;
        }

        // The sender answers a NAK with the whole framed packet
        self.state = State::AwaitHeader;
        self.sink.emit(self.config.nak);
        self.last_activity_ms = Some(now_ms);
    }

    /// Nothing delivered yet: keep inviting the sender with 'C'. Any
    /// activity since the last one postpones the next.
    fn handshake(&mut self, now_ms: u64) {
        let due = match (self.last_handshake_ms, self.last_activity_ms) {
            (Some(_), Some(last)) => now_ms.saturating_sub(last) > self.config.handshake_interval_ms,
            _ => true,
        };
        if !due {
            return;
        }

        if self.last_handshake_ms.is_some() && !self.record_error() {
            return;
        }

        trace!("Sent: 'C' at {} ms", now_ms);
        self.sink.emit(CRC_HANDSHAKE);
        self.last_handshake_ms = Some(now_ms);
        self.last_activity_ms = Some(now_ms);
    }

    /// Count a stall or bad packet. Returns false once the session has
    /// given up.
    fn record_error(&mut self) -> bool {
        self.error_count += 1;
        if self.error_count > self.config.max_errors {
            warn!("Giving up after {} consecutive errors", self.error_count);
            self.state = State::Failure;
            return false;
        }
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
