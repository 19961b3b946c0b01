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

//! Receiver tuning knobs

use crate::protocol::NAK;

/// Timing and retry policy for a receive session.
///
/// All intervals are in milliseconds of the clock passed to
/// [`ReceiverFsm::tick`](crate::receiver::ReceiverFsm::tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Byte sent to request a retransmission
    pub nak: u8,
    /// Gap between handshake bytes while waiting for the first packet
    pub handshake_interval_ms: u64,
    /// Silence tolerated once a transfer is under way
    pub retry_interval_ms: u64,
    /// Stalls allowed before the session fails
    pub max_errors: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            nak: NAK,
            handshake_interval_ms: 500,
            retry_interval_ms: 1000,
            max_errors: 10,
        }
    }
}

impl ReceiverConfig {
    pub fn with_nak(mut self, nak: u8) -> Self {
        self.nak = nak;
        self
    }

    pub fn with_handshake_interval(mut self, ms: u64) -> Self {
        self.handshake_interval_ms = ms;
        self
    }

    pub fn with_retry_interval(mut self, ms: u64) -> Self {
        self.retry_interval_ms = ms;
        self
    }

    pub fn with_max_errors(mut self, max_errors: u32) -> Self {
        self.max_errors = max_errors;
        self
    }
}
