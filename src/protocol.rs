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

//! XMODEM-CRC wire constants

/// Start of header - begins a 128-byte data packet
pub const SOH: u8 = 0x01;

/// Start of text - begins a 1024-byte data packet (XMODEM-1K)
pub const STX: u8 = 0x02;

/// End of transmission - sender has no more packets
pub const EOT: u8 = 0x04;

/// Acknowledge - packet accepted, or transfer complete after EOT
pub const ACK: u8 = 0x06;

/// Negative acknowledge - request retransmission of the current packet
pub const NAK: u8 = 0x15;

/// End of transmission block - used as the negative acknowledge by some
/// embedded senders instead of NAK
pub const ETB: u8 = 0x17;

/// Padding byte senders use to fill the final packet
pub const SUB: u8 = 0x1A;

/// Receiver announces CRC mode and invites the sender to start
pub const CRC_HANDSHAKE: u8 = b'C';

/// Payload size of an SOH packet
pub const PACKET_SIZE: usize = 128;

/// Payload size of an STX packet
pub const PACKET_SIZE_1K: usize = 1024;

/// Largest payload the receiver has to buffer
pub const MAX_PACKET_SIZE: usize = PACKET_SIZE_1K;

/// Payload size announced by a header marker, `None` if the byte is not one.
pub fn packet_size(marker: u8) -> Option<usize> {
    match marker {
        SOH => Some(PACKET_SIZE),
        STX => Some(PACKET_SIZE_1K),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_size_markers() {
        assert_eq!(packet_size(SOH), Some(128));
        assert_eq!(packet_size(STX), Some(1024));
        assert_eq!(packet_size(EOT), None);
        assert_eq!(packet_size(CRC_HANDSHAKE), None);
    }
}
