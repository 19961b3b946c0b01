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

//! CRC-16/XMODEM (polynomial 0x1021, seed 0, no reflection)

const POLY: u16 = 0x1021;

/// Fold one byte into a running CRC.
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ (u16::from(byte) << 8);
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// CRC of a whole packet payload, starting from seed 0.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &byte| crc16_update(crc, byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn test_reference_vectors() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
        assert_eq!(crc16(b"A"), 0x58E5);
        assert_eq!(crc16(&[0x00]), 0x0000);
        assert_eq!(crc16(&[0xFF]), 0x1EF0);
    }

    #[test]
    fn test_zero_block_stays_zero() {
        // Zero bytes never set a bit when the seed is zero
        assert_eq!(crc16(&[0u8; 128]), 0x0000);
    }

    proptest! {
        #[test]
        fn appending_own_crc_yields_zero(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let crc = crc16(&data);
            let mut framed = data.clone();
            framed.push((crc >> 8) as u8);
            framed.push(crc as u8);
            prop_assert_eq!(crc16(&framed), 0);
        }
    }
}
