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

use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use crate::config::ReceiverConfig;
use crate::error::{Result, TransferError};
use crate::protocol::{MAX_PACKET_SIZE, SUB};
use crate::receiver::{ReceiverFsm, State};
use crate::serial::{SerialLink, SerialPort};

// ============================================================================
// Options & Summary
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub config: ReceiverConfig,
    /// Drop trailing SUB padding from the last block
    pub strip_padding: bool,
    /// How long a single read may block before the receiver is ticked again
    pub poll_interval: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            config: ReceiverConfig::default(),
            strip_padding: false,
            poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub blocks: u32,
    pub bytes: u64,
}

// ============================================================================
// Block Writer
// ============================================================================

/// Writes delivered blocks in order. With padding stripping on, the newest
/// block is held back because only the last one may be trimmed.
struct BlockWriter<'a, W: Write> {
    output: &'a mut W,
    strip_padding: bool,
    held: Vec<u8>,
    blocks: u32,
    bytes: u64,
}

impl<'a, W: Write> BlockWriter<'a, W> {
    fn new(output: &'a mut W, strip_padding: bool) -> Self {
        BlockWriter {
            output,
            strip_padding,
            held: Vec::with_capacity(MAX_PACKET_SIZE),
            blocks: 0,
            bytes: 0,
        }
    }

    fn push(&mut self, block: &[u8]) -> io::Result<()> {
        self.blocks += 1;

        if !self.strip_padding {
            return self.write(block);
        }

        let previous = std::mem::take(&mut self.held);
        self.write(&previous)?;
        self.held.extend_from_slice(block);
        Ok(())
    }

    fn finish(mut self) -> io::Result<TransferSummary> {
        let held = std::mem::take(&mut self.held);
        let end = held.iter().rposition(|&b| b != SUB).map_or(0, |i| i + 1);
        if end < held.len() {
            debug!("Stripped {} padding bytes", held.len() - end);
        }
        self.write(&held[..end])?;
        self.output.flush()?;

        Ok(TransferSummary { blocks: self.blocks, bytes: self.bytes })
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.output.write_all(data)?;
        self.bytes += data.len() as u64;
        Ok(())
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Receive one file from `port` into `output`.
///
/// Runs until the sender finishes with EOT or the receiver gives up.
pub fn receive_file<W: Write>(
    port: Box<dyn SerialPort>,
    output: &mut W,
    options: &TransferOptions,
) -> Result<TransferSummary> {
    let started = Instant::now();
    let mut fsm = ReceiverFsm::new(SerialLink::new(port), options.config);
    let mut writer = BlockWriter::new(output, options.strip_padding);
    let mut chunk = [0u8; 256];
    let mut packet = [0u8; MAX_PACKET_SIZE];

    info!("Waiting for sender");

    while !fsm.is_finished() {
        fsm.tick(elapsed_ms(started));
        check_link(&mut fsm)?;

        let count = match fsm.sink_mut().read_timeout(&mut chunk, options.poll_interval) {
            Ok(count) => count,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => 0,
            Err(e) => return Err(e.into()),
        };

        for &byte in &chunk[..count] {
            // A ready packet must be taken before the next byte, or the
            // receiver would ignore the rest of the chunk
            if fsm.feed_byte(byte) {
                if let Some(extracted) = fsm.try_extract(&mut packet) {
                    writer.push(&packet[..extracted.len])?;
                }
            }
        }
        check_link(&mut fsm)?;
    }

    match fsm.state() {
        State::Success => {
            let summary = writer.finish()?;
            info!("Received {} blocks, {} bytes", summary.blocks, summary.bytes);
            Ok(summary)
        }
        state => {
            warn!("Transfer ended in state {}", state);
            Err(TransferError::Aborted { errors: fsm.error_count() })
        }
    }
}

fn check_link(fsm: &mut ReceiverFsm<SerialLink>) -> Result<()> {
    match fsm.sink_mut().take_error() {
        Some(e) => Err(TransferError::Io(e)),
        None => Ok(()),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc16;
    use crate::logging;
    use crate::protocol::*;
    use crate::serial::MockSerialPort;

    fn frame(marker: u8, wire_block: u8, payload: &[u8]) -> Vec<u8> {
        let crc = crc16(payload);
        let mut bytes = vec![marker, wire_block, 0xFF - wire_block];
        bytes.extend_from_slice(payload);
        bytes.push((crc >> 8) as u8);
        bytes.push(crc as u8);
        bytes
    }

    fn run(stream: &[u8], expected_writes: Vec<u8>, options: &TransferOptions) -> (Result<TransferSummary>, Vec<u8>) {
        logging::init_for_tests();
        let mock = Box::new(MockSerialPort::with_bytes(stream, expected_writes));
        let mut output = Vec::new();
        let result = receive_file(mock, &mut output, options);
        (result, output)
    }

    #[test]
    fn test_receive_two_blocks() {
        let first: Vec<u8> = (0..128).map(|i| i as u8).collect();
        let second = [0x5Au8; 128];

        let mut stream = frame(SOH, 1, &first);
        stream.extend(frame(SOH, 2, &second));
        stream.push(EOT);

        let (result, output) = run(&stream, vec![CRC_HANDSHAKE, ACK, ACK, ACK], &TransferOptions::default());

        let summary = result.expect("transfer succeeds");
        assert_eq!(summary, TransferSummary { blocks: 2, bytes: 256 });
        assert_eq!(&output[..128], &first[..]);
        assert_eq!(&output[128..], &second[..]);
    }

    #[test]
    fn test_receive_retries_bad_crc() {
        let payload = [0x33u8; 128];
        let good = frame(SOH, 1, &payload);
        let mut bad = good.clone();
        bad[50] ^= 0x80;

        let mut stream = bad;
        stream.extend_from_slice(&good);
        stream.push(EOT);

        let (result, output) = run(&stream, vec![CRC_HANDSHAKE, NAK, ACK, ACK], &TransferOptions::default());

        assert_eq!(result.expect("transfer succeeds").blocks, 1);
        assert_eq!(output, payload.to_vec());
    }

    #[test]
    fn test_receive_skips_retransmitted_block() {
        let first = [1u8; 128];
        let second = [2u8; 1024];

        let mut stream = frame(SOH, 1, &first);
        stream.extend(frame(SOH, 1, &first));
        stream.extend(frame(STX, 2, &second));
        stream.push(EOT);

        let (result, output) = run(&stream, vec![CRC_HANDSHAKE, ACK, ACK, ACK, ACK], &TransferOptions::default());

        assert_eq!(result.expect("transfer succeeds"), TransferSummary { blocks: 2, bytes: 1152 });
        assert_eq!(&output[..128], &first[..]);
        assert_eq!(&output[128..], &second[..]);
    }

    #[test]
    fn test_receive_strips_padding() {
        let mut last = b"hello".to_vec();
        last.resize(128, SUB);
        let full = [SUB; 128];

        let mut stream = frame(SOH, 1, &full);
        stream.extend(frame(SOH, 2, &last));
        stream.push(EOT);

        let options = TransferOptions { strip_padding: true, ..TransferOptions::default() };
        let (result, output) = run(&stream, vec![CRC_HANDSHAKE, ACK, ACK, ACK], &options);

        assert_eq!(result.expect("transfer succeeds"), TransferSummary { blocks: 2, bytes: 133 });
        assert_eq!(&output[..128], &full[..], "only the final block is trimmed");
        assert_eq!(&output[128..], b"hello");
    }

    #[test]
    fn test_receive_empty_transfer() {
        let (result, output) = run(&[EOT], vec![CRC_HANDSHAKE, ACK], &TransferOptions::default());
        assert_eq!(result.expect("transfer succeeds"), TransferSummary { blocks: 0, bytes: 0 });
        assert!(output.is_empty());
    }

    #[test]
    fn test_receive_gives_up_on_silent_sender() {
        let options = TransferOptions {
            config: ReceiverConfig::default().with_handshake_interval(1).with_max_errors(2),
            poll_interval: Duration::from_millis(1),
            ..TransferOptions::default()
        };

        let (result, output) = run(&[], vec![CRC_HANDSHAKE; 3], &options);

        match result {
            Err(TransferError::Aborted { errors }) => assert_eq!(errors, 3),
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(output.is_empty());
    }

    #[test]
    fn test_receive_reports_write_failure() {
        logging::init_for_tests();
        let mock = MockSerialPort::new(Vec::new(), Vec::new())
            .failing_writes(io::ErrorKind::BrokenPipe);
        let mut output = Vec::new();

        match receive_file(Box::new(mock), &mut output, &TransferOptions::default()) {
            Err(TransferError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected I/O error, got {:?}", other),
        }
    }
}
