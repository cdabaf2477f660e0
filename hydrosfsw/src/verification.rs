//! Link-verification block encoder
//!
//! Produces the deterministic pseudo-random transmission that proves a
//! continuous communications link. Ground regenerates the same bit stream
//! from the shared team identifier and synchronized clock and compares; this
//! is a link-continuity proof, not a cryptographic one.

use std::fmt::Write as _;

use hydroslibgs::TeamId;

use crate::config::constants::{PRN_A, PRN_B, PRN_M, PRN_WORDS};
use crate::drivers::WallClock;

/// Header bytes per block: team id, sequence, seconds, microseconds
pub const BLOCK_HEADER_LEN: usize = 16;

/// PRN payload bytes per block
pub const BLOCK_PAYLOAD_LEN: usize = PRN_WORDS * 4;

/// Total bytes per block
pub const BLOCK_LEN: usize = BLOCK_HEADER_LEN + BLOCK_PAYLOAD_LEN;

pub struct VerificationEncoder {
    team_id: TeamId,
}

impl VerificationEncoder {
    pub fn new(team_id: TeamId) -> Self {
        Self { team_id }
    }

    /// Encode `num_blocks` verification blocks against the given clock and
    /// return the hex transmission. Each block reads the clock once, so the
    /// seconds field (and with it the seed chain) can roll over between
    /// blocks of one transmission.
    pub fn encode(&self, num_blocks: u32, clock: &dyn WallClock) -> String {
        let mut transmission = String::with_capacity(num_blocks as usize * BLOCK_LEN * 2);

        for sequence in 0..num_blocks {
            let timestamp = clock.now();
            let seconds = timestamp.seconds as u32;
            let micros = timestamp.subsec_micros_rounded();

            let mut block = Vec::with_capacity(BLOCK_LEN);
            block.extend_from_slice(&self.team_id.0.to_be_bytes());
            block.extend_from_slice(&sequence.to_be_bytes());
            block.extend_from_slice(&seconds.to_be_bytes());
            block.extend_from_slice(&micros.to_be_bytes());

            // Seed chain: operating-period base seed from the team id and
            // wall-clock seconds, then per-block from the sequence number.
            let base_seed = self.team_id.0 ^ seconds;
            let block_seed = base_seed ^ sequence;

            // x0 is the block seed and is not emitted.
            let mut x = u64::from(block_seed);
            for _ in 0..PRN_WORDS {
                x = (PRN_A * x + PRN_B) % PRN_M;
                block.extend_from_slice(&(x as u32).to_be_bytes());
            }

            for byte in &block {
                let _ = write!(transmission, "{byte:02x}");
            }
        }

        transmission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FixedClock;

    const FIXED_SECONDS: f64 = 1_000_000_000.0;

    fn encoder() -> VerificationEncoder {
        VerificationEncoder::new(TeamId(1234))
    }

    fn decode_hex(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_zero_blocks_is_empty() {
        let clock = FixedClock::at(FIXED_SECONDS);
        assert_eq!(encoder().encode(0, &clock), "");
    }

    #[test]
    fn test_transmission_length() {
        let clock = FixedClock::at(FIXED_SECONDS);
        for n in [1u32, 2, 5, 78] {
            let hex = encoder().encode(n, &clock);
            assert_eq!(hex.len(), 288 * n as usize);
        }
    }

    #[test]
    fn test_header_layout() {
        let clock = FixedClock::at(FIXED_SECONDS);
        let bytes = decode_hex(&encoder().encode(2, &clock));
        assert_eq!(bytes.len(), 2 * BLOCK_LEN);

        // Block 0: team 1234, sequence 0, seconds 1e9, zero microseconds.
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x04, 0xD2]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[0x3B, 0x9A, 0xCA, 0x00]);
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x00, 0x00]);

        // Block 1 differs only in its sequence number field.
        let block1 = &bytes[BLOCK_LEN..];
        assert_eq!(&block1[4..8], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_sequence_numbers_in_order() {
        let clock = FixedClock::at(FIXED_SECONDS);
        let bytes = decode_hex(&encoder().encode(6, &clock));
        for (i, block) in bytes.chunks(BLOCK_LEN).enumerate() {
            let seq = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
            assert_eq!(seq, i as u32);
            assert_eq!(block.len(), BLOCK_LEN);
        }
    }

    #[test]
    fn test_payload_matches_generator() {
        let clock = FixedClock::at(FIXED_SECONDS);
        let bytes = decode_hex(&encoder().encode(1, &clock));
        let payload = &bytes[BLOCK_HEADER_LEN..];
        assert_eq!(payload.len(), BLOCK_PAYLOAD_LEN);

        let mut x = u64::from(1234u32 ^ 1_000_000_000u32);
        for word in payload.chunks(4) {
            x = (PRN_A * x + PRN_B) % PRN_M;
            let expected = (x as u32).to_be_bytes();
            assert_eq!(word, expected);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        let clock = FixedClock::at(FIXED_SECONDS);
        let a = encoder().encode(3, &clock);
        let b = encoder().encode(3, &clock);
        assert_eq!(a, b);
    }

    #[test]
    fn test_seconds_change_payload() {
        let hex_a = encoder().encode(1, &FixedClock::at(FIXED_SECONDS));
        let hex_b = encoder().encode(1, &FixedClock::at(FIXED_SECONDS + 1.0));
        assert_ne!(
            hex_a[BLOCK_HEADER_LEN * 2..],
            hex_b[BLOCK_HEADER_LEN * 2..]
        );
    }

    #[test]
    fn test_fractional_seconds_in_header() {
        let clock = FixedClock::at(FIXED_SECONDS + 0.5);
        let bytes = decode_hex(&encoder().encode(1, &clock));
        let micros = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        assert_eq!(micros, 500_000);
    }
}
