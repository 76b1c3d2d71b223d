//! Running-XOR checksum of the bus protocol

use super::CHECKSUM_SEED;

/// XOR-folds `bytes` into an accumulator seeded with 0x55
pub fn compute(bytes: &[u8]) -> u8 {
    bytes.iter().fold(CHECKSUM_SEED, |acc, b| acc ^ b)
}

/// True when a complete frame, trailing checksum included, folds to zero
pub fn verify(frame: &[u8]) -> bool {
    compute(frame) == 0
}
