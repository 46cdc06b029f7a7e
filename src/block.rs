//! Block headers: codec, proof of work, difficulty retargeting

use std::io::Read;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{max_target, GENESIS_MAIN, GENESIS_TEST, TWO_WEEKS};
use crate::error::Result;
use crate::hashes::hash256;
use crate::transaction::{read_bytes, read_u32_le};

/// An 80-byte block header. The hash fields are held in displayed
/// (big-endian) order and reversed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub version: u32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
}

impl Block {
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let version = read_u32_le(reader)?;
        let mut prev_block = [0u8; 32];
        for (dst, src) in prev_block.iter_mut().zip(read_bytes(reader, 32)?.iter().rev()) {
            *dst = *src;
        }
        let mut merkle_root = [0u8; 32];
        for (dst, src) in merkle_root.iter_mut().zip(read_bytes(reader, 32)?.iter().rev()) {
            *dst = *src;
        }
        let timestamp = read_u32_le(reader)?;
        let mut bits = [0u8; 4];
        bits.copy_from_slice(&read_bytes(reader, 4)?);
        let mut nonce = [0u8; 4];
        nonce.copy_from_slice(&read_bytes(reader, 4)?);
        Ok(Self {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(80);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend(self.prev_block.iter().rev());
        out.extend(self.merkle_root.iter().rev());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.bits);
        out.extend_from_slice(&self.nonce);
        out
    }

    /// HASH256 of the header, reversed into displayed order.
    pub fn hash(&self) -> [u8; 32] {
        let mut digest = hash256(&self.serialize());
        digest.reverse();
        digest
    }

    /// The block id as displayed hex.
    pub fn id(&self) -> String {
        hex::encode(self.hash())
    }

    /// The proof-of-work target this header claims.
    pub fn target(&self) -> BigUint {
        bits_to_target(&self.bits)
    }

    /// Difficulty relative to the genesis target.
    pub fn difficulty(&self) -> f64 {
        let genesis = max_target().to_f64().unwrap_or(f64::MAX);
        let target = self.target().to_f64().unwrap_or(f64::MAX);
        genesis / target
    }

    /// Proof of work holds when the header hash, read as a little-endian
    /// integer, is below the claimed target.
    pub fn check_pow(&self) -> bool {
        let digest = hash256(&self.serialize());
        BigUint::from_bytes_le(&digest) < self.target()
    }

    /// The hardcoded genesis header for the chosen network.
    pub fn genesis(testnet: bool) -> Self {
        let raw = hex::decode(if testnet { GENESIS_TEST } else { GENESIS_MAIN })
            .expect("hardcoded genesis hex");
        Self::parse(&mut raw.as_slice()).expect("hardcoded genesis parses")
    }
}

/// Expand compact bits into the full target:
/// `coefficient * 256^(exponent - 3)`, coefficient in the first three
/// little-endian bytes, exponent in the last.
pub fn bits_to_target(bits: &[u8; 4]) -> BigUint {
    let exponent = bits[3] as u32;
    let coefficient = BigUint::from_bytes_le(&bits[..3]);
    if exponent < 3 {
        coefficient >> (8 * (3 - exponent))
    } else {
        coefficient << (8 * (exponent - 3))
    }
}

/// Compress a target back into compact bits. A leading byte of 0x80 or
/// above would read as a sign bit, so the coefficient shifts right one
/// byte in that case.
pub fn target_to_bits(target: &BigUint) -> [u8; 4] {
    let mut raw = target.to_bytes_be();
    if raw == [0] {
        raw.clear();
    }
    let exponent = if raw.first().is_some_and(|&b| b >= 0x80) {
        raw.insert(0, 0x00);
        raw.len()
    } else {
        raw.len()
    };
    let mut coefficient = [0u8; 3];
    for (dst, src) in coefficient.iter_mut().zip(raw.iter()) {
        *dst = *src;
    }
    [coefficient[2], coefficient[1], coefficient[0], exponent as u8]
}

/// Retarget rule: scale the previous target by the observed epoch
/// duration over two weeks, clamped to a factor of four either way, and
/// cap at the genesis target. `time_diff` spans the first to the last
/// block of the closing epoch, which measures 2015 intervals rather than
/// 2016; consensus keeps that off-by-one.
pub fn calculate_new_bits(prev_bits: &[u8; 4], time_diff: u64) -> [u8; 4] {
    let time_diff = time_diff.clamp(TWO_WEEKS / 4, TWO_WEEKS * 4);
    let prev_target = bits_to_target(prev_bits);
    let mut new_target = prev_target * BigUint::from(time_diff) / BigUint::from(TWO_WEEKS);
    let cap = max_target();
    if new_target > cap {
        new_target = cap;
    }
    target_to_bits(&new_target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // mainnet block 473759
    const HEADER_HEX: &str = "020000208ec39428b17323fa0ddec8e887b4a7c53b8c0a0a220cfd0000000000000000005b0750fce0a889502d40508d39576821155e9c9e3f5c3157f961db38fd8b25be1e77a759e93c0118a4ffd71d";

    fn parse_fixture() -> Block {
        let raw = hex::decode(HEADER_HEX).unwrap();
        Block::parse(&mut Cursor::new(&raw)).unwrap()
    }

    #[test]
    fn test_parse_fields() {
        let block = parse_fixture();
        assert_eq!(block.version, 0x20000002);
        assert_eq!(
            hex::encode(block.prev_block),
            "000000000000000000fd0c220a0a8c3bc5a7b487e8c8de0dfa2373b12894c38e"
        );
        assert_eq!(block.timestamp, 0x59a7771e);
        assert_eq!(block.bits, [0xe9, 0x3c, 0x01, 0x18]);
    }

    #[test]
    fn test_serialize_round_trip() {
        let raw = hex::decode(HEADER_HEX).unwrap();
        let block = Block::parse(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(block.serialize(), raw);
        assert_eq!(block.serialize().len(), 80);
    }

    #[test]
    fn test_id() {
        assert_eq!(
            parse_fixture().id(),
            "0000000000000000007e9e4c586439b0cdbe13b1370bdd9435d76a644d047523"
        );
    }

    #[test]
    fn test_target_and_difficulty() {
        let block = parse_fixture();
        assert_eq!(
            format!("{:064x}", block.target()),
            "0000000000000000013ce9000000000000000000000000000000000000000000"
        );
        assert!((block.difficulty() - 888_171_856_257.3206).abs() < 1.0);
    }

    #[test]
    fn test_check_pow() {
        let mut block = parse_fixture();
        assert!(block.check_pow());
        // spoiling the nonce spoils the work
        block.nonce = [0, 0, 0, 0];
        assert!(!block.check_pow());
    }

    #[test]
    fn test_genesis() {
        let genesis = Block::genesis(false);
        assert_eq!(
            genesis.id(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(genesis.prev_block, [0u8; 32]);
        assert!(genesis.check_pow());

        let testnet_genesis = Block::genesis(true);
        assert_eq!(testnet_genesis.merkle_root, genesis.merkle_root);
        assert_ne!(testnet_genesis.id(), genesis.id());
    }

    #[test]
    fn test_bits_round_trip() {
        for bits in [
            [0xff, 0xff, 0x00, 0x1d],
            [0xe9, 0x3c, 0x01, 0x18],
            [0x54, 0xd8, 0x01, 0x18],
        ] {
            assert_eq!(target_to_bits(&bits_to_target(&bits)), bits);
        }
    }

    #[test]
    fn test_calculate_new_bits() {
        // epoch ending at mainnet block 473759: 302400 seconds elapsed
        let prev_bits = [0x54, 0xd8, 0x01, 0x18];
        assert_eq!(
            calculate_new_bits(&prev_bits, 302_400),
            [0x00, 0x15, 0x76, 0x17]
        );
    }

    #[test]
    fn test_calculate_new_bits_clamps() {
        let prev_bits = [0xff, 0xff, 0x00, 0x1d];
        // instant epoch clamps to a 4x difficulty increase
        let fast = calculate_new_bits(&prev_bits, 0);
        assert_eq!(bits_to_target(&fast), bits_to_target(&prev_bits) / 4u8);
        // a stalled epoch caps at the genesis target
        let slow = calculate_new_bits(&prev_bits, TWO_WEEKS * 100);
        assert_eq!(bits_to_target(&slow), max_target());
    }
}
