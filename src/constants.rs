//! Protocol constants: curve parameters, network magics, retarget values

use std::sync::LazyLock;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::curve::{Curve, Generator, Point};

/// secp256k1 prime: 2^256 - 2^32 - 977
pub const SECP256K1_P: &str = "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";
pub const SECP256K1_GX: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
pub const SECP256K1_GY: &str = "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
/// Order of the generator point
pub const SECP256K1_N: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

/// The secp256k1 parameter set: curve, generator and group order.
#[derive(Debug, Clone)]
pub struct Secp256k1 {
    pub curve: Curve,
    pub gen: Generator,
}

fn parse_hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("hardcoded hex constant")
}

static SECP256K1: LazyLock<Secp256k1> = LazyLock::new(|| {
    let p = parse_hex(SECP256K1_P);
    let curve = Curve::new(p, BigUint::zero(), BigUint::from(7u8));
    let g = Point::new(&curve, parse_hex(SECP256K1_GX), parse_hex(SECP256K1_GY))
        .expect("generator is on the curve");
    let n = parse_hex(SECP256K1_N);
    Secp256k1 {
        curve,
        gen: Generator { g, n },
    }
});

/// The curve Bitcoin uses, initialized once per process.
pub fn secp256k1() -> &'static Secp256k1 {
    &SECP256K1
}

/// Sighash type covered by this crate
pub const SIGHASH_ALL: u32 = 1;

/// Address version bytes
pub const ADDR_VERSION_MAIN: u8 = 0x00;
pub const ADDR_VERSION_TEST: u8 = 0x6f;

/// P2P message magics
pub const MAGIC_MAIN: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];
pub const MAGIC_TEST: [u8; 4] = [0x0b, 0x11, 0x09, 0x07];

/// Protocol version spoken by the node
pub const PROTOCOL_VERSION: u32 = 70015;

/// Default peer ports
pub const PORT_MAIN: u16 = 8333;
pub const PORT_TEST: u16 = 18333;

/// Upper bound on headers per `headers` message
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;

/// Blocks between difficulty retargets
pub const RETARGET_INTERVAL: u32 = 2016;

/// Seconds in the two-week retarget window
pub const TWO_WEEKS: u64 = 60 * 60 * 24 * 14;

/// 80-byte genesis block headers
pub const GENESIS_MAIN: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";
pub const GENESIS_TEST: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4adae5494dffff001d1aa4ae18";

/// Highest allowed target, the difficulty-1 target of the genesis block.
pub fn max_target() -> BigUint {
    BigUint::from(0xffffu32) * BigUint::from(256u32).pow(0x1d - 3)
}
