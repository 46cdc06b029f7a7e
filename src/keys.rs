//! Private and public keys, SEC serialization, key generation

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::address;
use crate::constants::secp256k1;
use crate::curve::Point;
use crate::entropy;
use crate::error::{CoreError, Result};
use crate::hashes::hash160;

/// Left-pad a big integer to a 32-byte big-endian array.
pub(crate) fn be32(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// A secret scalar in [1, n-1].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: BigUint,
}

impl PrivateKey {
    pub fn new(secret: BigUint) -> Result<Self> {
        let n = &secp256k1().gen.n;
        if secret.is_zero() || &secret >= n {
            return Err(CoreError::Invariant(
                "secret scalar outside [1, n-1]".to_string(),
            ));
        }
        Ok(Self { secret })
    }

    /// Generate a key from OS randomness, retrying the negligible
    /// out-of-range draws.
    pub fn generate() -> Self {
        Self::from_bytes_fn(|| {
            let mut out = [0u8; 32];
            out.copy_from_slice(&entropy::rand_bytes(32));
            out
        })
    }

    /// Generate a key from the user-entropy mixer.
    pub fn from_user_entropy<F>(prompt: F) -> Self
    where
        F: FnMut(usize) -> String,
    {
        let seed = entropy::user_entropy(prompt);
        // the seed feeds the same modular reduction; reroll from the seed
        // itself in the (practically unreachable) out-of-range case
        let mut material = seed;
        Self::from_bytes_fn(move || {
            let current = material;
            material = crate::sha256::sha256(&material);
            current
        })
    }

    /// The fixed Mastering Bitcoin chapter 4 key.
    pub fn from_mastering_vector() -> Self {
        Self::new(BigUint::from_bytes_be(&entropy::mastering_bitcoin_bytes()))
            .expect("vector is in range")
    }

    fn from_bytes_fn<F>(mut bytes_fn: F) -> Self
    where
        F: FnMut() -> [u8; 32],
    {
        let n = &secp256k1().gen.n;
        loop {
            let candidate = BigUint::from_bytes_be(&bytes_fn());
            if candidate >= BigUint::one() && &candidate < n {
                return Self { secret: candidate };
            }
        }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim_start_matches("0x");
        let secret = BigUint::parse_bytes(s.as_bytes(), 16)
            .ok_or_else(|| CoreError::Parse(format!("bad hex scalar: {}", s)))?;
        Self::new(secret)
    }

    pub fn secret(&self) -> &BigUint {
        &self.secret
    }

    pub fn to_hex(&self) -> String {
        hex::encode(be32(&self.secret))
    }

    /// Derive the public point secret * G.
    pub fn public_key(&self) -> PublicKey {
        let params = secp256k1();
        let point = params
            .gen
            .g
            .mul(&self.secret)
            .expect("generator multiplication cannot fail");
        PublicKey { point }
    }
}

/// A public key: a non-infinity point on secp256k1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    point: Point,
}

impl PublicKey {
    pub fn new(point: Point) -> Result<Self> {
        if point.is_infinity() {
            return Err(CoreError::Invariant(
                "public key cannot be the point at infinity".to_string(),
            ));
        }
        Ok(Self { point })
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn x(&self) -> &BigUint {
        self.point.x().expect("non-infinity by construction").num()
    }

    pub fn y(&self) -> &BigUint {
        self.point.y().expect("non-infinity by construction").num()
    }

    /// SEC encoding: `04 || X || Y` uncompressed, or `02/03 || X` with the
    /// prefix carrying the parity of Y.
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        let x = be32(self.x());
        if compressed {
            let prefix = if self.point.y().expect("non-infinity").is_even() {
                0x02
            } else {
                0x03
            };
            let mut out = Vec::with_capacity(33);
            out.push(prefix);
            out.extend_from_slice(&x);
            out
        } else {
            let mut out = Vec::with_capacity(65);
            out.push(0x04);
            out.extend_from_slice(&x);
            out.extend_from_slice(&be32(self.y()));
            out
        }
    }

    /// Parse a SEC encoding. The compressed form recovers Y as the square
    /// root of x^3 + 7 whose parity matches the prefix byte; the curve
    /// prime satisfies p = 3 mod 4, so the root is y2^((p+1)/4).
    pub fn from_sec(bytes: &[u8]) -> Result<Self> {
        let params = secp256k1();
        let curve = &params.curve;
        match bytes.first() {
            Some(0x04) => {
                if bytes.len() != 65 {
                    return Err(CoreError::Parse(format!(
                        "uncompressed SEC must be 65 bytes, got {}",
                        bytes.len()
                    )));
                }
                let x = BigUint::from_bytes_be(&bytes[1..33]);
                let y = BigUint::from_bytes_be(&bytes[33..65]);
                Self::new(Point::new(curve, x, y)?)
            }
            Some(prefix @ (0x02 | 0x03)) => {
                if bytes.len() != 33 {
                    return Err(CoreError::Parse(format!(
                        "compressed SEC must be 33 bytes, got {}",
                        bytes.len()
                    )));
                }
                let want_even = *prefix == 0x02;
                let x = BigUint::from_bytes_be(&bytes[1..33]);
                if x >= curve.p {
                    return Err(CoreError::Parse("SEC x coordinate above prime".to_string()));
                }
                let y2 = (x.modpow(&BigUint::from(3u8), &curve.p) + BigUint::from(7u8)) % &curve.p;
                let exp = (&curve.p + BigUint::one()) >> 2u32;
                let mut y = y2.modpow(&exp, &curve.p);
                let is_even = (&y % BigUint::from(2u8)).is_zero();
                if is_even != want_even {
                    y = &curve.p - &y;
                }
                Self::new(Point::new(curve, x, y)?)
            }
            Some(other) => Err(CoreError::Parse(format!("bad SEC prefix byte {:#04x}", other))),
            None => Err(CoreError::Parse("empty SEC encoding".to_string())),
        }
    }

    /// The Base58Check P2PKH address for this key.
    pub fn address(&self, compressed: bool, testnet: bool) -> String {
        address::h160_to_address(&hash160(&self.sec(compressed)), testnet)
    }
}
