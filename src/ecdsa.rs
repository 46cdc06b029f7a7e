//! ECDSA over secp256k1: deterministic signing, verification, DER

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::constants::secp256k1;
use crate::error::{CoreError, Result};
use crate::keys::{be32, PrivateKey, PublicKey};
use crate::sha256::hmac_sha256;

/// An ECDSA signature (r, s), both in [1, n-1], s in low-S form when
/// produced by [`sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Result<Self> {
        let n = &secp256k1().gen.n;
        if r.is_zero() || &r >= n || s.is_zero() || &s >= n {
            return Err(CoreError::Invariant(
                "signature component outside [1, n-1]".to_string(),
            ));
        }
        Ok(Self { r, s })
    }

    /// DER serialization: `30 len 02 len(r) r 02 len(s) s` with minimal
    /// big-endian integers, 0x00-padded when the high bit is set.
    pub fn der(&self) -> Vec<u8> {
        fn encode_int(n: &BigUint) -> Vec<u8> {
            let mut bytes = n.to_bytes_be();
            if bytes[0] & 0x80 != 0 {
                bytes.insert(0, 0x00);
            }
            bytes
        }
        let r = encode_int(&self.r);
        let s = encode_int(&self.s);
        let mut out = Vec::with_capacity(6 + r.len() + s.len());
        out.push(0x30);
        out.push((4 + r.len() + s.len()) as u8);
        out.push(0x02);
        out.push(r.len() as u8);
        out.extend_from_slice(&r);
        out.push(0x02);
        out.push(s.len() as u8);
        out.extend_from_slice(&s);
        out
    }

    /// Parse DER, insisting on the canonical encoding.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        fn decode_int(bytes: &[u8]) -> Result<(BigUint, &[u8])> {
            if bytes.len() < 2 || bytes[0] != 0x02 {
                return Err(CoreError::Parse("missing DER integer marker".to_string()));
            }
            let len = bytes[1] as usize;
            let rest = &bytes[2..];
            if len == 0 || rest.len() < len {
                return Err(CoreError::Parse("truncated DER integer".to_string()));
            }
            let value = &rest[..len];
            if value[0] & 0x80 != 0 {
                return Err(CoreError::Parse("negative DER integer".to_string()));
            }
            if len > 1 && value[0] == 0x00 && value[1] & 0x80 == 0 {
                return Err(CoreError::Parse("non-minimal DER integer".to_string()));
            }
            Ok((BigUint::from_bytes_be(value), &rest[len..]))
        }

        if bytes.len() < 2 || bytes[0] != 0x30 {
            return Err(CoreError::Parse("missing DER sequence marker".to_string()));
        }
        if bytes[1] as usize != bytes.len() - 2 {
            return Err(CoreError::Parse("DER length mismatch".to_string()));
        }
        let (r, rest) = decode_int(&bytes[2..])?;
        let (s, rest) = decode_int(rest)?;
        if !rest.is_empty() {
            return Err(CoreError::Parse("trailing bytes after DER signature".to_string()));
        }
        Signature::new(r, s).map_err(|_| {
            CoreError::Parse("DER signature component outside [1, n-1]".to_string())
        })
    }
}

/// RFC 6979 nonce generator: HMAC-SHA-256 chain seeded from the secret
/// and the message digest, yielding candidates until one is in range.
struct NonceGenerator {
    k: [u8; 32],
    v: [u8; 32],
}

impl NonceGenerator {
    fn new(secret: &BigUint, z: &BigUint) -> Self {
        let n = &secp256k1().gen.n;
        let x = be32(secret);
        let h1 = be32(&(z % n));

        let mut k = [0x00u8; 32];
        let mut v = [0x01u8; 32];

        let mut data = Vec::with_capacity(32 + 1 + 64);
        data.extend_from_slice(&v);
        data.push(0x00);
        data.extend_from_slice(&x);
        data.extend_from_slice(&h1);
        k = hmac_sha256(&k, &data);
        v = hmac_sha256(&k, &v);

        data.clear();
        data.extend_from_slice(&v);
        data.push(0x01);
        data.extend_from_slice(&x);
        data.extend_from_slice(&h1);
        k = hmac_sha256(&k, &data);
        v = hmac_sha256(&k, &v);

        Self { k, v }
    }

    fn next(&mut self) -> BigUint {
        let n = &secp256k1().gen.n;
        loop {
            self.v = hmac_sha256(&self.k, &self.v);
            let candidate = BigUint::from_bytes_be(&self.v);
            if candidate >= BigUint::one() && &candidate < n {
                return candidate;
            }
            let mut data = Vec::with_capacity(33);
            data.extend_from_slice(&self.v);
            data.push(0x00);
            self.k = hmac_sha256(&self.k, &data);
            self.v = hmac_sha256(&self.k, &self.v);
        }
    }
}

/// Sign the digest z with the given key. The nonce is derived
/// deterministically per RFC 6979, and s is normalized to the low half
/// of the group order.
pub fn sign(key: &PrivateKey, z: &BigUint) -> Signature {
    let params = secp256k1();
    let n = &params.gen.n;
    let mut nonces = NonceGenerator::new(key.secret(), z);
    loop {
        let k = nonces.next();
        let r_point = params.gen.g.mul(&k).expect("k is in range");
        let r = match r_point.x() {
            Some(x) => x.num() % n,
            None => continue,
        };
        if r.is_zero() {
            continue;
        }
        let k_inv = k.modpow(&(n - BigUint::from(2u8)), n);
        let mut s = ((z % n) + &r * key.secret()) % n * k_inv % n;
        if s.is_zero() {
            continue;
        }
        if &s > &(n >> 1u32) {
            s = n - &s;
        }
        return Signature { r, s };
    }
}

/// Verify a signature over digest z against a public key.
pub fn verify(pubkey: &PublicKey, z: &BigUint, sig: &Signature) -> bool {
    let params = secp256k1();
    let n = &params.gen.n;
    if sig.r.is_zero() || &sig.r >= n || sig.s.is_zero() || &sig.s >= n {
        return false;
    }
    let w = sig.s.modpow(&(n - BigUint::from(2u8)), n);
    let u1 = (z % n) * &w % n;
    let u2 = &sig.r * &w % n;
    let a = match params.gen.g.mul(&u1) {
        Ok(point) => point,
        Err(_) => return false,
    };
    let b = match pubkey.point().mul(&u2) {
        Ok(point) => point,
        Err(_) => return false,
    };
    let x = match a.add(&b) {
        Ok(point) => point,
        Err(_) => return false,
    };
    match x.x() {
        Some(coord) => coord.num() % n == sig.r,
        None => false,
    }
}
