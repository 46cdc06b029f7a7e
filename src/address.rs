//! Base58, Base58Check and P2PKH addresses

use num_bigint::BigUint;
use num_traits::Zero;

use crate::constants::{ADDR_VERSION_MAIN, ADDR_VERSION_TEST};
use crate::error::{CoreError, Result};
use crate::hashes::hash256;

/// The Base58 alphabet: no 0, O, I or l.
pub const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58-encode a byte string. Leading zero bytes become leading '1's.
pub fn b58encode(data: &[u8]) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(58u8);
    let mut digits = Vec::new();
    while !num.is_zero() {
        let rem = (&num % &base).to_u32_digits();
        digits.push(BASE58_ALPHABET[rem.first().copied().unwrap_or(0) as usize]);
        num /= &base;
    }
    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();
    let mut out = vec![b'1'; leading_zeros];
    out.extend(digits.iter().rev());
    String::from_utf8(out).expect("alphabet is ascii")
}

/// Inverse of [`b58encode`].
pub fn b58decode(s: &str) -> Result<Vec<u8>> {
    let mut num = BigUint::zero();
    let base = BigUint::from(58u8);
    for c in s.bytes() {
        let digit = BASE58_ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| CoreError::Parse(format!("invalid base58 character {:?}", c as char)))?;
        num = num * &base + BigUint::from(digit);
    }
    let leading_ones = s.bytes().take_while(|&b| b == b'1').count();
    let mut out = vec![0u8; leading_ones];
    if !num.is_zero() {
        out.extend(num.to_bytes_be());
    }
    Ok(out)
}

/// Base58 with a 4-byte double-SHA-256 checksum suffix.
pub fn b58check_encode(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&hash256(payload)[..4]);
    b58encode(&data)
}

/// Decode Base58Check, verifying the checksum.
pub fn b58check_decode(s: &str) -> Result<Vec<u8>> {
    let data = b58decode(s)?;
    if data.len() < 5 {
        return Err(CoreError::Parse(format!(
            "base58check payload too short: {} bytes",
            data.len()
        )));
    }
    let (payload, checksum) = data.split_at(data.len() - 4);
    if checksum != &hash256(payload)[..4] {
        return Err(CoreError::Crypto("base58check checksum mismatch".to_string()));
    }
    Ok(payload.to_vec())
}

/// Encode a public key hash as a P2PKH address.
pub fn h160_to_address(h160: &[u8; 20], testnet: bool) -> String {
    let version = if testnet {
        ADDR_VERSION_TEST
    } else {
        ADDR_VERSION_MAIN
    };
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(h160);
    b58check_encode(&payload)
}

/// Decode a P2PKH address back to its version byte and public key hash.
pub fn address_to_h160(address: &str) -> Result<(u8, [u8; 20])> {
    let payload = b58check_decode(address)?;
    if payload.len() != 21 {
        return Err(CoreError::Parse(format!(
            "address payload must be 21 bytes, got {}",
            payload.len()
        )));
    }
    let version = payload[0];
    if version != ADDR_VERSION_MAIN && version != ADDR_VERSION_TEST {
        return Err(CoreError::Parse(format!(
            "unknown address version byte {:#04x}",
            version
        )));
    }
    let mut h160 = [0u8; 20];
    h160.copy_from_slice(&payload[1..]);
    Ok((version, h160))
}
