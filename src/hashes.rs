//! The two composite hashes Bitcoin uses everywhere

use ripemd::{Digest, Ripemd160};

use crate::sha256::sha256;

/// HASH256: two rounds of SHA-256. Used for txids, block ids, checksums.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// HASH160: RIPEMD-160 of SHA-256. Used for public key hashes.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha256(data)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256() {
        // double SHA-256 of "hello"
        assert_eq!(
            hex::encode(hash256(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_hash160() {
        // hash160 of the compressed generator point
        let sec =
            hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap();
        assert_eq!(
            hex::encode(hash160(&sec)),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }
}
