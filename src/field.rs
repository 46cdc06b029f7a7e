//! Arithmetic over the field of integers modulo a prime

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{CoreError, Result};

/// An element of the prime field Z/pZ. Holds its modulus so that elements
/// of different fields cannot be combined by accident.
///
/// Invariant: `num < prime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldElement {
    num: BigUint,
    prime: BigUint,
}

impl FieldElement {
    pub fn new(num: BigUint, prime: BigUint) -> Result<Self> {
        if num >= prime {
            return Err(CoreError::Invariant(format!(
                "field element {} not in range 0..{}",
                num, prime
            )));
        }
        Ok(Self { num, prime })
    }

    /// Construct from a small integer, reduced modulo the prime.
    pub fn from_u32(num: u32, prime: &BigUint) -> Self {
        Self {
            num: BigUint::from(num) % prime,
            prime: prime.clone(),
        }
    }

    pub fn num(&self) -> &BigUint {
        &self.num
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    fn same_field(&self, other: &Self) -> Result<()> {
        if self.prime != other.prime {
            return Err(CoreError::Invariant(
                "cannot combine field elements of different primes".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        Ok(Self {
            num: (&self.num + &other.num) % &self.prime,
            prime: self.prime.clone(),
        })
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        // lift above zero before reducing, BigUint has no negatives
        Ok(Self {
            num: (&self.num + &self.prime - &other.num) % &self.prime,
            prime: self.prime.clone(),
        })
    }

    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        Ok(Self {
            num: (&self.num * &other.num) % &self.prime,
            prime: self.prime.clone(),
        })
    }

    /// Modular exponentiation by square-and-multiply.
    pub fn pow(&self, exponent: &BigUint) -> Self {
        Self {
            num: self.num.modpow(exponent, &self.prime),
            prime: self.prime.clone(),
        }
    }

    /// Multiplicative inverse via Fermat's little theorem: a^(p-2) mod p.
    pub fn inverse(&self) -> Result<Self> {
        if self.num.is_zero() {
            return Err(CoreError::Invariant(
                "zero has no multiplicative inverse".to_string(),
            ));
        }
        let exp = &self.prime - BigUint::from(2u8);
        Ok(self.pow(&exp))
    }

    pub fn negate(&self) -> Self {
        if self.num.is_zero() {
            return self.clone();
        }
        Self {
            num: &self.prime - &self.num,
            prime: self.prime.clone(),
        }
    }

    /// True when the element is even as an integer. Used for the SEC
    /// compressed-key parity bit.
    pub fn is_even(&self) -> bool {
        (&self.num % BigUint::from(2u8)).is_zero()
    }
}
