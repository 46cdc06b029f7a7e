//! Points on short Weierstrass curves over prime fields

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{CoreError, Result};
use crate::field::FieldElement;

/// An elliptic curve y^2 = x^3 + a*x + b over the integers modulo p.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
}

impl Curve {
    pub fn new(p: BigUint, a: BigUint, b: BigUint) -> Self {
        Self { p, a, b }
    }
}

/// A point (x, y) on a curve, or the point at infinity.
///
/// Construction checks the curve equation, so every non-infinity `Point`
/// in circulation satisfies y^2 = x^3 + a*x + b (mod p).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    curve: Curve,
    xy: Option<(FieldElement, FieldElement)>,
}

impl Point {
    pub fn new(curve: &Curve, x: BigUint, y: BigUint) -> Result<Self> {
        let x = FieldElement::new(x, curve.p.clone())?;
        let y = FieldElement::new(y, curve.p.clone())?;
        let a = FieldElement::new(curve.a.clone() % &curve.p, curve.p.clone())?;
        let b = FieldElement::new(curve.b.clone() % &curve.p, curve.p.clone())?;
        // y^2 == x^3 + a*x + b
        let lhs = y.mul(&y)?;
        let rhs = x.mul(&x)?.mul(&x)?.add(&a.mul(&x)?)?.add(&b)?;
        if lhs != rhs {
            return Err(CoreError::Parse(format!(
                "point ({}, {}) is not on the curve",
                x.num(),
                y.num()
            )));
        }
        Ok(Self {
            curve: curve.clone(),
            xy: Some((x, y)),
        })
    }

    pub fn infinity(curve: &Curve) -> Self {
        Self {
            curve: curve.clone(),
            xy: None,
        }
    }

    pub fn is_infinity(&self) -> bool {
        self.xy.is_none()
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn x(&self) -> Option<&FieldElement> {
        self.xy.as_ref().map(|(x, _)| x)
    }

    pub fn y(&self) -> Option<&FieldElement> {
        self.xy.as_ref().map(|(_, y)| y)
    }

    /// Group law: the chord-tangent rule.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.curve != other.curve {
            return Err(CoreError::Invariant(
                "cannot add points on different curves".to_string(),
            ));
        }
        // identity cases
        let (x1, y1) = match &self.xy {
            None => return Ok(other.clone()),
            Some(xy) => xy,
        };
        let (x2, y2) = match &other.xy {
            None => return Ok(self.clone()),
            Some(xy) => xy,
        };

        // P + (-P) = infinity
        if x1 == x2 && y1 != y2 {
            return Ok(Self::infinity(&self.curve));
        }

        let slope = if x1 == x2 {
            // tangent at a doubling; vertical tangent when y = 0
            if y1.is_zero() {
                return Ok(Self::infinity(&self.curve));
            }
            let a = FieldElement::new(self.curve.a.clone() % &self.curve.p, self.curve.p.clone())?;
            let three_x_sq = FieldElement::from_u32(3, &self.curve.p).mul(&x1.mul(x1)?)?;
            let two_y = FieldElement::from_u32(2, &self.curve.p).mul(y1)?;
            three_x_sq.add(&a)?.mul(&two_y.inverse()?)?
        } else {
            // chord through the two points
            y2.sub(y1)?.mul(&x2.sub(x1)?.inverse()?)?
        };

        let x3 = slope.mul(&slope)?.sub(x1)?.sub(x2)?;
        let y3 = slope.mul(&x1.sub(&x3)?)?.sub(y1)?;
        Ok(Self {
            curve: self.curve.clone(),
            xy: Some((x3, y3)),
        })
    }

    /// Scalar multiplication k*P by double-and-add, walking the bits of k
    /// from least significant up.
    pub fn mul(&self, k: &BigUint) -> Result<Self> {
        let mut result = Self::infinity(&self.curve);
        let mut append = self.clone();
        let mut k = k.clone();
        while !k.is_zero() {
            if k.bit(0) {
                result = result.add(&append)?;
            }
            append = append.add(&append)?;
            k >>= 1u32;
        }
        Ok(result)
    }
}

/// A generator point together with its (pre-computed) order n,
/// so that n*G = infinity.
#[derive(Debug, Clone)]
pub struct Generator {
    pub g: Point,
    pub n: BigUint,
}
