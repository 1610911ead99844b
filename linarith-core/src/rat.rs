//! Exact-rational helpers shared by the solvers.
//!
//! Coefficients are [`BigRational`] throughout. Arbitrary precision cannot
//! wrap around, but pivoting and pairwise row combination grow numerator and
//! denominator magnitudes multiplicatively, so every combination hot spot
//! routes fresh values through [`guard`]: once a value's numerator or
//! denominator exceeds [`MAGNITUDE_BITS`] bits it is rounded to
//! [`GUARD_DIGITS`] decimal digits. This is a resource-safety property of the
//! whole subsystem, not an optimization.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// Bit-size threshold above which a coefficient is approximated.
pub const MAGNITUDE_BITS: u64 = 512;

/// Decimal digits kept by the bounded approximation.
pub const GUARD_DIGITS: usize = 12;

/// Clamp a freshly computed coefficient to a safe magnitude.
///
/// Values whose numerator and denominator both fit in [`MAGNITUDE_BITS`]
/// bits pass through untouched; anything larger is rounded to
/// [`GUARD_DIGITS`] decimal digits.
pub fn guard(r: BigRational) -> BigRational {
    if r.numer().bits() <= MAGNITUDE_BITS && r.denom().bits() <= MAGNITUDE_BITS {
        return r;
    }
    tracing::debug!(
        "coefficient exceeded {} bits, reducing to {}-digit approximation",
        MAGNITUDE_BITS,
        GUARD_DIGITS
    );
    approximate_decimal(&r, GUARD_DIGITS)
}

/// Round `r` to `digits` decimal digits, denominator `10^digits`.
pub fn approximate_decimal(r: &BigRational, digits: usize) -> BigRational {
    let scale = num_traits::pow(BigInt::from(10), digits);
    let scaled = r * BigRational::from_integer(scale.clone());
    BigRational::new(scaled.round().to_integer(), scale)
}

/// Largest integer `<= r`.
pub fn floor_int(r: &BigRational) -> BigInt {
    r.floor().to_integer()
}

/// Smallest integer `>= r`.
pub fn ceil_int(r: &BigRational) -> BigInt {
    r.ceil().to_integer()
}

/// Render as `num/den`, or just `num` for integers.
pub fn fraction_string(r: &BigRational) -> String {
    if r.is_integer() {
        r.numer().to_string()
    } else {
        format!("{}/{}", r.numer(), r.denom())
    }
}

/// Content of a rational vector: `gcd(numerators) / lcm(denominators)`.
///
/// Dividing the vector by its content yields integer entries with gcd 1 and
/// leaves the all-zero vector untouched (content 1).
pub fn content(coeffs: &[BigRational]) -> BigRational {
    let mut num_gcd = BigInt::zero();
    let mut den_lcm = BigInt::one();
    for c in coeffs {
        if c.is_zero() {
            continue;
        }
        num_gcd = num_gcd.gcd(c.numer());
        den_lcm = den_lcm.lcm(c.denom());
    }
    if num_gcd.is_zero() {
        return BigRational::one();
    }
    BigRational::new(num_gcd, den_lcm)
}

/// Divide a vector by its content in place.
pub fn normalize_content(coeffs: &mut [BigRational]) {
    let c = content(coeffs);
    if c.is_one() {
        return;
    }
    for x in coeffs.iter_mut() {
        if !x.is_zero() {
            *x = &*x / &c;
        }
    }
}

/// `true` when `r` is a whole number.
pub fn is_int(r: &BigRational) -> bool {
    r.is_integer()
}

/// `true` when `r` is 0 or 1.
pub fn is_zero_or_one(r: &BigRational) -> bool {
    r.is_zero() || r.is_one()
}

/// Guarded multiply-accumulate: `acc + a * b`.
pub fn mul_add(acc: &BigRational, a: &BigRational, b: &BigRational) -> BigRational {
    guard(acc + a * b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn test_guard_passthrough() {
        let r = rat(22, 7);
        assert_eq!(guard(r.clone()), r);
    }

    #[test]
    fn test_guard_reduces_huge_values() {
        let huge = num_traits::pow(BigInt::from(3), 400);
        let r = BigRational::new(huge.clone(), &huge + BigInt::one());
        let g = guard(r);
        assert!(g.numer().bits() <= MAGNITUDE_BITS);
        assert!(g.denom().bits() <= MAGNITUDE_BITS);
        // Just below 1, and the approximation must stay there.
        assert!(g <= BigRational::one());
    }

    #[test]
    fn test_approximate_decimal() {
        let third = rat(1, 3);
        let a = approximate_decimal(&third, 3);
        assert_eq!(a, rat(333, 1000));
        let neg = approximate_decimal(&rat(-1, 3), 3);
        assert_eq!(neg, rat(-333, 1000));
    }

    #[test]
    fn test_floor_ceil() {
        assert_eq!(floor_int(&rat(7, 2)), BigInt::from(3));
        assert_eq!(ceil_int(&rat(7, 2)), BigInt::from(4));
        assert_eq!(floor_int(&rat(-7, 2)), BigInt::from(-4));
        assert_eq!(ceil_int(&rat(-7, 2)), BigInt::from(-3));
    }

    #[test]
    fn test_fraction_string() {
        assert_eq!(fraction_string(&rat(3, 1)), "3");
        assert_eq!(fraction_string(&rat(3, 4)), "3/4");
    }

    #[test]
    fn test_content_normalization() {
        let mut v = vec![rat(2, 3), rat(4, 3), BigRational::zero()];
        normalize_content(&mut v);
        assert_eq!(v[0], rat(1, 1));
        assert_eq!(v[1], rat(2, 1));
        assert!(v[2].is_zero());
    }

    #[test]
    fn test_content_zero_vector() {
        let v = vec![BigRational::zero(), BigRational::zero()];
        assert_eq!(content(&v), BigRational::one());
    }
}
