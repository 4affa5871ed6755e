//! Rounding that reproduces the upstream profile numbers exactly.
//!
//! Published profiles round half to even on the exact binary value (so
//! `round_to(2.675, 2)` is `2.67`, because `2.675` is stored as
//! `2.67499999...`). These helpers keep that behaviour.

/// Rounds `value` to `digits` decimal places, ties to even.
///
/// Rounding is decided on the exact decimal expansion of the binary value,
/// not on `value * 10^digits`, which can itself round onto a tie.
#[must_use]
pub fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let Ok(digits) = usize::try_from(digits) else {
        let factor = 10f64.powi(-digits);
        return (value / factor).round_ties_even() * factor;
    };

    // Every finite f64 has a terminating decimal expansion; printing this
    // many places is exact.
    let exact = format!("{:.*}", exact_places(value).max(digits + 1), value.abs());
    let (whole, fraction) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let (kept, rest) = fraction.split_at(digits.min(fraction.len()));

    let mut mantissa: Vec<u8> = whole.bytes().chain(kept.bytes()).map(|b| b - b'0').collect();
    let mut rest = rest.bytes().map(|b| b - b'0');
    let round_up = match rest.next() {
        Some(6..=9) => true,
        Some(5) => rest.any(|d| d != 0) || mantissa.last().is_some_and(|d| d % 2 == 1),
        _ => false,
    };

    if round_up {
        let mut carry = true;
        for digit in mantissa.iter_mut().rev() {
            if *digit == 9 {
                *digit = 0;
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            mantissa.insert(0, 1);
        }
    }

    let split = mantissa.len() - digits;
    let mut text: String = mantissa[..split].iter().map(|d| char::from(b'0' + d)).collect();
    text.push('.');
    text.extend(mantissa[split..].iter().map(|d| char::from(b'0' + d)));

    text.parse::<f64>().map_or(value, |rounded| rounded.copysign(value))
}

/// Number of fractional decimal places in the exact expansion of `value`.
fn exact_places(value: f64) -> usize {
    let bits = value.to_bits();
    let exponent = i64::try_from((bits >> 52) & 0x7ff).unwrap_or(0);
    // Subnormals share the smallest exponent.
    let scale = if exponent == 0 { -1074 } else { exponent - 1075 };
    usize::try_from(-scale).unwrap_or(0)
}

/// Rounds `value` to the nearest integer, ties to even.
///
/// Returns `None` for non-finite input.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_to_int(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.round_ties_even() as i64)
}

/// Index of `root` relative to `other`: `round(round(root / other, 2) * 100)`.
///
/// Returns `None` when either side is missing or `other` is zero.
#[must_use]
pub fn rounded_ratio(root: Option<f64>, other: Option<f64>) -> Option<i64> {
    match (root, other) {
        (Some(root), Some(other)) if other != 0.0 => {
            round_to_int(round_to(root / other, 2) * 100.0)
        }
        _ => None,
    }
}

/// `num` as a percentage of `denom`, rounded to `digits` places.
///
/// Returns `None` when either side is missing or `denom` is zero.
#[must_use]
pub fn percentage(num: Option<f64>, denom: Option<f64>, digits: i32) -> Option<f64> {
    match (num, denom) {
        (Some(num), Some(denom)) if denom != 0.0 => Some(round_to(num / denom * 100.0, digits)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(200.0, 1), 200.0);
        assert_eq!(round_to_int(2.5), Some(2));
        assert_eq!(round_to_int(3.5), Some(4));
        assert_eq!(round_to_int(f64::NAN), None);
    }

    #[test]
    fn near_ties_follow_the_stored_value() {
        // Each literal is stored just below the written tie.
        assert_eq!(round_to(1.005, 2), 1.0);
        assert_eq!(round_to(0.285, 2), 0.28);
        assert_eq!(round_to(1.115, 2), 1.11);
        assert_eq!(round_to(0.045, 2), 0.04);
        assert_eq!(round_to(-2.675, 2), -2.67);
        // Exact ties go to the even digit.
        assert_eq!(round_to(0.5, 0), 0.0);
        assert_eq!(round_to(1.5, 0), 2.0);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-0.125, 2), -0.12);
    }

    #[test]
    fn rounding_carries_and_passes_through() {
        assert_eq!(round_to(9.996, 2), 10.0);
        assert_eq!(round_to(99.95, 1), 100.0);
        assert_eq!(round_to(166.666_666, 3), 166.667);
        assert_eq!(round_to(1234.0, 2), 1234.0);
        assert_eq!(round_to(0.0, 3), 0.0);
        assert_eq!(round_to(1e300, 2), 1e300);
        assert_eq!(round_to(1250.0, -2), 1200.0);
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn rounded_ratio_matches_profile_index() {
        assert_eq!(rounded_ratio(Some(50.0), Some(200.0)), Some(25));
        assert_eq!(rounded_ratio(Some(200.0), Some(200.0)), Some(100));
        assert_eq!(rounded_ratio(Some(1.0), Some(3.0)), Some(33));
        assert_eq!(rounded_ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(rounded_ratio(None, Some(1.0)), None);
    }

    #[test]
    fn percentages() {
        assert_eq!(percentage(Some(1.0), Some(8.0), 1), Some(12.5));
        assert_eq!(percentage(Some(5.0), Some(3.0), 3), Some(166.667));
        assert_eq!(percentage(Some(5.0), Some(0.0), 1), None);
        assert_eq!(percentage(None, Some(3.0), 1), None);
    }
}
