//! Margin-of-error formulas from the ACS General Handbook.
//!
//! See "Calculating MOEs for Derived Proportions" and "Calculating MOEs for
//! Derived Ratios" (appendix A-14 / A-15) of
//! <https://www.census.gov/acs/www/Downloads/handbooks/ACSGeneralHandbook.pdf>.
//!
//! Every argument is nullable; a null argument counts as `0`.

fn condition(arg: Option<f64>) -> f64 {
    arg.unwrap_or(0.0)
}

/// MOE of a sum or difference of two estimates.
#[must_use]
#[allow(clippy::suboptimal_flops)] // fused multiply-add would change the last bit
pub fn moe_add(moe_a: Option<f64>, moe_b: Option<f64>) -> f64 {
    let (a, b) = (condition(moe_a), condition(moe_b));
    (a * a + b * b).sqrt()
}

/// MOE of a derived proportion (numerator is a subset of the denominator).
///
/// Falls back to [`moe_ratio`] when the radicand is negative. Returns
/// `None` for a zero denominator.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn moe_proportion(
    numerator: Option<f64>,
    denominator: Option<f64>,
    numerator_moe: Option<f64>,
    denominator_moe: Option<f64>,
) -> Option<f64> {
    let denominator = condition(denominator);
    if denominator == 0.0 {
        return None;
    }

    let ratio = condition(numerator) / denominator;
    let numerator_moe = condition(numerator_moe);
    let denominator_moe = condition(denominator_moe);

    let radicand = numerator_moe.powi(2) - ratio.powi(2) * denominator_moe.powi(2);
    if radicand < 0.0 {
        return Some(ratio_error(
            ratio,
            denominator,
            numerator_moe,
            denominator_moe,
        ));
    }

    Some(radicand.sqrt() / denominator)
}

/// MOE of a derived ratio (numerator is not a subset of the denominator).
///
/// Returns `None` for a zero denominator.
#[must_use]
pub fn moe_ratio(
    numerator: Option<f64>,
    denominator: Option<f64>,
    numerator_moe: Option<f64>,
    denominator_moe: Option<f64>,
) -> Option<f64> {
    let denominator = condition(denominator);
    if denominator == 0.0 {
        return None;
    }

    Some(ratio_error(
        condition(numerator) / denominator,
        denominator,
        condition(numerator_moe),
        condition(denominator_moe),
    ))
}

#[allow(clippy::suboptimal_flops)]
fn ratio_error(ratio: f64, denominator: f64, numerator_moe: f64, denominator_moe: f64) -> f64 {
    (numerator_moe.powi(2) + ratio.powi(2) * denominator_moe.powi(2)).sqrt() / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moe_add_is_root_sum_of_squares() {
        assert_eq!(moe_add(Some(3.0), Some(4.0)), 5.0);
        assert_eq!(moe_add(None, Some(7.5)), 7.5);
        assert_eq!(moe_add(Some(2.0), None), 2.0);
        assert_eq!(moe_add(None, None), 0.0);
    }

    #[test]
    fn proportion_of_zero_denominator_is_null() {
        assert_eq!(moe_proportion(Some(1.0), Some(0.0), Some(1.0), Some(1.0)), None);
        assert_eq!(moe_proportion(Some(1.0), None, Some(1.0), Some(1.0)), None);
        assert_eq!(moe_ratio(Some(1.0), Some(0.0), Some(1.0), Some(1.0)), None);
    }

    #[test]
    fn proportion_falls_back_to_ratio_formula() {
        let proportion = moe_proportion(Some(60.0), Some(20.0), Some(2.0), Some(1.0));
        let ratio = moe_ratio(Some(60.0), Some(20.0), Some(2.0), Some(1.0));
        assert_eq!(proportion, ratio);
    }

    #[test]
    fn ratio_formula_adds_the_denominator_term() {
        let moe = moe_ratio(Some(10.0), Some(5.0), Some(3.0), Some(2.0)).unwrap();
        assert_eq!(moe, (9.0_f64 + 4.0 * 4.0).sqrt() / 5.0);
    }
}
