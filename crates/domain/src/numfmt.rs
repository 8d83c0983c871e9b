//! Human-oriented number formatting shared by the progress and size reports

/// Format like printf's `%#.{precision}g`
///
/// Keeps `precision` significant digits, trailing zeros and the decimal
/// point, switching to scientific notation for exponents below -4 or at
/// least `precision`.
pub fn general(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let point = if mantissa.contains('.') { "" } else { "." };
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}{}e{}{:02}", mantissa, point, sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        let mut fixed = format!("{:.*}", decimals, value);
        if decimals == 0 {
            fixed.push('.');
        }
        fixed
    }
}

/// [`general`] with four significant digits, right-aligned in six columns
pub fn general_compact(value: f64) -> String {
    format!("{:>6}", general(value, 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_fixed_range() {
        assert_eq!(general(0.0, 4), "0.000");
        assert_eq!(general(5.0, 4), "5.000");
        assert_eq!(general(12.3456, 4), "12.35");
        assert_eq!(general(1234.0, 4), "1234.");
        assert_eq!(general(0.00012345, 4), "0.0001234");
    }

    #[test]
    fn test_general_scientific_range() {
        assert_eq!(general(12346.0, 4), "1.235e+04");
        assert_eq!(general(0.00001, 4), "1.000e-05");
        assert_eq!(general(2.5e300, 4), "2.500e+300");
        assert_eq!(general(3.0e6, 1), "3.e+06");
    }

    #[test]
    fn test_general_rounding_moves_exponent() {
        assert_eq!(general(9999.7, 4), "1.000e+04");
        assert_eq!(general(-0.5, 4), "-0.5000");
    }

    #[test]
    fn test_general_non_finite() {
        assert_eq!(general(f64::NAN, 4), "nan");
        assert_eq!(general(f64::INFINITY, 4), "inf");
        assert_eq!(general(f64::NEG_INFINITY, 4), "-inf");
    }

    #[test]
    fn test_general_compact_pads() {
        assert_eq!(general_compact(5.0), " 5.000");
        assert_eq!(general_compact(12346.0), "1.235e+04");
    }
}
