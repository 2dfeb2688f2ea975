//! `HH:MM` input mask and its decimal-hours encoding
//!
//! Durations travel to the backend as decimal hours (`7.5`) but are typed and
//! shown as `HH:MM` (`07:30`).

use crate::error::ValidationError;

const MAX_DIGITS: usize = 4;

/// Masks raw keystroke input: keeps at most four digits and puts a colon after
/// the first two once a third digit is present.
pub fn apply_mask(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(MAX_DIGITS)
        .collect();

    if digits.len() > 2 {
        format!("{}:{}", &digits[..2], &digits[2..])
    } else {
        digits
    }
}

/// Completes a partial value when the input loses focus.
///
/// The digits are right-padded with `0` to four and re-masked, so `"8"` becomes
/// `"80:00"` (and then fails validation) while `"083"` becomes `"08:30"`. An
/// empty input stays empty.
pub fn complete_partial(masked: &str) -> String {
    let digits: String = masked.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    apply_mask(&format!("{:0<width$}", digits, width = MAX_DIGITS))
}

/// Parses `H:MM` or `HH:MM` into `(hours, minutes)`
pub fn parse_masked(masked: &str) -> Option<(u32, u32)> {
    let (hours, minutes) = masked.split_once(':')?;

    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !(1..=2).contains(&hours.len()) || minutes.len() != 2 {
        return None;
    }
    if !all_digits(hours) || !all_digits(minutes) {
        return None;
    }

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    (hours <= 23 && minutes <= 59).then_some((hours, minutes))
}

/// Decimal hours of a masked value; `0.0` when the value does not parse
pub fn to_decimal(masked: &str) -> f64 {
    parse_masked(masked)
        .map(|(hours, minutes)| hours as f64 + minutes as f64 / 60.0)
        .unwrap_or(0.0)
}

/// Renders decimal hours as `HH:MM`, flooring hours and rounding minutes
pub fn to_masked(decimal: f64) -> String {
    if !decimal.is_finite() || decimal <= 0.0 {
        return "00:00".to_string();
    }

    let mut hours = decimal.floor() as u64;
    let mut minutes = ((decimal - decimal.floor()) * 60.0).round() as u64;
    if minutes == 60 {
        hours += 1;
        minutes = 0;
    }
    format!("{:02}:{:02}", hours, minutes)
}

/// Validates a duration for submission and returns its decimal hours
pub fn validate_duration(masked: &str) -> Result<f64, ValidationError> {
    let masked = masked.trim();
    if masked.is_empty() {
        return Err(ValidationError::MissingField("time".to_string()));
    }

    let (hours, minutes) =
        parse_masked(masked).ok_or_else(|| ValidationError::InvalidTime(masked.to_string()))?;
    if hours == 0 && minutes == 0 {
        return Err(ValidationError::ZeroDuration);
    }
    Ok(to_decimal(masked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "")]
    #[case("8", "8")]
    #[case("08", "08")]
    #[case("083", "08:3")]
    #[case("0830", "08:30")]
    #[case("08:30", "08:30")]
    #[case("0a8h3m0", "08:30")]
    #[case("123456", "12:34")]
    #[case("abc", "")]
    fn test_apply_mask(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(apply_mask(raw), expected);
    }

    #[test]
    fn test_long_digit_strings_truncate_to_four() {
        for raw in ["12345", "987654321", "00000000", "235999"] {
            let masked = apply_mask(raw);
            assert_eq!(masked.len(), 5);
            assert_eq!(masked.replace(':', ""), raw[..4]);
            assert_eq!(masked.as_bytes()[2], b':');
        }
    }

    #[rstest]
    #[case("", "")]
    #[case("8", "80:00")]
    #[case("08", "08:00")]
    #[case("08:3", "08:30")]
    #[case("08:30", "08:30")]
    fn test_complete_partial(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(complete_partial(input), expected);
    }

    #[rstest]
    #[case("08:30", Some((8, 30)))]
    #[case("8:30", Some((8, 30)))]
    #[case("23:59", Some((23, 59)))]
    #[case("24:00", None)]
    #[case("12:60", None)]
    #[case("123:00", None)]
    #[case("12:5", None)]
    #[case("1230", None)]
    #[case(":30", None)]
    #[case("+1:30", None)]
    fn test_parse_masked(#[case] input: &str, #[case] expected: Option<(u32, u32)>) {
        assert_eq!(parse_masked(input), expected);
    }

    #[test]
    fn test_to_decimal_and_back() {
        assert_eq!(to_decimal("07:30"), 7.5);
        assert_eq!(to_decimal("00:15"), 0.25);
        assert_eq!(to_decimal("bogus"), 0.0);
        assert_eq!(to_masked(7.5), "07:30");
        assert_eq!(to_masked(0.0), "00:00");
        assert_eq!(to_masked(31.25), "31:15");
        assert_eq!(to_masked(1.9999), "02:00");
    }

    #[test]
    fn test_round_trip_for_every_valid_value() {
        for hours in 0..=23 {
            for minutes in 0..=59 {
                let masked = format!("{:02}:{:02}", hours, minutes);
                assert_eq!(to_masked(to_decimal(&masked)), masked);
            }
        }
    }

    #[test]
    fn test_validate_duration() {
        assert!(matches!(
            validate_duration(""),
            Err(ValidationError::MissingField(_))
        ));
        assert_eq!(validate_duration("00:00"), Err(ValidationError::ZeroDuration));
        assert!(matches!(
            validate_duration("80:00"),
            Err(ValidationError::InvalidTime(_))
        ));
        let one_minute = validate_duration("00:01").unwrap();
        assert!(one_minute > 0.0);
        assert_eq!(validate_duration("01:30"), Ok(1.5));
    }
}
