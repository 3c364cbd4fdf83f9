use std::time::Duration;

/// Parses a duration string into a number of milliseconds.
///
/// The input is a sequence of `<digits><unit>` pairs where the unit is one of `s`, `m`, `h`
/// or `d`, e.g. `1m30s`.
///
/// # Returns
/// A number of milliseconds, or `None` if the input string is invalid or overflows.
///
/// # Examples
///
/// ```
/// use kvm_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1m30s"), Some(90_000));
/// ```
pub fn parse_duration(input: &str) -> Option<u128> {
    let mut total: u128 = 0;
    let mut chars = input.chars().peekable();

    while chars.peek().is_some() {
        let mut number_str = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number_str.push(chars.next()?);
            } else {
                break;
            }
        }

        if number_str.is_empty() {
            return None;
        }

        let number: u128 = number_str.parse().ok()?;
        let multiplier = match chars.next()? {
            's' => 1000,
            'm' => 60 * 1000,
            'h' => 60 * 60 * 1000,
            'd' => 24 * 60 * 60 * 1000,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(multiplier)?)?;
    }

    Some(total)
}

/// Like [`parse_duration`], but returns a [`Duration`] and rejects a zero-length result.
pub fn parse_timeout(input: &str) -> Option<Duration> {
    let millis = parse_duration(input)?;
    if millis == 0 {
        return None;
    }
    u64::try_from(millis).ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s"), Some(1000));
        assert_eq!(parse_duration("1m"), Some(60 * 1000));
        assert_eq!(parse_duration("1h"), Some(60 * 60 * 1000));
        assert_eq!(parse_duration("1d"), Some(24 * 60 * 60 * 1000));
        assert_eq!(
            parse_duration("1d1h1m1s"),
            Some(24 * 60 * 60 * 1000 + 60 * 60 * 1000 + 60 * 1000 + 1000)
        );
        assert_eq!(parse_duration("1d1h1m1s1"), None);
        assert_eq!(parse_duration("1x"), None);
        assert_eq!(parse_duration("fail"), None);
        assert_eq!(parse_duration(""), Some(0));
    }

    #[test]
    fn test_integer_overflow() {
        assert_eq!(
            parse_duration("340282366920938463463374607431768211456"),
            None
        );
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("60s"), Some(Duration::from_secs(60)));
        assert_eq!(parse_timeout("0s"), None);
        assert_eq!(parse_timeout(""), None);
        assert_eq!(parse_timeout("soon"), None);
    }
}
