use std::time::Duration;

/// Parses a duration string such as "250ms", "30s", "10m", "5h" or "3d".
///
/// A bare number is not accepted; the unit is mandatory.
pub fn parse_duration_string(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration string cannot be empty".to_string());
    }

    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("Unknown duration unit in '{}'. Use 'ms', 's', 'm', 'h', or 'd'.", s))?;
    let (value_str, unit) = s.split_at(split_at);

    let value: u64 = value_str
        .parse()
        .map_err(|_| format!("Invalid numeric value in duration: '{}'", value_str))?;

    let seconds_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "Unknown duration unit: '{}'. Use 'ms', 's', 'm', 'h', or 'd'.",
                unit
            ))
        }
    };

    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration '{}' is too large", s))
}

/// Splits a comma-separated header list, honoring `\,` as a literal comma.
///
/// Blank entries are skipped; other entries are returned untrimmed.
/// Example: "Connection:keep-alive,Keep-Alive:timeout=5\,max=200"
pub fn parse_headers_with_escapes(headers_str: &str) -> Vec<String> {
    const PLACEHOLDER: char = '\u{0}';

    headers_str
        .replace("\\,", &PLACEHOLDER.to_string())
        .split(',')
        .filter(|header| !header.trim().is_empty())
        .map(|header| header.replace(PLACEHOLDER, ","))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod duration {
        use super::*;

        #[test]
        fn parse_millis() {
            assert_eq!(
                parse_duration_string("250ms").unwrap(),
                Duration::from_millis(250)
            );
        }

        #[test]
        fn parse_seconds() {
            assert_eq!(
                parse_duration_string("30s").unwrap(),
                Duration::from_secs(30)
            );
        }

        #[test]
        fn parse_minutes() {
            assert_eq!(
                parse_duration_string("10m").unwrap(),
                Duration::from_secs(600)
            );
        }

        #[test]
        fn parse_hours_and_days() {
            assert_eq!(
                parse_duration_string("5h").unwrap(),
                Duration::from_secs(18000)
            );
            assert_eq!(
                parse_duration_string("3d").unwrap(),
                Duration::from_secs(259200)
            );
        }

        #[test]
        fn trims_whitespace() {
            assert_eq!(
                parse_duration_string("  10m  ").unwrap(),
                Duration::from_secs(600)
            );
        }

        #[test]
        fn empty_string_errors() {
            let err = parse_duration_string("   ").unwrap_err();
            assert!(err.contains("empty"), "error was: {}", err);
        }

        #[test]
        fn unknown_suffix_errors() {
            let err = parse_duration_string("10x").unwrap_err();
            assert!(err.contains("Unknown duration unit"), "error was: {}", err);
        }

        #[test]
        fn no_suffix_errors() {
            let err = parse_duration_string("10").unwrap_err();
            assert!(err.contains("Unknown duration unit"), "error was: {}", err);
        }

        #[test]
        fn no_number_errors() {
            let err = parse_duration_string("m").unwrap_err();
            assert!(err.contains("Invalid numeric"), "error was: {}", err);
        }

        #[test]
        fn fractional_number_errors() {
            let err = parse_duration_string("5.5h").unwrap_err();
            assert!(err.contains("Unknown duration unit"), "error was: {}", err);
        }

        #[test]
        fn overflow_errors() {
            let err = parse_duration_string("18446744073709551615d").unwrap_err();
            assert!(err.contains("too large"), "error was: {}", err);
        }
    }

    #[test]
    fn test_parse_headers_simple() {
        let result = parse_headers_with_escapes("Content-Type:application/json,X-Run:bench");
        assert_eq!(result, vec!["Content-Type:application/json", "X-Run:bench"]);
    }

    #[test]
    fn test_parse_headers_with_escaped_comma() {
        let result =
            parse_headers_with_escapes("Connection:keep-alive,Keep-Alive:timeout=5\\,max=200");
        assert_eq!(
            result,
            vec!["Connection:keep-alive", "Keep-Alive:timeout=5,max=200"]
        );
    }

    #[test]
    fn test_parse_headers_skips_blank_entries() {
        let result = parse_headers_with_escapes("  A:1  ,  ,B:2,");
        assert_eq!(result, vec!["  A:1  ", "B:2"]);
    }

    #[test]
    fn test_parse_headers_keeps_other_backslashes() {
        let result = parse_headers_with_escapes("Path:C:\\Users\\test,Host:example.com");
        assert_eq!(result, vec!["Path:C:\\Users\\test", "Host:example.com"]);
    }
}
