//! Various small helper functions

use std::num::ParseIntError;
use std::time::Duration;

/// Splits the input string into two parts at the first occurence of the separator
pub fn split_into_two(input: &str, separator: &'static str) -> Option<(String, String)> {
    let parts: Vec<&str> = input.splitn(2, separator).collect();

    if parts.len() != 2 {
        return None;
    }

    Some((parts[0].to_string(), parts[1].to_string()))
}

/// Parses a Duration from a string containing milliseconds.
/// Useful for command line parsing
pub fn parse_millis(src: &str) -> Result<Duration, ParseIntError> {
    let millis = src.parse::<u64>()?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn split_at_first_separator() {
        assert_eq!(
            split_into_two("session:file:extra", ":"),
            Some(("session".to_string(), "file:extra".to_string()))
        );
    }

    #[test]
    fn reject_missing_separator() {
        assert_eq!(split_into_two("session", ":"), None);
    }

    #[test]
    fn parse_durations() {
        assert_eq!(parse_millis("250").unwrap(), Duration::from_millis(250));
        assert!(parse_millis("soon").is_err());
    }
}
