use std::sync::OnceLock;

use regex::Regex;

/// Values extracted from one device line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub raw_value: i64,
    pub derived_value: f64,
}

/// `ADC: <int> | Current: <decimal> A`, anywhere in the line.
const READING_PATTERN: &str =
    r"(?i)ADC:\s*([-+]?\d+)\s*\|\s*Current:\s*([-+]?\d*\.?\d+)\s*A";

fn reading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(READING_PATTERN).expect("reading pattern is valid"))
}

/// Extract the raw ADC count and the current value from a device line.
/// Returns `None` when the line does not carry a reading or a number does
/// not fit its type.
pub fn parse_line(line: &str) -> Option<Reading> {
    let caps = reading_regex().captures(line)?;
    let raw_value = caps.get(1)?.as_str().parse::<i64>().ok()?;
    let derived_value = caps.get(2)?.as_str().parse::<f64>().ok()?;
    if !derived_value.is_finite() {
        return None;
    }
    Some(Reading { raw_value, derived_value })
}

/// Whether a non-reading line looks like device diagnostics worth showing.
pub fn is_informational<S: AsRef<str>>(line: &str, keywords: &[S]) -> bool {
    keywords
        .iter()
        .map(AsRef::as_ref)
        .any(|k| !k.is_empty() && line.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(raw: i64, derived: f64) -> Option<Reading> {
        Some(Reading { raw_value: raw, derived_value: derived })
    }

    #[test]
    fn test_parses_device_line() {
        assert_eq!(parse_line("ADC: 12345 | Current: 0.00123 A"), reading(12345, 0.00123));
    }

    #[test]
    fn test_signs_and_spacing() {
        assert_eq!(parse_line("ADC:-42|Current:-0.5A"), reading(-42, -0.5));
        assert_eq!(parse_line("   ADC:   +7   |   Current:  +.25   A   "), reading(7, 0.25));
        assert_eq!(parse_line("\tADC: 0 | Current: 3 A\r"), reading(0, 3.0));
        assert_eq!(
            parse_line("ADC: -8388607 | Current: -0.000123456 A"),
            reading(-8388607, -0.000123456)
        );
    }

    #[test]
    fn test_embedded_in_other_text() {
        assert_eq!(
            parse_line("[t=12] ADC: 1000 | Current: 0.001000 A (ok)"),
            reading(1000, 0.001)
        );
    }

    #[test]
    fn test_case_insensitive_markers() {
        assert_eq!(parse_line("adc: 5 | current: 0.1 a"), reading(5, 0.1));
    }

    #[test]
    fn test_rejects_non_readings() {
        for line in [
            "",
            "booting up, ADC ready",
            "=== CS1237 startup ===",
            "ADC: 12 | Voltage: 0.1 V",
            "ADC: abc | Current: 0.1 A",
            "ADC: 12 | Current: x A",
            "ADC: 12 Current: 0.1 A",
            "Current: 0.1 A | ADC: 12",
            "ADC: 12 | Current: 0.1",
        ] {
            assert_eq!(parse_line(line), None, "{line:?}");
        }
    }

    #[test]
    fn test_raw_overflow_is_no_value() {
        assert_eq!(parse_line("ADC: 99999999999999999999 | Current: 0.1 A"), None);
    }

    #[test]
    fn test_informational_keywords() {
        let keywords = ["ADC", "配置", "錯誤"];
        assert!(is_informational("booting up, ADC ready", &keywords));
        assert!(is_informational("❌ 錯誤: ADC 初始化失敗", &keywords));
        assert!(!is_informational("hello", &keywords));
        assert!(!is_informational("anything", &[""]));
    }
}
