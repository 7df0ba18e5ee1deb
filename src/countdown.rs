//! Countdown arithmetic and display formatting.
//!
//! A countdown is a signed number of seconds. Positive values count down to
//! the campaign start, negative values count up the time since it went
//! negative. Every tick moves the value exactly one second forward in time.

use std::fmt;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

// ---------------------------------------------------------------------------
// CountdownDisplay
// ---------------------------------------------------------------------------

/// Decomposed, sign-aware view of a countdown value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountdownDisplay {
    pub negative: bool,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl CountdownDisplay {
    /// Decompose `seconds` into days / hours / minutes / seconds.
    pub fn of(seconds: i64) -> Self {
        let magnitude = seconds.unsigned_abs();
        Self {
            negative: seconds < 0,
            days: magnitude / SECONDS_PER_DAY,
            hours: (magnitude / SECONDS_PER_HOUR) % 24,
            minutes: (magnitude / SECONDS_PER_MINUTE) % 60,
            seconds: magnitude % 60,
        }
    }

    /// Negative countdowns are shown with the elapsed style.
    pub fn is_elapsed(&self) -> bool {
        self.negative
    }
}

impl fmt::Display for CountdownDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(
            f,
            "{}{}d {:02}h {:02}m {:02}s",
            sign, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Result of advancing a countdown by one second.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tick {
    pub display: CountdownDisplay,
    pub next_seconds: i64,
}

/// The countdown value one second after `seconds`.
///
/// Non-negative values decrement (`0` becomes `-1`, there is no resting state
/// at zero). Negative values grow in magnitude: `-n` becomes `-(n + 1)`.
pub fn next_seconds(seconds: i64) -> i64 {
    if seconds < 0 {
        let magnitude = seconds.unsigned_abs().saturating_add(1);
        i64::try_from(magnitude).map(|m| -m).unwrap_or(i64::MIN)
    } else {
        seconds - 1
    }
}

/// Advance `seconds` by one tick and format the new value.
pub fn format(seconds: i64) -> Tick {
    let next = next_seconds(seconds);
    Tick {
        display: CountdownDisplay::of(next),
        next_seconds: next,
    }
}

/// Coerce a textual seconds value into an integer.
///
/// Accepts integers (`"42"`, `"-7"`) and decimals (`"42.9"`, truncated toward
/// zero). Anything else is treated as zero.
pub fn coerce_seconds(input: &str) -> i64 {
    let trimmed = input.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => truncate_seconds(value),
        _ => 0,
    }
}

/// Truncate a fractional seconds value toward zero, saturating at the i64 range.
pub fn truncate_seconds(value: f64) -> i64 {
    if value.is_nan() {
        0
    } else {
        // `as` saturates for out-of-range floats.
        value.trunc() as i64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_positive_decrements() {
        let tick = format(5);
        assert_eq!(tick.next_seconds, 4);
        assert_eq!(tick.display.to_string(), "0d 00h 00m 04s");
        assert!(!tick.display.is_elapsed());
    }

    #[test]
    fn test_zero_becomes_minus_one() {
        let tick = format(0);
        assert_eq!(tick.next_seconds, -1);
        assert_eq!(tick.display.to_string(), "-0d 00h 00m 01s");
        assert!(tick.display.is_elapsed());
    }

    #[test]
    fn test_negative_grows_magnitude() {
        let tick = format(-1);
        assert_eq!(tick.next_seconds, -2);
        assert_eq!(tick.display.to_string(), "-0d 00h 00m 02s");
    }

    #[test]
    fn test_decomposition() {
        // 2 days, 3 hours, 4 minutes, 5 seconds, plus one second for the tick.
        let seconds = 2 * 86_400 + 3 * 3_600 + 4 * 60 + 6;
        assert_eq!(format(seconds).display.to_string(), "2d 03h 04m 05s");
        assert_eq!(format(-seconds).display.to_string(), "-2d 03h 04m 07s");
    }

    #[test]
    fn test_five_seconds_across_zero() {
        let mut value = 5;
        let mut shown = Vec::new();
        for _ in 0..7 {
            let tick = format(value);
            shown.push(tick.display.to_string());
            value = tick.next_seconds;
        }
        assert_eq!(shown[0], "0d 00h 00m 04s");
        assert_eq!(shown[4], "0d 00h 00m 00s");
        assert_eq!(shown[5], "-0d 00h 00m 01s");
        assert_eq!(shown[6], "-0d 00h 00m 02s");
        assert_eq!(value, -2);
    }

    #[test]
    fn test_coerce_seconds() {
        assert_eq!(coerce_seconds("42"), 42);
        assert_eq!(coerce_seconds(" -7 "), -7);
        assert_eq!(coerce_seconds("12.9"), 12);
        assert_eq!(coerce_seconds("-12.9"), -12);
        assert_eq!(coerce_seconds("soon"), 0);
        assert_eq!(coerce_seconds(""), 0);
    }

    #[test]
    fn test_text_input_formats_like_integer() {
        assert_eq!(format(coerce_seconds("14400")), format(14400));
        assert_eq!(format(coerce_seconds("-2")), format(-2));
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        assert_eq!(next_seconds(i64::MIN), i64::MIN);
        assert_eq!(format(i64::MAX).next_seconds, i64::MAX - 1);
    }

    proptest! {
        #[test]
        fn prop_positive_decrements(n in 1i64..=i64::MAX) {
            prop_assert_eq!(format(n).next_seconds, n - 1);
        }

        #[test]
        fn prop_negative_grows(n in (i64::MIN / 2)..=-1i64) {
            prop_assert_eq!(format(n).next_seconds, -(n.abs() + 1));
        }

        #[test]
        fn prop_sequence_is_contiguous(start in -100_000i64..100_000, steps in 1usize..200) {
            let mut value = start;
            let mut zero_elapsed = 0;
            for _ in 0..steps {
                let tick = format(value);
                prop_assert_eq!(tick.next_seconds, value - 1);
                if tick.display.is_elapsed() && tick.display.to_string() == "-0d 00h 00m 00s" {
                    zero_elapsed += 1;
                }
                value = tick.next_seconds;
            }
            prop_assert_eq!(zero_elapsed, 0);
        }

        #[test]
        fn prop_fields_zero_padded(n in -10_000_000i64..10_000_000) {
            let display = format(n).display;
            let text = display.to_string();
            let parts: Vec<&str> = text.split(' ').collect();
            prop_assert_eq!(parts.len(), 4);
            for (part, value) in parts[1..].iter().zip([display.hours, display.minutes, display.seconds]) {
                prop_assert_eq!(part.len(), 3);
                prop_assert_eq!(part.starts_with('0'), value < 10);
            }
        }
    }
}
