//! # Scale Signal Stabilizer
//!
//! Turns the noisy line-oriented stream from the scale indicator into
//! trustworthy discrete weight readings.
//!
//! ## Debounce Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stabilizer State Machine                             │
//! │                                                                         │
//! │  Raw line "ST,GS,  12000"                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  parse: [status, _, weight]      < 3 fields or bad weight → dropped,   │
//! │       │                           counters untouched                   │
//! │       ▼                                                                 │
//! │  status != "ST" ──────────────► run length := 0 (noise never           │
//! │       │                          accumulates toward stability)         │
//! │       ▼                                                                 │
//! │  same value as current run? ──► run length += 1                        │
//! │  changed value? ──────────────► run length := 1 (fresh run)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  run length == threshold (6) ─► EMIT stable reading, run length := 0   │
//! │                                  (suppressed when equal to the         │
//! │                                   previous emission, if enabled)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The repeat-emission suppression mirrors the indicator's observed behavior
//! in the field: once a weight has been reported stable, an indicator left
//! alone keeps repeating it forever. Pull-based queries that need the
//! instantaneous value bypass this gate via [`parse_line`].

use chrono::{DateTime, Utc};

use crate::types::{ScaleStatus, WeightReading};
use crate::STABILITY_THRESHOLD;

/// Stabilizer tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct StabilizerConfig {
    /// Consecutive qualifying stable reads required before emitting.
    pub threshold: u32,

    /// When true, a stable reading equal to the previously emitted one is
    /// swallowed instead of re-emitted. Disable to allow legitimate
    /// re-weighs of the exact same value to notify again.
    pub suppress_repeat_emission: bool,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        StabilizerConfig {
            threshold: STABILITY_THRESHOLD,
            suppress_repeat_emission: true,
        }
    }
}

/// Parses one raw serial line into `(status, weight)`.
///
/// Expected payload shape: `status,unused,weight[,...]` — comma separated,
/// at least three fields, weight parsed as a leading integer (trailing
/// units like `" kg"` are tolerated). Returns `None` for malformed lines.
pub fn parse_line(line: &str) -> Option<(ScaleStatus, i64)> {
    let mut parts = line.split(',');
    let status = parts.next()?;
    let _unused = parts.next()?;
    let weight = parse_weight(parts.next()?)?;
    Some((ScaleStatus::from_flag(status.trim()), weight))
}

/// Parses a weight field: optional sign followed by leading digits.
fn parse_weight(field: &str) -> Option<i64> {
    let field = field.trim();
    let (sign, digits) = match field.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, field.strip_prefix('+').unwrap_or(field)),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }

    digits[..end].parse::<i64>().ok().map(|w| sign * w)
}

/// Debouncing state machine over the raw line stream.
///
/// Feed every incoming line; a `Some` return is a trusted stable reading.
#[derive(Debug)]
pub struct Stabilizer {
    config: StabilizerConfig,
    /// Value of the stable run currently being counted.
    run_value: i64,
    /// Length of the current run of identical stable reads.
    run_length: u32,
    /// Value of the last emitted stable reading, for repeat suppression.
    last_emitted: Option<i64>,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Stabilizer {
            config,
            run_value: 0,
            run_length: 0,
            last_emitted: None,
        }
    }

    /// Feeds one raw line through the state machine.
    ///
    /// Returns a stable reading stamped with `now` when the stability
    /// threshold is reached, `None` otherwise.
    pub fn feed(&mut self, line: &str, now: DateTime<Utc>) -> Option<WeightReading> {
        let Some((status, value)) = parse_line(line) else {
            // Malformed lines are dropped without affecting counters.
            return None;
        };

        if status != ScaleStatus::Stable {
            // Unstable readings never accumulate toward stability.
            self.run_length = 0;
            return None;
        }

        if self.run_length > 0 && value != self.run_value {
            // A changed value starts a fresh run.
            self.run_length = 1;
        } else {
            self.run_length += 1;
        }
        self.run_value = value;

        if self.run_length < self.config.threshold {
            return None;
        }
        self.run_length = 0;

        if self.config.suppress_repeat_emission && self.last_emitted == Some(value) {
            return None;
        }
        self.last_emitted = Some(value);

        Some(WeightReading {
            status: ScaleStatus::Stable,
            value,
            observed_at: now,
        })
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Stabilizer::new(StabilizerConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(stab: &mut Stabilizer, lines: &[&str]) -> Vec<WeightReading> {
        let now = Utc::now();
        lines.iter().filter_map(|l| stab.feed(l, now)).collect()
    }

    #[test]
    fn six_identical_stable_lines_emit_once() {
        let mut stab = Stabilizer::default();
        let emitted = feed_all(&mut stab, &["ST,GS,100"; 6]);

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].value, 100);
        assert_eq!(emitted[0].status, ScaleStatus::Stable);
    }

    #[test]
    fn five_stable_lines_emit_nothing() {
        let mut stab = Stabilizer::default();
        assert!(feed_all(&mut stab, &["ST,GS,100"; 5]).is_empty());
    }

    #[test]
    fn unstable_line_resets_the_run() {
        let mut stab = Stabilizer::default();
        let mut lines = vec!["ST,GS,100"; 5];
        lines.push("US,GS,100");
        assert!(feed_all(&mut stab, &lines).is_empty());

        // Six fresh stable lines are required afterward.
        assert!(feed_all(&mut stab, &["ST,GS,100"; 5]).is_empty());
        assert_eq!(feed_all(&mut stab, &["ST,GS,100"]).len(), 1);
    }

    #[test]
    fn changed_value_restarts_the_run() {
        let mut stab = Stabilizer::default();
        let emitted = feed_all(
            &mut stab,
            &[
                "ST,GS,100", "ST,GS,100", "ST,GS,100",
                "ST,GS,250", // platform still settling
                "ST,GS,250", "ST,GS,250", "ST,GS,250", "ST,GS,250",
            ],
        );
        assert!(emitted.is_empty());

        assert_eq!(feed_all(&mut stab, &["ST,GS,250"]).len(), 1);
    }

    #[test]
    fn malformed_lines_do_not_touch_counters() {
        let mut stab = Stabilizer::default();
        let emitted = feed_all(
            &mut stab,
            &[
                "ST,GS,100", "ST,GS,100", "ST,GS,100",
                "garbage",        // fewer than 3 fields
                "ST,GS",          // fewer than 3 fields
                "ST,GS,heavy",    // no leading digits
                "ST,GS,100", "ST,GS,100", "ST,GS,100",
            ],
        );
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].value, 100);
    }

    #[test]
    fn repeat_emission_suppressed_by_default() {
        let mut stab = Stabilizer::default();
        let emitted = feed_all(&mut stab, &["ST,GS,100"; 18]);
        // 18 lines is three full runs, but only the first emits.
        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn repeat_emission_allowed_when_toggle_off() {
        let mut stab = Stabilizer::new(StabilizerConfig {
            suppress_repeat_emission: false,
            ..Default::default()
        });
        let emitted = feed_all(&mut stab, &["ST,GS,100"; 18]);
        assert_eq!(emitted.len(), 3);
    }

    #[test]
    fn suppression_only_applies_to_the_previous_emission() {
        let mut stab = Stabilizer::default();
        let mut lines = vec!["ST,GS,100"; 6];
        lines.extend(vec!["ST,GS,300"; 6]);
        lines.extend(vec!["ST,GS,100"; 6]);

        let emitted = feed_all(&mut stab, &lines);
        let values: Vec<i64> = emitted.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![100, 300, 100]);
    }

    #[test]
    fn parses_units_and_padding_in_weight_field() {
        assert_eq!(parse_line("ST,GS,  12000 kg"), Some((ScaleStatus::Stable, 12000)));
        assert_eq!(parse_line("US,GS,-40"), Some((ScaleStatus::Unstable, -40)));
        assert_eq!(parse_line("ST,GS,kg"), None);
        assert_eq!(parse_line("ST,GS"), None);
    }
}
