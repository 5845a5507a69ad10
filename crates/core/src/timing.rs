//! Derived Morse timings shared by the generator and receiver.

/// Lower/upper bounds on speed, in words per minute.
pub const SPEED_MIN_WPM: u32 = 4;
pub const SPEED_MAX_WPM: u32 = 60;

pub const FREQUENCY_MIN_HZ: i32 = 0;
pub const FREQUENCY_MAX_HZ: i32 = 4000;

pub const VOLUME_MIN_PCT: u8 = 0;
pub const VOLUME_MAX_PCT: u8 = 100;

pub const GAP_MIN: u32 = 0;
pub const GAP_MAX: u32 = 60;

pub const WEIGHTING_MIN: u32 = 20;
pub const WEIGHTING_MAX: u32 = 80;
pub const WEIGHTING_STANDARD: u32 = 50;

pub const TOLERANCE_MIN_PCT: u32 = 0;
pub const TOLERANCE_MAX_PCT: u32 = 90;

/// Derived element timings, all in microseconds, for a given
/// (speed, weighting, gap) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub unit_us: i64,
    pub dot_us: i64,
    pub dash_us: i64,
    pub inter_element_us: i64,
    pub inter_character_us: i64,
    pub inter_word_us: i64,
}

impl Timings {
    /// `unit = 1_200_000 / wpm; dot = unit * weighting/50; dash = 3*dot;
    /// inter_element = unit; inter_character = 3*unit + gap*unit;
    /// inter_word = 7*unit + gap*unit`.
    pub fn derive(wpm: u32, weighting: u32, gap: u32) -> Self {
        let wpm = wpm.max(1) as i64;
        let unit_us = 1_200_000 / wpm;
        let dot_us = unit_us * weighting as i64 / WEIGHTING_STANDARD as i64;
        let dash_us = 3 * dot_us;
        let inter_element_us = unit_us;
        let inter_character_us = 3 * unit_us + gap as i64 * unit_us;
        let inter_word_us = 7 * unit_us + gap as i64 * unit_us;
        Timings {
            unit_us,
            dot_us,
            dash_us,
            inter_element_us,
            inter_character_us,
            inter_word_us,
        }
    }

    /// `unit = 1_200_000 / wpm` alone, used by the receiver which does not
    /// track weighting/gap (it classifies durations, it doesn't produce them).
    pub fn unit_us_for_speed(wpm: f64) -> f64 {
        1_200_000.0 / wpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paris_totals_fifty_units_at_20_wpm() {
        // "PARIS" sent character-by-character at standard weighting/gap
        // totals 50 dot-units.
        let t = Timings::derive(20, WEIGHTING_STANDARD, 0);
        assert_eq!(t.unit_us, 60_000);

        // P=.--.  A=.-  R=.-.  I=..  S=...
        let words = ["P", "A", "R", "I", "S"];
        let reps: Vec<&str> = words
            .iter()
            .map(|w| crate::morse::char_to_representation(w.chars().next().unwrap()).unwrap())
            .collect();

        let mut total = 0i64;
        for (idx, rep) in reps.iter().enumerate() {
            for (i, sym) in rep.chars().enumerate() {
                total += if sym == '.' { t.dot_us } else { t.dash_us };
                if i + 1 < rep.len() {
                    total += t.inter_element_us;
                }
            }
            if idx + 1 < reps.len() {
                total += t.inter_character_us;
            }
        }
        // Including the trailing inter-word gap, "PARIS" is the classic
        // 50-unit timing reference.
        total += t.inter_word_us;
        assert_eq!(total, 3_000_000);
    }

    #[test]
    fn weighting_50_is_standard_a() {
        let t = Timings::derive(20, 50, 0);
        assert_eq!(t.dash_us, 3 * t.dot_us);
        assert_eq!(t.dot_us + t.dash_us + 3 * t.inter_element_us, t.unit_us * 7);
    }
}
