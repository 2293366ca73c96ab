//! # LRC Parsing
//!
//! A timed line looks like `[mm:ss]text` or `[mm:ss.xx]text`, with exactly two
//! digits for minutes and seconds and two or three fraction digits. Anything
//! else is not a timestamp and the line is dropped. Source order is kept as
//! given, even when timestamps are out of order.

use crate::error::{LyricsError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One displayable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Seconds from the start of the song
    pub time: f64,
    pub text: String,
}

/// `true` if the text contains at least one `[dd:dd` marker.
pub fn is_timed(text: &str) -> bool {
    text.as_bytes().windows(6).any(|w| {
        w[0] == b'['
            && w[1].is_ascii_digit()
            && w[2].is_ascii_digit()
            && w[3] == b':'
            && w[4].is_ascii_digit()
            && w[5].is_ascii_digit()
    })
}

/// Parse every timed line. Lines without a valid leading timestamp, or with
/// nothing after it, are skipped.
pub fn parse_lrc(text: &str) -> Vec<LyricLine> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<LyricLine> {
    let rest = line.strip_prefix('[')?;
    let (stamp, text) = rest.split_once(']')?;
    let time = parse_timestamp(stamp)?;

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    Some(LyricLine {
        time,
        text: text.to_string(),
    })
}

fn parse_timestamp(stamp: &str) -> Option<f64> {
    let (minutes, rest) = stamp.split_once(':')?;
    let (seconds, fraction) = match rest.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (rest, None),
    };

    if !is_digits(minutes, 2) || !is_digits(seconds, 2) {
        return None;
    }

    let millis = match fraction {
        None => 0,
        Some(f) if (f.len() == 2 || f.len() == 3) && f.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{f:0<3}").parse::<u32>().ok()?
        }
        Some(_) => return None,
    };

    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    Some(f64::from(minutes * 60 + seconds) + f64::from(millis) / 1000.0)
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Index of the active line at `position`: the last line in source order whose
/// time is at or before `position`. `None` before the first timestamp.
pub fn active_line_index(lines: &[LyricLine], position: f64) -> Option<usize> {
    lines.iter().rposition(|line| line.time <= position)
}

/// Parsed lyrics ready for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lyrics {
    lines: Vec<LyricLine>,
    timed: bool,
}

impl Lyrics {
    /// Parse lyric text, never failing.
    ///
    /// Untimed text becomes a single line at 0 holding the whole text. Text
    /// that looks timed but yields no lines is treated the same way.
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::default();
        }

        if !is_timed(text) {
            return Self::untimed(text);
        }

        match Self::parse_timed(text) {
            Ok(lyrics) => lyrics,
            Err(e) => {
                warn!(error = %e, "Falling back to untimed lyrics");
                Self::untimed(text)
            }
        }
    }

    /// Strict timed parse.
    pub fn parse_timed(text: &str) -> Result<Self> {
        let lines = parse_lrc(text);
        if lines.is_empty() {
            return Err(LyricsError::Malformed(
                "timestamp markers present but no timed line parsed".to_string(),
            ));
        }
        Ok(Self { lines, timed: true })
    }

    fn untimed(text: &str) -> Self {
        Self {
            lines: vec![LyricLine {
                time: 0.0,
                text: text.trim().to_string(),
            }],
            timed: false,
        }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn is_timed(&self) -> bool {
        self.timed
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn active_line_index(&self, position: f64) -> Option<usize> {
        active_line_index(&self.lines, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(time: f64, text: &str) -> LyricLine {
        LyricLine {
            time,
            text: text.to_string(),
        }
    }

    #[test]
    fn parses_fraction_widths() {
        let lines = parse_lrc("[00:12.50]two\n[01:02.345]three\n[00:03]none");
        assert_eq!(
            lines,
            vec![line(12.5, "two"), line(62.345, "three"), line(3.0, "none")]
        );
    }

    #[test]
    fn rejects_non_timestamps() {
        let lines = parse_lrc(
            "[00:12.5]one digit\n[0:12.00]short minute\n[ar:Artist]\n  [00:01.00]indented\nplain",
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn drops_empty_text_and_trims() {
        let lines = parse_lrc("[00:01.00]   \n[00:02.00]  hello  \r\n[00:03.00]");
        assert_eq!(lines, vec![line(2.0, "hello")]);
    }

    #[test]
    fn keeps_source_order() {
        let lines = parse_lrc("[00:10.00]b\n[00:05.00]a");
        assert_eq!(lines[0].text, "b");
        assert_eq!(lines[1].text, "a");
    }

    #[test]
    fn detection() {
        assert!(is_timed("intro\n[00:01]x"));
        assert!(!is_timed("just words [1:00]"));
        assert!(!is_timed(""));
    }

    #[test]
    fn active_line_rules() {
        let lines = vec![line(1.0, "A"), line(3.0, "B"), line(5.0, "C")];
        assert_eq!(active_line_index(&lines, 0.5), None);
        assert_eq!(active_line_index(&lines, 1.0), Some(0));
        assert_eq!(active_line_index(&lines, 3.5), Some(1));
        assert_eq!(active_line_index(&lines, 500.0), Some(2));
        assert_eq!(active_line_index(&lines, f64::NAN), None);
        assert_eq!(active_line_index(&[], 10.0), None);
    }

    #[test]
    fn active_line_is_last_in_source_order_when_unsorted() {
        let lines = vec![line(10.0, "late"), line(2.0, "early")];
        assert_eq!(active_line_index(&lines, 3.0), Some(1));
        assert_eq!(active_line_index(&lines, 11.0), Some(1));
        assert_eq!(active_line_index(&lines, 1.0), None);
    }

    #[test]
    fn untimed_text_is_one_line_at_zero() {
        let lyrics = Lyrics::parse("la la la\nsecond verse\n");
        assert!(!lyrics.is_timed());
        assert_eq!(lyrics.lines(), &[line(0.0, "la la la\nsecond verse")]);
        assert_eq!(lyrics.active_line_index(0.0), Some(0));
    }

    #[test]
    fn malformed_timed_text_falls_back() {
        let text = "[00:01.00]\n[00:02.00]";
        assert!(matches!(Lyrics::parse_timed(text), Err(LyricsError::Malformed(_))));

        let lyrics = Lyrics::parse(text);
        assert!(!lyrics.is_timed());
        assert_eq!(lyrics.len(), 1);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(Lyrics::parse("  \n").is_empty());
    }
}
