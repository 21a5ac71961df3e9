//! Time-tagged lyric text (`[mm:ss.xx] line`).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Seconds from the start of the track.
    pub time: f64,
    pub text: String,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[(\d+):(\d{2})\.(\d{2,3})\]").expect("static lyric tag pattern")
    })
}

/// Parse raw text into lines sorted by time.
///
/// A 2-digit fraction is centiseconds, a 3-digit one milliseconds. Lines
/// without a leading tag, and tagged lines with no text, are skipped one by
/// one; parsing itself never fails.
pub fn parse(raw: &str) -> Vec<LyricLine> {
    let mut lines: Vec<LyricLine> = raw.lines().filter_map(parse_line).collect();
    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
    lines
}

fn parse_line(line: &str) -> Option<LyricLine> {
    let Some(caps) = tag_re().captures(line) else {
        if !line.trim().is_empty() {
            trace!("lyrics: skip untagged {:?}", line);
        }
        return None;
    };
    let minutes: u64 = caps[1].parse().ok()?;
    let seconds: u64 = caps[2].parse().ok()?;
    let frac = &caps[3];
    let millis: u64 = frac.parse::<u64>().ok()? * if frac.len() == 2 { 10 } else { 1 };

    let tag_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let text = line[tag_end..].trim();
    if text.is_empty() {
        trace!("lyrics: skip empty line at {}:{}", minutes, seconds);
        return None;
    }

    // whole milliseconds first so serialize() can reproduce the value exactly
    let Some(total_ms) = minutes
        .checked_mul(60_000)
        .and_then(|ms| ms.checked_add(seconds * 1000 + millis))
    else {
        trace!("lyrics: skip out-of-range tag {:?}", &caps[0]);
        return None;
    };
    Some(LyricLine {
        time: total_ms as f64 / 1000.0,
        text: text.to_string(),
    })
}

/// Write lines back out as `[mm:ss.fff] text`, one per line.
pub fn serialize(lines: &[LyricLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let ms = (line.time.max(0.0) * 1000.0).round() as u64;
        out.push_str(&format!(
            "[{:02}:{:02}.{:03}] {}\n",
            ms / 60_000,
            (ms % 60_000) / 1000,
            ms % 1000,
            line.text
        ));
    }
    out
}

/// `mm:ss` for display next to a line.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
