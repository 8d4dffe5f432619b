//! Progress marker parsing for external tool output.

use cumulus_core::config::tools::ProgressStyle;

/// Parses tool-specific progress markers out of output lines into a
/// 0-99 percentage. 100 is reserved for verified-successful completion
/// and is never produced by a parser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressParser {
    /// ffmpeg-style `time=HH:MM:SS.ff` markers measured against a known
    /// total duration.
    FfmpegTime {
        /// Total media duration in seconds.
        total_seconds: f64,
    },
    /// Plain `NN%` markers.
    Percent,
    /// The tool emits no usable markers.
    Silent,
}

impl ProgressParser {
    /// Build a parser from the configured style and the job's known
    /// duration. An ffmpeg-style tool without a known duration degrades
    /// to silent; a ratio against an unknown total is meaningless.
    pub fn from_style(style: ProgressStyle, duration_seconds: Option<f64>) -> Self {
        match style {
            ProgressStyle::Ffmpeg => match duration_seconds {
                Some(total) if total > 0.0 => Self::FfmpegTime {
                    total_seconds: total,
                },
                _ => Self::Silent,
            },
            ProgressStyle::Percent => Self::Percent,
            ProgressStyle::Silent => Self::Silent,
        }
    }

    /// Extract a progress percentage from one output line, if present.
    pub fn parse_line(&self, line: &str) -> Option<u8> {
        match self {
            Self::FfmpegTime { total_seconds } => {
                let processed = parse_ffmpeg_time(line)?;
                let percent = (processed / total_seconds * 100.0).floor();
                Some((percent.max(0.0) as u8).min(99))
            }
            Self::Percent => parse_percent(line),
            Self::Silent => None,
        }
    }
}

/// Parse the seconds processed out of an ffmpeg status line, e.g.
/// `frame= 100 fps= 25 ... time=00:01:30.55 bitrate=...`.
fn parse_ffmpeg_time(line: &str) -> Option<f64> {
    let start = line.find("time=")? + "time=".len();
    let marker: String = line[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ':' || *c == '.')
        .collect();

    let mut parts = marker.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3_600.0 + minutes * 60.0 + seconds)
}

/// Parse a `NN%` marker, taking the digits immediately preceding the
/// first percent sign.
fn parse_percent(line: &str) -> Option<u8> {
    let pos = line.find('%')?;
    let digits: String = line[..pos]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let value: u32 = digits.parse().ok()?;
    Some((value.min(99)) as u8)
}
