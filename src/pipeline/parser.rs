//! Parser for gesture scripts
//!
//! Format:
//! +<timestep_delta>| <event1>; <event2>  # comments
//!
//! Events:
//! - Pointer:  down x,y | move x,y | up x,y
//! - Stop:     stop
//! - Settings: mode single|line|loop, scale <name>,
//!   duration quarter|eighth|sixteenth|random, bpm <n>

use crate::image::Cell;
use crate::pipeline::scale::Scale;
use crate::pipeline::session::PlaybackMode;
use crate::pipeline::tempo::DurationPolicy;

/// A single scripted action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptEvent {
    Down(Cell),
    Move(Cell),
    Up(Cell),
    Stop,
    Mode(PlaybackMode),
    Scale(Scale),
    Duration(DurationPolicy),
    Bpm(f64),
}

/// A line from the script with its timestep delta
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvents {
    /// Timesteps since previous line (absolute timestep for first line)
    pub delta: usize,
    /// Events occurring at this timestep
    pub events: Vec<ScriptEvent>,
}

/// Parse errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    InvalidLine(String),
    InvalidTimestep(String),
    InvalidEvent(String),
    InvalidCell(String),
    InvalidSetting(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidLine(s) => write!(f, "Invalid line: {}", s),
            ParseError::InvalidTimestep(s) => write!(f, "Invalid timestep: {}", s),
            ParseError::InvalidEvent(s) => write!(f, "Invalid event: {}", s),
            ParseError::InvalidCell(s) => write!(f, "Invalid cell: {}", s),
            ParseError::InvalidSetting(s) => write!(f, "Invalid setting: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse "x,y"; coordinates may be negative (off-grid pointer)
fn parse_cell(s: &str) -> Result<Cell, ParseError> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| ParseError::InvalidCell(s.to_string()))?;
    let x = x
        .trim()
        .parse::<i32>()
        .map_err(|_| ParseError::InvalidCell(s.to_string()))?;
    let y = y
        .trim()
        .parse::<i32>()
        .map_err(|_| ParseError::InvalidCell(s.to_string()))?;
    Ok(Cell::new(x, y))
}

/// Parse a single event string
/// Examples: down 3,4 / stop / mode loop / scale dorian
fn parse_event(s: &str) -> Result<ScriptEvent, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::InvalidEvent("empty event".to_string()));
    }

    let (keyword, arg) = match s.split_once(char::is_whitespace) {
        Some((keyword, arg)) => (keyword, arg.trim()),
        None => (s, ""),
    };

    let event = match keyword.to_ascii_lowercase().as_str() {
        "down" => ScriptEvent::Down(parse_cell(arg)?),
        "move" => ScriptEvent::Move(parse_cell(arg)?),
        "up" => ScriptEvent::Up(parse_cell(arg)?),
        "stop" if arg.is_empty() => ScriptEvent::Stop,
        "mode" => ScriptEvent::Mode(
            PlaybackMode::from_name(arg).ok_or_else(|| ParseError::InvalidSetting(s.to_string()))?,
        ),
        "scale" if !arg.is_empty() => ScriptEvent::Scale(Scale::from_name(arg)),
        "duration" => ScriptEvent::Duration(
            DurationPolicy::from_name(arg)
                .ok_or_else(|| ParseError::InvalidSetting(s.to_string()))?,
        ),
        "bpm" => {
            let bpm = arg
                .parse::<f64>()
                .ok()
                .filter(|bpm| *bpm > 0.0 && bpm.is_finite())
                .ok_or_else(|| ParseError::InvalidSetting(s.to_string()))?;
            ScriptEvent::Bpm(bpm)
        }
        _ => return Err(ParseError::InvalidEvent(s.to_string())),
    };
    Ok(event)
}

/// Parse a line of the script format
/// Format: +<delta>| event1; event2; ...  # comment
pub fn parse_line(line: &str) -> Result<TimedEvents, ParseError> {
    let line = line.split('#').next().unwrap_or(line).trim();

    if line.is_empty() {
        return Ok(TimedEvents {
            delta: 0,
            events: vec![],
        });
    }

    let (timestep_part, events_part) = line.split_once('|').ok_or_else(|| {
        ParseError::InvalidLine("expected format: +<delta>| events".to_string())
    })?;

    let timestep_part = timestep_part.trim();
    let delta_str = timestep_part.strip_prefix('+').ok_or_else(|| {
        ParseError::InvalidTimestep("timestep must start with +".to_string())
    })?;
    let delta = delta_str
        .parse::<usize>()
        .map_err(|_| ParseError::InvalidTimestep(timestep_part.to_string()))?;

    let events = events_part
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_event)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TimedEvents { delta, events })
}

/// Parse a full script
/// Returns timed events in chronological order; lines without events only
/// contribute their delta to the next line.
pub fn parse_script(text: &str) -> Result<Vec<TimedEvents>, ParseError> {
    let mut result = Vec::new();
    let mut carried = 0;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut timed = parse_line(line)?;
        if timed.events.is_empty() {
            carried += timed.delta;
            continue;
        }
        timed.delta += carried;
        carried = 0;
        result.push(timed);
    }

    Ok(result)
}

/// Total script length in timesteps
pub fn script_length(events: &[TimedEvents]) -> usize {
    events.iter().map(|e| e.delta).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tempo::NoteDuration;

    #[test]
    fn test_parse_event() {
        assert_eq!(parse_event("down 3,4").unwrap(), ScriptEvent::Down(Cell::new(3, 4)));
        assert_eq!(parse_event("move -1, 2").unwrap(), ScriptEvent::Move(Cell::new(-1, 2)));
        assert_eq!(parse_event("UP 0,0").unwrap(), ScriptEvent::Up(Cell::new(0, 0)));
        assert_eq!(parse_event("stop").unwrap(), ScriptEvent::Stop);
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!(
            parse_event("mode loop").unwrap(),
            ScriptEvent::Mode(PlaybackMode::LoopingLine)
        );
        assert_eq!(
            parse_event("scale whole tone").unwrap(),
            ScriptEvent::Scale(Scale::WholeTone)
        );
        assert_eq!(
            parse_event("duration sixteenth").unwrap(),
            ScriptEvent::Duration(DurationPolicy::Fixed(NoteDuration::Sixteenth))
        );
        assert_eq!(
            parse_event("duration random").unwrap(),
            ScriptEvent::Duration(DurationPolicy::Random)
        );
        assert_eq!(parse_event("bpm 90").unwrap(), ScriptEvent::Bpm(90.0));
    }

    #[test]
    fn test_parse_line() {
        let timed = parse_line("+1| down 0,0; move 1,0").unwrap();
        assert_eq!(timed.delta, 1);
        assert_eq!(
            timed.events,
            vec![ScriptEvent::Down(Cell::new(0, 0)), ScriptEvent::Move(Cell::new(1, 0))]
        );

        let timed = parse_line("+4| up 2,2  # release").unwrap();
        assert_eq!(timed.delta, 4);
        assert_eq!(timed.events.len(), 1);
    }

    #[test]
    fn test_parse_script() {
        let text = r#"
# draw one looping line
+0| mode loop
+10| down 0,0
+5| move 4,0; up 4,0
+200| stop
        "#;

        let result = parse_script(text).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[1].delta, 10);
        assert_eq!(result[2].events.len(), 2);
        assert_eq!(script_length(&result), 215);
    }

    #[test]
    fn test_empty_lines_carry_delta() {
        let text = "+5| down 1,1\n+3|\n+2| up 1,1\n";
        let result = parse_script(text).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].delta, 5);
    }

    #[test]
    fn test_invalid_timestep() {
        assert!(parse_line("1| stop").is_err()); // missing +
        assert!(parse_line("+abc| stop").is_err());
        assert!(matches!(parse_line("stop"), Err(ParseError::InvalidLine(_))));
    }

    #[test]
    fn test_invalid_event() {
        assert!(matches!(parse_event("jump 1,1"), Err(ParseError::InvalidEvent(_))));
        assert!(matches!(parse_event("down 1"), Err(ParseError::InvalidCell(_))));
        assert!(matches!(parse_event("down a,b"), Err(ParseError::InvalidCell(_))));
        assert!(matches!(parse_event("mode chord"), Err(ParseError::InvalidSetting(_))));
        assert!(matches!(parse_event("duration whole"), Err(ParseError::InvalidSetting(_))));
        assert!(matches!(parse_event("bpm -3"), Err(ParseError::InvalidSetting(_))));
        assert!(parse_event("stop now").is_err());
    }

    #[test]
    fn test_large_timestep() {
        let timed = parse_line("+1000000| stop").unwrap();
        assert_eq!(timed.delta, 1000000);
    }
}
