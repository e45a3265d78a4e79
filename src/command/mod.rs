//! The stdin command grammar: whitespace-trimmed, newline-terminated lines,
//! parsed into a typed [`Command`]. Parse failures are never fatal - they
//! produce [`Command::Unknown`], which the dispatcher logs and discards.

pub mod reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Began,
    Moved,
    Ended,
}

impl TouchPhase {
    /// `began`/`moved` keep both "down" flags set; `ended` clears them.
    pub fn is_down(self) -> bool {
        !matches!(self, TouchPhase::Ended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonName {
    Home,
    Lock,
    Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Rotate(String),
    Touch {
        phase: TouchPhase,
        points: Vec<(f64, f64)>,
    },
    Button {
        name: ButtonName,
        direction: Direction,
    },
    Key {
        code: u16,
        direction: Direction,
    },
    Fps(bool),
    Shutdown,
    /// A line that did not match the grammar. Carries the raw line for
    /// logging; never dispatched to a handler.
    Unknown(String),
}

/// Parse one already-trimmed, non-empty line. Returns `Command::Unknown`
/// rather than an error for anything that doesn't match the grammar -
/// malformed input is logged and ignored, never fatal.
pub fn parse_line(line: &str) -> Command {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return Command::Unknown(line.to_string());
    };
    let rest: Vec<&str> = tokens.collect();

    match command {
        "rotate" => match rest.first() {
            Some(rotation) => Command::Rotate(rotation.to_string()),
            None => Command::Unknown(line.to_string()),
        },
        "touch" => parse_touch(&rest).unwrap_or_else(|| Command::Unknown(line.to_string())),
        "button" => parse_button(&rest).unwrap_or_else(|| Command::Unknown(line.to_string())),
        "key" => parse_key(&rest).unwrap_or_else(|| Command::Unknown(line.to_string())),
        "fps" => match rest.first() {
            Some(&"true") => Command::Fps(true),
            Some(&"false") => Command::Fps(false),
            _ => Command::Unknown(line.to_string()),
        },
        "shutdown" => Command::Shutdown,
        _ => Command::Unknown(line.to_string()),
    }
}

fn parse_touch(rest: &[&str]) -> Option<Command> {
    let phase = match *rest.first()? {
        "began" => TouchPhase::Began,
        "moved" => TouchPhase::Moved,
        "ended" => TouchPhase::Ended,
        _ => return None,
    };
    let mut points = Vec::new();
    for token in &rest[1..] {
        let (x, y) = token.split_once(',')?;
        points.push((x.parse().ok()?, y.parse().ok()?));
    }
    if points.is_empty() {
        return None;
    }
    Some(Command::Touch { phase, points })
}

fn parse_button(rest: &[&str]) -> Option<Command> {
    let arg = rest.first()?;
    let (name, direction) = arg.split_once(',')?;
    let name = match name {
        "home" => ButtonName::Home,
        "lock" => ButtonName::Lock,
        "side" => ButtonName::Side,
        _ => return None,
    };
    let direction = parse_direction(direction)?;
    Some(Command::Button { name, direction })
}

fn parse_key(rest: &[&str]) -> Option<Command> {
    let arg = rest.first()?;
    let (code, direction) = arg.split_once(',')?;
    let code: u16 = code.parse().ok()?;
    let direction = parse_direction(direction)?;
    Some(Command::Key { code, direction })
}

fn parse_direction(s: &str) -> Option<Direction> {
    match s {
        "down" => Some(Direction::Down),
        "up" => Some(Direction::Up),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_began_single_point() {
        let cmd = parse_line("touch began 0.5,0.5");
        assert_eq!(
            cmd,
            Command::Touch {
                phase: TouchPhase::Began,
                points: vec![(0.5, 0.5)],
            }
        );
    }

    #[test]
    fn touch_multi_point() {
        let cmd = parse_line("touch moved 0.1,0.2 0.3,0.4");
        assert_eq!(
            cmd,
            Command::Touch {
                phase: TouchPhase::Moved,
                points: vec![(0.1, 0.2), (0.3, 0.4)],
            }
        );
    }

    #[test]
    fn touch_malformed_is_unknown() {
        assert_eq!(
            parse_line("touch banana"),
            Command::Unknown("touch banana".to_string())
        );
    }

    #[test]
    fn button_with_direction() {
        assert_eq!(
            parse_line("button home,down"),
            Command::Button {
                name: ButtonName::Home,
                direction: Direction::Down,
            }
        );
    }

    #[test]
    fn key_with_code() {
        assert_eq!(
            parse_line("key 40,up"),
            Command::Key {
                code: 40,
                direction: Direction::Up,
            }
        );
    }

    #[test]
    fn fps_toggle() {
        assert_eq!(parse_line("fps true"), Command::Fps(true));
        assert_eq!(parse_line("fps false"), Command::Fps(false));
        assert_eq!(
            parse_line("fps maybe"),
            Command::Unknown("fps maybe".to_string())
        );
    }

    #[test]
    fn shutdown_takes_no_argument() {
        assert_eq!(parse_line("shutdown"), Command::Shutdown);
    }

    #[test]
    fn rotate_is_logged_not_unimplemented() {
        assert_eq!(parse_line("rotate 90"), Command::Rotate("90".to_string()));
    }

    #[test]
    fn unknown_leading_token() {
        assert_eq!(
            parse_line("frobnicate"),
            Command::Unknown("frobnicate".to_string())
        );
    }

    #[test]
    fn extra_whitespace_is_tolerated() {
        assert_eq!(
            parse_line("touch   began   0.5,0.5"),
            Command::Touch {
                phase: TouchPhase::Began,
                points: vec![(0.5, 0.5)],
            }
        );
    }

    #[test]
    fn touch_phase_down_flags() {
        assert!(TouchPhase::Began.is_down());
        assert!(TouchPhase::Moved.is_down());
        assert!(!TouchPhase::Ended.is_down());
    }
}
