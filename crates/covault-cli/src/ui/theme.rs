//! Status badges and the ANSI palette.

/// Outcome marker prefixed to human-facing status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Ok,
    Warn,
    Err,
    Info,
}

impl Badge {
    /// Bracketed marker for this badge, unicode or ascii.
    pub fn symbol(self, unicode: bool) -> &'static str {
        match (self, unicode) {
            (Self::Ok, true) => "[\u{2713}]",
            (Self::Ok, false) => "[OK]",
            (Self::Warn, true) => "[\u{26A0}]",
            (Self::Warn, false) => "[WARN]",
            (Self::Err, true) => "[\u{2717}]",
            (Self::Err, false) => "[ERR]",
            (Self::Info, true) => "[\u{2139}]",
            (Self::Info, false) => "[INFO]",
        }
    }

    /// The tone a badge is painted in.
    pub fn tone(self) -> Tone {
        match self {
            Self::Ok => Tone::Success,
            Self::Warn => Tone::Caution,
            Self::Err => Tone::Failure,
            Self::Info => Tone::Neutral,
        }
    }
}

/// Styling tones the renderer paints with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Caution,
    Failure,
    Neutral,
    Muted,
    Strong,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Self::Success => "\x1b[32m",
            Self::Caution => "\x1b[33m",
            Self::Failure => "\x1b[31m",
            Self::Neutral => "\x1b[36m",
            Self::Muted => "\x1b[2m",
            Self::Strong => "\x1b[1m",
        }
    }

    /// Wrap `text` in this tone; identity when color is off.
    pub fn paint(self, text: &str, color: bool) -> String {
        if color {
            format!("{}{}\x1b[0m", self.code(), text)
        } else {
            text.to_string()
        }
    }
}
