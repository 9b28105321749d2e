//! Output mode selection.

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Machine-readable JSON, nothing else on the stream.
    Json,
    /// Stable `key=value` text for scripts and logs.
    #[default]
    Plain,
    /// Colored, table-formatted output for a person at a terminal.
    Pretty,
}

impl OutputMode {
    /// Pick the mode from flags and terminal state.
    ///
    /// `--json` wins over everything else. `--format plain` and `TERM=dumb`
    /// both force plain, as does a non-TTY stdout; only an ordinary
    /// terminal gets pretty output.
    pub fn resolve(
        json_flag: bool,
        format_flag: Option<&str>,
        is_tty: bool,
        term_is_dumb: bool,
    ) -> Self {
        if json_flag {
            Self::Json
        } else if format_flag == Some("plain") || term_is_dumb || !is_tty {
            Self::Plain
        } else {
            Self::Pretty
        }
    }

    pub fn is_json(self) -> bool {
        self == Self::Json
    }

    pub fn is_pretty(self) -> bool {
        self == Self::Pretty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_flag_wins_over_format_and_tty() {
        assert_eq!(
            OutputMode::resolve(true, Some("plain"), true, false),
            OutputMode::Json
        );
    }

    #[test]
    fn test_format_plain_downgrades_a_tty() {
        assert_eq!(
            OutputMode::resolve(false, Some("plain"), true, false),
            OutputMode::Plain
        );
    }

    #[test]
    fn test_dumb_terminal_never_gets_pretty() {
        assert_eq!(
            OutputMode::resolve(false, None, true, true),
            OutputMode::Plain
        );
    }

    #[test]
    fn test_tty_defaults_to_pretty() {
        assert_eq!(
            OutputMode::resolve(false, None, true, false),
            OutputMode::Pretty
        );
    }

    #[test]
    fn test_pipe_defaults_to_plain() {
        assert_eq!(
            OutputMode::resolve(false, None, false, false),
            OutputMode::Plain
        );
    }

    #[test]
    fn test_other_formats_leave_pretty_alone() {
        assert_eq!(
            OutputMode::resolve(false, Some("table"), true, false),
            OutputMode::Pretty
        );
    }
}
