//! Terminal capability detection.

use std::io::IsTerminal;

use super::mode::OutputMode;

/// What the terminal supports, resolved once per command.
#[derive(Debug, Clone)]
pub struct UiContext {
    pub is_tty: bool,
    pub color: bool,
    pub unicode: bool,
    pub width: usize,
    pub mode: OutputMode,
}

impl UiContext {
    /// Resolve capabilities from CLI flags, environment and the terminal.
    ///
    /// Color honors `--no-color`, the `NO_COLOR` convention and `TERM=dumb`;
    /// `--ascii` drops the unicode symbols; width prefers `COLUMNS` over
    /// the tty probe.
    pub fn from_env(
        json_flag: bool,
        format_flag: Option<&str>,
        no_color_flag: bool,
        ascii_flag: bool,
    ) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        let dumb = matches!(std::env::var("TERM").as_deref(), Ok("dumb"));
        let color =
            is_tty && !dumb && !no_color_flag && std::env::var_os("NO_COLOR").is_none();

        Self {
            is_tty,
            color,
            unicode: !ascii_flag,
            width: detect_width(),
            mode: OutputMode::resolve(json_flag, format_flag, is_tty, dumb),
        }
    }

    /// True when prompting the user is possible.
    pub fn is_interactive(&self) -> bool {
        self.is_tty && std::io::stdin().is_terminal()
    }

    /// True when spinners may animate without garbling the output.
    pub fn allows_animation(&self) -> bool {
        self.mode == OutputMode::Pretty
    }
}

/// Terminal width: `COLUMNS`, then the tty itself, then 80.
fn detect_width() -> usize {
    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 {
                return width;
            }
        }
    }
    probe_tty_width().unwrap_or(80)
}

#[cfg(unix)]
fn probe_tty_width() -> Option<usize> {
    let mut size = std::mem::MaybeUninit::<libc::winsize>::uninit();
    // SAFETY: TIOCGWINSZ writes a winsize on success and nothing else.
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, size.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let size = unsafe { size.assume_init() };
    if size.ws_col > 0 {
        Some(size.ws_col as usize)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn probe_tty_width() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_flag_selects_json_mode() {
        let ctx = UiContext::from_env(true, None, false, false);
        assert_eq!(ctx.mode, OutputMode::Json);
    }

    #[test]
    fn test_ascii_flag_disables_unicode() {
        assert!(!UiContext::from_env(false, None, false, true).unicode);
    }

    #[test]
    fn test_no_color_flag_disables_color() {
        assert!(!UiContext::from_env(false, None, true, false).color);
    }

    #[test]
    fn test_width_is_never_zero() {
        assert!(UiContext::from_env(false, None, false, false).width > 0);
    }
}
