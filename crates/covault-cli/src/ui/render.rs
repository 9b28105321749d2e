//! Shared rendering for the three output modes.
//!
//! Pretty mode targets humans on a tty, plain mode targets grep and
//! shell pipelines (`key=value` lines, space-separated rows), and JSON
//! mode renders nothing here because the commands emit a document
//! instead.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_MARKDOWN, NOTHING, UTF8_FULL};
use comfy_table::{Attribute, Cell, ContentArrangement, Table as ComfyTable};

use super::context::UiContext;
use super::mode::OutputMode;
use super::theme::{Badge, Tone};

/// Header line for a command, with an optional subject.
///
/// Pretty: `Covault · show (web-login)`. Plain: `covault show`.
pub fn header(ctx: &UiContext, command: &str, subject: Option<&str>) -> String {
    match ctx.mode {
        OutputMode::Pretty => {
            let name = Tone::Strong.paint("Covault", ctx.color);
            match subject {
                Some(s) => format!("{} \u{00B7} {} ({})", name, command, s),
                None => format!("{} \u{00B7} {}", name, command),
            }
        }
        OutputMode::Plain => format!("covault {}", command),
        OutputMode::Json => String::new(),
    }
}

/// Horizontal rule, capped at 60 columns.
pub fn divider(ctx: &UiContext) -> String {
    if ctx.mode.is_pretty() {
        "\u{2500}".repeat(ctx.width.min(60))
    } else {
        "---".to_string()
    }
}

/// A status badge followed by a message.
pub fn badge(ctx: &UiContext, kind: Badge, message: &str) -> String {
    let mark = kind.tone().paint(kind.symbol(ctx.unicode), ctx.color);
    if message.is_empty() {
        mark
    } else {
        format!("{} {}", mark, message)
    }
}

/// One labelled value.
///
/// Pretty: `Label: value` with a muted label. Plain: `label=value`
/// with the label lowercased and spaces turned into underscores.
pub fn kv(ctx: &UiContext, label: &str, value: &str) -> String {
    if ctx.mode.is_pretty() {
        let label = Tone::Muted.paint(&format!("{}:", label), ctx.color);
        format!("{} {}", label, value)
    } else {
        format!("{}={}", plain_key(label), value)
    }
}

/// A follow-up suggestion under an error or a result.
pub fn hint(ctx: &UiContext, text: &str) -> String {
    if ctx.mode.is_pretty() {
        format!("{} {}", Tone::Muted.paint("Hint:", ctx.color), text)
    } else {
        format!("hint={}", text)
    }
}

/// Summary block printed after a mutating command succeeds.
///
/// Plain mode opens with `status=ok` so scripts can test the first line.
pub fn receipt(ctx: &UiContext, title: &str, fields: &[(&str, &str)]) -> String {
    let mut lines = Vec::new();
    if ctx.mode.is_pretty() {
        lines.push(badge(ctx, Badge::Ok, title));
        for (label, value) in fields {
            lines.push(format!("  {}", kv(ctx, label, value)));
        }
    } else {
        lines.push("status=ok".to_string());
        for (label, value) in fields {
            lines.push(kv(ctx, label, value));
        }
    }
    lines.join("\n")
}

/// Table column header.
#[derive(Debug, Clone)]
pub struct Column {
    pub header: &'static str,
}

impl Column {
    pub const fn new(header: &'static str) -> Self {
        Self { header }
    }
}

/// Bordered table for dense results.
///
/// Plain mode drops the header and borders entirely so each row is one
/// greppable line.
pub fn table(ctx: &UiContext, columns: &[Column], rows: &[Vec<String>]) -> String {
    if !ctx.mode.is_pretty() {
        return plain_rows(rows);
    }

    let mut out = ComfyTable::new();
    if ctx.unicode {
        out.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    } else {
        out.load_preset(ASCII_MARKDOWN);
    }
    out.set_content_arrangement(ContentArrangement::Dynamic);
    out.set_header(columns.iter().map(|c| c.header));
    for row in rows {
        out.add_row(row);
    }
    out.to_string()
}

/// Borderless table for listings.
pub fn simple_table(ctx: &UiContext, columns: &[Column], rows: &[Vec<String>]) -> String {
    if !ctx.mode.is_pretty() {
        return plain_rows(rows);
    }

    let mut out = ComfyTable::new();
    out.load_preset(NOTHING);
    out.set_content_arrangement(ContentArrangement::Dynamic);
    out.set_header(columns.iter().map(|c| {
        let cell = Cell::new(c.header);
        if ctx.color {
            cell.add_attribute(Attribute::Dim)
        } else {
            cell
        }
    }));
    // Two spaces between columns, no left gutter.
    for index in 0..columns.len() {
        if let Some(column) = out.column_mut(index) {
            column.set_padding((0, 2));
        }
    }
    for row in rows {
        out.add_row(row);
    }
    out.to_string()
}

fn plain_key(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

fn plain_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print to stdout unless the command is emitting JSON.
pub fn print(ctx: &UiContext, message: &str) {
    if !ctx.mode.is_json() {
        println!("{}", message);
    }
}

/// Spacer line, pretty mode only.
pub fn blank_line(ctx: &UiContext) {
    if ctx.mode.is_pretty() {
        println!();
    }
}

/// Error line with an optional hint underneath.
pub fn error_message(ctx: &UiContext, message: &str, suggestion: Option<&str>) -> String {
    let mut lines = Vec::new();
    if ctx.mode.is_pretty() {
        lines.push(badge(ctx, Badge::Err, message));
        if let Some(s) = suggestion {
            lines.push(hint(ctx, s));
        }
    } else {
        lines.push(format!("error={}", message));
        if let Some(s) = suggestion {
            lines.push(format!("hint={}", s));
        }
    }
    lines.join("\n")
}

/// Same as [`error_message`] but written to stderr.
pub fn print_error(ctx: &UiContext, message: &str, suggestion: Option<&str>) {
    eprintln!("{}", error_message(ctx, message, suggestion));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> UiContext {
        UiContext {
            is_tty: false,
            color: false,
            unicode: false,
            width: 80,
            mode: OutputMode::Plain,
        }
    }

    fn pretty() -> UiContext {
        UiContext {
            is_tty: true,
            color: false,
            unicode: true,
            width: 80,
            mode: OutputMode::Pretty,
        }
    }

    #[test]
    fn test_header_is_machine_friendly_in_plain_mode() {
        assert_eq!(header(&plain(), "list", None), "covault list");
    }

    #[test]
    fn test_header_names_the_subject_in_pretty_mode() {
        let h = header(&pretty(), "show", Some("web-login"));
        assert!(h.contains("Covault"));
        assert!(h.contains("show"));
        assert!(h.contains("(web-login)"));
    }

    #[test]
    fn test_header_is_empty_in_json_mode() {
        let ctx = UiContext {
            mode: OutputMode::Json,
            ..plain()
        };
        assert_eq!(header(&ctx, "list", None), "");
    }

    #[test]
    fn test_divider_is_ascii_in_plain_mode() {
        assert_eq!(divider(&plain()), "---");
    }

    #[test]
    fn test_divider_caps_at_sixty_columns() {
        let ctx = UiContext {
            width: 200,
            ..pretty()
        };
        assert_eq!(divider(&ctx).chars().count(), 60);
    }

    #[test]
    fn test_badge_keeps_message_after_symbol() {
        assert_eq!(badge(&plain(), Badge::Ok, "Done"), "[OK] Done");
    }

    #[test]
    fn test_kv_normalizes_labels_in_plain_mode() {
        assert_eq!(kv(&plain(), "Pass Date", "2026-01-01"), "pass_date=2026-01-01");
    }

    #[test]
    fn test_kv_keeps_label_in_pretty_mode() {
        let line = kv(&pretty(), "Name", "test");
        assert!(line.contains("Name:"));
        assert!(line.contains("test"));
    }

    #[test]
    fn test_hint_renders_in_both_modes() {
        assert_eq!(hint(&plain(), "try this"), "hint=try this");
        assert!(hint(&pretty(), "try this").contains("Hint:"));
    }

    #[test]
    fn test_receipt_opens_with_status_ok() {
        let r = receipt(&plain(), "Added", &[("Id", "abc")]);
        assert!(r.starts_with("status=ok"));
        assert!(r.contains("id=abc"));
    }

    #[test]
    fn test_receipt_indents_fields_in_pretty_mode() {
        let r = receipt(&pretty(), "Added", &[("Id", "abc")]);
        assert!(r.contains("\n  Id: abc"));
    }

    #[test]
    fn test_table_plain_joins_rows_with_spaces() {
        let columns = [Column::new("ID"), Column::new("Name")];
        let rows = vec![vec!["abc".to_string(), "test".to_string()]];
        assert_eq!(table(&plain(), &columns, &rows), "abc test");
    }

    #[test]
    fn test_table_pretty_includes_headers() {
        let columns = [Column::new("ID"), Column::new("Name")];
        let rows = vec![vec!["abc".to_string(), "test".to_string()]];
        let t = table(&pretty(), &columns, &rows);
        assert!(t.contains("ID"));
        assert!(t.contains("Name"));
        assert!(t.contains("abc"));
        assert!(t.contains("test"));
    }

    #[test]
    fn test_simple_table_drops_header_in_plain_mode() {
        let columns = [Column::new("ID"), Column::new("Name")];
        let rows = vec![
            vec!["a".to_string(), "one".to_string()],
            vec!["b".to_string(), "two".to_string()],
        ];
        assert_eq!(simple_table(&plain(), &columns, &rows), "a one\nb two");
    }

    #[test]
    fn test_error_message_plain() {
        assert_eq!(
            error_message(&plain(), "boom", Some("retry")),
            "error=boom\nhint=retry"
        );
    }
}
