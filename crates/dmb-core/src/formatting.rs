//! Text rendering for alerts, status reports and heartbeats (Telegram HTML).
//!
//! Every piece of user- or inventory-supplied text passes through
//! [`escape_html`] before it is embedded in markup.

use crate::expiry::{DueDomain, StatusLine};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Human phrasing of a signed day count.
pub fn describe_days(days: i64) -> String {
    match days {
        d if d < -1 => format!("expired {} days ago", -d),
        -1 => "expired 1 day ago".to_string(),
        0 => "expires today".to_string(),
        1 => "1 day left".to_string(),
        d => format!("{d} days left"),
    }
}

pub fn format_alert_block(due: &DueDomain) -> String {
    format!(
        "• <b>{}</b>\n  Expires: {} ({})\n  Provider: {}\n  Manage: {}",
        escape_html(&due.name),
        due.expiration_date.format(DATE_FORMAT),
        describe_days(due.days_remaining),
        escape_html(due.provider_or_default()),
        escape_html(due.link_or_default()),
    )
}

/// One message covering every due domain.
pub fn format_alert_message(due: &[DueDomain]) -> String {
    let blocks = due
        .iter()
        .map(format_alert_block)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("🚨 <b>URGENT Domain Expiration Alert</b>\n\n{blocks}")
}

pub fn format_status_report(lines: &[StatusLine]) -> String {
    if lines.is_empty() {
        return "📊 <b>Domain Status</b>\n\nNo domains in inventory.".to_string();
    }

    let mut out = vec![format!("📊 <b>Domain Status</b> ({} domains)\n", lines.len())];
    for line in lines {
        let expiry = match (line.expiration_date, line.days_remaining) {
            (Some(date), Some(days)) => {
                format!("{} ({})", date.format(DATE_FORMAT), describe_days(days))
            }
            _ => "N/A".to_string(),
        };
        out.push(format!(
            "• <b>{}</b>: {}, status: {}",
            escape_html(&line.name),
            expiry,
            escape_html(&line.status)
        ));
    }
    out.join("\n")
}

pub fn format_heartbeat(total: usize, dated: usize, due: usize, threshold_days: i64) -> String {
    let due_line = if due == 0 {
        format!("No domains expire within {threshold_days} days.")
    } else {
        format!("{due} domain(s) expire within {threshold_days} days. Use /check for details.")
    };
    format!(
        "✅ <b>Domain monitor is running</b>\n\nTracking {total} domains ({dated} with expiry dates).\n{due_line}"
    )
}

/// Split `text` into chunks of at most `limit` bytes, breaking on newlines.
///
/// Lines longer than `limit` are cut between markup atoms: a tag or an
/// entity is never split, and tags still open at a cut are closed there and
/// reopened in the next chunk. Chunks only exceed `limit` when a single atom
/// plus its enclosing tags does not fit.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split('\n') {
        let needed = if chunk.is_empty() {
            line.len()
        } else {
            chunk.len() + 1 + line.len()
        };
        if needed <= limit {
            if !chunk.is_empty() {
                chunk.push('\n');
            }
            chunk.push_str(line);
            continue;
        }

        if !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }
        if line.len() <= limit {
            chunk.push_str(line);
            continue;
        }

        chunk = split_long_line(line, limit, &mut out);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

/// Cut one over-long line, pushing full chunks to `out` and returning the
/// unfinished tail.
fn split_long_line(line: &str, limit: usize, out: &mut Vec<String>) -> String {
    let mut chunk = String::new();
    // Opening tags currently in effect, outermost first.
    let mut open: Vec<&str> = Vec::new();
    // Length of the reopened-tag prefix at the start of `chunk`.
    let mut prefix = 0usize;

    for atom in markup_atoms(line) {
        // Room needed to close whatever is open once `atom` is in.
        let mut closing: usize = open.iter().map(|t| closing_tag_len(t)).sum();
        if is_opening_tag(atom) {
            closing += closing_tag_len(atom);
        } else if atom.starts_with("</") {
            closing = closing.saturating_sub(atom.len());
        }
        if chunk.len() > prefix && chunk.len() + atom.len() + closing > limit {
            for tag in open.iter().rev() {
                chunk.push_str(&format!("</{}>", tag_name(tag)));
            }
            out.push(std::mem::take(&mut chunk));
            for tag in &open {
                chunk.push_str(tag);
            }
            prefix = chunk.len();
        }

        chunk.push_str(atom);
        if atom.starts_with("</") {
            let name = tag_name(atom);
            if let Some(pos) = open.iter().rposition(|t| tag_name(t) == name) {
                open.truncate(pos);
            }
        } else if is_opening_tag(atom) {
            open.push(atom);
        }
    }

    if chunk.len() == prefix {
        // Only reopened tags left; nothing worth sending.
        return String::new();
    }
    chunk
}

/// Break a line into indivisible pieces: whole tags, whole entities, or
/// single chars.
fn markup_atoms(line: &str) -> Vec<&str> {
    let mut atoms = Vec::new();
    let mut rest = line;
    while let Some(ch) = rest.chars().next() {
        let end = match ch {
            '<' => rest.find('>').map(|i| i + 1),
            '&' => rest
                .find(';')
                .filter(|&i| {
                    i <= 10
                        && rest[1..i]
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '#')
                })
                .map(|i| i + 1),
            _ => None,
        }
        .unwrap_or(ch.len_utf8());
        let (atom, tail) = rest.split_at(end);
        atoms.push(atom);
        rest = tail;
    }
    atoms
}

fn is_opening_tag(atom: &str) -> bool {
    atom.len() > 2 && atom.starts_with('<') && !atom.starts_with("</") && !atom.ends_with("/>")
}

fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .next()
        .unwrap_or("")
}

fn closing_tag_len(tag: &str) -> usize {
    tag_name(tag).len() + 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn due(name: &str, days: i64) -> DueDomain {
        DueDomain {
            name: name.to_string(),
            expiration_date: NaiveDate::from_ymd_opt(2026, 3, 13).unwrap(),
            days_remaining: days,
            provider: None,
            management_link: None,
        }
    }

    #[test]
    fn escape_html_escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
        // Characters that broke strict Markdown parsing are plain text in HTML mode.
        assert_eq!(escape_html("my-site.co.uk!"), "my-site.co.uk!");
    }

    #[test]
    fn alert_block_uses_fallbacks() {
        let block = format_alert_block(&due("a.com", 3));
        assert!(block.contains("<b>a.com</b>"));
        assert!(block.contains("Expires: 2026-03-13 (3 days left)"));
        assert!(block.contains("Provider: N/A"));
        assert!(block.contains("Manage: not available"));
    }

    #[test]
    fn alert_block_escapes_metadata() {
        let mut d = due("a.com", 1);
        d.provider = Some("Tom & Jerry <Registrar>".to_string());
        d.management_link = Some("https://x.test/?a=1&b=2".to_string());
        let block = format_alert_block(&d);
        assert!(block.contains("Provider: Tom &amp; Jerry &lt;Registrar&gt;"));
        assert!(block.contains("Manage: https://x.test/?a=1&amp;b=2"));
        assert!(block.contains("(1 day left)"));
    }

    #[test]
    fn alert_message_joins_all_domains() {
        let msg = format_alert_message(&[due("a.com", -2), due("b.com", 0)]);
        assert!(msg.starts_with("🚨"));
        assert!(msg.contains("expired 2 days ago"));
        assert!(msg.contains("expires today"));
        assert_eq!(msg.matches("• <b>").count(), 2);
    }

    #[test]
    fn status_report_renders_missing_dates() {
        let lines = vec![
            StatusLine {
                name: "a.com".to_string(),
                expiration_date: NaiveDate::from_ymd_opt(2026, 4, 1),
                days_remaining: Some(22),
                status: "active".to_string(),
            },
            StatusLine {
                name: "b.com".to_string(),
                expiration_date: None,
                days_remaining: None,
                status: "unknown".to_string(),
            },
        ];
        let out = format_status_report(&lines);
        assert!(out.contains("(2 domains)"));
        assert!(out.contains("<b>a.com</b>: 2026-04-01 (22 days left), status: active"));
        assert!(out.contains("<b>b.com</b>: N/A, status: unknown"));
        assert!(format_status_report(&[]).contains("No domains in inventory."));
    }

    #[test]
    fn heartbeat_mentions_due_count() {
        assert!(format_heartbeat(3, 2, 0, 5).contains("No domains expire within 5 days."));
        assert!(format_heartbeat(3, 2, 1, 5).contains("1 domain(s) expire within 5 days"));
    }

    #[test]
    fn split_chunks_breaks_on_lines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_chunks(text, 100), vec![text.to_string()]);
        assert_eq!(split_chunks(text, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_chunks("abcdefgh", 3), vec!["abc", "def", "gh"]);
        for chunk in split_chunks("ééééé\nxy", 4) {
            assert!(chunk.len() <= 4);
        }
    }

    /// Every tag closed in order and no entity cut short.
    fn assert_well_formed(chunk: &str) {
        let mut open: Vec<&str> = Vec::new();
        for atom in markup_atoms(chunk) {
            if atom.starts_with('&') {
                assert!(atom.len() > 1 && atom.ends_with(';'), "split entity in {chunk:?}");
            } else if atom.starts_with('<') {
                assert!(atom.ends_with('>'), "split tag in {chunk:?}");
                if atom.starts_with("</") {
                    assert_eq!(open.pop(), Some(tag_name(atom)), "unbalanced {chunk:?}");
                } else {
                    open.push(tag_name(atom));
                }
            }
        }
        assert!(open.is_empty(), "unclosed tags in {chunk:?}");
    }

    #[test]
    fn long_lines_are_never_cut_inside_entities() {
        let mut d = due("a.com", 2);
        let query = (0..40).map(|i| format!("a={i}&")).collect::<String>();
        d.management_link = Some(format!("https://registrar.test/manage?{query}"));
        let msg = format_alert_message(&[d]);

        let chunks = split_chunks(&msg, 200);
        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 200);
            assert_well_formed(chunk);
        }
        assert_eq!(chunks.concat().matches("&amp;").count(), 40);
    }

    #[test]
    fn long_bold_lines_are_closed_and_reopened() {
        let line = format!("<b>{}</b> tail", "x".repeat(50));
        let chunks = split_chunks(&line, 20);
        for chunk in &chunks {
            assert!(chunk.len() <= 20, "{chunk:?}");
            assert_well_formed(chunk);
        }
        let text: String = chunks
            .iter()
            .map(|c| c.replace("<b>", "").replace("</b>", ""))
            .collect();
        assert_eq!(text, format!("{} tail", "x".repeat(50)));
        assert!(chunks[0].starts_with("<b>"));
    }
}
