use crate::util::escape_html;

const PROMPT_PREAMBLE: &str = "Summarize the following article in 5-7 concise bullet points. \
Focus on key facts and outcomes.\n\n";

/// Builds the instruction sent to every provider.
///
/// The `Title:` line is omitted when the title is blank.
pub fn build_summary_prompt(title: &str, content: &str) -> String {
    let title = title.trim();
    let title_line = if title.is_empty() {
        String::new()
    } else {
        format!("Title: {title}\n")
    };
    format!("{PROMPT_PREAMBLE}{title_line}Content:\n{content}")
}

/// Strips one leading bullet marker (`•`, `-` or `*`) and the space after it.
fn strip_bullet(line: &str) -> &str {
    let rest = line
        .strip_prefix('•')
        .or_else(|| line.strip_prefix('-'))
        .or_else(|| line.strip_prefix('*'));
    match rest {
        Some(rest) => rest
            .strip_prefix(|c: char| c.is_whitespace())
            .unwrap_or(rest),
        None => line,
    }
}

/// Renders a plain-text summary as an HTML section.
///
/// Two or more non-empty lines become a bullet list; a single block becomes
/// paragraphs split on blank lines. Blank input yields an empty string.
///
/// ```
/// use fluxread::ai::format_summary_html;
///
/// assert_eq!(
///     format_summary_html("- one\n- two", "Summary"),
///     "<section class=\"ai-summary\"><h2>Summary</h2><ul><li>one</li><li>two</li></ul></section>"
/// );
/// assert_eq!(format_summary_html("  \n ", "Summary"), "");
/// ```
pub fn format_summary_html(summary: &str, heading: &str) -> String {
    let normalized = summary.trim();
    if normalized.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = normalized
        .split('\n')
        .map(|line| strip_bullet(line).trim())
        .filter(|line| !line.is_empty())
        .collect();

    let body = if lines.len() > 1 {
        let items: String = lines
            .iter()
            .map(|line| format!("<li>{}</li>", escape_html(line)))
            .collect();
        format!("<ul>{items}</ul>")
    } else {
        split_paragraphs(normalized)
            .into_iter()
            .map(|p| format!("<p>{}</p>", escape_html(&p)))
            .collect()
    };

    format!(
        "<section class=\"ai-summary\"><h2>{}</h2>{}</section>",
        escape_html(heading),
        body
    )
}

/// Splits on runs of two or more newlines; single newlines become spaces.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut newlines = 0usize;

    let mut push = |current: &mut String| {
        let p = current.replace('\n', " ");
        let p = p.trim();
        if !p.is_empty() {
            paragraphs.push(p.to_string());
        }
        current.clear();
    };

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines >= 2 {
            push(&mut current);
        } else if newlines == 1 {
            current.push('\n');
        }
        newlines = 0;
        current.push(c);
    }
    push(&mut current);
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prompt_with_title() {
        assert_eq!(
            build_summary_prompt("  Big News ", "Body"),
            "Summarize the following article in 5-7 concise bullet points. \
Focus on key facts and outcomes.\n\nTitle: Big News\nContent:\nBody"
        );
    }

    #[test]
    fn test_prompt_without_title() {
        let prompt = build_summary_prompt("   ", "Body");
        assert!(prompt.ends_with("outcomes.\n\nContent:\nBody"));
        assert!(!prompt.contains("Title:"));
    }

    #[test]
    fn test_bullets_become_list_with_markers_stripped() {
        let html = format_summary_html("• First point\n* Second <b>\n\n-Third", "AI Summary");
        assert_eq!(
            html,
            "<section class=\"ai-summary\"><h2>AI Summary</h2><ul>\
<li>First point</li><li>Second &lt;b&gt;</li><li>Third</li></ul></section>"
        );
    }

    #[test]
    fn test_single_line_becomes_paragraph() {
        let html = format_summary_html("Tom & Jerry's \"show\"", "S");
        assert_eq!(
            html,
            "<section class=\"ai-summary\"><h2>S</h2><p>Tom &amp; Jerry&#39;s &quot;show&quot;</p></section>"
        );
    }

    #[test]
    fn test_heading_is_escaped() {
        let html = format_summary_html("text", "<Summary>");
        assert!(html.contains("<h2>&lt;Summary&gt;</h2>"));
    }

    #[test]
    fn test_single_bullet_is_paragraph_of_raw_text() {
        // One line after filtering: paragraphs use the unstripped text
        let html = format_summary_html("- only item", "S");
        assert!(html.contains("<p>- only item</p>"));
    }

    #[test]
    fn test_split_paragraphs() {
        assert_eq!(
            split_paragraphs("a\nb\n\n\nc"),
            vec!["a b".to_string(), "c".to_string()]
        );
    }
}
