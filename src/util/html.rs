//! Minimal HTML handling for entry content.
//!
//! Entry bodies arrive as sanitized HTML from the server. The terminal only
//! needs their block structure (headings, paragraphs, list items, quotes,
//! preformatted text, images) and their plain text, so this is a forgiving
//! string scanner rather than a full parser. Malformed markup degrades to
//! text, it never fails.

/// A renderable chunk of entry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    ListItem(String),
    Quote(String),
    Preformatted(String),
    Image { alt: String, src: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Kind {
    #[default]
    Paragraph,
    Heading,
    ListItem,
    Preformatted,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    text: String,
    kind: Kind,
    pre_depth: usize,
    quote_depth: usize,
}

impl BlockBuilder {
    fn push_text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = decode_entities(raw);
        if self.pre_depth > 0 {
            self.text.push_str(&decoded);
            return;
        }
        for c in decoded.chars() {
            if c.is_whitespace() && c != '\u{a0}' {
                if !self.text.is_empty() && !self.text.ends_with([' ', '\n']) {
                    self.text.push(' ');
                }
            } else {
                self.text.push(c);
            }
        }
    }

    fn line_break(&mut self) {
        if self.pre_depth > 0 {
            self.text.push('\n');
            return;
        }
        let trimmed = self.text.trim_end_matches(' ').len();
        self.text.truncate(trimmed);
        if !self.text.is_empty() {
            self.text.push('\n');
        }
    }

    fn flush(&mut self) {
        let text = if self.kind == Kind::Preformatted {
            self.text.trim_matches('\n').to_string()
        } else {
            self.text.trim().replace('\u{a0}', " ")
        };
        self.text.clear();
        if text.trim().is_empty() {
            return;
        }
        let block = match self.kind {
            Kind::Heading => Block::Heading(text),
            Kind::ListItem => Block::ListItem(text),
            Kind::Preformatted => Block::Preformatted(text),
            Kind::Paragraph if self.quote_depth > 0 => Block::Quote(text),
            Kind::Paragraph => Block::Paragraph(text),
        };
        self.blocks.push(block);
    }

    fn handle_tag(&mut self, tag: &Tag<'_>) {
        match tag.name.as_str() {
            "br" => self.line_break(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.kind = if tag.closing {
                    Kind::Paragraph
                } else {
                    Kind::Heading
                };
            }
            "li" => {
                self.flush();
                self.kind = if tag.closing {
                    Kind::Paragraph
                } else {
                    Kind::ListItem
                };
            }
            "pre" => {
                self.flush();
                if tag.closing {
                    self.pre_depth = self.pre_depth.saturating_sub(1);
                    self.kind = Kind::Paragraph;
                } else {
                    self.pre_depth += 1;
                    self.kind = Kind::Preformatted;
                }
            }
            "blockquote" => {
                self.flush();
                if tag.closing {
                    self.quote_depth = self.quote_depth.saturating_sub(1);
                } else {
                    self.quote_depth += 1;
                }
            }
            "img" if !tag.closing => {
                self.flush();
                let src = tag.attr("src").unwrap_or_default();
                if !src.is_empty() {
                    let alt = tag.attr("alt").unwrap_or_default();
                    self.blocks.push(Block::Image {
                        alt: decode_entities(&alt),
                        src,
                    });
                }
            }
            "td" | "th" => self.push_text(" "),
            "p" | "div" | "section" | "article" | "header" | "footer" | "figure"
            | "figcaption" | "table" | "tr" | "ul" | "ol" | "dl" | "dt" | "dd" | "hr"
            | "main" | "aside" | "nav" => self.flush(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

struct Tag<'a> {
    name: String,
    closing: bool,
    raw: &'a str,
}

impl<'a> Tag<'a> {
    fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        let (closing, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let name = body
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self { name, closing, raw }
    }

    /// Value of attribute `name`, quoted or bare.
    fn attr(&self, name: &str) -> Option<String> {
        let lower = self.raw.to_ascii_lowercase();
        let needle = format!("{name}=");
        let mut from = 0;
        while let Some(pos) = lower[from..].find(&needle) {
            let start = from + pos;
            let preceded_by_space = start == 0
                || lower[..start]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_whitespace);
            let value_start = start + needle.len();
            if preceded_by_space {
                let rest = &self.raw[value_start..];
                let value = match rest.chars().next() {
                    Some(q @ ('"' | '\'')) => rest[1..].split(q).next().unwrap_or_default(),
                    _ => rest
                        .split(|c: char| c.is_whitespace() || c == '>')
                        .next()
                        .unwrap_or_default(),
                };
                return Some(value.to_string());
            }
            from = value_start;
        }
        None
    }
}

/// Splits entry HTML into renderable blocks.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        builder.push_text(&rest[..lt]);
        rest = &rest[lt..];

        if rest.starts_with("<!--") {
            rest = rest.find("-->").map_or("", |end| &rest[end + 3..]);
            continue;
        }

        let Some(gt) = rest.find('>') else {
            break;
        };
        let tag = Tag::parse(&rest[1..gt]);
        rest = &rest[gt + 1..];

        if !tag.closing && matches!(tag.name.as_str(), "script" | "style" | "noscript" | "template")
        {
            let close = format!("</{}", tag.name);
            rest = match rest.to_ascii_lowercase().find(&close) {
                Some(i) => rest[i..].find('>').map_or("", |g| &rest[i + g + 1..]),
                None => "",
            };
            continue;
        }

        builder.handle_tag(&tag);
    }
    builder.push_text(rest);
    builder.finish()
}

/// Plain text of an HTML fragment, one block per line.
///
/// Returns an empty string when the markup carries no text.
pub fn extract_text(html: &str) -> String {
    html_to_blocks(html)
        .into_iter()
        .filter_map(|block| match block {
            Block::Heading(t)
            | Block::Paragraph(t)
            | Block::ListItem(t)
            | Block::Quote(t)
            | Block::Preformatted(t) => Some(t),
            Block::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Escapes the five HTML-special characters.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decodes named and numeric character references. Unknown ones are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "bull" => '•',
        "middot" => '·',
        "deg" => '°',
        "times" => '×',
        "euro" => '€',
        _ => return None,
    };
    Some(c)
}
