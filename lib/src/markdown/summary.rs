use crate::protocol::Protocol;

/// The first paragraph of a rendered body, as plain text.
///
/// For HTML this is the text of the first `<p>` element with tags removed.
/// For Gemini it's the first run of non-blank lines.
pub fn summarize(protocol: Protocol, body: &str) -> String {
    match protocol {
        Protocol::Http => html_summary(body),
        Protocol::Gemini => gemini_summary(body),
    }
}

fn html_summary(body: &str) -> String {
    let start = body.match_indices("<p").find(|(i, _)| {
        matches!(body.as_bytes().get(i + 2), Some(b'>' | b' ' | b'\t' | b'\n'))
    });

    let Some((start, _)) = start else {
        return String::new();
    };

    let Some(open_end) = body[start..].find('>').map(|i| start + i + 1) else {
        return String::new();
    };

    let close = body[open_end..].find("</p>").map_or(body.len(), |i| open_end + i);
    strip_tags(&body[open_end..close]).trim().to_string()
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match (ch, in_tag) {
            ('<', false) => in_tag = true,
            ('>', true) => in_tag = false,
            (ch, false) => text.push(ch),
            (_, true) => {}
        }
    }

    text
}

fn gemini_summary(body: &str) -> String {
    body.lines()
        .skip_while(|line| line.trim().is_empty())
        .take_while(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
