use std::collections::HashSet;

/// Strips all HTML tags from input (for titles, names and other single-line fields).
/// The result is plain text; templates escape it again on output.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

/// Keeps only `http(s)` image links; anything else is dropped.
pub fn safe_image_url(input: &str) -> Option<String> {
    let trimmed = input.trim();
    match url::Url::parse(trimmed) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Some(trimmed.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_but_keeps_text() {
        assert_eq!(strip_all_html("<script>alert(1)</script>Pots"), "Pots");
        assert_eq!(strip_all_html("<b>Bold</b> move"), "Bold move");
        assert_eq!(strip_all_html("Salt & Pepper <3"), "Salt & Pepper <3");
    }

    #[test]
    fn only_web_image_links_survive() {
        assert_eq!(safe_image_url(" https://cdn.example/a.png "), Some("https://cdn.example/a.png".to_string()));
        assert_eq!(safe_image_url("javascript:alert(1)"), None);
        assert_eq!(safe_image_url("data:image/png;base64,AAAA"), None);
        assert_eq!(safe_image_url("not a url"), None);
    }
}
