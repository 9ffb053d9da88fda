//! Rendering of feed items into notifications.

use super::types::{
    FeedItem, FeedKey, Notification, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH, PLACEHOLDER_TITLE,
};

/// Marker appended to truncated text.
const ELLIPSIS: &str = "...";

/// Build the notification for one feed item.
pub fn render(item: &FeedItem, key: &FeedKey) -> Notification {
    let title = if item.title.trim().is_empty() {
        PLACEHOLDER_TITLE.to_string()
    } else {
        truncate(item.title.trim(), MAX_TITLE_LENGTH)
    };

    let description = item
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| truncate(&strip_html(d), MAX_DESCRIPTION_LENGTH));

    let url = item
        .link
        .as_deref()
        .map(str::trim)
        .filter(|link| is_absolute_url(link))
        .map(str::to_string);

    let image_url = item
        .media
        .as_ref()
        .filter(|media| media.is_image())
        .map(|media| media.url.trim())
        .filter(|src| is_absolute_url(src))
        .map(str::to_string);

    Notification {
        title,
        url,
        description,
        image_url,
        footer: key.to_string(),
    }
}

/// Check that a string is a well-formed absolute URL with a host.
pub fn is_absolute_url(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    url::Url::parse(s).map(|u| u.has_host()).unwrap_or(false)
}

/// Truncate to at most `max` characters, ending with `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut result: String = text.chars().take(keep).collect();
    result.push_str(ELLIPSIS);
    result
}

/// Strip HTML tags from text, decoding common entities.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_entity = false;
    let mut entity = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                if in_entity {
                    // Bare ampersand directly before a tag
                    in_entity = false;
                    result.push('&');
                    result.push_str(&entity);
                }
                in_tag = true;
            }
            '>' if in_tag => {
                // Tags separate words
                in_tag = false;
                result.push(' ');
            }
            '&' if !in_tag => {
                if in_entity {
                    // Previous '&' was not an entity
                    result.push('&');
                    result.push_str(&entity);
                }
                in_entity = true;
                entity.clear();
            }
            ';' if in_entity => {
                in_entity = false;
                match entity.as_str() {
                    "amp" => result.push('&'),
                    "lt" => result.push('<'),
                    "gt" => result.push('>'),
                    "quot" => result.push('"'),
                    "apos" => result.push('\''),
                    "nbsp" => result.push(' '),
                    _ if entity.starts_with('#') => {
                        if let Some(c) = parse_numeric_entity(&entity).and_then(char::from_u32) {
                            result.push(c);
                        }
                    }
                    _ => {
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ if in_entity => {
                if ch.is_whitespace() {
                    // Bare ampersand followed by text
                    in_entity = false;
                    result.push('&');
                    result.push_str(&entity);
                    result.push(ch);
                } else {
                    entity.push(ch);
                }
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    if in_entity {
        result.push('&');
        result.push_str(&entity);
    }

    result.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        entity.strip_prefix('#').and_then(|dec| dec.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FeedKey {
        FeedKey::normalize("https://example.com/feed.xml")
    }

    #[test]
    fn test_render_full_item() {
        let item = FeedItem::new("Release 1.0")
            .with_link("https://example.com/posts/1")
            .with_description("<p>New <b>release</b> &amp; notes</p>")
            .with_media("https://example.com/cover.png", "image/png");

        let n = render(&item, &key());
        assert_eq!(n.title, "Release 1.0");
        assert_eq!(n.url.as_deref(), Some("https://example.com/posts/1"));
        assert_eq!(n.description.as_deref(), Some("New release & notes"));
        assert_eq!(n.image_url.as_deref(), Some("https://example.com/cover.png"));
        assert_eq!(n.footer, "https://example.com/feed.xml");
    }

    #[test]
    fn test_blank_title_uses_placeholder() {
        let n = render(&FeedItem::new("   "), &key());
        assert_eq!(n.title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_long_title_truncated() {
        let n = render(&FeedItem::new("t".repeat(300)), &key());
        assert_eq!(n.title.chars().count(), MAX_TITLE_LENGTH);
        assert!(n.title.ends_with("..."));
    }

    #[test]
    fn test_long_description_truncated() {
        let item = FeedItem::new("a").with_description("あ".repeat(3000));
        let n = render(&item, &key());
        assert_eq!(
            n.description.unwrap().chars().count(),
            MAX_DESCRIPTION_LENGTH
        );
    }

    #[test]
    fn test_blank_description_omitted() {
        let item = FeedItem::new("a").with_description("  \n ");
        assert!(render(&item, &key()).description.is_none());
        assert!(render(&FeedItem::new("a"), &key()).description.is_none());
    }

    #[test]
    fn test_relative_link_omitted() {
        let item = FeedItem::new("a").with_link("/posts/1");
        assert!(render(&item, &key()).url.is_none());

        let item = FeedItem::new("a").with_link("");
        assert!(render(&item, &key()).url.is_none());
    }

    #[test]
    fn test_non_image_media_omitted() {
        let item = FeedItem::new("a").with_media("https://example.com/ep.mp3", "audio/mpeg");
        assert!(render(&item, &key()).image_url.is_none());
    }

    #[test]
    fn test_image_with_bad_url_omitted() {
        let item = FeedItem::new("a").with_media("cover.png", "image/png");
        assert!(render(&item, &key()).image_url.is_none());
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("http://example.com/a?b=c"));
        assert!(!is_absolute_url("example.com/feed"));
        assert!(!is_absolute_url("/feed"));
        assert!(!is_absolute_url("mailto:someone@example.com"));
        assert!(!is_absolute_url(""));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("this is too long", 10), "this is...");
    }

    #[test]
    fn test_strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(strip_html("<b>Bold</b> text"), "Bold text");
        assert_eq!(strip_html("<div><p>Nested</p></div>"), "Nested");
    }

    #[test]
    fn test_strip_html_entities() {
        assert_eq!(strip_html("&lt;tag&gt;"), "<tag>");
        assert_eq!(strip_html("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(strip_html("A&nbsp;B"), "A B");
        assert_eq!(strip_html("&#65;&#x42;"), "AB");
        assert_eq!(strip_html("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_strip_html_bare_ampersand() {
        assert_eq!(strip_html("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(strip_html("AT&T"), "AT&T");
    }

    #[test]
    fn test_strip_html_ampersand_before_tag() {
        assert_eq!(strip_html("<p>R&D</p><p>next</p>"), "R&D next");
        assert_eq!(strip_html("Q&A<br/>Answers"), "Q&A Answers");
        assert_eq!(strip_html("<p>Fish &</p>"), "Fish &");
    }

    #[test]
    fn test_strip_html_tags_separate_words() {
        assert_eq!(strip_html("<p>one</p><p>two</p>"), "one two");
        assert_eq!(strip_html("line<br>break"), "line break");
    }

    #[test]
    fn test_strip_html_whitespace() {
        assert_eq!(
            strip_html("<p>\n\tNewlines\n\tand\ttabs\n</p>"),
            "Newlines and tabs"
        );
    }

    #[test]
    fn test_parse_numeric_entity() {
        assert_eq!(parse_numeric_entity("#65"), Some(65));
        assert_eq!(parse_numeric_entity("#x41"), Some(65));
        assert_eq!(parse_numeric_entity("#X41"), Some(65));
        assert_eq!(parse_numeric_entity("invalid"), None);
    }
}
