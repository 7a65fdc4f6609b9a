use ammonia;

/// Sanitizes free text (resource descriptions, student notes) before storage.
///
/// Whitelist based: harmless tags like <b> survive, <script> is removed together
/// with its content, event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Cleans an optional field, turning blank input into `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(clean_html)
}
