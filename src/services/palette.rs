// src/services/palette.rs

/// Lesson colors handed out in order.
pub const LESSON_PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
];

/// Used once every palette color is taken.
pub const DEFAULT_LESSON_COLOR: &str = "#64748B";

/// First palette color not among `used`, else the default.
pub fn pick_color<S: AsRef<str>>(used: &[S]) -> &'static str {
    LESSON_PALETTE
        .iter()
        .find(|color| {
            !used
                .iter()
                .any(|u| u.as_ref().eq_ignore_ascii_case(color))
        })
        .copied()
        .unwrap_or(DEFAULT_LESSON_COLOR)
}
