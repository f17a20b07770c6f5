//! Priority classification for outbound backbone packets (§4.5).

use nexdigi_core::Priority;

/// Tags inspected by priority classification. All fields are derived from
/// the APRS payload or station metadata by the caller before the packet
/// enters the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketTags<'a> {
    /// Free-form content tags, e.g. weather/alert codes.
    pub tags: &'a [&'a str],
    /// Explicit priority override tag (`'H'`, `'M'`, `'L'`), if the payload
    /// carries one.
    pub priority_tag: Option<char>,
    /// Whether the payload is a bulletin or weather report.
    pub is_bulletin_or_weather: bool,
    /// APRS data-type category, if applicable (e.g. `'B'` for bulletin).
    pub category: Option<char>,
    /// Whether the payload is a status report.
    pub is_status: bool,
}

/// Tags that always classify a packet as [`Priority::Emergency`].
pub const EMERGENCY_TAGS: &[&str] = &["TOR", "SVR", "FFW", "EMERGENCY", "MAYDAY"];

/// Classifies a packet's scheduling priority from its tags (§4.5).
///
/// Order matters: Emergency is checked first, then High, then Low; anything
/// left over is Normal.
#[must_use]
pub fn classify(meta: &PacketTags<'_>) -> Priority {
    let is_emergency_tag = meta.tags.iter().any(|tag| {
        let upper = tag.to_ascii_uppercase();
        EMERGENCY_TAGS.contains(&upper.as_str())
    });
    if is_emergency_tag || meta.priority_tag == Some('H') {
        return Priority::Emergency;
    }
    if meta.is_bulletin_or_weather || meta.priority_tag == Some('M') {
        return Priority::High;
    }
    if meta.category == Some('B') || meta.priority_tag == Some('L') || meta.is_status {
        return Priority::Low;
    }
    Priority::Normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_tag_wins_regardless_of_case() {
        let meta = PacketTags { tags: &["ffw"], ..Default::default() };
        assert_eq!(classify(&meta), Priority::Emergency);
    }

    #[test]
    fn priority_tag_h_is_emergency() {
        let meta = PacketTags { priority_tag: Some('H'), ..Default::default() };
        assert_eq!(classify(&meta), Priority::Emergency);
    }

    #[test]
    fn bulletin_or_weather_is_high() {
        let meta = PacketTags { is_bulletin_or_weather: true, ..Default::default() };
        assert_eq!(classify(&meta), Priority::High);
    }

    #[test]
    fn category_b_is_low() {
        let meta = PacketTags { category: Some('B'), ..Default::default() };
        assert_eq!(classify(&meta), Priority::Low);
    }

    #[test]
    fn status_report_is_low() {
        let meta = PacketTags { is_status: true, ..Default::default() };
        assert_eq!(classify(&meta), Priority::Low);
    }

    #[test]
    fn default_is_normal() {
        let meta = PacketTags::default();
        assert_eq!(classify(&meta), Priority::Normal);
    }

    #[test]
    fn emergency_takes_precedence_over_high_and_low_signals() {
        let meta = PacketTags {
            tags: &["MAYDAY"],
            is_bulletin_or_weather: true,
            category: Some('B'),
            ..Default::default()
        };
        assert_eq!(classify(&meta), Priority::Emergency);
    }
}
