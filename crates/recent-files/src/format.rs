//! Display helpers for recent file listings

use crate::types::DocumentRecord;
use chrono::DateTime;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Describe how long ago `then` was, relative to `now` (both epoch millis)
pub fn format_relative_time(now: i64, then: i64) -> String {
    let diff = now.saturating_sub(then);
    let minutes = diff / MINUTE_MS;
    let hours = diff / HOUR_MS;
    let days = diff / DAY_MS;

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours < 24 {
        format!("{} hour{} ago", hours, if hours > 1 { "s" } else { "" })
    } else if days < 7 {
        format!("{} day{} ago", days, if days > 1 { "s" } else { "" })
    } else {
        DateTime::from_timestamp_millis(then)
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Long ago".to_string())
    }
}

/// Human-readable size with 1024-based units
pub fn format_byte_size(bytes: u64) -> String {
    if bytes == 0 {
        return "Unknown size".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Case-insensitive match on display name or source locator
pub fn matches_query(record: &DocumentRecord, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || record.display_name.to_lowercase().contains(&query)
        || record.source_locator.to_lowercase().contains(&query)
}

/// Multi-line description of a record
pub fn record_summary(record: &DocumentRecord, now: i64) -> String {
    let view = &record.view_state;
    let cache = if record.is_content_cached {
        format!("Cached locally ({})", format_byte_size(record.cached_byte_size))
    } else {
        "Will download when opened".to_string()
    };

    [
        format!("Filename: {}", record.display_name),
        format!(
            "Last Opened: {}",
            format_relative_time(now, record.last_opened_at)
        ),
        format!("Current Page: {}", view.page),
        format!("Zoom Level: {}%", (view.zoom_factor * 100.0).round()),
        format!("Rotation: {}°", view.rotation.degrees()),
        format!(
            "Has Edits: {}",
            if record.has_unsaved_edits { "Yes" } else { "No" }
        ),
        format!("Cache: {}", cache),
        format!("File Path: {}", record.source_locator),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time_buckets() {
        let now = 100 * DAY_MS;
        assert_eq!(format_relative_time(now, now - 30 * 1000), "Just now");
        assert_eq!(format_relative_time(now, now - 5 * MINUTE_MS), "5 min ago");
        assert_eq!(format_relative_time(now, now - HOUR_MS), "1 hour ago");
        assert_eq!(format_relative_time(now, now - 3 * HOUR_MS), "3 hours ago");
        assert_eq!(format_relative_time(now, now - DAY_MS), "1 day ago");
        assert_eq!(format_relative_time(now, now - 6 * DAY_MS), "6 days ago");
    }

    #[test]
    fn test_relative_time_falls_back_to_date() {
        // 2024-03-01T12:00:00Z
        let then = 1_709_294_400_000;
        assert_eq!(format_relative_time(then + 30 * DAY_MS, then), "2024-03-01");
    }

    #[test]
    fn test_future_timestamps_are_just_now() {
        assert_eq!(format_relative_time(0, 5 * MINUTE_MS), "Just now");
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(format_byte_size(0), "Unknown size");
        assert_eq!(format_byte_size(512), "512 B");
        assert_eq!(format_byte_size(1536), "1.5 KB");
        assert_eq!(format_byte_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_byte_size(3 * 1024 * 1024 * 1024 * 1024), "3072.0 GB");
    }

    #[test]
    fn test_query_matches_name_or_locator() {
        let record =
            DocumentRecord::new("fp", "Quarterly Report.pdf", "https://files.example/q3", 0);

        assert!(matches_query(&record, "report"));
        assert!(matches_query(&record, "FILES.EXAMPLE"));
        assert!(matches_query(&record, "  "));
        assert!(!matches_query(&record, "invoice"));
    }

    #[test]
    fn test_summary_lines() {
        let mut record = DocumentRecord::new("fp", "a.pdf", "/docs/a.pdf", 0);
        record.view_state.zoom_factor = 1.5;
        record.has_unsaved_edits = true;

        let summary = record_summary(&record, 0);
        assert!(summary.contains("Filename: a.pdf"));
        assert!(summary.contains("Zoom Level: 150%"));
        assert!(summary.contains("Has Edits: Yes"));
        assert!(summary.contains("Will download when opened"));
        assert!(summary.ends_with("File Path: /docs/a.pdf"));
    }
}
