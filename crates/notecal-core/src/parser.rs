//! Schedule section parsing.
//!
//! A day note is loosely structured markdown. Everything under the
//! configured schedule heading, up to the next heading of equal or
//! shallower level, is scanned for list items; each list item becomes at
//! most one [`ScheduleEntry`]. Non-list lines in the section are ignored.
//!
//! The same heading-bounded region also feeds [`normalized_fingerprint`],
//! the change-detection input. Both paths share [`section_bounds`] so the
//! two can never disagree about where the section ends.

use chrono::{Duration, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// One calendar-worthy item extracted from a day's text.
///
/// `raw_line` keeps the list-item text exactly as written (checkbox marker
/// included); it is the input to identity-key derivation. When `all_day`
/// is set, `start`/`end` are ignored for event building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub raw_line: String,
    pub title: String,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub all_day: bool,
}

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.+)$").expect("static regex"));
static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").expect("static regex"));
static CHECKBOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(?: |x|X)\]\s+").expect("static regex"));
static TIME_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})\s+(.+)$").expect("static regex"));
static TIME_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})\s+(.+)$").expect("static regex"));
static ALL_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^all-?day\s*[:-]?\s*(.+)$").expect("static regex"));

/// Heading level (number of `#`) and text, if `line` is a heading.
fn heading_parts(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING_RE.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let text = caps.get(2)?.as_str();
    Some((level, text))
}

/// Line-index range of the section body under the first heading whose
/// trimmed text equals `heading` case-insensitively.
///
/// The range starts after the heading line and stops before the next
/// heading of equal-or-shallower level (or at end of text). `None` when
/// the heading is absent.
fn section_bounds(lines: &[&str], heading: &str) -> Option<(usize, usize)> {
    let wanted = heading.trim().to_lowercase();
    let (idx, level) = lines.iter().enumerate().find_map(|(i, line)| {
        let (level, text) = heading_parts(line)?;
        (text.trim().to_lowercase() == wanted).then_some((i, level))
    })?;

    let end = lines[idx + 1..]
        .iter()
        .position(|line| heading_parts(line).is_some_and(|(lvl, _)| lvl <= level))
        .map_or(lines.len(), |offset| idx + 1 + offset);

    Some((idx + 1, end))
}

/// Strip one leading checkbox marker (`[ ]`, `[x]`, `[X]`) from a list
/// item, returning the rest unchanged.
pub fn strip_checkbox(item: &str) -> &str {
    match CHECKBOX_RE.find(item) {
        Some(m) => &item[m.end()..],
        None => item,
    }
}

/// Normalize clock components by modulo: hour mod 24, minute mod 60.
/// `25:70` becomes `01:10`.
pub fn fix_time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour % 24, minute % 60, 0).expect("components in range after modulo")
}

fn clock_field(caps: &Captures, index: usize) -> u32 {
    caps[index].parse().unwrap_or(0)
}

/// Parse the list items under `heading` into schedule entries, in source
/// order. Absent heading yields an empty list; lines that are not list
/// items are skipped silently.
pub fn parse_schedule(text: &str, heading: &str) -> Vec<ScheduleEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let Some((start, end)) = section_bounds(&lines, heading) else {
        return Vec::new();
    };

    lines[start..end]
        .iter()
        .filter_map(|line| {
            let caps = BULLET_RE.captures(line)?;
            let item = caps.get(1)?.as_str().trim();
            parse_schedule_line(item)
        })
        .collect()
}

/// Classify one list item. First match wins:
/// timed range, timed start, all-day marker, then bare title.
fn parse_schedule_line(item: &str) -> Option<ScheduleEntry> {
    if item.is_empty() {
        return None;
    }
    let text = strip_checkbox(item);

    if let Some(caps) = TIME_RANGE_RE.captures(text) {
        return Some(ScheduleEntry {
            raw_line: item.to_string(),
            title: caps[5].trim().to_string(),
            start: Some(fix_time(clock_field(&caps, 1), clock_field(&caps, 2))),
            end: Some(fix_time(clock_field(&caps, 3), clock_field(&caps, 4))),
            all_day: false,
        });
    }

    if let Some(caps) = TIME_START_RE.captures(text) {
        return Some(ScheduleEntry {
            raw_line: item.to_string(),
            title: caps[3].trim().to_string(),
            start: Some(fix_time(clock_field(&caps, 1), clock_field(&caps, 2))),
            end: None,
            all_day: false,
        });
    }

    if let Some(caps) = ALL_DAY_RE.captures(text) {
        return Some(ScheduleEntry {
            raw_line: item.to_string(),
            title: caps[1].trim().to_string(),
            start: None,
            end: None,
            all_day: true,
        });
    }

    // No time prefix at all: the whole text is the title.
    Some(ScheduleEntry {
        raw_line: item.to_string(),
        title: text.to_string(),
        start: None,
        end: None,
        all_day: false,
    })
}

/// Normalized text of the schedule section, for change detection only.
///
/// Walks the same section as [`parse_schedule`], strips checkbox markers,
/// collapses internal whitespace and joins the per-item results with
/// newlines. Recomputed independently of the entry list: two differently
/// classified lines with equal cleaned text fingerprint equally.
pub fn normalized_fingerprint(text: &str, heading: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some((start, end)) = section_bounds(&lines, heading) else {
        return String::new();
    };

    let mut collected = Vec::new();
    for line in &lines[start..end] {
        let Some(caps) = BULLET_RE.captures(line) else {
            continue;
        };
        let item = caps.get(1).map_or("", |m| m.as_str()).trim();
        let item = strip_checkbox(item);
        let squashed = item.split_whitespace().collect::<Vec<_>>().join(" ");
        collected.push(squashed);
    }
    collected.join("\n")
}

/// Deterministic sync identity for one schedule line on one date:
/// `YYYY-MM-DD::<line with checkbox marker stripped, trimmed>`.
///
/// Toggling a checkbox does not change the key; any other edit to the
/// line does, and is treated downstream as delete-old + create-new.
pub fn make_event_key(date: NaiveDate, raw_line: &str) -> String {
    format!("{}::{}", date.format("%Y-%m-%d"), strip_checkbox(raw_line).trim())
}

/// End of a timed entry: explicit end if present, otherwise start plus the
/// configured default duration (wrapping past midnight stays on the same
/// calendar day, matching how the event body is rendered).
pub fn resolve_end(entry: &ScheduleEntry, start: NaiveTime, default_duration_minutes: u32) -> NaiveTime {
    entry
        .end
        .unwrap_or_else(|| start + Duration::minutes(i64::from(default_duration_minutes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_timed_openend_and_allday_entries() {
        let text = indoc! {"
            # 2025-03-01

            ## Schedule
            - 09:00-10:00 Standup
            - 14:30 1:1
            - all-day: Offsite

            ## Notes
            - not a schedule item
        "};
        let entries = parse_schedule(text, "Schedule");
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].title, "Standup");
        assert_eq!(entries[0].start, Some(time(9, 0)));
        assert_eq!(entries[0].end, Some(time(10, 0)));
        assert!(!entries[0].all_day);

        assert_eq!(entries[1].title, "1:1");
        assert_eq!(entries[1].start, Some(time(14, 30)));
        assert_eq!(entries[1].end, None);

        assert_eq!(entries[2].title, "Offsite");
        assert!(entries[2].all_day);
        assert_eq!(entries[2].start, None);
    }

    #[test]
    fn missing_heading_yields_no_entries() {
        assert!(parse_schedule("# Other\n- 09:00 Thing", "Schedule").is_empty());
        assert_eq!(normalized_fingerprint("# Other\n- x", "Schedule"), "");
    }

    #[test]
    fn heading_match_is_case_insensitive_and_trimmed() {
        let entries = parse_schedule("##  sChEdUlE \n- 09:00 Standup", "Schedule");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn section_stops_at_equal_or_shallower_heading_only() {
        let text = indoc! {"
            ## Schedule
            - 09:00 Before
            ### Details
            - 10:00 Still inside
            ## Next
            - 11:00 Outside
        "};
        let entries = parse_schedule(text, "Schedule");
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Before", "Still inside"]);

        // The fingerprint walks the exact same region.
        let fp = normalized_fingerprint(text, "Schedule");
        assert_eq!(fp, "09:00 Before\n10:00 Still inside");
    }

    #[test]
    fn non_list_lines_are_ignored_not_errors() {
        let text = "## Schedule\nsome prose\n- 09:00 Standup\n> quote\n";
        let entries = parse_schedule(text, "Schedule");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Standup");
    }

    #[test]
    fn checkbox_marker_is_stripped_for_classification_but_kept_in_raw_line() {
        let entries = parse_schedule("## Schedule\n- [x] 09:00 Standup\n", "Schedule");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_line, "[x] 09:00 Standup");
        assert_eq!(entries[0].title, "Standup");
        assert_eq!(entries[0].start, Some(time(9, 0)));
    }

    #[test]
    fn untimed_line_becomes_bare_title_entry() {
        let entries = parse_schedule("## Schedule\n- Buy groceries\n", "Schedule");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Buy groceries");
        assert_eq!(entries[0].start, None);
        assert!(!entries[0].all_day);
    }

    #[test]
    fn all_day_marker_variants() {
        for line in ["- all-day: Offsite", "- allday Offsite", "- ALL-DAY - Offsite"] {
            let text = format!("## Schedule\n{line}\n");
            let entries = parse_schedule(&text, "Schedule");
            assert_eq!(entries.len(), 1, "line: {line}");
            assert!(entries[0].all_day, "line: {line}");
            assert_eq!(entries[0].title, "Offsite", "line: {line}");
        }
    }

    #[test]
    fn fix_time_normalizes_by_modulo() {
        assert_eq!(fix_time(25, 70).format("%H:%M").to_string(), "01:10");
        assert_eq!(fix_time(0, 0).format("%H:%M").to_string(), "00:00");
        assert_eq!(fix_time(23, 59), time(23, 59));
    }

    #[test]
    fn fingerprint_is_stable_under_interword_whitespace() {
        let a = "## Schedule\n- 09:00  Standup   meeting\n";
        let b = "## Schedule\n- 09:00 Standup meeting\n";
        assert_eq!(
            normalized_fingerprint(a, "Schedule"),
            normalized_fingerprint(b, "Schedule")
        );
    }

    #[test]
    fn fingerprint_ignores_checkbox_state() {
        let a = "## Schedule\n- [ ] 09:00 Standup\n";
        let b = "## Schedule\n- [x] 09:00 Standup\n";
        assert_eq!(
            normalized_fingerprint(a, "Schedule"),
            normalized_fingerprint(b, "Schedule")
        );
    }

    #[test]
    fn event_key_ignores_checkbox_but_preserves_case() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            make_event_key(date, "[ ] 09:00 Standup"),
            make_event_key(date, "[x] 09:00 Standup")
        );
        assert_ne!(
            make_event_key(date, "[ ] 09:00 Standup"),
            make_event_key(date, "[ ] 09:00 standup")
        );
        assert_eq!(
            make_event_key(date, "09:00 Standup"),
            "2025-03-01::09:00 Standup"
        );
    }

    #[test]
    fn resolve_end_uses_default_duration_and_wraps() {
        let entry = ScheduleEntry {
            raw_line: "23:30 Late".into(),
            title: "Late".into(),
            start: Some(time(23, 30)),
            end: None,
            all_day: false,
        };
        assert_eq!(resolve_end(&entry, time(23, 30), 60), time(0, 30));
        assert_eq!(resolve_end(&entry, time(9, 0), 45), time(9, 45));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fix_time_components_always_in_range(h in 0u32..200, m in 0u32..200) {
                let t = fix_time(h, m);
                let rendered = t.format("%H:%M").to_string();
                prop_assert_eq!(rendered, format!("{:02}:{:02}", h % 24, m % 60));
            }

            #[test]
            fn fingerprint_idempotent_under_space_doubling(title in "[a-zA-Z][a-zA-Z ]{0,30}") {
                let single = format!("## Schedule\n- 09:00 {}\n", title);
                let doubled = format!("## Schedule\n- 09:00 {}\n", title.replace(' ', "  "));
                prop_assert_eq!(
                    normalized_fingerprint(&single, "Schedule"),
                    normalized_fingerprint(&doubled, "Schedule")
                );
            }
        }
    }
}
