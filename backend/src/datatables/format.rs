// Named cell formatters for the player and round-history tables.

use chrono::{DateTime, Utc};

use super::{CellValue, FormatError, RowValues};

fn integer(value: &CellValue) -> Result<i64, FormatError> {
    value
        .as_i64()
        .ok_or_else(|| FormatError(format!("expected a number, got `{value}`")))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, FormatError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| FormatError(format!("bad timestamp {secs}")))
}

/// Escape text for inclusion in an HTML cell.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Group digits with commas: `1234567` → `1,234,567`.
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `H:MM:SS`-style duration, hours unbounded.
pub fn seconds_to_hms(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Coarse "time since" text between two unix timestamps.
pub fn format_difference(from: i64, to: i64) -> String {
    if from <= 0 {
        return "Never".to_string();
    }
    let diff = (to - from).max(0);
    if diff < 60 {
        return "Just now".to_string();
    }
    const UNITS: [(i64, &str); 6] = [
        (365 * 86400, "year"),
        (30 * 86400, "month"),
        (7 * 86400, "week"),
        (86400, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];
    let (size, name) = UNITS
        .iter()
        .copied()
        .find(|(size, _)| diff >= *size)
        .unwrap_or((60, "minute"));
    let n = diff / size;
    let plural = if n == 1 { "" } else { "s" };
    format!("{n} {name}{plural} ago")
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

// ── Formatters ───────────────────────────────────────────────────────

pub fn text(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    Ok(html_escape(&value.to_string()))
}

pub fn number(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    let n = value
        .as_f64()
        .ok_or_else(|| FormatError(format!("expected a number, got `{value}`")))?;
    Ok(group_thousands(n.round() as i64))
}

pub fn rank_image(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    let rank = integer(value)?;
    Ok(format!(
        "<img class='center' src=\"/images/ranks/rank_{rank}.gif\">"
    ))
}

pub fn army_image(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    let army = integer(value)?;
    Ok(format!(
        "<img class='center' src=\"/images/armies/small/{army}.png\">"
    ))
}

/// `05 Mar 2017`
pub fn date(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    Ok(timestamp(integer(value)?)?.format("%d %b %Y").to_string())
}

/// `March 5th, 2017 3:04 PM UTC`
pub fn long_timestamp(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    let t = timestamp(integer(value)?)?;
    let day: u32 = t.format("%-d").to_string().parse().unwrap_or(0);
    Ok(format!(
        "{} {}{}, {}",
        t.format("%B"),
        day,
        ordinal_suffix(day),
        t.format("%Y %-I:%M %p UTC")
    ))
}

pub fn time_since(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    Ok(format_difference(integer(value)?, Utc::now().timestamp()))
}

pub fn duration(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    Ok(seconds_to_hms(integer(value)?))
}

pub fn ban_flag(value: &CellValue, _row: &RowValues) -> Result<String, FormatError> {
    Ok(if integer(value)? == 0 {
        "<span style=\"color: green; \">No</span>".to_string()
    } else {
        "<span style=\"color: red; \">Yes</span>".to_string()
    })
}

/// View/edit/ban/unban/delete buttons for a player row.
pub fn player_actions(_value: &CellValue, row: &RowValues) -> Result<String, FormatError> {
    let id = row
        .integer("id")
        .ok_or_else(|| FormatError("row has no id".to_string()))?;
    let banned = row.integer("permban").unwrap_or(0) == 1;
    let hide = " style=\"display: none\"";
    let (ban_style, unban_style) = if banned { (hide, "") } else { ("", hide) };
    Ok(format!(
        "<span class=\"btn-group\">\
         <a id=\"go-{id}\" href=\"/players/{id}\" rel=\"tooltip\" title=\"View Player\" class=\"btn btn-small\"><i class=\"icon-eye-open\"></i></a>\
         <a id=\"edit-btn-{id}\" href=\"#\" rel=\"tooltip\" title=\"Edit Player\" class=\"btn btn-small\"><i class=\"icon-pencil\"></i></a>\
         <a id=\"ban-btn-{id}\" href=\"#\" rel=\"tooltip\" title=\"Ban Player\" class=\"btn btn-small\"{ban_style}><i class=\"icon-flag\"></i></a>\
         <a id=\"unban-btn-{id}\" href=\"#\" rel=\"tooltip\" title=\"Unban Player\" class=\"btn btn-small\"{unban_style}><i class=\"icon-ok\"></i></a>\
         <a id=\"delete-btn-{id}\" href=\"#\" rel=\"tooltip\" title=\"Delete Player\" class=\"btn btn-small\"><i class=\"icon-trash\"></i></a>\
         </span>"
    ))
}

/// Link to the round detail page of a history row.
pub fn round_actions(_value: &CellValue, row: &RowValues) -> Result<String, FormatError> {
    let (Some(pid), Some(rid)) = (row.integer("pid"), row.integer("roundid")) else {
        return Err(FormatError("row has no pid/roundid".to_string()));
    };
    Ok(format!(
        "<span class=\"btn-group\">\
         <a href=\"/players/{pid}/history/{rid}\" rel=\"tooltip\" title=\"View Round Details\" class=\"btn btn-small\"><i class=\"icon-eye-open\"></i></a>\
         </span>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> RowValues {
        RowValues::default()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-45000), "-45,000");
    }

    #[test]
    fn test_number_rounds_like_integer_format() {
        assert_eq!(number(&CellValue::Real(1499.6), &empty()).unwrap(), "1,500");
        assert_eq!(number(&CellValue::Text("2500".into()), &empty()).unwrap(), "2,500");
        assert!(number(&CellValue::Text("abc".into()), &empty()).is_err());
    }

    #[test]
    fn test_seconds_to_hms() {
        assert_eq!(seconds_to_hms(0), "00:00:00");
        assert_eq!(seconds_to_hms(3661), "01:01:01");
        assert_eq!(seconds_to_hms(360000), "100:00:00");
    }

    #[test]
    fn test_format_difference() {
        assert_eq!(format_difference(0, 1000), "Never");
        assert_eq!(format_difference(1000, 1030), "Just now");
        assert_eq!(format_difference(1000, 1000 + 60), "1 minute ago");
        assert_eq!(format_difference(1000, 1000 + 2 * 3600), "2 hours ago");
        assert_eq!(format_difference(1000, 1000 + 3 * 86400), "3 days ago");
        assert_eq!(format_difference(1000, 1000 + 400 * 86400), "1 year ago");
    }

    #[test]
    fn test_dates() {
        // 2017-03-05 15:04:00 UTC
        let ts = CellValue::Integer(1488726240);
        assert_eq!(date(&ts, &empty()).unwrap(), "05 Mar 2017");
        assert_eq!(
            long_timestamp(&ts, &empty()).unwrap(),
            "March 5th, 2017 3:04 PM UTC"
        );
    }

    #[test]
    fn test_ordinal_suffix() {
        assert_eq!(ordinal_suffix(1), "st");
        assert_eq!(ordinal_suffix(2), "nd");
        assert_eq!(ordinal_suffix(3), "rd");
        assert_eq!(ordinal_suffix(11), "th");
        assert_eq!(ordinal_suffix(12), "th");
        assert_eq!(ordinal_suffix(22), "nd");
    }

    #[test]
    fn test_ban_flag_and_actions() {
        assert!(ban_flag(&CellValue::Integer(0), &empty()).unwrap().contains("No"));
        assert!(ban_flag(&CellValue::Integer(1), &empty()).unwrap().contains("Yes"));

        let mut row = RowValues::default();
        row.insert("id", CellValue::Integer(7));
        row.insert("permban", CellValue::Integer(1));
        let html = player_actions(&CellValue::Null, &row).unwrap();
        assert!(html.contains("href=\"/players/7\""));
        assert!(html.contains("ban-btn-7\" href=\"#\" rel=\"tooltip\" title=\"Ban Player\" class=\"btn btn-small\" style=\"display: none\""));

        assert!(player_actions(&CellValue::Null, &empty()).is_err());
    }

    #[test]
    fn test_round_actions_link() {
        let mut row = RowValues::default();
        row.insert("pid", CellValue::Integer(3));
        row.insert("roundid", CellValue::Integer(44));
        let html = round_actions(&CellValue::Null, &row).unwrap();
        assert!(html.contains("/players/3/history/44"));
    }

    #[test]
    fn test_text_is_escaped() {
        let v = CellValue::Text("<b>[TAG]</b>".into());
        assert_eq!(text(&v, &empty()).unwrap(), "&lt;b&gt;[TAG]&lt;/b&gt;");
    }
}
