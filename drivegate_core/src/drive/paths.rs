use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};

use crate::error::{GatewayError, Result};

/// Item id Graph accepts for the drive root.
pub const ROOT_ITEM_ID: &str = "root";

pub const ITEM_FIELDS: &str = "id,name,size,lastModifiedDateTime,file,folder";
pub const ITEM_DETAIL_FIELDS: &str =
    "id,name,size,lastModifiedDateTime,file,folder,parentReference,webUrl";

/// `None` for the root, otherwise `/a/b` without a trailing slash.
pub fn normalize(path: &str) -> Option<String> {
    let segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/")))
    }
}

pub fn is_root(path: &str) -> bool {
    normalize(path).is_none()
}

/// Percent-encode each segment, keeping the separators.
pub fn encode(path: &str) -> String {
    match normalize(path) {
        None => String::new(),
        Some(p) => p
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/"),
    }
}

/// `{drive}/root` or `{drive}/root:/a/b:`.
pub fn item_path(drive: &str, path: &str) -> String {
    if is_root(path) {
        format!("{}/root", drive)
    } else {
        format!("{}/root:{}:", drive, encode(path))
    }
}

pub fn children_path(drive: &str, path: &str) -> String {
    if is_root(path) {
        format!("{}/root/children", drive)
    } else {
        format!("{}/root:{}:/children", drive, encode(path))
    }
}

/// Split `/a/b/name.txt` into (`/a/b`, `name.txt`).
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let normalized = normalize(path)?;
    let (parent, name) = normalized.rsplit_once('/')?;
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent.to_string(), name.to_string()))
}

/// `root/search(q='...')` with OData quote escaping.
pub fn search_path(drive: &str, query: &str) -> String {
    let escaped = query.replace('\'', "''");
    format!(
        "{}/root/search(q='{}')",
        drive,
        urlencoding::encode(&escaped)
    )
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
pub fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        GatewayError::Validation(format!(
            "'{}' is not a date (expected YYYY-MM-DD or RFC 3339)",
            raw
        ))
    })?;
    let (h, m, s) = if end_of_day { (23, 59, 59) } else { (0, 0, 0) };
    let time = NaiveTime::from_hms_opt(h, m, s)
        .ok_or_else(|| GatewayError::Validation(format!("invalid time for '{}'", raw)))?;
    Ok(date.and_time(time).and_utc())
}

pub fn modified_filter(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> String {
    let fmt = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
    match end {
        Some(end) => format!(
            "lastModifiedDateTime ge {} and lastModifiedDateTime le {}",
            fmt(start),
            fmt(end)
        ),
        None => format!("lastModifiedDateTime ge {}", fmt(start)),
    }
}

/// Last path segment of a URL, used as the operation or item id Graph embeds there.
pub fn last_segment(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_detection() {
        assert!(is_root("/"));
        assert!(is_root(""));
        assert!(is_root(" // "));
        assert!(!is_root("/Docs"));
        assert_eq!(normalize("Docs/Reports/").as_deref(), Some("/Docs/Reports"));
    }

    #[test]
    fn builds_path_addressed_endpoints() {
        assert_eq!(item_path("/drives/d1", "/"), "/drives/d1/root");
        assert_eq!(
            item_path("/drives/d1", "/My Docs/2024"),
            "/drives/d1/root:/My%20Docs/2024:"
        );
        assert_eq!(
            children_path("/me/drive", "Docs"),
            "/me/drive/root:/Docs:/children"
        );
        assert_eq!(children_path("/me/drive", "/"), "/me/drive/root/children");
    }

    #[test]
    fn splits_parent_and_name() {
        assert_eq!(
            split_parent("/a/b/file.txt"),
            Some(("/a/b".to_string(), "file.txt".to_string()))
        );
        assert_eq!(
            split_parent("file.txt"),
            Some(("/".to_string(), "file.txt".to_string()))
        );
        assert_eq!(split_parent("/"), None);
    }

    #[test]
    fn search_escapes_quotes() {
        assert_eq!(
            search_path("/drives/d", "bob's"),
            "/drives/d/root/search(q='bob%27%27s')"
        );
    }

    #[test]
    fn date_filters() {
        let start = parse_date_bound("2024-03-01", false).unwrap();
        let end = parse_date_bound("2024-03-31", true).unwrap();
        assert_eq!(
            modified_filter(start, Some(end)),
            "lastModifiedDateTime ge 2024-03-01T00:00:00Z and lastModifiedDateTime le 2024-03-31T23:59:59Z"
        );
        let ts = parse_date_bound("2024-03-01T10:00:00+02:00", false).unwrap();
        assert_eq!(modified_filter(ts, None), "lastModifiedDateTime ge 2024-03-01T08:00:00Z");
        assert!(parse_date_bound("last tuesday", false).is_err());
    }

    #[test]
    fn last_segment_of_monitor_url() {
        assert_eq!(
            last_segment("https://api.onedrive.com/v1.0/monitor/4A3407B5-88FC?x=1").as_deref(),
            Some("4A3407B5-88FC")
        );
        assert_eq!(last_segment("not a url"), None);
    }
}
