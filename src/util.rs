use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// IMF-fixdate 格式，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// 把时间格式化为 `last-modified` / `date` 头使用的 HTTP 日期
pub fn http_date(time: SystemTime) -> String {
    let date: DateTime<Utc> = time.into();
    format_date(&date)
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

/// 距 Unix 纪元的毫秒数，早于纪元的时间记为 0
pub fn epoch_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}
