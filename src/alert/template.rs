//! Markdown rendering of slow query alerts.
//!
//! The layout is fixed: every field is always present, with `-` standing in
//! for an unknown log timestamp.

use crate::entry::ParsedEntry;

/// Render the alert text for `entry`.
pub fn render_alert(entry: &ParsedEntry) -> String {
    let logged_at = entry
        .logged_at
        .map_or_else(|| "-".to_owned(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());

    format!(
        "<font color=\"warning\">**Slow query alert**</font>\n\
         > **Query time:** <font color=\"warning\">{query:.2} s</font>\n\
         > **Lock time:** <font color=\"comment\">{lock:.2} s</font>\n\
         > **Database:** <font color=\"comment\">{database}</font>\n\
         > **User:** <font color=\"comment\">{user}</font>\n\
         > **Host:** <font color=\"comment\">{host}</font>\n\
         > **Logged at:** <font color=\"comment\">{logged_at}</font>\n\
         > **Rows sent:** <font color=\"comment\">{rows_sent}</font>\n\
         > **Rows examined:** <font color=\"comment\">{rows_examined}</font>\n\
         > **SQL:** <font color=\"comment\">{sql}</font>\n",
        query = entry.query_time_secs,
        lock = entry.lock_time_secs,
        database = entry.database,
        user = entry.user,
        host = entry.host,
        rows_sent = entry.rows_sent,
        rows_examined = entry.rows_examined,
        sql = entry.sql_text,
    )
}

/// The alert sent by the `--test` dry run.
pub fn sample_alert() -> String {
    render_alert(&ParsedEntry::sample())
}
