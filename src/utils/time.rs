use chrono::DateTime;
use chrono_tz::Tz;

/// Human readable "now" for the model, e.g.
/// `Current date and time: Wednesday, May 1, 2024 09:30 AM CEST (Europe/Berlin)`
pub fn current_date_context(now: DateTime<Tz>) -> String {
    format!(
        "Current date and time: {} ({})",
        now.format("%A, %B %-d, %Y %I:%M %p %Z"),
        now.timezone().name()
    )
}
