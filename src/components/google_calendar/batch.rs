use super::models::{BatchEventResult, BatchOptions, BatchResponse, BatchSummary, EventSpec};
use super::time::parse_event_time;
use super::CalendarProvider;
use crate::error::{validation_error, AppResult};
use chrono_tz::Tz;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of provider calls in flight per round
pub const BATCH_CHUNK_SIZE: usize = 10;

/// Check an event before it is sent to the provider
pub fn validate_event(event: &EventSpec, tz: &Tz) -> AppResult<()> {
    if event.summary.trim().is_empty() {
        return Err(validation_error("Event summary is required"));
    }
    if event.start_date_time.trim().is_empty() {
        return Err(validation_error("Start time is required"));
    }
    if event.end_date_time.trim().is_empty() {
        return Err(validation_error("End time is required"));
    }

    let start = parse_event_time(&event.start_date_time, tz)
        .ok_or_else(|| validation_error("Invalid start time format"))?;
    let end = parse_event_time(&event.end_date_time, tz)
        .ok_or_else(|| validation_error("Invalid end time format"))?;

    if end <= start {
        return Err(validation_error("End time must be after start time"));
    }

    Ok(())
}

/// Creates many events at once in bounded concurrent chunks.
///
/// Each chunk is fired together and awaited together; chunks run one after
/// another. With `stop_on_error` the run ends after the chunk in which the
/// first failure happened, so events issued alongside the failure in that
/// chunk may still be created.
pub struct BatchEventEngine {
    provider: Arc<dyn CalendarProvider>,
    chunk_size: usize,
    timezone: Tz,
}

impl BatchEventEngine {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        Self {
            provider,
            chunk_size: BATCH_CHUNK_SIZE,
            timezone: Tz::UTC,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Timezone for event times that carry no offset
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub async fn submit_batch(&self, events: Vec<EventSpec>, options: BatchOptions) -> BatchResponse {
        let total = events.len();
        let mut results: Vec<BatchEventResult> = Vec::with_capacity(total);

        info!(
            "Processing batch of {} events (validate_only={}, stop_on_error={})",
            total, options.validate_only, options.stop_on_error
        );

        for (index, chunk) in events.chunks(self.chunk_size).enumerate() {
            debug!("Processing chunk {} with {} events", index, chunk.len());

            // join_all keeps input order regardless of completion order
            let chunk_results =
                join_all(chunk.iter().map(|event| self.process_event(event, options))).await;
            results.extend(chunk_results);

            if options.stop_on_error && results.iter().any(|r| !r.is_success()) {
                if results.len() < total {
                    warn!(
                        "Stopping batch after chunk {}: {} events not attempted",
                        index,
                        total - results.len()
                    );
                }
                break;
            }
        }

        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - successful;
        let summary = BatchSummary {
            total,
            successful,
            failed,
            skipped: total - results.len(),
        };

        BatchResponse {
            success: failed == 0,
            message: format_batch_summary(&summary, options.validate_only),
            results,
            summary,
        }
    }

    async fn process_event(&self, event: &EventSpec, options: BatchOptions) -> BatchEventResult {
        if let Err(e) = validate_event(event, &self.timezone) {
            return BatchEventResult::failed(event.clone(), e.detail());
        }

        if options.validate_only {
            return BatchEventResult::validated(event.clone());
        }

        match self.provider.create_event(event).await {
            Ok(created) => BatchEventResult::created(event.clone(), created.id),
            Err(e) => {
                warn!("Failed to create event '{}': {}", event.summary, e);
                BatchEventResult::failed(event.clone(), e.detail())
            }
        }
    }
}

fn format_batch_summary(summary: &BatchSummary, was_validation: bool) -> String {
    let operation = if was_validation { "validated" } else { "created" };

    if summary.failed == 0 {
        return format!("Successfully {} all {} events.", operation, summary.successful);
    }

    let message = format!(
        "{} {} events successfully, {} failed.",
        operation, summary.successful, summary.failed
    );
    if summary.skipped > 0 {
        format!(
            "Stopped after a failure: {} {} events were not attempted.",
            message, summary.skipped
        )
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages() {
        let tz = Tz::UTC;
        let ok = EventSpec::new("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z");
        assert!(validate_event(&ok, &tz).is_ok());

        let cases = [
            (EventSpec::new(" ", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z"), "summary"),
            (EventSpec::new("A", "", "2024-01-01T11:00:00Z"), "Start time is required"),
            (EventSpec::new("A", "2024-01-01T10:00:00Z", ""), "End time is required"),
            (EventSpec::new("A", "soon", "2024-01-01T11:00:00Z"), "Invalid start time"),
            (EventSpec::new("A", "2024-01-01T10:00:00Z", "later"), "Invalid end time"),
            (EventSpec::new("A", "2024-01-01T10:00:00Z", "2024-01-01T10:00:00Z"), "after"),
        ];

        for (spec, expected) in cases {
            let err = validate_event(&spec, &tz).unwrap_err();
            assert!(err.detail().contains(expected), "{} should mention {}", err, expected);
        }
    }

    #[test]
    fn summary_wording() {
        let all_ok = BatchSummary { total: 3, successful: 3, failed: 0, skipped: 0 };
        assert_eq!(format_batch_summary(&all_ok, false), "Successfully created all 3 events.");
        assert_eq!(format_batch_summary(&all_ok, true), "Successfully validated all 3 events.");

        let partial = BatchSummary { total: 3, successful: 2, failed: 1, skipped: 0 };
        assert_eq!(format_batch_summary(&partial, false), "created 2 events successfully, 1 failed.");

        let stopped = BatchSummary { total: 30, successful: 9, failed: 1, skipped: 20 };
        assert!(format_batch_summary(&stopped, false).contains("20 events were not attempted"));
    }
}
