use crate::utils::time::current_date_context;
use chrono::DateTime;
use chrono_tz::Tz;

pub const MAX_MESSAGE_LENGTH: usize = 1000;

pub const EMPTY_MESSAGE_REPLY: &str = "Please provide a valid message.";
pub const TOO_LONG_REPLY: &str = "Message too long. Please keep it under 1000 characters.";
pub const ERROR_REPLY: &str =
    "I encountered an error while processing your request. Please try again.";
pub const NO_RESPONSE_REPLY: &str = "I couldn't generate a response.";
pub const NO_FUNCTION_RESPONSE_REPLY: &str = "I couldn't process the calendar operation.";

pub fn system_prompt(now: DateTime<Tz>) -> String {
    let timezone = now.timezone().name();
    format!(
        "You are a helpful calendar assistant. {context}

Help users manage their calendar by:
1. Creating single or multiple events
2. Updating and deleting events
3. Checking availability
4. Listing events

When handling dates and times:
- Use the current date/time as reference for relative times (e.g., \"tomorrow\", \"next week\")
- Always consider the user's timezone: {timezone}
- For ambiguous times, ask for clarification
- Default meeting duration to 1 hour unless specified

For multiple events:
- Use createMultipleEvents function when user wants to create several events at once
- Batch process related events together
- Validate all event times before creating
- Provide a summary of successes and failures

Important:
- Maintain conversation context and refer to previous messages
- If user provides partial information, use context from previous messages
- Ask for clarification only when necessary information is missing from both current and previous messages

For calendar operations, use the appropriate function.
For general questions or unclear requests, ask for clarification.
Keep responses concise and professional.",
        context = current_date_context(now),
        timezone = timezone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prompt_mentions_date_and_zone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap();
        let prompt = system_prompt(now);
        assert!(prompt.starts_with("You are a helpful calendar assistant."));
        assert!(prompt.contains("Monday, March 4, 2024"));
        assert!(prompt.contains("timezone: America/New_York"));
    }
}
