use crate::components::google_calendar::{BatchOptions, EventPatch, EventSpec};
use crate::components::language_model::FunctionDefinition;
use crate::error::{validation_error, AppResult};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CREATE_EVENT: &str = "createEvent";
pub const UPDATE_EVENT: &str = "updateEvent";
pub const DELETE_EVENT: &str = "deleteEvent";
pub const CHECK_AVAILABILITY: &str = "checkAvailability";
pub const LIST_EVENTS: &str = "listEvents";
pub const CREATE_MULTIPLE_EVENTS: &str = "createMultipleEvents";

/// Names of every function offered to the model
pub const FUNCTION_NAMES: [&str; 6] = [
    CREATE_EVENT,
    UPDATE_EVENT,
    DELETE_EVENT,
    CHECK_AVAILABILITY,
    LIST_EVENTS,
    CREATE_MULTIPLE_EVENTS,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventArgs {
    /// ID of the event to update
    pub event_id: String,
    #[serde(flatten)]
    pub patch: EventPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEventArgs {
    /// ID of the event to delete
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeArgs {
    /// Start of time range
    pub time_min: String,
    /// End of time range
    pub time_max: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultipleEventsArgs {
    pub events: Vec<EventSpec>,
    #[serde(default)]
    pub options: BatchOptions,
}

/// A model-selected calendar operation with its decoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "camelCase")]
pub enum CalendarFunction {
    CreateEvent(EventSpec),
    UpdateEvent(UpdateEventArgs),
    DeleteEvent(DeleteEventArgs),
    CheckAvailability(TimeRangeArgs),
    ListEvents(TimeRangeArgs),
    CreateMultipleEvents(CreateMultipleEventsArgs),
}

/// Why a function call could not be turned into a `CalendarFunction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Unsupported(String),
    InvalidArguments(String),
}

impl CalendarFunction {
    /// Decode a raw function call. The name is checked before the arguments
    /// so that unknown functions are reported as such.
    pub fn decode(name: &str, arguments: &str) -> Result<Self, DecodeError> {
        if !FUNCTION_NAMES.contains(&name) {
            return Err(DecodeError::Unsupported(name.to_string()));
        }

        let arguments: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| DecodeError::InvalidArguments(e.to_string()))?
        };

        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| DecodeError::InvalidArguments(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CalendarFunction::CreateEvent(_) => CREATE_EVENT,
            CalendarFunction::UpdateEvent(_) => UPDATE_EVENT,
            CalendarFunction::DeleteEvent(_) => DELETE_EVENT,
            CalendarFunction::CheckAvailability(_) => CHECK_AVAILABILITY,
            CalendarFunction::ListEvents(_) => LIST_EVENTS,
            CalendarFunction::CreateMultipleEvents(_) => CREATE_MULTIPLE_EVENTS,
        }
    }
}

fn parameters_for<T: JsonSchema>() -> AppResult<Value> {
    let generator = SchemaSettings::draft07()
        .with(|settings| {
            settings.inline_subschemas = true;
            settings.meta_schema = None;
        })
        .into_generator();

    let mut schema = serde_json::to_value(generator.into_root_schema_for::<T>())?;
    let object = schema
        .as_object_mut()
        .ok_or_else(|| validation_error("Function schema is not an object"))?;
    object.remove("title");
    object.remove("definitions");

    Ok(schema)
}

fn definition<T: JsonSchema>(name: &str, description: &str) -> AppResult<FunctionDefinition> {
    Ok(FunctionDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: parameters_for::<T>()?,
    })
}

/// The six calendar functions offered to the model on the first round
pub fn function_definitions() -> AppResult<Vec<FunctionDefinition>> {
    Ok(vec![
        definition::<EventSpec>(CREATE_EVENT, "Create a new calendar event")?,
        definition::<UpdateEventArgs>(UPDATE_EVENT, "Update an existing calendar event")?,
        definition::<DeleteEventArgs>(DELETE_EVENT, "Delete a calendar event")?,
        definition::<TimeRangeArgs>(CHECK_AVAILABILITY, "Check availability for a time slot")?,
        definition::<TimeRangeArgs>(LIST_EVENTS, "List calendar events in a time range")?,
        definition::<CreateMultipleEventsArgs>(
            CREATE_MULTIPLE_EVENTS,
            "Create multiple calendar events in a single batch operation",
        )?,
    ])
}

/// Uniform result of a calendar function, fed back to the model as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

impl CalendarResponse {
    pub fn ok(data: Option<Value>, message: &str) -> Self {
        Self {
            success: true,
            data,
            error: None,
            message: message.to_string(),
        }
    }

    pub fn failed(error: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            message: message.to_string(),
        }
    }

    pub fn not_authenticated() -> Self {
        Self::failed(
            "Calendar service not initialized",
            "Please ensure you are authenticated to perform Calendar operations",
        )
    }

    pub fn from_decode_error(err: &DecodeError) -> Self {
        match err {
            DecodeError::Unsupported(name) => Self::failed(
                "Unsupported function",
                &format!("Function {} is not supported", name),
            ),
            DecodeError::InvalidArguments(detail) => Self::failed(
                &format!("Invalid arguments: {}", detail),
                "Failed to execute calendar operation",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_create_event() {
        let f = CalendarFunction::decode(
            "createEvent",
            r#"{"summary":"Standup","startDateTime":"2024-05-01T09:00:00Z","endDateTime":"2024-05-01T09:15:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            f,
            CalendarFunction::CreateEvent(EventSpec::new(
                "Standup",
                "2024-05-01T09:00:00Z",
                "2024-05-01T09:15:00Z"
            ))
        );
    }

    #[test]
    fn decodes_update_event_with_flattened_patch() {
        let f = CalendarFunction::decode("updateEvent", r#"{"eventId":"e1","summary":"Renamed"}"#)
            .unwrap();
        match f {
            CalendarFunction::UpdateEvent(args) => {
                assert_eq!(args.event_id, "e1");
                assert_eq!(args.patch.summary.as_deref(), Some("Renamed"));
                assert!(args.patch.start_date_time.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_time_range_functions() {
        let args = r#"{"timeMin":"2024-05-01T00:00:00Z","timeMax":"2024-05-02T00:00:00Z"}"#;
        assert!(matches!(
            CalendarFunction::decode("listEvents", args),
            Ok(CalendarFunction::ListEvents(_))
        ));
        assert!(matches!(
            CalendarFunction::decode("checkAvailability", args),
            Ok(CalendarFunction::CheckAvailability(_))
        ));
        let f = CalendarFunction::decode("listEvents", args).unwrap();
        assert_eq!(f.name(), LIST_EVENTS);
    }

    #[test]
    fn batch_options_default_when_absent() {
        let f = CalendarFunction::decode("createMultipleEvents", r#"{"events":[]}"#).unwrap();
        match f {
            CalendarFunction::CreateMultipleEvents(args) => {
                assert!(args.events.is_empty());
                assert_eq!(args.options, BatchOptions::default());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_name_is_unsupported_even_with_bad_arguments() {
        assert_eq!(
            CalendarFunction::decode("sendEmail", "not json"),
            Err(DecodeError::Unsupported("sendEmail".to_string()))
        );
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let err = CalendarFunction::decode("deleteEvent", "").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArguments(_)));

        let err = CalendarFunction::decode("createEvent", "{").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArguments(_)));
    }

    #[test]
    fn definitions_cover_every_function() {
        let defs = function_definitions().unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, FUNCTION_NAMES.to_vec());

        let create = &defs[0].parameters;
        assert_eq!(create["type"], "object");
        let required = create["required"].as_array().unwrap();
        assert!(required.contains(&json!("summary")));
        assert!(required.contains(&json!("startDateTime")));
        assert!(create.get("title").is_none());

        let update = &defs[1].parameters;
        assert!(update["properties"].get("eventId").is_some());
        assert!(update["properties"].get("location").is_some());
    }

    #[test]
    fn unauthenticated_shape() {
        let value = serde_json::to_value(CalendarResponse::not_authenticated()).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": "Calendar service not initialized",
                "message": "Please ensure you are authenticated to perform Calendar operations"
            })
        );
    }
}
