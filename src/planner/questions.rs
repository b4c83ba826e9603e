//! Fixed clarifying-question templates for required trip fields.

/// Required fields in the order they are checked and asked about.
pub const REQUIRED_FIELDS: [&str; 4] = [
    "destination",
    "duration_days",
    "travel_start_date",
    "travel_end_date",
];

/// The literal question asked for a missing field, if one is defined.
pub fn question_for(field: &str) -> Option<&'static str> {
    match field {
        "destination" => Some("What is your travel destination?"),
        "duration_days" => Some("How many days will your trip be?"),
        "travel_start_date" => Some("What date does your trip start? (format: YYYY-MM-DD)"),
        "travel_end_date" => Some("What date does your trip end? (format: YYYY-MM-DD)"),
        _ => None,
    }
}

/// One question per missing field; unmapped names are skipped.
pub fn questions_for<S: AsRef<str>>(missing_fields: &[S]) -> Vec<String> {
    missing_fields
        .iter()
        .filter_map(|field| question_for(field.as_ref()))
        .map(str::to_string)
        .collect()
}
