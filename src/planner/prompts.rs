//! Prompt text for the model-calling workflow steps.

use super::state::{TripState, UserResponses, list_label};

/// System prompt for requirement extraction.
pub const EXTRACT_REQUIREMENTS_PROMPT: &str = "\
You are a trip planning assistant. Extract ONLY the travel-related requirements the user states.

Rules:
- Extract only what the user explicitly says. Do NOT infer, assume or invent details.
- Ignore anything unrelated to travel.
- Requirements about dates, budget, itinerary timing, accommodation, transport or stay \
preferences count as travel-related, however they are phrased.
- Travel-related details that fit no other field go into additional_requirements as-is.
- duration_days, travel_start_date and travel_end_date: when exactly two are given, compute \
the third. Counting is inclusive, so an N-day trip starting on a date ends N-1 days later.

Supported fields (include only the ones mentioned):
- destination: string
- duration_days: integer
- travel_start_date: string (YYYY-MM-DD)
- travel_end_date: string (YYYY-MM-DD)
- daily_start_time: string (HH:MM, 24-hour)
- daily_end_time: string (HH:MM, 24-hour)
- budget: number
- group_size: integer
- preferences: list of strings
- accommodation_type: string
- accommodation_amenities: list of strings
- transport_preferences: list of strings
- additional_requirements: list of strings

Return ONLY a JSON object. No explanations, no markdown.";

/// System prompt for the standalone attraction lookup.
pub const IDENTIFY_ATTRACTIONS_PROMPT: &str = "\
You are a trip planning assistant. Identify attractions worth visiting for the given destination, \
duration and preferences.

Return a JSON array of objects, each with:
- name: string
- type: string (e.g. \"museum\", \"beach\", \"landmark\", \"restaurant\")
- description: string (brief)
- estimated_time_hours: number
- cost_estimate: string (e.g. \"free\", \"$10-20\", \"$$$\")

Pick enough attractions to fill the trip without overloading any day. \
Return ONLY the JSON array.";

/// System prompt for the fused attractions + day plan call.
pub const IDENTIFY_ATTRACTIONS_AND_PLAN_PROMPT: &str = "\
You are a trip planning assistant. In one response, identify attractions and build a \
day-by-day itinerary from them.

Return a JSON object with exactly two keys:
- attractions: array of objects with name, type, description, estimated_time_hours, cost_estimate
- day_wise_plan: array of days, each with:
  - day: integer
  - date: string (the calendar date when a start date is known, otherwise \"Day N\")
  - theme: string (e.g. \"Cultural Day\")
  - activities: array of objects with time (\"HH:MM\"), activity, location, duration_hours, notes

The itinerary must:
- order activities with realistic timing inside the daily start and end times
- group nearby attractions to minimise travel
- balance the load across the full duration
- respect preferences, budget, group size and other stated requirements
- only use attractions from the attractions list

Return ONLY the JSON object.";

/// System prompt for turning attractions into a day plan.
pub const GENERATE_DAY_WISE_PLAN_PROMPT: &str = "\
You are a trip planning assistant. Organise the given attractions into a day-by-day itinerary.

Return a JSON array of days, each with:
- day: integer
- date: string (the calendar date when known, otherwise \"Day N\")
- theme: string
- activities: array of objects with time (\"HH:MM\"), activity, location, duration_hours, notes

Sequence activities realistically through the day, group attractions by proximity and \
spread them evenly over the trip. Return ONLY the JSON array.";

/// System prompt for the final optimisation and formatting pass.
pub const OPTIMIZE_AND_FORMAT_PROMPT: &str = "\
You are a travel editor. Improve the itinerary and present it to the traveller.

1. Optimise: reorder stops to cut travel time, make sure visits fall inside typical opening \
hours, and leave sensible gaps for meals and transit.
2. Format: write a clear, friendly travel plan in plain text or light markdown with a short \
overview, one section per day with times, and practical tips at the end.

Return the formatted plan only, not JSON.";

/// Combine the original request with answers to clarifying questions.
///
/// Returns `None` when there is nothing to extract from.
pub fn extraction_input(
    user_input: Option<&str>,
    user_responses: Option<&UserResponses>,
) -> Option<String> {
    let input = user_input.map(str::trim).filter(|s| !s.is_empty());
    let responses = user_responses.filter(|r| !r.is_empty());

    let rendered = responses.map(|responses| {
        let mut text = String::from("User responses to clarifying questions:\n");
        for (key, value) in responses {
            text.push_str(&format!("- {key}: {value}\n"));
        }
        text
    });

    match (input, rendered) {
        (Some(input), Some(rendered)) => Some(format!("{input}\n\n{rendered}")),
        (Some(input), None) => Some(input.to_string()),
        (None, Some(rendered)) => Some(rendered),
        (None, None) => None,
    }
}

pub fn extraction_user_prompt(combined_input: &str) -> String {
    format!("User input: {combined_input}")
}

pub fn attractions_user_prompt(state: &TripState) -> String {
    format!(
        "Destination: {}\nDuration: {} days\nPreferences: {}\nBudget: {}\nGroup Size: {}\n\n\
         Identify attractions that match these criteria.",
        state.destination_label(),
        state.duration_label(),
        state.preferences_label(),
        state.budget_label(),
        state.group_size_label(),
    )
}

pub fn attractions_and_plan_user_prompt(state: &TripState) -> String {
    format!(
        "Destination: {}\n\
         Duration: {} days\n\
         Travel Start Date: {}\n\
         Travel End Date: {}\n\
         Daily Start Time: {}\n\
         Daily End Time: {}\n\
         Preferences: {}\n\
         Group Size: {}\n\
         Budget: {}\n\
         Accommodation Type: {}\n\
         Accommodation Amenities: {}\n\
         Transport Preferences: {}\n\
         Additional Requirements: {}\n\n\
         Identify matching attractions and build a detailed day-by-day plan with times, \
         grouping the days into logical themes.",
        state.destination_label(),
        state.duration_label(),
        state.start_date_label(),
        state.end_date_label(),
        state.daily_start_label(),
        state.daily_end_label(),
        state.preferences_label(),
        state.group_size_label(),
        state.budget_label(),
        state.accommodation_label(),
        list_label(&state.accommodation_amenities),
        list_label(&state.transport_preferences),
        list_label(&state.additional_requirements),
    )
}

pub fn day_plan_user_prompt(state: &TripState, duration_days: u32, attractions_json: &str) -> String {
    format!(
        "Destination: {}\nDuration: {} days\nTravel Dates: {}\nPreferences: {}\nAttractions: {}\n\n\
         Create a detailed day-by-day plan with specific times and activities, organising the \
         attractions into logical daily themes.",
        state.destination_label(),
        duration_days,
        state.travel_dates_label(),
        state.preferences_label(),
        attractions_json,
    )
}

pub fn optimize_user_prompt(state: &TripState, itinerary_json: &str) -> String {
    let budget = match state.budget {
        Some(_) => state.budget_label(),
        None => "Not specified".to_string(),
    };
    let duration = state
        .duration_days
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "Destination: {}\nDuration: {} days\nBudget: {}\nItinerary: {}\n\n\
         Optimise this itinerary for efficiency and format it into a readable travel plan.",
        state.destination_label(),
        duration,
        budget,
        itinerary_json,
    )
}
