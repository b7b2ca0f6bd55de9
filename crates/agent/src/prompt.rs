//! System prompt for the food assistant.

use chrono::NaiveDate;

const PERSONA: &str =
    "You are a concise food assistant. Help users discover new foods & remember their preferences.";

const SEARCH_HINT: &str = "You can search the web for recipes using `search_food`.";

/// Build the base system prompt for `date`.
///
/// An override replaces the persona and tool hint but still gets the date line.
pub fn system_prompt(date: NaiveDate, tools_enabled: bool, override_text: Option<&str>) -> String {
    let mut prompt = match override_text.map(str::trim).filter(|s| !s.is_empty()) {
        Some(custom) => custom.to_string(),
        None if tools_enabled => format!("{PERSONA}\n{SEARCH_HINT}"),
        None => PERSONA.to_string(),
    };
    prompt.push_str(&format!("\nDate: {}", date.format("%Y-%m-%d")));
    prompt
}
