//! Built-in prompt wording.

/// Persona stage prompt. Parameters: `attribute`, `context`.
pub const DEFAULT_PERSONA_PROMPT: &str = "You are skilled at creating names and personas that \
represent different people authentically. Your task is to craft a detailed persona for someone \
with the following demographic: {{ attribute }}. Include specific and relevant details about \
this person's background, personality, and preferences. Additionally, describe in the persona \
{{ context }}. Please follow this json format in your response:
{
  \"name\": \"<a string representing the person's name>\",
  \"description\": \"<a detailed string describing the person's persona>\"
}";

/// Decision stage prompt. Parameters: `name`, `description`, `scenario`,
/// `actionSpace`.
pub const DEFAULT_DECISION_PROMPT: &str = "You are {{ name }}. You have the following persona: \
{{ description }}
You are facing the following situation: {{ scenario }}
Respond in the following json format:
{
  \"decision\": \"<a string, {{ actionSpace }}>\",
  \"rationale\": \"<a string, representing the rationale behind your decision>\"
}";
