//! System prompt for the agent
//!
//! The built-in prompt sets up the weather assistant persona. Deployments
//! can replace it through `agent.system_prompt`.

/// Default persona and tool-use policy
pub const WEATHER_ASSISTANT_PROMPT: &str = "You are a helpful weather assistant.

You have access to weather tools that can retrieve current weather information.
When a user asks about weather, use the available tools to get accurate data.

Always:
- Be concise and friendly
- Use tools when needed to get real data
- Provide clear, actionable information";

/// Builds the system prompt, preferring a configured override
///
/// A blank override falls back to the built-in prompt.
///
/// # Examples
///
/// ```
/// use mcp_agent_api::prompts::build_system_prompt;
///
/// assert!(build_system_prompt(None).contains("weather assistant"));
/// assert_eq!(build_system_prompt(Some("Be terse.")), "Be terse.");
/// ```
pub fn build_system_prompt(override_prompt: Option<&str>) -> String {
    match override_prompt {
        Some(prompt) if !prompt.trim().is_empty() => prompt.to_string(),
        _ => WEATHER_ASSISTANT_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_mentions_tools() {
        let prompt = build_system_prompt(None);
        assert!(prompt.starts_with("You are a helpful weather assistant."));
        assert!(prompt.contains("Use tools when needed"));
    }

    #[test]
    fn test_blank_override_falls_back() {
        assert_eq!(build_system_prompt(Some("   ")), WEATHER_ASSISTANT_PROMPT);
    }
}
