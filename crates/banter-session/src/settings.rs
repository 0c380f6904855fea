//! Generation request settings.

use serde_json::{json, Map, Value};

/// Settings assembled into the generation request payload.
///
/// The inference server treats most of this as an opaque configuration
/// object; provider-specific knobs that Banter does not model go through
/// `extra` unmodified.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Attention mode forwarded to the provider.
    pub mode: String,
    /// Template applied to the outgoing prompt. `{system}` and `{prompt}`
    /// are substituted.
    pub prompt_template: String,
    /// System prompt substituted into the template.
    pub system_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Response length cap.
    pub max_tokens: u32,
    /// Literal data payloads that terminate a stream early.
    pub stop_markers: Vec<String>,
    /// Provider-specific fields passed through unmodified.
    pub extra: Map<String, Value>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            mode: "balanced".to_string(),
            prompt_template: "{system}{prompt}".to_string(),
            system_prompt: String::new(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1024,
            stop_markers: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl GenerationSettings {
    /// Render the outgoing prompt through the template.
    pub fn render_prompt(&self, prompt: &str) -> String {
        self.prompt_template
            .replace("{system}", &self.system_prompt)
            .replace("{prompt}", prompt)
    }

    /// Assemble the generation request body for one prompt.
    ///
    /// Named fields win over `extra` on key collision.
    pub fn request_body(&self, prompt: &str) -> Value {
        let mut body = self.extra.clone();
        body.insert("mode".to_string(), json!(self.mode));
        body.insert("prompt".to_string(), json!(self.render_prompt(prompt)));
        body.insert("temperature".to_string(), json!(self.temperature));
        body.insert("top_p".to_string(), json!(self.top_p));
        body.insert("max_tokens".to_string(), json!(self.max_tokens));
        if !self.stop_markers.is_empty() {
            body.insert("stop".to_string(), json!(self.stop_markers));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_template_with_system_prompt() {
        let settings = GenerationSettings {
            prompt_template: "{system}\n\nUser: {prompt}\nAssistant:".to_string(),
            system_prompt: "You are helpful.".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.render_prompt("hi"),
            "You are helpful.\n\nUser: hi\nAssistant:"
        );
    }

    #[test]
    fn body_carries_mode_and_prompt() {
        let settings = GenerationSettings::default();
        let body = settings.request_body("hello");
        assert_eq!(body["mode"], "balanced");
        assert_eq!(body["prompt"], "hello");
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn extra_fields_pass_through_but_never_shadow() {
        let mut settings = GenerationSettings::default();
        settings.extra.insert("seed".to_string(), json!(42));
        settings.extra.insert("mode".to_string(), json!("sneaky"));
        settings.stop_markers = vec!["[DONE]".to_string()];

        let body = settings.request_body("hi");
        assert_eq!(body["seed"], 42);
        assert_eq!(body["mode"], "balanced");
        assert_eq!(body["stop"], json!(["[DONE]"]));
    }
}
