//! LLM contradiction probe
//!
//! Asks the model whether a draft reply contradicts a stored fact and
//! expects strictly `{"contradicts": bool, "reason": string}` back. Any
//! other shape is a `ContradictionCheckFailed`, which callers treat as
//! "use the structural check only".

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use mnemo_core::{Error, GenerateRequest, LanguageModel, Result};

const PROBE_SYSTEM_PROMPT: &str = "You are a contradiction checker for a memory system. \
Given a draft reply and a stored fact, decide whether the draft contradicts the fact. \
A draft that expresses uncertainty about something the fact states is a contradiction. \
Respond with ONLY a JSON object: {\"contradicts\": true|false, \"reason\": \"...\"}. \
No markdown, no extra text.";

/// Probe verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionVerdict {
    pub contradicts: bool,
    pub reason: String,
}

/// Structured contradiction check on top of any `LanguageModel`
pub struct ContradictionProbe {
    llm: Arc<dyn LanguageModel>,
    temperature: f32,
}

impl ContradictionProbe {
    pub fn new(llm: Arc<dyn LanguageModel>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Ask the model whether `draft` contradicts the fact `key = value`
    pub async fn check(&self, draft: &str, key: &str, value: &str) -> Result<ContradictionVerdict> {
        let prompt = format!(
            "Stored fact: {} = {}\nDraft reply: {}\n\nDoes the draft contradict the fact?",
            key, value, draft
        );

        let request = GenerateRequest::new(PROBE_SYSTEM_PROMPT)
            .with_user_message(prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(128);

        let response = self
            .llm
            .generate(request)
            .await
            .map_err(|e| Error::ContradictionCheckFailed(e.to_string()))?;

        Self::parse_verdict(&response.text)
    }

    /// Parse the strict probe response, tolerating markdown fences
    fn parse_verdict(text: &str) -> Result<ContradictionVerdict> {
        let clean = text
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        serde_json::from_str(clean).map_err(|e| {
            Error::ContradictionCheckFailed(format!("probe returned non-JSON verdict: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mnemo_core::GenerateResponse;
    use parking_lot::Mutex;

    /// Scripted model returning canned responses in order
    struct ScriptedModel {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            match self.responses.lock().pop() {
                Some(text) => Ok(GenerateResponse::new(text)),
                None => Err(Error::BackendUnavailable("script exhausted".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_parse_clean_verdict() {
        let model = Arc::new(ScriptedModel::new(vec![
            r#"{"contradicts": true, "reason": "draft says unknown but fact exists"}"#,
        ]));
        let probe = ContradictionProbe::new(model, 0.1);

        let verdict = probe.check("I don't know", "name", "Morten").await.unwrap();
        assert!(verdict.contradicts);
        assert!(!verdict.reason.is_empty());
    }

    #[tokio::test]
    async fn test_parse_fenced_verdict() {
        let model = Arc::new(ScriptedModel::new(vec![
            "```json\n{\"contradicts\": false, \"reason\": \"agrees\"}\n```",
        ]));
        let probe = ContradictionProbe::new(model, 0.1);

        let verdict = probe
            .check("Your name is Morten", "name", "Morten")
            .await
            .unwrap();
        assert!(!verdict.contradicts);
    }

    #[tokio::test]
    async fn test_malformed_verdict_fails_typed() {
        let model = Arc::new(ScriptedModel::new(vec!["I think it contradicts."]));
        let probe = ContradictionProbe::new(model, 0.1);

        let err = probe.check("draft", "name", "Morten").await.unwrap_err();
        assert!(matches!(err, Error::ContradictionCheckFailed(_)));
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_check_failed() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let probe = ContradictionProbe::new(model, 0.1);

        let err = probe.check("draft", "name", "Morten").await.unwrap_err();
        assert!(matches!(err, Error::ContradictionCheckFailed(_)));
    }
}
