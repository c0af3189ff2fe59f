//! Provider request bodies built from local resources.

use serde_json::{json, Map, Value};
use tandem_core::{AgentSpec, ResourceKind, TrainingSample, VoiceSpec};

/// Body for a create or update call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePayload {
    pub kind: ResourceKind,
    pub body: Value,
    /// Carries training media; the provider needs the longer timeout
    pub media: bool,
}

/// Agent body. The provider stores agent configuration as a call template.
pub fn agent_payload(name: &str, agent: &AgentSpec, voice_remote_id: Option<&str>) -> RemotePayload {
    let mut template = Map::new();
    template.insert("systemPrompt".into(), json!(agent.system_prompt));
    template.insert("model".into(), json!(agent.model));
    template.insert("temperature".into(), json!(agent.temperature));
    template.insert("languageHint".into(), json!(agent.language_hint));
    template.insert("joinTimeout".into(), json!(agent.join_timeout));
    template.insert("maxDuration".into(), json!(agent.max_duration));
    template.insert("recordingEnabled".into(), json!(agent.recording_enabled));
    if let Some(voice) = voice_remote_id {
        template.insert("voice".into(), json!(voice));
    }
    if let Some(greeting) = agent.greeting.as_deref().filter(|g| !g.trim().is_empty()) {
        template.insert(
            "firstSpeakerSettings".into(),
            json!({ "agent": { "text": greeting } }),
        );
    }
    if !agent.tools.is_empty() {
        template.insert("selectedTools".into(), Value::Array(agent.tools.clone()));
    }

    RemotePayload {
        kind: ResourceKind::Agent,
        body: json!({
            "name": name,
            "callTemplate": Value::Object(template),
        }),
        media: false,
    }
}

/// Voice body. Samples are only sent on create.
pub fn voice_payload(
    name: &str,
    description: Option<&str>,
    voice: &VoiceSpec,
    samples: &[TrainingSample],
) -> RemotePayload {
    let mut body = Map::new();
    body.insert("name".into(), json!(name));
    if let Some(description) = description {
        body.insert("description".into(), json!(description));
    }
    body.insert("provider".into(), json!(voice.provider));
    body.insert("type".into(), json!(voice.voice_type.as_str()));
    body.insert("language".into(), json!(voice.language));
    if let Some(provider_voice_id) = &voice.provider_voice_id {
        body.insert("provider_voice_id".into(), json!(provider_voice_id));
    }
    if !samples.is_empty() {
        body.insert(
            "training_samples".into(),
            Value::Array(
                samples
                    .iter()
                    .map(|s| {
                        json!({
                            "text": s.text,
                            "audio_url": s.audio_url,
                            "duration_seconds": s.duration_seconds,
                        })
                    })
                    .collect(),
            ),
        );
    }

    RemotePayload {
        kind: ResourceKind::Voice,
        body: Value::Object(body),
        media: !samples.is_empty(),
    }
}
