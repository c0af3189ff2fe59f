//! API Request and Response Types

mod agent;
mod common;
mod voice;

pub use agent::{AgentResponse, CreateAgentRequest, CreateDraftAgentRequest, UpdateAgentRequest};
pub use common::{DeleteResponse, Envelope, ListQuery, Meta, SyncResponse, TenantQuery};
pub use voice::{CreateVoiceRequest, UpdateVoiceRequest, VoiceResponse};
