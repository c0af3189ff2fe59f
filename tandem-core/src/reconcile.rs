//! Drift reconciliation between a local resource and its remote mirror.
//!
//! `reconcile` is pure: it only reports. Applying the corrections is the
//! lifecycle service's job.

use crate::{DriftAction, Resource, ResourcePatch, ResourceStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote state of a resource as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub remote_id: String,
    /// Provider status vocabulary, when the provider reports one
    pub status: Option<String>,
    pub training_info: Option<Value>,
    pub name: Option<String>,
}

/// One field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Difference {
    RemoteId {
        local: Option<String>,
        remote: String,
    },
    Status {
        local: ResourceStatus,
        remote: ResourceStatus,
        provider_status: Option<String>,
    },
    TrainingInfo {
        #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
        local: Option<Value>,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        remote: Value,
    },
}

/// Computed, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DriftReport {
    pub has_drift: bool,
    pub recommended_action: DriftAction,
    pub differences: Vec<Difference>,
}

impl DriftReport {
    pub fn none() -> Self {
        Self {
            has_drift: false,
            recommended_action: DriftAction::None,
            differences: Vec::new(),
        }
    }

    /// Report for a record that had no remote id and was created remotely
    /// by the sync path.
    pub fn remote_created(remote_id: impl Into<String>) -> Self {
        Self {
            has_drift: true,
            recommended_action: DriftAction::SyncRemoteId,
            differences: vec![Difference::RemoteId {
                local: None,
                remote: remote_id.into(),
            }],
        }
    }

    /// Patch fixing every listed difference.
    pub fn corrections(&self) -> ResourcePatch {
        let mut patch = ResourcePatch::default();
        for difference in &self.differences {
            match difference {
                Difference::RemoteId { remote, .. } => {
                    patch.remote_id = Some(Some(remote.clone()));
                }
                Difference::Status { remote, .. } => {
                    patch.status = Some(*remote);
                }
                Difference::TrainingInfo { remote, .. } => {
                    patch.training_info = Some(Some(remote.clone()));
                }
            }
        }
        patch
    }
}

/// Translate provider status vocabulary into local status.
///
/// Unknown values map to `None` and are not compared.
pub fn map_provider_status(provider_status: &str) -> Option<ResourceStatus> {
    match provider_status.trim().to_lowercase().as_str() {
        "training" | "processing" | "pending" => Some(ResourceStatus::Training),
        "active" | "ready" => Some(ResourceStatus::Active),
        "failed" | "error" => Some(ResourceStatus::Failed),
        _ => None,
    }
}

/// Compare a local resource with its remote snapshot.
pub fn reconcile(local: &Resource, remote: &RemoteSnapshot) -> DriftReport {
    let mut differences = Vec::new();

    let remote_id_drift = local.remote_id.as_deref() != Some(remote.remote_id.as_str());
    if remote_id_drift {
        differences.push(Difference::RemoteId {
            local: local.remote_id.clone(),
            remote: remote.remote_id.clone(),
        });
    }

    // A mirror exists, so a record still in draft/creating must go live even
    // when the provider has no status vocabulary for this kind.
    let remote_status = remote
        .status
        .as_deref()
        .and_then(map_provider_status)
        .or_else(|| {
            matches!(local.status, ResourceStatus::Draft | ResourceStatus::Creating)
                .then(|| local.status_after_remote_create())
        });
    if let Some(mapped) = remote_status {
        if mapped != local.status {
            differences.push(Difference::Status {
                local: local.status,
                remote: mapped,
                provider_status: remote.status.clone(),
            });
        }
    }

    if let Some(training) = &remote.training_info {
        if local.training_info.as_ref() != Some(training) {
            differences.push(Difference::TrainingInfo {
                local: local.training_info.clone(),
                remote: training.clone(),
            });
        }
    }

    let recommended_action = if remote_id_drift {
        DriftAction::SyncRemoteId
    } else if !differences.is_empty() {
        DriftAction::UpdateStatus
    } else {
        DriftAction::None
    };

    DriftReport {
        has_drift: !differences.is_empty(),
        recommended_action,
        differences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AgentSpec, ResourceSpec, TenantId, VoiceSpec, VoiceType, DEFAULT_VOICE_LANGUAGE,
        DEFAULT_VOICE_PROVIDER,
    };
    use proptest::prelude::*;
    use serde_json::json;

    fn custom_voice(status: ResourceStatus, remote_id: Option<&str>) -> Resource {
        let mut resource = Resource::new(
            TenantId::parse("org_1").unwrap(),
            "Clone",
            None,
            ResourceSpec::Voice(VoiceSpec {
                voice_type: VoiceType::Custom,
                provider: DEFAULT_VOICE_PROVIDER.to_string(),
                provider_voice_id: None,
                language: DEFAULT_VOICE_LANGUAGE.to_string(),
            }),
        );
        resource.status = status;
        resource.remote_id = remote_id.map(str::to_string);
        resource
    }

    fn snapshot(remote_id: &str, status: Option<&str>, training: Option<Value>) -> RemoteSnapshot {
        RemoteSnapshot {
            remote_id: remote_id.to_string(),
            status: status.map(str::to_string),
            training_info: training,
            name: None,
        }
    }

    #[test]
    fn test_status_mapping_table() {
        assert_eq!(map_provider_status("ready"), Some(ResourceStatus::Active));
        assert_eq!(map_provider_status("ACTIVE"), Some(ResourceStatus::Active));
        assert_eq!(map_provider_status("training"), Some(ResourceStatus::Training));
        assert_eq!(map_provider_status("error"), Some(ResourceStatus::Failed));
        assert_eq!(map_provider_status("failed"), Some(ResourceStatus::Failed));
        assert_eq!(map_provider_status("archived"), None);
    }

    #[test]
    fn test_no_drift_when_in_sync() {
        let local = custom_voice(ResourceStatus::Active, Some("uv_1"));
        let report = reconcile(&local, &snapshot("uv_1", Some("ready"), None));
        assert_eq!(report, DriftReport::none());
    }

    #[test]
    fn test_training_finished_recommends_update_status() {
        let local = custom_voice(ResourceStatus::Training, Some("uv_1"));
        let training = json!({"progress": 100});
        let report = reconcile(&local, &snapshot("uv_1", Some("ready"), Some(training.clone())));
        assert!(report.has_drift);
        assert_eq!(report.recommended_action, DriftAction::UpdateStatus);

        let patch = report.corrections();
        assert_eq!(patch.status, Some(ResourceStatus::Active));
        assert_eq!(patch.training_info, Some(Some(training)));
        assert!(patch.remote_id.is_none());
    }

    #[test]
    fn test_remote_id_mismatch_recommends_sync() {
        let local = custom_voice(ResourceStatus::Active, Some("uv_old"));
        let report = reconcile(&local, &snapshot("uv_new", Some("ready"), None));
        assert_eq!(report.recommended_action, DriftAction::SyncRemoteId);
        assert_eq!(report.corrections().remote_id, Some(Some("uv_new".to_string())));
    }

    #[test]
    fn test_unknown_provider_status_is_not_compared() {
        let local = custom_voice(ResourceStatus::Failed, Some("uv_1"));
        let report = reconcile(&local, &snapshot("uv_1", Some("archived"), None));
        assert!(!report.has_drift);
    }

    #[test]
    fn test_creating_record_goes_live_without_provider_status() {
        let mut local = Resource::new(
            TenantId::parse("org_1").unwrap(),
            "Agent",
            None,
            ResourceSpec::Agent(AgentSpec::default()),
        );
        local.status = ResourceStatus::Creating;
        let report = reconcile(&local, &snapshot("uv_1", None, None));
        assert_eq!(report.recommended_action, DriftAction::SyncRemoteId);

        let mut fixed = local.clone();
        fixed.apply(&report.corrections());
        assert_eq!(fixed.status, ResourceStatus::Active);
        assert!(fixed.check_invariants().is_ok());
    }

    fn status_strategy() -> impl Strategy<Value = ResourceStatus> {
        prop_oneof![
            Just(ResourceStatus::Draft),
            Just(ResourceStatus::Creating),
            Just(ResourceStatus::Training),
            Just(ResourceStatus::Active),
            Just(ResourceStatus::Failed),
        ]
    }

    fn provider_status_strategy() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(prop_oneof![
            Just("training".to_string()),
            Just("ready".to_string()),
            Just("active".to_string()),
            Just("error".to_string()),
            Just("failed".to_string()),
            Just("unknown".to_string()),
        ])
    }

    proptest! {
        #[test]
        fn prop_reconcile_is_idempotent_after_applying_corrections(
            status in status_strategy(),
            local_remote in proptest::option::of("uv_[a-z0-9]{1,6}"),
            remote_id in "uv_[a-z0-9]{1,6}",
            provider_status in provider_status_strategy(),
            progress in proptest::option::of(0u8..=100),
        ) {
            let local = custom_voice(status, local_remote.as_deref());
            let remote = RemoteSnapshot {
                remote_id,
                status: provider_status,
                training_info: progress.map(|p| json!({"progress": p})),
                name: None,
            };

            let first = reconcile(&local, &remote);
            let mut corrected = local.clone();
            corrected.apply(&first.corrections());

            let second = reconcile(&corrected, &remote);
            prop_assert!(!second.has_drift, "second report still drifts: {:?}", second);
            prop_assert_eq!(second.recommended_action, DriftAction::None);
        }
    }
}
