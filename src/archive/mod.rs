//! Archive access: manifest checks, generation, and session lookups.

mod http_client;

pub use http_client::{resolve_user_agent, HttpResponse, XnatClient};

use async_trait::async_trait;
use serde::Deserialize;

use crate::context::SessionRef;
use crate::error::ArchiveError;
use crate::manifest::Manifest;

/// Result of a manifest existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Missing,
}

/// One row of a subject's session listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionListEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl SessionListEntry {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    /// Label if set, otherwise the ID.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// `{"ResultSet": {"Result": [...]}}`
#[derive(Debug, Deserialize)]
pub(crate) struct SessionListResponse {
    #[serde(rename = "ResultSet")]
    pub result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultSet {
    #[serde(rename = "Result", default)]
    pub result: Vec<SessionListEntry>,
}

/// `{"items": [{"data_fields": {"label": ...}}]}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionRecord {
    #[serde(default)]
    pub items: Vec<SessionItem>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionItem {
    #[serde(default)]
    pub data_fields: DataFields,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DataFields {
    #[serde(default)]
    pub label: Option<String>,
}

impl SessionRecord {
    pub fn label(self) -> Option<String> {
        self.items
            .into_iter()
            .next()
            .and_then(|item| item.data_fields.label)
            .filter(|label| !label.is_empty())
    }
}

/// Scope of an administrative metadata regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateScope {
    Session {
        project_id: String,
        experiment_id: String,
    },
    Subject {
        project_id: String,
        subject_id: String,
    },
    Project {
        project_id: String,
    },
    All,
}

impl RegenerateScope {
    pub fn path(&self) -> String {
        match self {
            RegenerateScope::Session {
                project_id,
                experiment_id,
            } => experiment_path(project_id, experiment_id),
            RegenerateScope::Subject {
                project_id,
                subject_id,
            } => format!(
                "/xapi/viewer/projects/{}/subjects/{}",
                enc(project_id),
                enc(subject_id)
            ),
            RegenerateScope::Project { project_id } => {
                format!("/xapi/viewer/projects/{}", enc(project_id))
            }
            RegenerateScope::All => "/xapi/viewer/generate-all-metadata".to_string(),
        }
    }
}

fn enc(segment: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(segment)
}

pub(crate) fn experiment_path(project_id: &str, experiment_id: &str) -> String {
    format!(
        "/xapi/viewer/projects/{}/experiments/{}",
        enc(project_id),
        enc(experiment_id)
    )
}

pub(crate) fn exists_path(project_id: &str, experiment_id: &str) -> String {
    format!("{}/exists", experiment_path(project_id, experiment_id))
}

pub(crate) fn session_list_path(project_id: &str, subject_id: &str) -> String {
    format!(
        "/data/archive/projects/{}/subjects/{}/experiments?format=json",
        enc(project_id),
        enc(subject_id)
    )
}

pub(crate) fn session_record_path(session: &SessionRef) -> String {
    format!(
        "/data/archive/projects/{}/subjects/{}/experiments/{}?format=json",
        enc(&session.project_id),
        enc(&session.subject_id),
        enc(&session.experiment_id)
    )
}

/// Operations the launch pipeline needs from the archive.
#[async_trait]
pub trait ArchiveApi: Send + Sync {
    /// 200 maps to `Exists`, 404 to `Missing`, anything else is an error.
    async fn manifest_exists(
        &self,
        project_id: &str,
        experiment_id: &str,
    ) -> Result<Existence, ArchiveError>;

    /// Ask the archive to produce the manifest. Safe to repeat.
    async fn generate_manifest(
        &self,
        project_id: &str,
        experiment_id: &str,
    ) -> Result<(), ArchiveError>;

    async fn fetch_manifest(
        &self,
        project_id: &str,
        experiment_id: &str,
    ) -> Result<Manifest, ArchiveError>;

    async fn list_sessions(
        &self,
        project_id: &str,
        subject_id: &str,
    ) -> Result<Vec<SessionListEntry>, ArchiveError>;

    /// `Ok(None)` when the record has no label.
    async fn session_label(&self, session: &SessionRef) -> Result<Option<String>, ArchiveError>;

    async fn regenerate(&self, scope: &RegenerateScope) -> Result<(), ArchiveError>;
}
