//! Viewer URL construction and navigation.

use tracing::info;
use url::form_urlencoded;
use url::Url;

use crate::context::{LaunchMode, ViewerContext};
use crate::error::{ArchiveError, LaunchError};
use crate::frontend::Frontend;

/// Default route of the viewer application on the archive host.
pub const DEFAULT_VIEWER_ROUTE: &str = "/VIEWER";

/// Query parameters understood by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerQuery {
    pub project_id: String,
    pub subject_id: String,
    pub experiment_id: Option<String>,
    pub experiment_label: Option<String>,
    pub parent_project_id: Option<String>,
}

impl ViewerQuery {
    /// Subject-level view; no session is selected.
    pub fn subject(context: &ViewerContext) -> Self {
        Self {
            project_id: context.project_id.clone(),
            subject_id: context.subject_id.clone(),
            experiment_id: None,
            experiment_label: None,
            parent_project_id: context.parent_project_id.clone(),
        }
    }

    /// Session-level view.
    pub fn session(context: &ViewerContext, experiment_label: Option<String>) -> Self {
        Self {
            experiment_id: context.experiment_id.clone(),
            experiment_label,
            ..Self::subject(context)
        }
    }

    pub fn to_query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("subjectId", &self.subject_id);
        query.append_pair("projectId", &self.project_id);
        if let Some(ref experiment_id) = self.experiment_id {
            query.append_pair("experimentId", experiment_id);
        }
        if let Some(ref label) = self.experiment_label {
            query.append_pair("experimentLabel", label);
        }
        if let Some(ref parent) = self.parent_project_id {
            query.append_pair("parentProjectId", parent);
        }
        query.finish()
    }

    /// Full viewer URL under `base_url`.
    pub fn viewer_url(&self, base_url: &Url, route: &str) -> Result<Url, ArchiveError> {
        let mut url = join_path(base_url, route)?;
        url.set_query(Some(&self.to_query_string()));
        Ok(url)
    }
}

/// Join an absolute route onto the base URL, keeping any context path the
/// archive is deployed under (e.g. `https://host/xnat`).
pub(crate) fn join_path(base_url: &Url, route: &str) -> Result<Url, ArchiveError> {
    let base = base_url.as_str().trim_end_matches('/');
    let route = route.trim_start_matches('/');
    Url::parse(&format!("{}/{}", base, route)).map_err(|e| ArchiveError::Url(e.to_string()))
}

/// Hand the viewer URL to the frontend.
///
/// A new tab leaves the current context running, so the busy indicator is
/// stopped here. An in-place navigation unloads the current context.
pub fn navigate<F: Frontend + ?Sized>(
    frontend: &F,
    url: &Url,
    mode: LaunchMode,
) -> Result<(), LaunchError> {
    info!("Opening viewer ({:?}): {}", mode, url);
    match mode {
        LaunchMode::NewTab => {
            let result = frontend.open_new_tab(url);
            frontend.stop_busy();
            result
        }
        LaunchMode::InPlace => frontend.navigate(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://xnat.example.org/xnat/").unwrap()
    }

    #[test]
    fn test_subject_query_has_required_params_only() {
        let ctx = ViewerContext::subject("P1", "S1");
        assert_eq!(
            ViewerQuery::subject(&ctx).to_query_string(),
            "subjectId=S1&projectId=P1"
        );
    }

    #[test]
    fn test_session_query_order() {
        let ctx = ViewerContext::session("P1", "S1", "E1").with_parent_project(Some("P0".into()));
        let query = ViewerQuery::session(&ctx, Some("MR_01".into()));
        assert_eq!(
            query.to_query_string(),
            "subjectId=S1&projectId=P1&experimentId=E1&experimentLabel=MR_01&parentProjectId=P0"
        );
    }

    #[test]
    fn test_label_is_encoded() {
        let ctx = ViewerContext::session("P1", "S1", "E1");
        let query = ViewerQuery::session(&ctx, Some("MR 1&2".into()));
        assert!(query
            .to_query_string()
            .ends_with("experimentLabel=MR+1%262"));
    }

    #[test]
    fn test_viewer_url_keeps_context_path() {
        let ctx = ViewerContext::subject("P1", "S1");
        let url = ViewerQuery::subject(&ctx)
            .viewer_url(&base(), DEFAULT_VIEWER_ROUTE)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://xnat.example.org/xnat/VIEWER?subjectId=S1&projectId=P1"
        );
    }

    #[test]
    fn test_join_path_without_trailing_slash() {
        let base = Url::parse("http://localhost:8080").unwrap();
        let url = join_path(&base, "/xapi/viewer/projects/P1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/xapi/viewer/projects/P1");
    }
}
