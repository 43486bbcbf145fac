//! Viewer context and launch triggers.

use serde::{Deserialize, Serialize};

/// One imaging session, addressed by its project, subject and experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionRef {
    pub project_id: String,
    pub subject_id: String,
    pub experiment_id: String,
}

impl SessionRef {
    pub fn new(project_id: &str, subject_id: &str, experiment_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            subject_id: subject_id.to_string(),
            experiment_id: experiment_id.to_string(),
        }
    }
}

/// What the user asked to view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Subject,
    Session,
}

/// Identifiers for a launch, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerContext {
    pub project_id: String,
    pub subject_id: String,
    pub experiment_id: Option<String>,
    pub parent_project_id: Option<String>,
    pub target: Target,
}

impl ViewerContext {
    /// Context for viewing every session of a subject.
    pub fn subject(project_id: &str, subject_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            subject_id: subject_id.to_string(),
            experiment_id: None,
            parent_project_id: None,
            target: Target::Subject,
        }
    }

    /// Context for viewing one session.
    pub fn session(project_id: &str, subject_id: &str, experiment_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            subject_id: subject_id.to_string(),
            experiment_id: Some(experiment_id.to_string()),
            parent_project_id: None,
            target: Target::Session,
        }
    }

    pub fn with_parent_project(mut self, parent_project_id: Option<String>) -> Self {
        self.parent_project_id = parent_project_id.filter(|p| !p.is_empty());
        self
    }

    /// The session this context points at, if any.
    pub fn session_ref(&self) -> Option<SessionRef> {
        self.experiment_id
            .as_deref()
            .map(|e| SessionRef::new(&self.project_id, &self.subject_id, e))
    }
}

/// Where the viewer is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Replace the current browsing context.
    #[default]
    InPlace,
    /// Open a new browsing context and leave the current one alone.
    NewTab,
}

/// Pointer input that can start a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Mouse button pressed; 0 = primary, 1 = middle, 2 = secondary.
    MouseDown { button: u8 },
    ContextMenu,
}

impl Trigger {
    /// Resolve the launch mode for this input.
    ///
    /// A secondary-button press returns `None`; the context-menu event that
    /// follows it starts the launch instead.
    pub fn launch_mode(self) -> Option<LaunchMode> {
        match self {
            Trigger::MouseDown { button: 2 } => None,
            Trigger::MouseDown { button: 1 } => Some(LaunchMode::NewTab),
            Trigger::MouseDown { .. } => Some(LaunchMode::InPlace),
            Trigger::ContextMenu => Some(LaunchMode::NewTab),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_modes() {
        assert_eq!(
            Trigger::MouseDown { button: 0 }.launch_mode(),
            Some(LaunchMode::InPlace)
        );
        assert_eq!(
            Trigger::MouseDown { button: 1 }.launch_mode(),
            Some(LaunchMode::NewTab)
        );
        assert_eq!(Trigger::MouseDown { button: 2 }.launch_mode(), None);
        assert_eq!(Trigger::ContextMenu.launch_mode(), Some(LaunchMode::NewTab));
    }

    #[test]
    fn test_session_ref_requires_experiment() {
        assert!(ViewerContext::subject("P1", "S1").session_ref().is_none());
        assert_eq!(
            ViewerContext::session("P1", "S1", "E1").session_ref(),
            Some(SessionRef::new("P1", "S1", "E1"))
        );
    }

    #[test]
    fn test_empty_parent_project_is_dropped() {
        let ctx = ViewerContext::subject("P1", "S1").with_parent_project(Some(String::new()));
        assert_eq!(ctx.parent_project_id, None);
        let ctx = ViewerContext::subject("P1", "S1").with_parent_project(Some("P0".into()));
        assert_eq!(ctx.parent_project_id.as_deref(), Some("P0"));
    }
}
