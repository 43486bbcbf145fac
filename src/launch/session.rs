//! Single-session launch.

use tracing::{debug, info, warn};

use super::{LaunchOutcome, LaunchState, Launcher};
use crate::archive::{ArchiveApi, Existence};
use crate::context::{LaunchMode, SessionRef, ViewerContext};
use crate::error::LaunchError;
use crate::frontend::{Frontend, Notice};
use crate::navigator::ViewerQuery;

/// States visited by a session launch, and how it ended.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub trace: Vec<LaunchState>,
    pub outcome: LaunchOutcome,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Checking,
    Generating,
    Validating,
    ResolvingLabel,
    Navigating,
}

impl From<Step> for LaunchState {
    fn from(step: Step) -> Self {
        match step {
            Step::Checking => LaunchState::Checking,
            Step::Generating => LaunchState::Generating,
            Step::Validating => LaunchState::Validating,
            Step::ResolvingLabel => LaunchState::ResolvingLabel,
            Step::Navigating => LaunchState::Navigating,
        }
    }
}

impl<A: ArchiveApi, F: Frontend> Launcher<A, F> {
    /// Check, generate if missing, validate, and open one session.
    pub async fn launch_session(&self, context: &ViewerContext, mode: LaunchMode) -> SessionReport {
        let Some(session) = context.session_ref() else {
            return SessionReport {
                trace: vec![LaunchState::Failed],
                outcome: self.fail(LaunchError::MissingExperiment),
            };
        };

        self.frontend.start_busy();

        let mut trace = Vec::new();
        let mut step = Step::Checking;
        let mut generated = false;
        let mut label = None;

        let outcome = loop {
            trace.push(LaunchState::from(step));
            step = match step {
                Step::Checking => {
                    match self
                        .archive
                        .manifest_exists(&session.project_id, &session.experiment_id)
                        .await
                    {
                        Ok(Existence::Exists) => {
                            debug!("Viewer metadata found for {}", session.experiment_id);
                            Step::Validating
                        }
                        Ok(Existence::Missing) if generated => {
                            break self
                                .fail(LaunchError::NotGenerated(session.experiment_id.clone()));
                        }
                        Ok(Existence::Missing) => Step::Generating,
                        Err(e) => break self.fail(e.into()),
                    }
                }
                Step::Generating => {
                    generated = true;
                    self.frontend.stop_busy();
                    self.frontend.notice(&Notice::GeneratingSession {
                        experiment_id: session.experiment_id.clone(),
                    });
                    info!("Generating viewer metadata for {}", session.experiment_id);
                    match self
                        .archive
                        .generate_manifest(&session.project_id, &session.experiment_id)
                        .await
                    {
                        Ok(()) => Step::Checking,
                        Err(e) => break self.fail(e.into()),
                    }
                }
                Step::Validating => {
                    match self
                        .archive
                        .fetch_manifest(&session.project_id, &session.experiment_id)
                        .await
                    {
                        Ok(manifest) if manifest.is_empty() => {
                            self.frontend.stop_busy();
                            warn!("No viewable scans in {}", session.experiment_id);
                            self.frontend.notice(&Notice::NoViewableScans);
                            break LaunchOutcome::NoViewableScans;
                        }
                        Ok(manifest) => {
                            debug!(
                                "Manifest for {} has {} studies, {} instances",
                                session.experiment_id,
                                manifest.study_count(),
                                manifest.instance_count()
                            );
                            Step::ResolvingLabel
                        }
                        Err(e) => break self.fail(e.into()),
                    }
                }
                Step::ResolvingLabel => {
                    label = self.resolve_label(&session).await;
                    Step::Navigating
                }
                Step::Navigating => {
                    break self.open(ViewerQuery::session(context, label.take()), mode);
                }
            };
        };

        trace.push(match outcome {
            LaunchOutcome::Failed(_) => LaunchState::Failed,
            _ => LaunchState::Done,
        });
        SessionReport { trace, outcome }
    }

    /// Fetch the session label. Failures only drop the label.
    async fn resolve_label(&self, session: &SessionRef) -> Option<String> {
        match self.archive.session_label(session).await {
            Ok(Some(label)) => Some(label),
            Ok(None) => {
                debug!("Session {} has no label", session.experiment_id);
                None
            }
            Err(e) => {
                warn!(
                    "Could not fetch label for {}, opening without it: {}",
                    session.experiment_id, e
                );
                None
            }
        }
    }
}
