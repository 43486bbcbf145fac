//! Launch pipeline: make sure viewer metadata exists, then open the viewer.
//!
//! A launch starts from a [`ViewerContext`] and a [`LaunchMode`]. Session
//! launches walk an explicit state machine (see [`LaunchState`]); subject
//! launches fan out one existence check per session and join on all of them
//! before generating what is missing.

mod session;
mod subject;

pub use session::SessionReport;
pub use subject::{CheckOutcome, CheckRecord, GenerateOutcome, GenerateRecord, SubjectReport};

use tracing::{error, info};
use url::Url;

use crate::archive::ArchiveApi;
use crate::context::{LaunchMode, Target, Trigger, ViewerContext};
use crate::error::LaunchError;
use crate::frontend::Frontend;
use crate::navigator::{navigate, ViewerQuery, DEFAULT_VIEWER_ROUTE};

/// Steps of a session launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Checking,
    Generating,
    Validating,
    ResolvingLabel,
    Navigating,
    Failed,
    Done,
}

/// How a launch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Opened { url: Url, mode: LaunchMode },
    /// The manifest has no instances; the viewer was not opened.
    NoViewableScans,
    Failed(LaunchError),
}

impl LaunchOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, LaunchOutcome::Opened { .. })
    }

    pub fn url(&self) -> Option<&Url> {
        match self {
            LaunchOutcome::Opened { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Result of [`Launcher::prepare`].
#[derive(Debug, Clone)]
pub enum LaunchReport {
    Session(SessionReport),
    Subject(SubjectReport),
}

impl LaunchReport {
    pub fn outcome(&self) -> &LaunchOutcome {
        match self {
            LaunchReport::Session(report) => &report.outcome,
            LaunchReport::Subject(report) => &report.outcome,
        }
    }
}

/// Drives launches against an archive and a frontend.
pub struct Launcher<A, F> {
    archive: A,
    frontend: F,
    base_url: Url,
    viewer_route: String,
}

impl<A: ArchiveApi, F: Frontend> Launcher<A, F> {
    pub fn new(archive: A, frontend: F, base_url: Url) -> Self {
        Self {
            archive,
            frontend,
            base_url,
            viewer_route: DEFAULT_VIEWER_ROUTE.to_string(),
        }
    }

    pub fn with_viewer_route(mut self, route: &str) -> Self {
        self.viewer_route = route.to_string();
        self
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    /// Launch whatever the context targets.
    pub async fn prepare(&self, context: &ViewerContext, mode: LaunchMode) -> LaunchReport {
        match context.target {
            Target::Subject => LaunchReport::Subject(self.launch_subject(context, mode).await),
            Target::Session => LaunchReport::Session(self.launch_session(context, mode).await),
        }
    }

    /// Launch from pointer input. Returns `None` if the input does not start
    /// a launch.
    pub async fn prepare_from(
        &self,
        context: &ViewerContext,
        trigger: Trigger,
    ) -> Option<LaunchReport> {
        let mode = trigger.launch_mode()?;
        Some(self.prepare(context, mode).await)
    }

    /// Viewer URL for `query` under the configured archive.
    pub fn viewer_url(&self, query: &ViewerQuery) -> Result<Url, LaunchError> {
        Ok(query.viewer_url(&self.base_url, &self.viewer_route)?)
    }

    fn fail(&self, err: LaunchError) -> LaunchOutcome {
        self.frontend.stop_busy();
        error!("Viewer launch stopped: {}", err);
        LaunchOutcome::Failed(err)
    }

    fn open(&self, query: ViewerQuery, mode: LaunchMode) -> LaunchOutcome {
        let url = match self.viewer_url(&query) {
            Ok(url) => url,
            Err(e) => return self.fail(e),
        };
        match navigate(&self.frontend, &url, mode) {
            Ok(()) => {
                info!("Viewer opened: {}", url);
                LaunchOutcome::Opened { url, mode }
            }
            Err(e) => self.fail(e),
        }
    }
}
