//! User-facing side of a launch: busy indicator, notices, and URL opening.

use std::io::Write;
use std::process::{Command, Stdio};

use console::style;
use tracing::{debug, warn};
use url::Url;

use crate::busy::{BusyConfig, BusyIndicator, TerminalSurface};
use crate::error::LaunchError;

/// Messages shown to the user during a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The manifest exists but holds nothing the viewer can display.
    NoViewableScans,
    /// Metadata for a single session is being generated.
    GeneratingSession { experiment_id: String },
    /// Metadata for several sessions of a subject is being generated.
    GeneratingSubject {
        generated: usize,
        total: usize,
        labels: Vec<String>,
    },
}

impl Notice {
    pub fn title(&self) -> String {
        match self {
            Notice::NoViewableScans => "No viewable scans".to_string(),
            Notice::GeneratingSession { .. } => "Generating viewer metadata".to_string(),
            Notice::GeneratingSubject {
                generated, total, ..
            } => format!("Generating Missing Viewer Data: {}/{}", generated, total),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notice::NoViewableScans => {
                "There are no scans in this session compatible with the OHIF Viewer.".to_string()
            }
            Notice::GeneratingSession { experiment_id } => format!(
                "Please wait... generating viewer metadata for session {}. This is a one-time \
                 operation that may take a few minutes if the session is very large. When \
                 complete, the viewer will open.",
                experiment_id
            ),
            Notice::GeneratingSubject { labels, .. } => format!(
                "Generating missing viewer metadata for sessions: {}. If the sessions are very \
                 large please wait a minute before attempting to open the viewer. This will \
                 only happen once.",
                labels.join(" ")
            ),
        }
    }
}

/// Surface the launch pipeline drives.
pub trait Frontend: Send + Sync {
    fn start_busy(&self);
    fn stop_busy(&self);
    fn notice(&self, notice: &Notice);
    /// Replace the current browsing context with `url`.
    fn navigate(&self, url: &Url) -> Result<(), LaunchError>;
    /// Open `url` in a new browsing context.
    fn open_new_tab(&self, url: &Url) -> Result<(), LaunchError>;
}

/// Openers tried in order when handing a URL to the desktop.
const OPENERS: &[&str] = &["xdg-open", "open", "wslview"];

/// Terminal frontend.
///
/// Navigating in place writes the URL to stdout for the caller to follow.
/// A new tab goes to the system opener, unless `print_only` is set.
pub struct TerminalFrontend {
    busy: BusyIndicator<TerminalSurface>,
    print_only: bool,
}

impl TerminalFrontend {
    pub fn new(busy_config: BusyConfig, print_only: bool) -> Self {
        Self {
            busy: BusyIndicator::new(
                TerminalSurface::new("Checking viewer metadata..."),
                busy_config,
            ),
            print_only,
        }
    }

    /// Tear down the spinner before the process exits.
    pub fn finish(&self) {
        self.busy.remove();
    }

    fn print_url(&self, url: &Url) -> Result<(), LaunchError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", url).map_err(|e| LaunchError::Open(e.to_string()))
    }
}

impl Frontend for TerminalFrontend {
    fn start_busy(&self) {
        self.busy.activate();
    }

    fn stop_busy(&self) {
        self.busy.stop();
    }

    fn notice(&self, notice: &Notice) {
        eprintln!("{}", style(notice.title()).bold().yellow());
        eprintln!("  {}", notice.body());
    }

    fn navigate(&self, url: &Url) -> Result<(), LaunchError> {
        // Nothing is unloaded in a terminal, so clear the spinner ourselves.
        self.busy.remove();
        self.print_url(url)
    }

    fn open_new_tab(&self, url: &Url) -> Result<(), LaunchError> {
        if self.print_only {
            return self.print_url(url);
        }
        let opener = OPENERS
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| LaunchError::Open("no system URL opener found".to_string()))?;
        debug!("Opening {} with {}", url, opener.display());
        let status = Command::new(&opener)
            .arg(url.as_str())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| LaunchError::Open(e.to_string()))?;
        if !status.success() {
            warn!("{} exited with {}", opener.display(), status);
            return Err(LaunchError::Open(format!(
                "{} exited with {}",
                opener.display(),
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_notice_lists_labels_and_progress() {
        let notice = Notice::GeneratingSubject {
            generated: 1,
            total: 3,
            labels: vec!["MR1".into(), "CT2".into()],
        };
        assert_eq!(notice.title(), "Generating Missing Viewer Data: 1/3");
        assert!(notice.body().starts_with("Generating missing viewer metadata for sessions: MR1 CT2."));
    }

    #[test]
    fn test_session_notice_names_experiment() {
        let notice = Notice::GeneratingSession {
            experiment_id: "XNAT_E00001".into(),
        };
        assert!(notice.body().contains("XNAT_E00001"));
    }

    #[test]
    fn test_print_only_new_tab_does_not_spawn() {
        let frontend = TerminalFrontend::new(BusyConfig::default(), true);
        let url = Url::parse("http://localhost/VIEWER?subjectId=S&projectId=P").unwrap();
        assert!(frontend.open_new_tab(&url).is_ok());
    }
}
