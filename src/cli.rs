//! Command-line interface.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::{debug, info};

use crate::archive::{ArchiveApi, RegenerateScope, XnatClient};
use crate::config::{load_settings, Settings};
use crate::context::{LaunchMode, ViewerContext};
use crate::error::ArchiveError;
use crate::frontend::{Frontend, TerminalFrontend};
use crate::launch::{LaunchOutcome, LaunchReport, Launcher};
use crate::navigator::ViewerQuery;

#[derive(Debug, Parser)]
#[command(
    name = "ohif-launch",
    version,
    about = "Prepare viewer metadata on XNAT and open sessions or subjects in the OHIF viewer"
)]
pub struct Cli {
    /// Archive root URL, including any context path.
    #[arg(long, env = "XNAT_URL", global = true)]
    pub base_url: Option<String>,

    #[arg(long, env = "XNAT_USER", global = true)]
    pub user: Option<String>,

    #[arg(long, env = "XNAT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open one imaging session.
    Session {
        project: String,
        subject: String,
        experiment: String,
        #[command(flatten)]
        open: OpenArgs,
    },
    /// Open every session of a subject.
    Subject {
        project: String,
        subject: String,
        #[command(flatten)]
        open: OpenArgs,
    },
    /// Print a viewer URL without contacting the archive.
    Url {
        project: String,
        subject: String,
        #[arg(long)]
        experiment: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        parent_project: Option<String>,
    },
    /// Force regeneration of viewer metadata.
    Regenerate {
        #[command(subcommand)]
        scope: RegenerateCommand,
    },
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Project the session is shared from.
    #[arg(long)]
    pub parent_project: Option<String>,

    /// Open the viewer in a new browser tab.
    #[arg(long, conflicts_with = "in_place")]
    pub new_tab: bool,

    /// Hand the viewer URL back on stdout (default).
    #[arg(long)]
    pub in_place: bool,

    /// Never start a browser; print the URL instead.
    #[arg(long)]
    pub print: bool,
}

impl OpenArgs {
    pub fn mode(&self) -> LaunchMode {
        if self.new_tab {
            LaunchMode::NewTab
        } else {
            LaunchMode::InPlace
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum RegenerateCommand {
    Session { project: String, experiment: String },
    Subject { project: String, subject: String },
    Project { project: String },
    /// Every session in the archive (admin only).
    All,
}

impl From<RegenerateCommand> for RegenerateScope {
    fn from(command: RegenerateCommand) -> Self {
        match command {
            RegenerateCommand::Session {
                project,
                experiment,
            } => RegenerateScope::Session {
                project_id: project,
                experiment_id: experiment,
            },
            RegenerateCommand::Subject { project, subject } => RegenerateScope::Subject {
                project_id: project,
                subject_id: subject,
            },
            RegenerateCommand::Project { project } => RegenerateScope::Project {
                project_id: project,
            },
            RegenerateCommand::All => RegenerateScope::All,
        }
    }
}

impl Cli {
    /// Command-line values take precedence over the config file.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref user) = self.user {
            settings.username = Some(user.clone());
        }
        if let Some(ref password) = self.password {
            settings.password = Some(password.clone());
        }
    }
}

/// Exit code for a launch outcome.
pub fn exit_code(outcome: &LaunchOutcome) -> ExitCode {
    match outcome {
        LaunchOutcome::Opened { .. } => ExitCode::SUCCESS,
        LaunchOutcome::Failed(_) => ExitCode::from(1),
        LaunchOutcome::NoViewableScans => ExitCode::from(2),
    }
}

/// Run the parsed command.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = load_settings().await;
    cli.apply_to_settings(&mut settings);
    settings.validate()?;
    debug!("Using archive at {}", settings.base_url);

    match cli.command {
        Commands::Session {
            project,
            subject,
            experiment,
            open,
        } => {
            let context = ViewerContext::session(&project, &subject, &experiment)
                .with_parent_project(open.parent_project.clone());
            launch(&settings, &context, &open).await
        }
        Commands::Subject {
            project,
            subject,
            open,
        } => {
            let context = ViewerContext::subject(&project, &subject)
                .with_parent_project(open.parent_project.clone());
            launch(&settings, &context, &open).await
        }
        Commands::Url {
            project,
            subject,
            experiment,
            label,
            parent_project,
        } => {
            let query = ViewerQuery {
                project_id: project,
                subject_id: subject,
                experiment_id: experiment,
                experiment_label: label,
                parent_project_id: parent_project,
            };
            let url = query.viewer_url(&settings.base_url()?, &settings.viewer_route)?;
            println!("{}", url);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Regenerate { scope } => regenerate(&settings, scope.into()).await,
    }
}

async fn launch(
    settings: &Settings,
    context: &ViewerContext,
    open: &OpenArgs,
) -> anyhow::Result<ExitCode> {
    let client = XnatClient::new(settings)?;
    let frontend = TerminalFrontend::new(settings.busy_config(), open.print);
    let launcher = Launcher::new(client, frontend, settings.base_url()?)
        .with_viewer_route(&settings.viewer_route);

    let report = launcher.prepare(context, open.mode()).await;
    launcher.frontend().finish();

    if let LaunchReport::Subject(ref subject) = report {
        info!(
            "Checked {} sessions ({} failed), generated {}/{}",
            subject.checks.len(),
            subject.failed_checks(),
            subject.generated_count(),
            subject.generations.len()
        );
    }
    if let LaunchOutcome::Failed(err) = report.outcome() {
        eprintln!("{} {}", style("error:").red().bold(), err);
    }
    Ok(exit_code(report.outcome()))
}

async fn regenerate(settings: &Settings, scope: RegenerateScope) -> anyhow::Result<ExitCode> {
    let client = XnatClient::new(settings)?;
    let frontend = TerminalFrontend::new(settings.busy_config(), true);

    frontend.start_busy();
    let result = client.regenerate(&scope).await;
    frontend.finish();

    match result {
        Ok(()) => {
            eprintln!("{} {}", style("Regenerated").green().bold(), scope.path());
            Ok(ExitCode::SUCCESS)
        }
        Err(ArchiveError::Locked(_)) => {
            eprintln!(
                "{} a bulk metadata generation is already running",
                style("busy:").yellow().bold()
            );
            Ok(ExitCode::from(3))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_command() {
        let cli = Cli::try_parse_from([
            "ohif-launch",
            "session",
            "P1",
            "S1",
            "E1",
            "--new-tab",
            "--parent-project",
            "P0",
        ])
        .unwrap();
        match cli.command {
            Commands::Session {
                ref experiment,
                ref open,
                ..
            } => {
                assert_eq!(experiment, "E1");
                assert_eq!(open.mode(), LaunchMode::NewTab);
                assert_eq!(open.parent_project.as_deref(), Some("P0"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_new_tab_conflicts_with_in_place() {
        let result = Cli::try_parse_from([
            "ohif-launch",
            "subject",
            "P1",
            "S1",
            "--new-tab",
            "--in-place",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_mode_is_in_place() {
        let cli = Cli::try_parse_from(["ohif-launch", "subject", "P1", "S1"]).unwrap();
        match cli.command {
            Commands::Subject { ref open, .. } => assert_eq!(open.mode(), LaunchMode::InPlace),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::try_parse_from([
            "ohif-launch",
            "--base-url",
            "https://xnat.example.org",
            "--user",
            "admin",
            "regenerate",
            "all",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.apply_to_settings(&mut settings);
        assert_eq!(settings.base_url, "https://xnat.example.org");
        assert_eq!(settings.username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_regenerate_scope_conversion() {
        let scope: RegenerateScope = RegenerateCommand::Project {
            project: "P1".into(),
        }
        .into();
        assert_eq!(scope.path(), "/xapi/viewer/projects/P1");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            format!("{:?}", exit_code(&LaunchOutcome::NoViewableScans)),
            format!("{:?}", ExitCode::from(2))
        );
    }
}
