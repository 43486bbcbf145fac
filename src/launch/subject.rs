//! Subject launch: fan out over every session, then join.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::{LaunchOutcome, Launcher};
use crate::archive::{ArchiveApi, Existence, SessionListEntry};
use crate::context::{LaunchMode, ViewerContext};
use crate::error::ArchiveError;
use crate::frontend::{Frontend, Notice};
use crate::navigator::ViewerQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Exists,
    Missing,
    Failed(ArchiveError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub session: SessionListEntry,
    pub outcome: CheckOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Generated,
    Failed(ArchiveError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRecord {
    pub session: SessionListEntry,
    pub outcome: GenerateOutcome,
}

/// Every per-session outcome of a subject launch.
///
/// `checks` and `generations` are in completion order.
#[derive(Debug, Clone)]
pub struct SubjectReport {
    pub checks: Vec<CheckRecord>,
    pub generations: Vec<GenerateRecord>,
    pub outcome: LaunchOutcome,
}

impl SubjectReport {
    /// Sessions whose check reported missing metadata.
    pub fn needs_generation(&self) -> Vec<&SessionListEntry> {
        self.checks
            .iter()
            .filter(|c| c.outcome == CheckOutcome::Missing)
            .map(|c| &c.session)
            .collect()
    }

    pub fn generated_count(&self) -> usize {
        self.generations
            .iter()
            .filter(|g| g.outcome == GenerateOutcome::Generated)
            .count()
    }

    pub fn failed_checks(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.outcome, CheckOutcome::Failed(_)))
            .count()
    }
}

impl<A: ArchiveApi, F: Frontend> Launcher<A, F> {
    /// Make sure every session of the subject has metadata, then open the
    /// subject view.
    pub async fn launch_subject(&self, context: &ViewerContext, mode: LaunchMode) -> SubjectReport {
        self.frontend.start_busy();

        let sessions = match self
            .archive
            .list_sessions(&context.project_id, &context.subject_id)
            .await
        {
            Ok(sessions) => sessions,
            Err(e) => {
                return SubjectReport {
                    checks: Vec::new(),
                    generations: Vec::new(),
                    outcome: self.fail(e.into()),
                }
            }
        };
        info!(
            "Checking viewer metadata for {} sessions of subject {}",
            sessions.len(),
            context.subject_id
        );

        let checks = self.check_all(&context.project_id, sessions).await;
        let missing: Vec<SessionListEntry> = checks
            .iter()
            .filter(|c| c.outcome == CheckOutcome::Missing)
            .map(|c| c.session.clone())
            .collect();

        let generations = if missing.is_empty() {
            Vec::new()
        } else {
            self.generate_all(&context.project_id, missing).await
        };

        let outcome = self.open(ViewerQuery::subject(context), mode);
        SubjectReport {
            checks,
            generations,
            outcome,
        }
    }

    /// Existence check for every session; resolves once all have completed.
    async fn check_all(
        &self,
        project_id: &str,
        sessions: Vec<SessionListEntry>,
    ) -> Vec<CheckRecord> {
        let total = sessions.len();
        let mut pending: FuturesUnordered<_> = sessions
            .into_iter()
            .map(|session| async move {
                let outcome = match self.archive.manifest_exists(project_id, &session.id).await {
                    Ok(Existence::Exists) => CheckOutcome::Exists,
                    Ok(Existence::Missing) => CheckOutcome::Missing,
                    Err(e) => {
                        warn!("Existence check failed for {}: {}", session.id, e);
                        CheckOutcome::Failed(e)
                    }
                };
                CheckRecord { session, outcome }
            })
            .collect();

        let mut records = Vec::with_capacity(total);
        while let Some(record) = pending.next().await {
            records.push(record);
            debug!("{}/{} sessions checked", records.len(), total);
        }
        records
    }

    /// Generate metadata for each missing session, reporting progress.
    async fn generate_all(
        &self,
        project_id: &str,
        missing: Vec<SessionListEntry>,
    ) -> Vec<GenerateRecord> {
        let total = missing.len();
        let labels: Vec<String> = missing
            .iter()
            .map(|s| s.display_name().to_string())
            .collect();

        self.frontend.stop_busy();
        self.frontend.notice(&Notice::GeneratingSubject {
            generated: 0,
            total,
            labels: labels.clone(),
        });

        let mut pending: FuturesUnordered<_> = missing
            .into_iter()
            .map(|session| async move {
                let outcome = match self.archive.generate_manifest(project_id, &session.id).await
                {
                    Ok(()) => GenerateOutcome::Generated,
                    Err(e) => {
                        warn!("Generation failed for {}: {}", session.id, e);
                        GenerateOutcome::Failed(e)
                    }
                };
                GenerateRecord { session, outcome }
            })
            .collect();

        let mut records = Vec::with_capacity(total);
        let mut generated = 0;
        while let Some(record) = pending.next().await {
            if record.outcome == GenerateOutcome::Generated {
                generated += 1;
            }
            records.push(record);
            self.frontend.notice(&Notice::GeneratingSubject {
                generated,
                total,
                labels: labels.clone(),
            });
        }
        info!("Generated viewer metadata for {}/{} sessions", generated, total);
        records
    }
}
