//! ohiflaunch: open XNAT imaging sessions and subjects in the OHIF viewer.
//!
//! Before the viewer opens, the archive is asked whether viewer metadata
//! exists for each session. Missing metadata is generated, and empty manifests
//! are reported instead of opened.

pub mod archive;
pub mod busy;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod frontend;
pub mod launch;
pub mod manifest;
pub mod navigator;

pub use archive::{ArchiveApi, Existence, SessionListEntry, XnatClient};
pub use context::{LaunchMode, SessionRef, Target, Trigger, ViewerContext};
pub use error::{ArchiveError, LaunchError};
pub use frontend::{Frontend, Notice};
pub use launch::{LaunchOutcome, LaunchReport, LaunchState, Launcher};
pub use manifest::Manifest;
