//! Viewer manifest model.
//!
//! A manifest lists the studies, series and instances the viewer can show for
//! one session. Only the shape down to `instances` is modelled; every other
//! field is left to the viewer.

use serde::Deserialize;
use serde_json::Value;

/// Parsed session manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Absent when the server returned something other than a study list.
    #[serde(default)]
    pub studies: Option<Vec<Option<Study>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Study {
    #[serde(default)]
    pub series: Option<Vec<Option<Series>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub instances: Option<Vec<Value>>,
}

impl Series {
    fn instance_count(&self) -> usize {
        self.instances.as_ref().map_or(0, Vec::len)
    }
}

impl Manifest {
    /// Parse a manifest from a response body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    fn series(&self) -> impl Iterator<Item = &Series> {
        self.studies
            .iter()
            .flatten()
            .flatten()
            .filter_map(|study| study.series.as_ref())
            .flatten()
            .flatten()
    }

    /// True when no series carries a viewable instance.
    pub fn is_empty(&self) -> bool {
        !self.series().any(|series| series.instance_count() > 0)
    }

    /// Total number of instances across all studies.
    pub fn instance_count(&self) -> usize {
        self.series().map(Series::instance_count).sum()
    }

    pub fn study_count(&self) -> usize {
        self.studies.as_ref().map_or(0, |s| s.iter().flatten().count())
    }
}
