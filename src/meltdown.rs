// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Meltdown windows: a period after a reconcile in which further reconciles
//! of the same resource are postponed.

use crate::constants::annotations::LAST_RECONCILE;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Time window starting at the last reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: Option<DateTime<Utc>>,
    duration: Duration,
}

impl Window {
    pub fn new(duration: Duration, last_reconcile: Option<DateTime<Utc>>) -> Self {
        Self {
            start: last_reconcile,
            duration,
        }
    }

    /// Build a window from the last-reconcile annotation. A missing or
    /// unparsable annotation gives an empty window.
    pub fn from_annotations(duration: Duration, annotations: &BTreeMap<String, String>) -> Self {
        let start = annotations
            .get(LAST_RECONCILE)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc));
        Self::new(duration, start)
    }

    /// True if `now` lies in `[start, start + duration)`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        let Ok(duration) = chrono::Duration::from_std(self.duration) else {
            return false;
        };
        start <= now && now < start + duration
    }
}

/// Annotation value recording a reconcile at `now`.
pub fn last_reconcile_annotation(now: DateTime<Utc>) -> (String, String) {
    (
        LAST_RECONCILE.to_string(),
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
