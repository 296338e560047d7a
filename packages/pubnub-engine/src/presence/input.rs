//! Channels and groups announced by the heartbeat.

use std::collections::BTreeSet;
use std::ops::{Add, Sub};

use crate::subscribe::PRESENCE_SUFFIX;

/// Immutable set of channels and channel groups.
///
/// Names are kept sorted, so equality ignores the order in which they were
/// added. Presence companion names (`*-pnpres`) and empty names are dropped
/// on construction: the heartbeat only announces real channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PresenceInput {
    channels: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl PresenceInput {
    pub fn new<C, G>(channels: impl IntoIterator<Item = C>, groups: impl IntoIterator<Item = G>) -> Self
    where
        C: Into<String>,
        G: Into<String>,
    {
        Self {
            channels: collect_names(channels),
            groups: collect_names(groups),
        }
    }

    pub fn from_channels<C: Into<String>>(channels: impl IntoIterator<Item = C>) -> Self {
        Self::new(channels, Vec::<String>::new())
    }

    pub fn from_groups<G: Into<String>>(groups: impl IntoIterator<Item = G>) -> Self {
        Self::new(Vec::<String>::new(), groups)
    }

    /// Channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    /// Group names, sorted.
    pub fn groups(&self) -> Vec<String> {
        self.groups.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.groups.is_empty()
    }

    /// Names present in both inputs.
    pub fn intersection(&self, other: &PresenceInput) -> PresenceInput {
        PresenceInput {
            channels: self.channels.intersection(&other.channels).cloned().collect(),
            groups: self.groups.intersection(&other.groups).cloned().collect(),
        }
    }
}

fn collect_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> BTreeSet<String> {
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| !name.is_empty() && !name.ends_with(PRESENCE_SUFFIX))
        .collect()
}

impl Add for PresenceInput {
    type Output = PresenceInput;

    fn add(mut self, rhs: PresenceInput) -> PresenceInput {
        self.channels.extend(rhs.channels);
        self.groups.extend(rhs.groups);
        self
    }
}

impl Sub for PresenceInput {
    type Output = PresenceInput;

    fn sub(mut self, rhs: PresenceInput) -> PresenceInput {
        self.channels.retain(|name| !rhs.channels.contains(name));
        self.groups.retain(|name| !rhs.groups.contains(name));
        self
    }
}
