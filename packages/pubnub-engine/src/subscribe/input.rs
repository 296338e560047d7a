//! Channels and groups the subscribe loop listens on.

use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use super::message::PRESENCE_SUFFIX;
use crate::presence::PresenceInput;

/// Immutable set of subscribed channels and groups.
///
/// Each name carries a "with presence" flag. When set, the companion
/// `{name}-pnpres` is added to the names sent on the wire so presence
/// events are received alongside messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SubscribeInput {
    channels: BTreeMap<String, bool>,
    groups: BTreeMap<String, bool>,
}

impl SubscribeInput {
    pub fn new<C, G>(
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
        with_presence: bool,
    ) -> Self
    where
        C: Into<String>,
        G: Into<String>,
    {
        Self {
            channels: collect_names(channels, with_presence),
            groups: collect_names(groups, with_presence),
        }
    }

    /// Subscribed channel names, without presence companions.
    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Subscribed group names, without presence companions.
    pub fn groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Channel names sent on the wire, presence companions included.
    pub fn channel_names(&self) -> Vec<String> {
        expand(&self.channels)
    }

    /// Group names sent on the wire, presence companions included.
    pub fn group_names(&self) -> Vec<String> {
        expand(&self.groups)
    }

    /// Names the presence heartbeat should announce.
    pub fn presence_input(&self) -> PresenceInput {
        PresenceInput::new(self.channels.keys().cloned(), self.groups.keys().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.groups.is_empty()
    }

    pub fn contains_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Remove names as passed to an unsubscribe call.
    ///
    /// `{name}-pnpres` only stops presence for `name` and keeps the
    /// subscription itself.
    pub fn remove<C, G>(
        &self,
        channels: impl IntoIterator<Item = C>,
        groups: impl IntoIterator<Item = G>,
    ) -> SubscribeInput
    where
        C: Into<String>,
        G: Into<String>,
    {
        let mut next = self.clone();
        for name in channels {
            remove_name(&mut next.channels, name.into());
        }
        for name in groups {
            remove_name(&mut next.groups, name.into());
        }
        next
    }
}

fn collect_names<S: Into<String>>(
    names: impl IntoIterator<Item = S>,
    with_presence: bool,
) -> BTreeMap<String, bool> {
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| !name.is_empty())
        .map(|name| (name, with_presence))
        .collect()
}

fn expand(names: &BTreeMap<String, bool>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(names.len());
    for (name, with_presence) in names {
        expanded.push(name.clone());
        if *with_presence && !name.ends_with(PRESENCE_SUFFIX) {
            expanded.push(format!("{}{}", name, PRESENCE_SUFFIX));
        }
    }
    expanded
}

fn remove_name(names: &mut BTreeMap<String, bool>, name: String) {
    if names.remove(&name).is_some() {
        return;
    }
    if let Some(base) = name.strip_suffix(PRESENCE_SUFFIX) {
        if let Some(with_presence) = names.get_mut(base) {
            *with_presence = false;
        }
    }
}

impl Add for SubscribeInput {
    type Output = SubscribeInput;

    fn add(mut self, rhs: SubscribeInput) -> SubscribeInput {
        for (name, with_presence) in rhs.channels {
            *self.channels.entry(name).or_insert(false) |= with_presence;
        }
        for (name, with_presence) in rhs.groups {
            *self.groups.entry(name).or_insert(false) |= with_presence;
        }
        self
    }
}

impl Sub for SubscribeInput {
    type Output = SubscribeInput;

    fn sub(mut self, rhs: SubscribeInput) -> SubscribeInput {
        self.channels.retain(|name, _| !rhs.channels.contains_key(name));
        self.groups.retain(|name, _| !rhs.groups.contains_key(name));
        self
    }
}
