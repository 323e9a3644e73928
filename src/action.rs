//! Plugin intents and their per-kind ordered container.

use std::collections::BTreeMap;
use std::fmt;

/// Action category. The declaration order is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    SendMessage,
    SendPrivateMessage,
    Kick,
    Ban,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SendMessage => "send_message",
            Self::SendPrivateMessage => "send_private_message",
            Self::Kick => "kick",
            Self::Ban => "ban",
        })
    }
}

/// Something a plugin wants done. Nicks are roster keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Say something in the current channel.
    SendMessage { body: String },
    SendPrivateMessage { nick: String, body: String },
    Kick { nick: String, reason: Option<String> },
    Ban { nick: String },
}

impl Action {
    pub fn send_message(body: impl Into<String>) -> Self {
        Self::SendMessage { body: body.into() }
    }

    pub fn send_private_message(nick: impl Into<String>, body: impl Into<String>) -> Self {
        Self::SendPrivateMessage {
            nick: nick.into(),
            body: body.into(),
        }
    }

    pub fn kick(nick: impl Into<String>, reason: Option<String>) -> Self {
        Self::Kick {
            nick: nick.into(),
            reason,
        }
    }

    pub fn ban(nick: impl Into<String>) -> Self {
        Self::Ban { nick: nick.into() }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SendMessage { .. } => ActionKind::SendMessage,
            Self::SendPrivateMessage { .. } => ActionKind::SendPrivateMessage,
            Self::Kick { .. } => ActionKind::Kick,
            Self::Ban { .. } => ActionKind::Ban,
        }
    }
}

/// Actions grouped by kind, each group in insertion order.
///
/// The key is derived from the action on insert, so an action can never sit
/// under the wrong kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionMap {
    actions: BTreeMap<ActionKind, Vec<Action>>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.entry(action.kind()).or_default().push(action);
    }

    /// Builder-style [`ActionMap::push`].
    #[must_use]
    pub fn with(mut self, action: Action) -> Self {
        self.push(action);
        self
    }

    /// Append every group of `other` after the matching group of `self`.
    pub fn merge(&mut self, other: ActionMap) {
        for (kind, mut actions) in other.actions {
            self.actions.entry(kind).or_default().append(&mut actions);
        }
    }

    pub fn get(&self, kind: ActionKind) -> &[Action] {
        self.actions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of actions.
    pub fn len(&self) -> usize {
        self.actions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.values().all(Vec::is_empty)
    }

    /// All actions, kind by kind in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values().flatten()
    }
}

impl From<Action> for ActionMap {
    fn from(action: Action) -> Self {
        Self::new().with(action)
    }
}

impl FromIterator<Action> for ActionMap {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl Extend<Action> for ActionMap {
    fn extend<I: IntoIterator<Item = Action>>(&mut self, iter: I) {
        for action in iter {
            self.push(action);
        }
    }
}

impl IntoIterator for ActionMap {
    type Item = Action;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::IntoValues<ActionKind, Vec<Action>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_follows_kind_order() {
        let map: ActionMap = [
            Action::ban("eve"),
            Action::kick("eve", None),
            Action::send_message("bye eve"),
            Action::send_private_message("eve", "why"),
        ]
        .into_iter()
        .collect();

        let kinds: Vec<_> = map.iter().map(Action::kind).collect();
        assert_eq!(
            kinds,
            [
                ActionKind::SendMessage,
                ActionKind::SendPrivateMessage,
                ActionKind::Kick,
                ActionKind::Ban
            ]
        );
    }

    #[test]
    fn test_merge_concatenates_per_kind() {
        let mut first = ActionMap::new()
            .with(Action::send_message("one"))
            .with(Action::kick("a", None));
        let second = ActionMap::new()
            .with(Action::send_message("two"))
            .with(Action::ban("b"));

        first.merge(second);

        assert_eq!(
            first.get(ActionKind::SendMessage),
            &[Action::send_message("one"), Action::send_message("two")]
        );
        assert_eq!(first.get(ActionKind::Ban), &[Action::ban("b")]);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_empty() {
        let map = ActionMap::new();
        assert!(map.is_empty());
        assert!(map.get(ActionKind::Kick).is_empty());
    }
}
