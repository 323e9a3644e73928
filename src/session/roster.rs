//! Channel roster: who is present and with which privilege.

use std::collections::{BTreeSet, HashMap};

use plugbot_proto::{Prefix, irc_to_lower};

/// Channel privilege, ordered from least to most powerful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Privilege {
    #[default]
    Usual,
    Voice,
    HalfOperator,
    Operator,
    Admin,
}

impl Privilege {
    /// Map a NAMES reply prefix (`~&@%+`).
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '~' | '&' => Some(Self::Admin),
            '@' => Some(Self::Operator),
            '%' => Some(Self::HalfOperator),
            '+' => Some(Self::Voice),
            _ => None,
        }
    }

    /// Map a channel mode letter (`qaohv`).
    pub fn from_mode(c: char) -> Option<Self> {
        match c {
            'q' | 'a' => Some(Self::Admin),
            'o' => Some(Self::Operator),
            'h' => Some(Self::HalfOperator),
            'v' => Some(Self::Voice),
            _ => None,
        }
    }
}

/// A channel member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Host part of the user mask; empty until the server has shown it.
    pub hostname: String,
    pub nick: String,
    /// Username (ident) from the user mask; empty when unknown.
    pub display_name: String,
    pub privilege: Privilege,
}

impl Person {
    /// A person known only by nick.
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            hostname: String::new(),
            nick: nick.into(),
            display_name: String::new(),
            privilege: Privilege::Usual,
        }
    }

    /// Build from a message prefix. Server prefixes yield a person named
    /// after the server.
    pub fn from_prefix(prefix: &Prefix) -> Self {
        match prefix {
            Prefix::Nickname(nick, user, host) => Self {
                hostname: host.clone(),
                nick: nick.clone(),
                display_name: user.clone(),
                privilege: Privilege::Usual,
            },
            Prefix::ServerName(name) => Self {
                hostname: name.clone(),
                ..Self::new(name.clone())
            },
        }
    }

    #[must_use]
    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }
}

/// One roster entry. `held` is every privilege mode the person is known to
/// hold; `person.privilege` is always its highest member, or `Usual`.
#[derive(Debug, Clone)]
struct Entry {
    person: Person,
    held: BTreeSet<Privilege>,
}

impl Entry {
    fn new(person: Person) -> Self {
        let mut held = BTreeSet::new();
        if person.privilege > Privilege::Usual {
            held.insert(person.privilege);
        }
        Self { person, held }
    }
}

/// Nick → Person, keyed case-insensitively under rfc1459.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    people: HashMap<String, Entry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn get(&self, nick: &str) -> Option<&Person> {
        self.people.get(&irc_to_lower(nick)).map(|e| &e.person)
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.people.contains_key(&irc_to_lower(nick))
    }

    /// Insert or refresh a person. Mask details fill in blanks; an existing
    /// privilege is never lowered here, only by a revoking
    /// [`Roster::apply_mode`].
    pub fn upsert(&mut self, person: Person) {
        match self.people.get_mut(&irc_to_lower(&person.nick)) {
            Some(entry) => {
                let existing = &mut entry.person;
                if !person.hostname.is_empty() {
                    existing.hostname = person.hostname;
                }
                if !person.display_name.is_empty() {
                    existing.display_name = person.display_name;
                }
                if person.privilege > Privilege::Usual {
                    entry.held.insert(person.privilege);
                }
                existing.privilege = existing.privilege.max(person.privilege);
                existing.nick = person.nick;
            }
            None => {
                self.people
                    .insert(irc_to_lower(&person.nick), Entry::new(person));
            }
        }
    }

    pub fn remove(&mut self, nick: &str) -> Option<Person> {
        self.people.remove(&irc_to_lower(nick)).map(|e| e.person)
    }

    /// Re-key a person after a nick change. Returns false if `old` was absent.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        match self.people.remove(&irc_to_lower(old)) {
            Some(mut entry) => {
                entry.person.nick = new.to_string();
                self.people.insert(irc_to_lower(new), entry);
                true
            }
            None => false,
        }
    }

    /// Apply a `+mode` / `-mode` privilege change. The person keeps the
    /// highest mode still held, so `-o` on someone with `+ov` leaves voice.
    pub fn apply_mode(&mut self, nick: &str, privilege: Privilege, granted: bool) -> bool {
        let Some(entry) = self.people.get_mut(&irc_to_lower(nick)) else {
            return false;
        };
        if granted {
            entry.held.insert(privilege);
        } else {
            entry.held.remove(&privilege);
        }
        entry.person.privilege = entry.held.last().copied().unwrap_or_default();
        true
    }

    pub fn clear(&mut self) {
        self.people.clear();
    }

    /// All people, sorted by nick for stable output.
    pub fn people(&self) -> Vec<Person> {
        let mut people: Vec<Person> = self.people.values().map(|e| e.person.clone()).collect();
        people.sort_by_key(|p| irc_to_lower(&p.nick));
        people
    }
}
