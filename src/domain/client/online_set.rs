//! Users a client believes are online.

use serde::Deserialize;

use crate::domain::foundation::{Reducer, Transition, UserId};

/// Transitions of the online set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnlineAction {
    /// Replace everything with a membership snapshot.
    Set { users: Vec<UserId> },
    Add { user: UserId },
    Remove { user: UserId },
}

impl Transition for OnlineAction {
    const MACHINE: &'static str = "online_set";
    const NAMES: &'static [&'static str] = &["set", "add", "remove"];
}

/// Ordered set of online users, in the order they became known.
///
/// Never holds duplicates: a repeated `add` (e.g. a presence event racing
/// the initial snapshot) leaves the set unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnlineSet {
    users: Vec<UserId>,
}

impl OnlineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.users.contains(user)
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Online users other than `me`; the list a user picks a peer from.
    pub fn peers<'a>(&'a self, me: &'a UserId) -> impl Iterator<Item = &'a UserId> + 'a {
        self.users.iter().filter(move |u| *u != me)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Reducer for OnlineSet {
    type Action = OnlineAction;

    fn reduce(mut self, action: OnlineAction) -> Self {
        match action {
            OnlineAction::Set { users } => {
                let mut deduped = Vec::with_capacity(users.len());
                for user in users {
                    if !deduped.contains(&user) {
                        deduped.push(user);
                    }
                }
                OnlineSet { users: deduped }
            }
            OnlineAction::Add { user } => {
                if !self.users.contains(&user) {
                    self.users.push(user);
                }
                self
            }
            OnlineAction::Remove { user } => {
                self.users.retain(|u| *u != user);
                self
            }
        }
    }
}
