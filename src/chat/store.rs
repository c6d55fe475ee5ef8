use std::collections::HashSet;

use crate::models::{Message, ProvisionalKey};

/// Ordered message list for one conversation.
///
/// Ids are unique at all times and confirmed messages are never out of
/// `created_at` order relative to each other. New messages go to the tail;
/// one that is older than a confirmed message already shown goes in front of
/// it. A confirmed message that replaces a provisional one takes over its
/// slot unless that slot would break the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    entries: Vec<Message>,
    /// Bumped on every mutation so callers can tell a stale read.
    revision: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.entries.iter().any(|m| m.id == id)
    }

    pub fn position_of_key(&self, key: ProvisionalKey) -> Option<usize> {
        self.entries
            .iter()
            .position(|m| m.provisional_key == Some(key))
    }

    pub fn provisional(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(|m| m.is_provisional())
    }

    /// The oldest outstanding provisional entry that `confirmed` reconciles.
    pub fn find_provisional_match(&self, confirmed: &Message) -> Option<usize> {
        self.entries.iter().position(|m| m.is_confirmed_by(confirmed))
    }

    /// Append an optimistic entry at the tail.
    pub fn push_provisional(&mut self, message: Message) {
        debug_assert!(message.is_provisional());
        self.entries.push(message);
        self.revision += 1;
    }

    /// Append a confirmed message, or put it in front of the first confirmed
    /// entry that is newer. Returns `false` if the id is already present.
    pub fn insert_confirmed(&mut self, message: Message) -> bool {
        if self.contains_id(message.id) {
            return false;
        }

        let index = self.ordered_position(&message);
        self.entries.insert(index, message);
        self.revision += 1;
        true
    }

    /// Swap the entry at `index` for `confirmed`, returning the old entry.
    ///
    /// `confirmed` keeps the slot if its confirmed neighbours allow it,
    /// otherwise it moves to its `created_at` position.
    pub fn replace_at(&mut self, index: usize, confirmed: Message) -> Message {
        self.revision += 1;
        let replaced = std::mem::replace(&mut self.entries[index], confirmed);

        if !self.fits_at(index) {
            let message = self.entries.remove(index);
            let target = self.ordered_position(&message);
            self.entries.insert(target, message);
        }

        replaced
    }

    fn ordered_position(&self, message: &Message) -> usize {
        self.entries
            .iter()
            .position(|m| !m.is_provisional() && m.created_at > message.created_at)
            .unwrap_or(self.entries.len())
    }

    /// Whether the entry at `index` is in order with the nearest confirmed
    /// entries on either side.
    fn fits_at(&self, index: usize) -> bool {
        let created_at = self.entries[index].created_at;
        let before = self.entries[..index].iter().rev().find(|m| !m.is_provisional());
        let after = self.entries[index + 1..].iter().find(|m| !m.is_provisional());

        before.is_none_or(|m| m.created_at <= created_at)
            && after.is_none_or(|m| m.created_at >= created_at)
    }

    pub fn remove_provisional(&mut self, key: ProvisionalKey) -> Option<Message> {
        let index = self.position_of_key(key)?;
        self.revision += 1;
        Some(self.entries.remove(index))
    }

    /// Replace every confirmed entry with `snapshot` in one step.
    ///
    /// Outstanding provisional entries stay at the tail unless a message that
    /// is new in `snapshot` confirms them. Returns the keys that were
    /// reconciled that way.
    pub fn replace_confirmed(&mut self, snapshot: Vec<Message>) -> Vec<ProvisionalKey> {
        let known: HashSet<i64> = self
            .entries
            .iter()
            .filter(|m| !m.is_provisional())
            .map(|m| m.id)
            .collect();

        let mut seen = HashSet::new();
        let mut next: Vec<Message> = snapshot
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .collect();

        // Only messages the store had not seen can confirm an in-flight send;
        // an old message with the same text must not.
        let mut unclaimed: Vec<&Message> = next.iter().filter(|m| !known.contains(&m.id)).collect();
        let mut reconciled = Vec::new();
        let mut outstanding = Vec::new();

        for pending in self.entries.iter().filter(|m| m.is_provisional()) {
            match unclaimed.iter().position(|m| pending.is_confirmed_by(m)) {
                Some(i) => {
                    unclaimed.remove(i);
                    reconciled.extend(pending.provisional_key);
                }
                None => outstanding.push(pending.clone()),
            }
        }

        next.extend(outstanding);
        self.entries = next;
        self.revision += 1;
        reconciled
    }

    /// Merge `snapshot` without dropping anything already shown. Used when
    /// the store changed while the snapshot was in flight. Returns the keys of
    /// provisional entries the snapshot confirmed.
    pub fn merge_confirmed(&mut self, snapshot: Vec<Message>) -> Vec<ProvisionalKey> {
        let mut reconciled = Vec::new();

        for message in snapshot {
            if self.contains_id(message.id) {
                continue;
            }
            match self.find_provisional_match(&message) {
                Some(index) => reconciled.extend(self.replace_at(index, message).provisional_key),
                None => {
                    self.insert_confirmed(message);
                }
            }
        }

        reconciled
    }
}
