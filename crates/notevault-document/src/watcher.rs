//! Typed change notifications for groups and notes.

use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::model::{Group, Note};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent<T> {
    Inserted(T),
    Removed(Uuid),
    Changed(T),
}

pub type GroupEvent = ContentEvent<Group>;
pub type NoteEvent = ContentEvent<Note>;

/// Fan-out of one event type to any number of receivers.
pub struct ContentWatcher<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E: Clone> ContentWatcher<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live receiver; dropped receivers are forgotten.
    pub fn publish(&self, event: E) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone> Default for ContentWatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct Watchers {
    groups: ContentWatcher<GroupEvent>,
    notes: ContentWatcher<NoteEvent>,
}

impl Watchers {
    pub fn subscribe_groups(&self) -> Receiver<GroupEvent> {
        self.groups.subscribe()
    }

    pub fn subscribe_notes(&self) -> Receiver<NoteEvent> {
        self.notes.subscribe()
    }

    pub(crate) fn group(&self, event: GroupEvent) {
        self.groups.publish(event);
    }

    pub(crate) fn note(&self, event: NoteEvent) {
        self.notes.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receivers_are_pruned() {
        let watcher: ContentWatcher<ContentEvent<u32>> = ContentWatcher::new();
        let kept = watcher.subscribe();
        let dropped = watcher.subscribe();
        drop(dropped);

        watcher.publish(ContentEvent::Inserted(7));
        assert_eq!(watcher.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), ContentEvent::Inserted(7));
    }
}
