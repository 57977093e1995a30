use chrono::Utc;
use notevault_shared::Outcome;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::EncryptedDatabase;
use crate::error::{DbError, Result};
use crate::model::Note;
use crate::watcher::ContentEvent;

impl EncryptedDatabase {
    pub fn get_note(&self, uid: &Uuid) -> Result<Note> {
        self.lock_open()?
            .tree
            .note(uid)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("note {uid}")))
    }

    /// Notes directly inside `group_uid`, in order.
    pub fn notes_in(&self, group_uid: &Uuid) -> Result<Vec<Note>> {
        let state = self.lock_open()?;
        let group = state
            .tree
            .group(group_uid)
            .ok_or_else(|| DbError::NotFound(format!("group {group_uid}")))?;
        Ok(group
            .notes
            .iter()
            .filter_map(|uid| state.tree.note(uid).cloned())
            .collect())
    }

    pub fn all_notes(&self) -> Result<Vec<Note>> {
        let state = self.lock_open()?;
        Ok(state
            .tree
            .walk_notes()
            .iter()
            .filter_map(|uid| state.tree.note(uid).cloned())
            .collect())
    }

    /// Notes whose title, property names or property values contain
    /// `query`, ignoring case.
    pub fn find_notes(&self, query: &str) -> Result<Vec<Note>> {
        let state = self.lock_open()?;
        Ok(state
            .tree
            .walk_notes()
            .iter()
            .filter_map(|uid| state.tree.note(uid))
            .filter(|note| note.matches(query))
            .cloned()
            .collect())
    }

    pub fn insert_note(&self, note: Note) -> Result<Outcome<Note>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;
        state.tree.insert_note(note.clone())?;

        let outcome = match self.commit_locked(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = state.tree.remove_note(&note.uid);
                debug!(uid = %note.uid, "note insert rolled back");
                return Err(e);
            }
        };

        self.watchers().note(ContentEvent::Inserted(note.clone()));
        info!(uid = %note.uid, group = %note.group_uid, "note inserted");
        Ok(outcome.with(note))
    }

    /// Update a note and return its uid afterwards.
    ///
    /// Within the same group the stored note is merged in place and keeps
    /// its uid. Moving to another group re-creates the note there under a
    /// new uid.
    pub fn update_note(&self, note: Note) -> Result<Outcome<Uuid>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;

        let stored = state
            .tree
            .note(&note.uid)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("note {}", note.uid)))?;

        if stored.group_uid == note.group_uid {
            if let Some(current) = state.tree.note_mut(&note.uid) {
                current.merge_from(&note);
            }
            let outcome = match self.commit_locked(&mut state) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Some(current) = state.tree.note_mut(&note.uid) {
                        *current = stored;
                    }
                    debug!(uid = %note.uid, "note update rolled back");
                    return Err(e);
                }
            };
            if let Some(updated) = state.tree.note(&note.uid) {
                self.watchers().note(ContentEvent::Changed(updated.clone()));
            }
            debug!(uid = %note.uid, "note updated");
            return Ok(outcome.with(note.uid));
        }

        if state.tree.group(&note.group_uid).is_none() {
            return Err(DbError::NotFound(format!("group {}", note.group_uid)));
        }

        let mut moved = stored.clone();
        moved.merge_from(&note);
        moved.uid = Uuid::new_v4();
        moved.group_uid = note.group_uid;
        moved.modified = Utc::now();
        let new_uid = moved.uid;

        let removed = state.tree.remove_note(&note.uid)?;
        state.tree.insert_note(moved.clone())?;

        let outcome = match self.commit_locked(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = state.tree.remove_note(&new_uid);
                state.tree.restore_note(removed)?;
                debug!(uid = %note.uid, "note move rolled back");
                return Err(e);
            }
        };

        self.watchers().note(ContentEvent::Removed(note.uid));
        self.watchers().note(ContentEvent::Inserted(moved));
        info!(old = %note.uid, new = %new_uid, group = %note.group_uid, "note moved");
        Ok(outcome.with(new_uid))
    }

    /// Delete a note and commit; put back on commit failure.
    pub fn remove_note(&self, uid: &Uuid) -> Result<Outcome<()>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;

        let removed = state.tree.remove_note(uid)?;
        let outcome = match self.commit_locked(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                state.tree.restore_note(removed)?;
                debug!(%uid, "note removal rolled back");
                return Err(e);
            }
        };

        self.watchers().note(ContentEvent::Removed(*uid));
        info!(%uid, "note removed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::database::tests::new_db;
    use crate::model::{Group, Property, PropertyKind};

    /// Uid of the "General" group, created on first use.
    fn general(db: &EncryptedDatabase) -> Uuid {
        if let Some(group) = db.find_groups("General").unwrap().first() {
            return group.uid;
        }
        let root = db.root_group().unwrap().uid;
        db.insert_group(Group::new(root, "General")).unwrap().into_value().uid
    }

    #[test]
    fn insert_and_find() {
        let (db, _) = new_db("k1");
        let group = general(&db);
        db.insert_note(
            Note::new(group, "Email")
                .with_property(Property::standard(PropertyKind::Username, "alice"))
                .with_property(Property::password("x")),
        )
        .unwrap();
        db.insert_note(Note::new(group, "Bank")).unwrap();

        assert_eq!(db.notes_in(&group).unwrap().len(), 2);
        assert_eq!(db.find_notes("ALICE").unwrap()[0].title, "Email");
        assert_eq!(db.find_notes("username").unwrap().len(), 1);
        assert!(db.find_notes("nothing").unwrap().is_empty());
        assert_eq!(db.get_group(&group).unwrap().note_count, 2);
    }

    #[test]
    fn failed_commit_rolls_back_note_insert() {
        let (db, store) = new_db("k1");
        let note = Note::new(general(&db), "Email");
        let uid = note.uid;

        store.fail.store(true, Ordering::SeqCst);
        assert!(db.insert_note(note).is_err());
        assert!(matches!(db.get_note(&uid), Err(DbError::NotFound(_))));
        assert!(db.all_notes().unwrap().is_empty());
    }

    #[test]
    fn update_in_place_keeps_uid() {
        let (db, _) = new_db("k1");
        let note = db
            .insert_note(
                Note::new(general(&db), "Email")
                    .with_property(Property::password("x"))
                    .with_property(Property::custom("PIN", "1", true)),
            )
            .unwrap()
            .into_value();

        let mut edited = note.clone();
        edited.properties = vec![Property::password("y"), Property::custom("Recovery", "r", false)];
        let uid = db.update_note(edited).unwrap().into_value();
        assert_eq!(uid, note.uid);

        let stored = db.get_note(&uid).unwrap();
        assert_eq!(stored.password(), Some("y"));
        let names: Vec<_> = stored.custom_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Recovery"]);
        assert_eq!(stored.created, note.created);
    }

    #[test]
    fn moving_note_assigns_new_uid() {
        let (db, _) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let work = db.insert_group(Group::new(root, "Work")).unwrap().into_value();
        let note = db
            .insert_note(Note::new(general(&db), "Email").with_property(Property::password("x")))
            .unwrap()
            .into_value();
        let events = db.watchers().subscribe_notes();

        let mut moved = note.clone();
        moved.group_uid = work.uid;
        let new_uid = db.update_note(moved).unwrap().into_value();

        assert_ne!(new_uid, note.uid);
        assert!(matches!(db.get_note(&note.uid), Err(DbError::NotFound(_))));
        let stored = db.get_note(&new_uid).unwrap();
        assert_eq!(stored.group_uid, work.uid);
        assert_eq!(stored.password(), Some("x"));

        assert_eq!(events.try_recv().unwrap(), ContentEvent::Removed(note.uid));
        assert!(matches!(events.try_recv().unwrap(), ContentEvent::Inserted(n) if n.uid == new_uid));
    }

    #[test]
    fn failed_update_restores_note() {
        let (db, store) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let work = db.insert_group(Group::new(root, "Work")).unwrap().into_value();
        let note = db.insert_note(Note::new(general(&db), "Email")).unwrap().into_value();

        store.fail.store(true, Ordering::SeqCst);
        let mut renamed = note.clone();
        renamed.title = "Mail".into();
        assert!(db.update_note(renamed).is_err());
        assert_eq!(db.get_note(&note.uid).unwrap(), note);

        let mut moved = note.clone();
        moved.group_uid = work.uid;
        assert!(db.update_note(moved).is_err());
        assert_eq!(db.get_note(&note.uid).unwrap(), note);
        assert!(db.notes_in(&work.uid).unwrap().is_empty());
    }

    #[test]
    fn remove_note_rolls_back_on_failure() {
        let (db, store) = new_db("k1");
        let note = db.insert_note(Note::new(general(&db), "Email")).unwrap().into_value();

        store.fail.store(true, Ordering::SeqCst);
        assert!(db.remove_note(&note.uid).is_err());
        assert!(db.get_note(&note.uid).is_ok());

        store.fail.store(false, Ordering::SeqCst);
        db.remove_note(&note.uid).unwrap();
        assert!(matches!(db.get_note(&note.uid), Err(DbError::NotFound(_))));
    }
}
