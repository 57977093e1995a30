use notevault_shared::Outcome;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::EncryptedDatabase;
use crate::error::{DbError, Result};
use crate::model::{contains_ci, Group};
use crate::tree::GroupNode;
use crate::watcher::ContentEvent;

impl EncryptedDatabase {
    pub fn root_group(&self) -> Result<Group> {
        let state = self.lock_open()?;
        let root = state.tree.root_uid();
        state
            .tree
            .view(&root)
            .ok_or_else(|| DbError::NotFound("root group".into()))
    }

    pub fn get_group(&self, uid: &Uuid) -> Result<Group> {
        self.lock_open()?
            .tree
            .view(uid)
            .ok_or_else(|| DbError::NotFound(format!("group {uid}")))
    }

    /// Direct children of `parent_uid`, in order.
    pub fn child_groups(&self, parent_uid: &Uuid) -> Result<Vec<Group>> {
        let state = self.lock_open()?;
        let parent = state
            .tree
            .group(parent_uid)
            .ok_or_else(|| DbError::NotFound(format!("group {parent_uid}")))?;
        Ok(parent
            .groups
            .iter()
            .filter_map(|uid| state.tree.view(uid))
            .collect())
    }

    /// Every group including the root, breadth-first.
    pub fn all_groups(&self) -> Result<Vec<Group>> {
        let state = self.lock_open()?;
        Ok(state
            .tree
            .walk_groups()
            .iter()
            .filter_map(|uid| state.tree.view(uid))
            .collect())
    }

    /// Groups whose title contains `query`, ignoring case.
    pub fn find_groups(&self, query: &str) -> Result<Vec<Group>> {
        Ok(self
            .all_groups()?
            .into_iter()
            .filter(|g| contains_ci(&g.title, query))
            .collect())
    }

    /// Add `group` under its parent and commit. Nothing is kept if the
    /// commit fails.
    pub fn insert_group(&self, group: Group) -> Result<Outcome<Group>> {
        let parent = group
            .parent_uid
            .ok_or_else(|| DbError::InvalidOperation("a group needs a parent".into()))?;

        let mut state = self.lock_open()?;
        state.ensure_writable()?;
        state.tree.insert_group(GroupNode::new(
            group.uid,
            Some(parent),
            group.title.clone(),
            group.inherit_autotype,
        ))?;

        let outcome = match self.commit_locked(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = state.tree.remove_group(&group.uid);
                debug!(uid = %group.uid, "group insert rolled back");
                return Err(e);
            }
        };

        let inserted = state
            .tree
            .view(&group.uid)
            .ok_or_else(|| DbError::NotFound(format!("group {}", group.uid)))?;
        self.watchers().group(ContentEvent::Inserted(inserted.clone()));
        info!(uid = %inserted.uid, parent = %parent, "group inserted");
        Ok(outcome.with(inserted))
    }

    /// Rename in place, or move when the parent changed.
    pub fn update_group(&self, group: Group) -> Result<Outcome<Group>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;

        let current = state
            .tree
            .group(&group.uid)
            .ok_or_else(|| DbError::NotFound(format!("group {}", group.uid)))?;
        let previous_title = current.title.clone();
        let previous_autotype = current.inherit_autotype;
        let previous_parent = current.parent;

        let moved_from = match (previous_parent, group.parent_uid) {
            (Some(from), Some(to)) if from != to => Some(state.tree.move_group(group.uid, to)?),
            (None, Some(_)) => {
                return Err(DbError::InvalidOperation("the root group cannot be moved".into()))
            }
            (Some(_), None) => {
                return Err(DbError::InvalidOperation("only the root group has no parent".into()))
            }
            _ => None,
        };

        if let Some(node) = state.tree.group_mut(&group.uid) {
            node.title = group.title.clone();
            node.inherit_autotype = group.inherit_autotype;
        }

        let outcome = match self.commit_locked(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some((parent, index)) = moved_from {
                    state.tree.detach_group(&group.uid);
                    let _ = state.tree.attach_group(group.uid, parent, Some(index));
                }
                if let Some(node) = state.tree.group_mut(&group.uid) {
                    node.title = previous_title;
                    node.inherit_autotype = previous_autotype;
                }
                debug!(uid = %group.uid, "group update rolled back");
                return Err(e);
            }
        };

        let updated = state
            .tree
            .view(&group.uid)
            .ok_or_else(|| DbError::NotFound(format!("group {}", group.uid)))?;
        self.watchers().group(ContentEvent::Changed(updated.clone()));
        match moved_from {
            Some((from, _)) => info!(uid = %group.uid, %from, to = ?updated.parent_uid, "group moved"),
            None => debug!(uid = %group.uid, "group updated"),
        }
        Ok(outcome.with(updated))
    }

    /// Delete a group with everything below it and commit. If the commit
    /// fails the subtree is put back where it was.
    pub fn remove_group(&self, uid: &Uuid) -> Result<Outcome<()>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;

        let removed = state.tree.remove_group(uid)?;
        let outcome = match self.commit_locked(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                state.tree.restore_group(removed)?;
                debug!(%uid, "group removal rolled back");
                return Err(e);
            }
        };

        for note in &removed.notes {
            self.watchers().note(ContentEvent::Removed(note.uid));
        }
        for node in &removed.groups {
            self.watchers().group(ContentEvent::Removed(node.uid));
        }
        info!(
            %uid,
            groups = removed.groups.len(),
            notes = removed.notes.len(),
            "group removed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::database::tests::new_db;
    use crate::model::Note;

    fn add(db: &EncryptedDatabase, parent: Uuid, title: &str) -> Group {
        db.insert_group(Group::new(parent, title)).unwrap().into_value()
    }

    #[test]
    fn new_document_is_only_a_root() {
        let (db, _) = new_db("k1");
        let groups = db.all_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].is_root());
        assert_eq!(db.root_group().unwrap().group_count, 0);
    }

    #[test]
    fn all_groups_is_breadth_first() {
        let (db, _) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let a = add(&db, root, "A");
        let b = add(&db, root, "B");
        add(&db, a.uid, "A1");
        add(&db, b.uid, "B1");

        let titles: Vec<_> = db.all_groups().unwrap().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, vec!["vault", "A", "B", "A1", "B1"]);
    }

    #[test]
    fn insert_requires_existing_parent() {
        let (db, _) = new_db("k1");
        let orphan = Group::new(Uuid::new_v4(), "Lost");
        assert!(matches!(db.insert_group(orphan), Err(DbError::NotFound(_))));
    }

    #[test]
    fn failed_commit_rolls_back_insert() {
        let (db, store) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let before = db.all_groups().unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let group = Group::new(root, "Work");
        let uid = group.uid;
        assert!(db.insert_group(group).is_err());

        assert!(matches!(db.get_group(&uid), Err(DbError::NotFound(_))));
        assert_eq!(db.all_groups().unwrap(), before);
    }

    #[test]
    fn rename_in_place() {
        let (db, _) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let mut general = add(&db, root, "General");
        general.title = "Misc".into();
        let updated = db.update_group(general).unwrap().into_value();
        assert_eq!(updated.title, "Misc");
        assert_eq!(db.find_groups("misc").unwrap().len(), 1);
    }

    #[test]
    fn move_into_descendant_fails_and_leaves_tree() {
        let (db, _) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let work = db.insert_group(Group::new(root, "Work")).unwrap().into_value();
        let email = db.insert_group(Group::new(work.uid, "Email")).unwrap().into_value();
        let before = db.all_groups().unwrap();

        let mut moved = work.clone();
        moved.parent_uid = Some(email.uid);
        assert!(matches!(db.update_group(moved), Err(DbError::InvalidMove)));
        assert_eq!(db.all_groups().unwrap(), before);
    }

    #[test]
    fn move_between_parents() {
        let (db, _) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let general = add(&db, root, "General");
        let work = add(&db, root, "Work");

        let mut moved = work.clone();
        moved.parent_uid = Some(general.uid);
        db.update_group(moved).unwrap();

        let children = db.child_groups(&general.uid).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].uid, work.uid);
        assert_eq!(db.root_group().unwrap().group_count, 1);
    }

    #[test]
    fn failed_move_is_undone() {
        let (db, store) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let general = add(&db, root, "General");
        let work = add(&db, root, "Work");
        let before = db.all_groups().unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let mut moved = work.clone();
        moved.parent_uid = Some(general.uid);
        moved.title = "Job".into();
        assert!(db.update_group(moved).is_err());
        assert_eq!(db.all_groups().unwrap(), before);
    }

    #[test]
    fn remove_cascades_and_rolls_back_on_failure() {
        let (db, store) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let work = db.insert_group(Group::new(root, "Work")).unwrap().into_value();
        let inner = db.insert_group(Group::new(work.uid, "Inner")).unwrap().into_value();
        let note = db.insert_note(Note::new(inner.uid, "Email")).unwrap().into_value();
        let before = db.all_groups().unwrap();

        store.fail.store(true, Ordering::SeqCst);
        assert!(db.remove_group(&work.uid).is_err());
        assert_eq!(db.all_groups().unwrap(), before);
        assert!(db.get_note(&note.uid).is_ok());

        store.fail.store(false, Ordering::SeqCst);
        db.remove_group(&work.uid).unwrap();
        assert!(matches!(db.get_group(&inner.uid), Err(DbError::NotFound(_))));
        assert!(matches!(db.get_note(&note.uid), Err(DbError::NotFound(_))));
    }

    #[test]
    fn root_cannot_be_removed() {
        let (db, _) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        assert!(matches!(db.remove_group(&root), Err(DbError::InvalidOperation(_))));
    }

    #[test]
    fn watchers_see_committed_changes_only() {
        let (db, store) = new_db("k1");
        let root = db.root_group().unwrap().uid;
        let events = db.watchers().subscribe_groups();

        store.fail.store(true, Ordering::SeqCst);
        assert!(db.insert_group(Group::new(root, "Nope")).is_err());
        assert!(events.try_recv().is_err());

        store.fail.store(false, Ordering::SeqCst);
        let work = db.insert_group(Group::new(root, "Work")).unwrap().into_value();
        assert_eq!(events.try_recv().unwrap(), ContentEvent::Inserted(work.clone()));

        db.remove_group(&work.uid).unwrap();
        assert_eq!(events.try_recv().unwrap(), ContentEvent::Removed(work.uid));
    }
}
