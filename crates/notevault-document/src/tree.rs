//! The document as an arena of nodes indexed by uid.
//!
//! Groups keep ordered lists of child group and note uids; every walk over
//! the tree is an explicit queue or stack over those lists, never
//! recursion, so cycle checks and subtree collection stay linear and
//! cannot overflow on deep trees.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::model::{Group, Note};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupNode {
    pub uid: Uuid,
    pub parent: Option<Uuid>,
    pub title: String,
    pub inherit_autotype: bool,
    pub groups: Vec<Uuid>,
    pub notes: Vec<Uuid>,
}

impl GroupNode {
    pub fn new(uid: Uuid, parent: Option<Uuid>, title: impl Into<String>, inherit_autotype: bool) -> Self {
        Self {
            uid,
            parent,
            title: title.into(),
            inherit_autotype,
            groups: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// Everything a removed group took with it, enough to put it back.
#[derive(Debug, Clone)]
pub(crate) struct RemovedSubtree {
    pub parent: Uuid,
    pub index: usize,
    /// Parents before children.
    pub groups: Vec<GroupNode>,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone)]
pub(crate) struct RemovedNote {
    pub index: usize,
    pub note: Note,
}

/// Serialized form: groups in breadth-first order, notes in group order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DocumentBody {
    pub groups: Vec<GroupRecord>,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GroupRecord {
    pub uid: Uuid,
    pub parent: Option<Uuid>,
    pub title: String,
    pub inherit_autotype: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    root: Uuid,
    groups: HashMap<Uuid, GroupNode>,
    notes: HashMap<Uuid, Note>,
}

impl Tree {
    pub fn new(root_title: impl Into<String>) -> Self {
        let root = GroupNode::new(Uuid::new_v4(), None, root_title, true);
        let uid = root.uid;
        Self {
            root: uid,
            groups: HashMap::from([(uid, root)]),
            notes: HashMap::new(),
        }
    }

    pub fn root_uid(&self) -> Uuid {
        self.root
    }

    pub fn group(&self, uid: &Uuid) -> Option<&GroupNode> {
        self.groups.get(uid)
    }

    pub fn group_mut(&mut self, uid: &Uuid) -> Option<&mut GroupNode> {
        self.groups.get_mut(uid)
    }

    pub fn note(&self, uid: &Uuid) -> Option<&Note> {
        self.notes.get(uid)
    }

    pub fn note_mut(&mut self, uid: &Uuid) -> Option<&mut Note> {
        self.notes.get_mut(uid)
    }

    pub fn contains(&self, uid: &Uuid) -> bool {
        self.groups.contains_key(uid) || self.notes.contains_key(uid)
    }

    /// Public view of a group with its counts filled in.
    pub fn view(&self, uid: &Uuid) -> Option<Group> {
        self.groups.get(uid).map(|node| Group {
            uid: node.uid,
            parent_uid: node.parent,
            title: node.title.clone(),
            group_count: node.groups.len(),
            note_count: node.notes.len(),
            inherit_autotype: node.inherit_autotype,
        })
    }

    /// Every group uid, breadth-first from the root, siblings in order.
    pub fn walk_groups(&self) -> Vec<Uuid> {
        self.walk_from(self.root)
    }

    fn walk_from(&self, start: Uuid) -> Vec<Uuid> {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(uid) = queue.pop_front() {
            if let Some(node) = self.groups.get(&uid) {
                order.push(uid);
                queue.extend(node.groups.iter().copied());
            }
        }
        order
    }

    /// Notes in tree order.
    pub fn walk_notes(&self) -> Vec<Uuid> {
        self.walk_groups()
            .iter()
            .filter_map(|uid| self.groups.get(uid))
            .flat_map(|node| node.notes.iter().copied())
            .collect()
    }

    /// `start` and all of its descendant groups.
    pub fn subtree(&self, start: Uuid) -> HashSet<Uuid> {
        self.walk_from(start).into_iter().collect()
    }

    // -- Mutation -----------------------------------------------------------

    pub fn insert_group(&mut self, node: GroupNode) -> Result<()> {
        if self.contains(&node.uid) {
            return Err(DbError::InvalidOperation(format!("uid {} already exists", node.uid)));
        }
        let parent_uid = node
            .parent
            .ok_or_else(|| DbError::InvalidOperation("a second root group".into()))?;
        let parent = self
            .groups
            .get_mut(&parent_uid)
            .ok_or_else(|| DbError::NotFound(format!("group {parent_uid}")))?;
        parent.groups.push(node.uid);
        self.groups.insert(node.uid, node);
        Ok(())
    }

    pub fn insert_note(&mut self, note: Note) -> Result<()> {
        self.insert_note_at(note, None)
    }

    fn insert_note_at(&mut self, note: Note, index: Option<usize>) -> Result<()> {
        if self.contains(&note.uid) {
            return Err(DbError::InvalidOperation(format!("uid {} already exists", note.uid)));
        }
        let group = self
            .groups
            .get_mut(&note.group_uid)
            .ok_or_else(|| DbError::NotFound(format!("group {}", note.group_uid)))?;
        let index = index.unwrap_or(group.notes.len()).min(group.notes.len());
        group.notes.insert(index, note.uid);
        self.notes.insert(note.uid, note);
        Ok(())
    }

    /// Unlink a group from its parent; returns the parent and position.
    pub fn detach_group(&mut self, uid: &Uuid) -> Option<(Uuid, usize)> {
        let parent_uid = self.groups.get(uid)?.parent?;
        let parent = self.groups.get_mut(&parent_uid)?;
        let index = parent.groups.iter().position(|g| g == uid)?;
        parent.groups.remove(index);
        Some((parent_uid, index))
    }

    /// Link a detached group under `parent`, at `index` or at the end.
    pub fn attach_group(&mut self, uid: Uuid, parent_uid: Uuid, index: Option<usize>) -> Result<()> {
        let parent = self
            .groups
            .get_mut(&parent_uid)
            .ok_or_else(|| DbError::NotFound(format!("group {parent_uid}")))?;
        let index = index.unwrap_or(parent.groups.len()).min(parent.groups.len());
        parent.groups.insert(index, uid);
        if let Some(node) = self.groups.get_mut(&uid) {
            node.parent = Some(parent_uid);
        }
        Ok(())
    }

    /// Move `uid` under `destination`, refusing to create a cycle.
    /// Returns where the group used to be.
    pub fn move_group(&mut self, uid: Uuid, destination: Uuid) -> Result<(Uuid, usize)> {
        if !self.groups.contains_key(&destination) {
            return Err(DbError::NotFound(format!("group {destination}")));
        }
        if uid == self.root {
            return Err(DbError::InvalidOperation("the root group cannot be moved".into()));
        }
        if self.subtree(uid).contains(&destination) {
            return Err(DbError::InvalidMove);
        }
        let previous = self
            .detach_group(&uid)
            .ok_or_else(|| DbError::NotFound(format!("group {uid}")))?;
        self.attach_group(uid, destination, None)?;
        Ok(previous)
    }

    pub fn remove_group(&mut self, uid: &Uuid) -> Result<RemovedSubtree> {
        if *uid == self.root {
            return Err(DbError::InvalidOperation("the root group cannot be removed".into()));
        }
        let order = self.walk_from(*uid);
        if order.is_empty() {
            return Err(DbError::NotFound(format!("group {uid}")));
        }
        let (parent, index) = self
            .detach_group(uid)
            .ok_or_else(|| DbError::NotFound(format!("group {uid}")))?;

        let mut groups = Vec::with_capacity(order.len());
        let mut notes = Vec::new();
        for group_uid in order {
            if let Some(node) = self.groups.remove(&group_uid) {
                notes.extend(node.notes.iter().filter_map(|n| self.notes.remove(n)));
                groups.push(node);
            }
        }

        Ok(RemovedSubtree {
            parent,
            index,
            groups,
            notes,
        })
    }

    /// Put a removed subtree back exactly where it was.
    pub fn restore_group(&mut self, removed: RemovedSubtree) -> Result<()> {
        let RemovedSubtree {
            parent,
            index,
            groups,
            notes,
        } = removed;
        let Some(top) = groups.first().map(|g| g.uid) else {
            return Ok(());
        };

        for node in groups {
            self.groups.insert(node.uid, node);
        }
        for note in notes {
            self.notes.insert(note.uid, note);
        }
        self.attach_group(top, parent, Some(index))
    }

    pub fn remove_note(&mut self, uid: &Uuid) -> Result<RemovedNote> {
        let note = self
            .notes
            .remove(uid)
            .ok_or_else(|| DbError::NotFound(format!("note {uid}")))?;
        let index = match self.groups.get_mut(&note.group_uid) {
            Some(group) => match group.notes.iter().position(|n| n == uid) {
                Some(index) => {
                    group.notes.remove(index);
                    index
                }
                None => 0,
            },
            None => 0,
        };
        Ok(RemovedNote { index, note })
    }

    pub fn restore_note(&mut self, removed: RemovedNote) -> Result<()> {
        self.insert_note_at(removed.note, Some(removed.index))
    }

    // -- Serialization --------------------------------------------------------

    pub fn to_body(&self) -> DocumentBody {
        let order = self.walk_groups();
        let groups = order
            .iter()
            .filter_map(|uid| self.groups.get(uid))
            .map(|node| GroupRecord {
                uid: node.uid,
                parent: node.parent,
                title: node.title.clone(),
                inherit_autotype: node.inherit_autotype,
            })
            .collect();
        let notes = self
            .walk_notes()
            .iter()
            .filter_map(|uid| self.notes.get(uid))
            .cloned()
            .collect();
        DocumentBody { groups, notes }
    }

    /// Rebuild and validate a tree: one root, no dangling parents, no
    /// cycles, no duplicate uids, every note in an existing group.
    pub fn from_body(body: DocumentBody) -> Result<Self> {
        let mut groups: HashMap<Uuid, GroupNode> = HashMap::with_capacity(body.groups.len());
        let mut order = Vec::with_capacity(body.groups.len());
        let mut root = None;

        for record in body.groups {
            if record.parent.is_none() {
                if root.replace(record.uid).is_some() {
                    return Err(DbError::Format("more than one root group".into()));
                }
            }
            order.push((record.uid, record.parent));
            let node = GroupNode::new(record.uid, record.parent, record.title, record.inherit_autotype);
            if groups.insert(record.uid, node).is_some() {
                return Err(DbError::Format(format!("duplicate group {}", record.uid)));
            }
        }
        let root = root.ok_or_else(|| DbError::Format("no root group".into()))?;

        for (uid, parent) in order {
            let Some(parent) = parent else { continue };
            let parent = groups
                .get_mut(&parent)
                .ok_or_else(|| DbError::Format(format!("group {uid} has a missing parent")))?;
            parent.groups.push(uid);
        }

        let mut tree = Self {
            root,
            groups,
            notes: HashMap::new(),
        };

        // Anything unreachable from the root sits on a cycle.
        if tree.walk_groups().len() != tree.groups.len() {
            return Err(DbError::Format("group hierarchy contains a cycle".into()));
        }

        for note in body.notes {
            let uid = note.uid;
            tree.insert_note(note).map_err(|e| match e {
                DbError::NotFound(_) => DbError::Format(format!("note {uid} has a missing group")),
                _ => DbError::Format(format!("duplicate note {uid}")),
            })?;
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Tree, Uuid, Uuid, Uuid) {
        let mut tree = Tree::new("Vault");
        let root = tree.root_uid();
        let work = Uuid::new_v4();
        let email = Uuid::new_v4();
        let home = Uuid::new_v4();
        tree.insert_group(GroupNode::new(work, Some(root), "Work", true)).unwrap();
        tree.insert_group(GroupNode::new(home, Some(root), "Home", true)).unwrap();
        tree.insert_group(GroupNode::new(email, Some(work), "Email", true)).unwrap();
        (tree, work, email, home)
    }

    #[test]
    fn walk_is_breadth_first() {
        let (tree, work, email, home) = sample();
        assert_eq!(tree.walk_groups(), vec![tree.root_uid(), work, home, email]);
    }

    #[test]
    fn move_into_own_subtree_is_rejected() {
        let (mut tree, work, email, _) = sample();
        let before = tree.clone();

        assert!(matches!(tree.move_group(work, email), Err(DbError::InvalidMove)));
        assert!(matches!(tree.move_group(work, work), Err(DbError::InvalidMove)));
        assert_eq!(tree, before);
    }

    #[test]
    fn move_relinks_group() {
        let (mut tree, work, email, home) = sample();
        let (old_parent, index) = tree.move_group(email, home).unwrap();
        assert_eq!((old_parent, index), (work, 0));
        assert_eq!(tree.group(&home).unwrap().groups, vec![email]);
        assert!(tree.group(&work).unwrap().groups.is_empty());
        assert_eq!(tree.group(&email).unwrap().parent, Some(home));
    }

    #[test]
    fn random_moves_never_create_cycles() {
        let mut tree = Tree::new("Vault");
        let mut uids = vec![tree.root_uid()];
        for i in 0..12 {
            let parent = uids[i / 2];
            let uid = Uuid::new_v4();
            tree.insert_group(GroupNode::new(uid, Some(parent), format!("g{i}"), true)).unwrap();
            uids.push(uid);
        }

        for (i, &source) in uids.iter().enumerate().skip(1) {
            for &destination in uids.iter().skip(i % 5) {
                let _ = tree.move_group(source, destination);
                assert_eq!(tree.walk_groups().len(), uids.len());
            }
        }
        for &uid in &uids {
            let mut cursor = tree.group(&uid).unwrap().parent;
            let mut steps = 0;
            while let Some(parent) = cursor {
                assert_ne!(parent, uid);
                cursor = tree.group(&parent).unwrap().parent;
                steps += 1;
                assert!(steps <= uids.len());
            }
        }
    }

    #[test]
    fn remove_and_restore_subtree() {
        let (mut tree, work, email, _) = sample();
        let note = Note::new(email, "imap");
        let note_uid = note.uid;
        tree.insert_note(note).unwrap();
        let before = tree.clone();

        let removed = tree.remove_group(&work).unwrap();
        assert!(tree.group(&email).is_none());
        assert!(tree.note(&note_uid).is_none());
        assert_eq!(removed.groups.len(), 2);

        tree.restore_group(removed).unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn root_cannot_be_removed() {
        let (mut tree, ..) = sample();
        let root = tree.root_uid();
        assert!(matches!(tree.remove_group(&root), Err(DbError::InvalidOperation(_))));
    }

    #[test]
    fn body_round_trip_preserves_order() {
        let (mut tree, work, ..) = sample();
        tree.insert_note(Note::new(work, "a")).unwrap();
        tree.insert_note(Note::new(work, "b")).unwrap();

        let rebuilt = Tree::from_body(tree.to_body()).unwrap();
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn invalid_bodies_rejected() {
        let root = GroupRecord {
            uid: Uuid::new_v4(),
            parent: None,
            title: "a".into(),
            inherit_autotype: true,
        };
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let cycle = vec![
            root.clone(),
            GroupRecord { uid: a, parent: Some(b), title: "a".into(), inherit_autotype: true },
            GroupRecord { uid: b, parent: Some(a), title: "b".into(), inherit_autotype: true },
        ];
        let cases = [
            vec![],
            vec![root.clone(), GroupRecord { uid: Uuid::new_v4(), ..root.clone() }],
            vec![root.clone(), GroupRecord { uid: a, parent: Some(Uuid::new_v4()), title: "x".into(), inherit_autotype: true }],
            cycle,
        ];
        for groups in cases {
            let body = DocumentBody { groups, notes: vec![] };
            assert!(matches!(Tree::from_body(body), Err(DbError::Format(_))));
        }

        let orphan = DocumentBody {
            groups: vec![root],
            notes: vec![Note::new(Uuid::new_v4(), "lost")],
        };
        assert!(matches!(Tree::from_body(orphan), Err(DbError::Format(_))));
    }
}
