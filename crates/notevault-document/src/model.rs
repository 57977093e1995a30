//! Groups and notes as handed to and returned from the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the free-text property that counts as a standard field.
pub const NOTES_PROPERTY: &str = "Notes";

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub uid: Uuid,
    /// `None` only for the root group.
    pub parent_uid: Option<Uuid>,
    pub title: String,
    /// Direct child groups at the time this value was produced.
    pub group_count: usize,
    /// Notes directly inside this group at the time this value was produced.
    pub note_count: usize,
    pub inherit_autotype: bool,
}

impl Group {
    /// A new group to be inserted under `parent_uid`.
    pub fn new(parent_uid: Uuid, title: impl Into<String>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            parent_uid: Some(parent_uid),
            title: title.into(),
            group_count: 0,
            note_count: 0,
            inherit_autotype: true,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_uid.is_none()
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Title,
    Password,
    Username,
    Url,
    Text,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Title => "title",
            PropertyKind::Password => "password",
            PropertyKind::Username => "username",
            PropertyKind::Url => "url",
            PropertyKind::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Some(PropertyKind::Title),
            "password" => Some(PropertyKind::Password),
            "username" | "user" => Some(PropertyKind::Username),
            "url" => Some(PropertyKind::Url),
            "text" => Some(PropertyKind::Text),
            _ => None,
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            PropertyKind::Title => "Title",
            PropertyKind::Password => "Password",
            PropertyKind::Username => "UserName",
            PropertyKind::Url => "URL",
            PropertyKind::Text => NOTES_PROPERTY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub kind: PropertyKind,
    pub name: String,
    pub value: String,
    /// Sensitive values are masked by callers.
    pub protected: bool,
}

impl Property {
    pub fn new(
        kind: PropertyKind,
        name: impl Into<String>,
        value: impl Into<String>,
        protected: bool,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
            protected,
        }
    }

    /// A standard field under its conventional name.
    pub fn standard(kind: PropertyKind, value: impl Into<String>) -> Self {
        Self::new(kind, kind.default_name(), value, kind == PropertyKind::Password)
    }

    pub fn password(value: impl Into<String>) -> Self {
        Self::standard(PropertyKind::Password, value)
    }

    pub fn custom(name: impl Into<String>, value: impl Into<String>, protected: bool) -> Self {
        Self::new(PropertyKind::Text, name, value, protected)
    }

    /// Anything besides the four typed fields and the free-text notes.
    pub fn is_custom(&self) -> bool {
        self.kind == PropertyKind::Text && self.name != NOTES_PROPERTY
    }

    /// Identity used when merging two versions of a note: standard fields
    /// match by kind, custom ones by name.
    pub(crate) fn slot(&self) -> (bool, &str) {
        if self.is_custom() {
            (true, &self.name)
        } else {
            (false, self.kind.as_str())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub uid: Uuid,
    pub group_uid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub title: String,
    pub properties: Vec<Property>,
}

impl Note {
    pub fn new(group_uid: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: Uuid::new_v4(),
            group_uid,
            created: now,
            modified: now,
            title: title.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, kind: PropertyKind) -> Option<&Property> {
        self.properties.iter().find(|p| p.kind == kind && !p.is_custom())
    }

    pub fn password(&self) -> Option<&str> {
        self.property(PropertyKind::Password).map(|p| p.value.as_str())
    }

    pub fn custom_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_custom())
    }

    /// Case-insensitive match on title, property names and property values.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.title, needle)
            || self
                .properties
                .iter()
                .any(|p| contains_ci(&p.name, needle) || contains_ci(&p.value, needle))
    }

    /// Fold `update` into this note in place, keeping uid and creation time.
    ///
    /// Properties missing from `update` are dropped, shared ones take the
    /// new value and new ones are appended, so existing order survives.
    pub(crate) fn merge_from(&mut self, update: &Note) {
        self.title = update.title.clone();
        self.properties
            .retain(|old| update.properties.iter().any(|new| new.slot() == old.slot()));

        for new in &update.properties {
            match self.properties.iter_mut().find(|old| old.slot() == new.slot()) {
                Some(old) => {
                    old.kind = new.kind;
                    old.name = new.name.clone();
                    old.value = new.value.clone();
                    old.protected = new.protected;
                }
                None => self.properties.push(new.clone()),
            }
        }
        self.modified = Utc::now();
    }
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_text_is_standard() {
        assert!(!Property::standard(PropertyKind::Text, "memo").is_custom());
        assert!(Property::custom("PIN", "1234", true).is_custom());
        assert!(Property::password("x").protected);
    }

    #[test]
    fn merge_diffs_custom_properties_by_name() {
        let group = Uuid::new_v4();
        let mut stored = Note::new(group, "Bank")
            .with_property(Property::password("old"))
            .with_property(Property::custom("PIN", "1111", true))
            .with_property(Property::custom("Branch", "North", false));
        let uid = stored.uid;
        let created = stored.created;

        let update = Note::new(group, "Bank account")
            .with_property(Property::password("new"))
            .with_property(Property::custom("Branch", "South", false))
            .with_property(Property::custom("IBAN", "DE00", false));
        stored.merge_from(&update);

        assert_eq!(stored.uid, uid);
        assert_eq!(stored.created, created);
        assert_eq!(stored.title, "Bank account");
        assert_eq!(stored.password(), Some("new"));
        let custom: Vec<_> = stored
            .custom_properties()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .collect();
        assert_eq!(custom, vec![("Branch", "South"), ("IBAN", "DE00")]);
    }

    #[test]
    fn search_covers_properties() {
        let note = Note::new(Uuid::new_v4(), "Email")
            .with_property(Property::standard(PropertyKind::Url, "https://Mail.example"));
        assert!(note.matches("email"));
        assert!(note.matches("mail.EXAMPLE"));
        assert!(note.matches("url"));
        assert!(!note.matches("bank"));
    }
}
