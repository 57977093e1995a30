use crate::tree::Tree;

/// Root title for a document stored as `file_name`: the name without its
/// extension.
pub fn root_title(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Fresh tree for a new document: a root group named after the file and
/// nothing else.
pub(crate) fn seed(file_name: &str) -> Tree {
    Tree::new(root_title(file_name))
}
