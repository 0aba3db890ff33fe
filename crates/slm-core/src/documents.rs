//! Grounding documents.
//!
//! A [`DocumentSet`] keeps documents in insertion order and treats the file
//! name as the unique key. Adding a document whose name is already present
//! is a silent no-op.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One already-parsed source document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique key across the set.
    pub file_name: String,
    /// Full text content.
    pub content: String,
}

impl Document {
    /// Build a document.
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// Ordered, file-name-unique collection of documents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSet {
    docs: Vec<Document>,
}

impl DocumentSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add documents, skipping any whose file name is already present
    /// (including names repeated within `incoming`). Returns how many were
    /// actually added.
    pub fn add(&mut self, incoming: impl IntoIterator<Item = Document>) -> usize {
        let mut seen: HashSet<String> = self.docs.iter().map(|d| d.file_name.clone()).collect();
        let before = self.docs.len();
        for doc in incoming {
            if seen.insert(doc.file_name.clone()) {
                self.docs.push(doc);
            }
        }
        self.docs.len() - before
    }

    /// Remove the document with `file_name`. Returns whether one was removed.
    pub fn remove(&mut self, file_name: &str) -> bool {
        let before = self.docs.len();
        self.docs.retain(|d| d.file_name != file_name);
        self.docs.len() != before
    }

    /// Whether a document with `file_name` is present.
    #[must_use]
    pub fn contains(&self, file_name: &str) -> bool {
        self.docs.iter().any(|d| d.file_name == file_name)
    }

    /// Documents in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Document] {
        &self.docs
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.docs.iter()
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Drop every document.
    pub fn clear(&mut self) {
        self.docs.clear();
    }
}

impl<'a> IntoIterator for &'a DocumentSet {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}
