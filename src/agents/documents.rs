//! Uploaded document handling

use serde::{Deserialize, Serialize};

/// A file whose text has already been extracted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub name: String,
    pub content: String,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Render documents as one labelled block of file text
pub fn combine_documents(documents: &[UploadedDocument]) -> String {
    documents
        .iter()
        .map(|doc| {
            format!(
                "Document Name: {}\nDocument Content:\n{}\n\n",
                doc.name, doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
