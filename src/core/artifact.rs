//! Artifact metadata.
//!
//! Describes one artifact published by a component. Value semantics
//! only: artifact sets in the cache are compared and iterated in a
//! stable order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::InternedString;

/// Metadata for a single artifact of a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Artifact base name
    name: InternedString,

    /// Artifact kind, e.g. "lib" or "sources"
    kind: InternedString,

    /// File extension
    extension: Option<InternedString>,

    /// Classifier distinguishing parallel artifacts of the same kind
    classifier: Option<InternedString>,
}

impl ArtifactMetadata {
    /// Create artifact metadata.
    pub fn new(name: impl Into<InternedString>, kind: impl Into<InternedString>) -> Self {
        ArtifactMetadata {
            name: name.into(),
            kind: kind.into(),
            extension: None,
            classifier: None,
        }
    }

    /// Set the file extension.
    pub fn with_extension(mut self, extension: impl Into<InternedString>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Set the classifier.
    pub fn with_classifier(mut self, classifier: impl Into<InternedString>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Get the artifact name.
    pub fn name(&self) -> InternedString {
        self.name
    }

    /// Get the artifact kind.
    pub fn kind(&self) -> InternedString {
        self.kind
    }

    /// Get the file extension.
    pub fn extension(&self) -> Option<InternedString> {
        self.extension
    }

    /// Get the classifier.
    pub fn classifier(&self) -> Option<InternedString> {
        self.classifier
    }

    /// File name this artifact materializes as.
    pub fn file_name(&self) -> String {
        let mut out = self.name.to_string();
        if let Some(classifier) = self.classifier {
            out.push('-');
            out.push_str(&classifier);
        }
        if let Some(extension) = self.extension {
            out.push('.');
            out.push_str(&extension);
        }
        out
    }
}

impl fmt::Display for ArtifactMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.file_name(), self.kind)
    }
}
