//! Content tables owned by a capsule.
//!
//! The per-type stores live outside this crate. The deletion coordinator only
//! needs each table's name and whether its rows point into the blob store.

use crate::state::{CapsuleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of content a capsule can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Spotify track reference.
    Song,
    /// Prompt and answer pair.
    QuestionAnswer,
    /// Free text.
    Writing,
    /// Uploaded photo.
    Photo,
    /// Voice recording.
    Audio,
    /// Drawing.
    Doodle,
    /// Any other uploaded file.
    MiscFile,
}

impl ContentKind {
    /// Kinds stored entirely in the relational store.
    pub const ROW_ONLY: [Self; 3] = [Self::Song, Self::QuestionAnswer, Self::Writing];

    /// Kinds whose rows reference an object in the blob store.
    pub const BLOB_BACKED: [Self; 4] = [Self::Photo, Self::Audio, Self::Doodle, Self::MiscFile];

    /// Table holding rows of this kind.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Song => "songs",
            Self::QuestionAnswer => "question_answers",
            Self::Writing => "writings",
            Self::Photo => "photos",
            Self::Audio => "audios",
            Self::Doodle => "doodles",
            Self::MiscFile => "misc_files",
        }
    }

    /// Whether rows carry an `object_name` into the blob store.
    #[must_use]
    pub const fn is_blob_backed(&self) -> bool {
        matches!(self, Self::Photo | Self::Audio | Self::Doodle | Self::MiscFile)
    }
}

/// One content row, as far as the lifecycle subsystem cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// Table the row lives in.
    pub kind: ContentKind,

    /// Contributor.
    pub user_id: UserId,

    /// Owning capsule.
    pub capsule_id: CapsuleId,

    /// Blob reference; `Some` exactly for blob-backed kinds.
    pub object_name: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_every_kind() {
        assert!(ContentKind::ROW_ONLY.iter().all(|kind| !kind.is_blob_backed()));
        assert!(ContentKind::BLOB_BACKED.iter().all(ContentKind::is_blob_backed));
    }

    #[test]
    fn test_tables_are_distinct() {
        let mut tables: Vec<&str> = ContentKind::ROW_ONLY
            .iter()
            .chain(ContentKind::BLOB_BACKED.iter())
            .map(ContentKind::table)
            .collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), 7);
    }
}
