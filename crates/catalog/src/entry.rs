//! Catalog domain types.
//!
//! These are the typed counterparts of the `songs` table. Conversion to and
//! from database rows happens in `models`, and nowhere else.

use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Stable surrogate identifier of a catalog entry. Assigned once by the
/// store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub i64);

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Cheap content identity used to recognise a file across renames and moves.
///
/// Collisions are treated as "same content". This is a proxy, not a
/// guarantee.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Recognised media grouping of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// MP3 audio with a same-basename CD+G graphics companion.
    Cdg,
    /// Zip archive (usually an MP3+CDG pair packed together).
    Zip,
    /// Video container without subtitles.
    Mp4,
    /// Video container with a same-basename `.ass` subtitle companion.
    Mp4Ass,
}

impl Format {
    /// Tag stored in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cdg => "CDG",
            Format::Zip => "ZIP",
            Format::Mp4 => "MP4",
            Format::Mp4Ass => "MP4+ASS",
        }
    }
}

impl FromStr for Format {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CDG" => Self::Cdg,
            "ZIP" => Self::Zip,
            "MP4" => Self::Mp4,
            "MP4+ASS" => Self::Mp4Ass,
            _ => exn::bail!(ErrorKind::InvalidData("format")),
        })
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Where an entry is in the metadata enrichment lifecycle.
///
/// The catalog only ever (re)sets this to [`Pending`](Self::Pending); the
/// enrichment collaborator moves it to a terminal value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    Enriched,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::Enriched => "enriched",
            EnrichmentStatus::Failed => "failed",
        }
    }

    /// Whether enrichment has finished with this entry (successfully or not).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EnrichmentStatus::Pending)
    }
}

impl FromStr for EnrichmentStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "enriched" => Self::Enriched,
            "failed" => Self::Failed,
            _ => exn::bail!(ErrorKind::InvalidData("enrichment status")),
        })
    }
}

impl Display for EnrichmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One recognised media item in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: EntryId,
    /// Path of the primary file relative to the library root, `/`-separated.
    pub path: String,
    pub fingerprint: Option<Fingerprint>,
    pub filename: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub variant: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    /// Identifier of the item on an external media site (e.g. a YouTube ID).
    pub external_id: Option<String>,
    pub format: Format,
    pub search_blob: Option<String>,
    pub visible: bool,
    pub status: EnrichmentStatus,
}

/// The fields a scan knows about a file when it first appears on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub path: String,
    pub filename: String,
    pub format: Format,
    pub fingerprint: Option<Fingerprint>,
}

impl NewEntry {
    /// Placeholder title derived from the filename: extension stripped and
    /// underscores turned into spaces. Enrichment replaces it later.
    pub fn seed_title(&self) -> String {
        let stem = match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => self.filename.as_str(),
        };
        stem.replace('_', " ")
    }
}

/// Descriptive fields written back by the enrichment collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub variant: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub external_id: Option<String>,
    pub search_blob: Option<String>,
    pub status: EnrichmentStatus,
}
