//! Turns an observation of the disk and the current catalog into the
//! minimal set of catalog writes that make them agree.
//!
//! Matching happens in three passes:
//! 1. Paths present in both are kept; their row is updated if the content
//!    fingerprint or the format changed.
//! 2. Catalog paths missing from disk are candidates for a move. Each
//!    fingerprint is claimed by at most one candidate, the lowest id.
//! 3. Each new disk path (in path order) claims the candidate holding its
//!    fingerprint as a move, otherwise it is inserted.
//!
//! Candidates left unclaimed are deleted.

use crate::scan::disk::{DiskFile, DiskSet};
use crate::scan::ScanStats;
use pikaraoke_catalog::{CatalogEntry, EntryId, Fingerprint, Format, NewEntry};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// New content or format for an entry that stayed at its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub id: EntryId,
    pub filename: String,
    pub format: Format,
    pub fingerprint: Option<Fingerprint>,
    /// The file's bytes changed, so its metadata must be looked up again.
    pub content_changed: bool,
}

/// An entry whose content now lives at a different path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub id: EntryId,
    pub from: String,
    pub to: String,
    pub filename: String,
    pub format: Format,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Plan {
    pub updates: Vec<Update>,
    pub moves: Vec<Move>,
    pub inserts: Vec<NewEntry>,
    pub deletes: Vec<EntryId>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.moves.is_empty() && self.inserts.is_empty() && self.deletes.is_empty()
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            added: self.inserts.len(),
            moved: self.moves.len(),
            updated: self.updates.len(),
            deleted: self.deletes.len(),
        }
    }
}

pub fn diff(disk: &DiskSet, catalog: Vec<CatalogEntry>) -> Plan {
    let mut catalog: BTreeMap<String, CatalogEntry> =
        catalog.into_iter().map(|entry| (entry.path.clone(), entry)).collect();
    let mut plan = Plan::default();

    let mut new_paths: Vec<(&String, &DiskFile)> = Vec::new();
    for (path, file) in disk {
        match catalog.remove(path) {
            Some(entry) => {
                if let Some(update) = changed(&entry, file) {
                    plan.updates.push(update);
                }
            },
            None => new_paths.push((path, file)),
        }
    }

    // Whatever is left is missing from disk.
    let mut missing: Vec<CatalogEntry> = catalog.into_values().collect();
    missing.sort_by_key(|entry| entry.id);
    let mut candidates: HashMap<Fingerprint, CatalogEntry> = HashMap::new();
    for entry in missing {
        let Some(fingerprint) = entry.fingerprint.clone() else {
            plan.deletes.push(entry.id);
            continue;
        };
        match candidates.entry(fingerprint) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            },
            Entry::Occupied(_) => plan.deletes.push(entry.id),
        }
    }

    for (path, file) in new_paths {
        let claimed = file.fingerprint.as_ref().and_then(|fingerprint| candidates.remove(fingerprint));
        match claimed {
            Some(entry) => plan.moves.push(Move {
                id: entry.id,
                from: entry.path,
                to: path.clone(),
                filename: file.filename.clone(),
                format: file.format,
            }),
            None => plan.inserts.push(NewEntry {
                path: path.clone(),
                filename: file.filename.clone(),
                format: file.format,
                fingerprint: file.fingerprint.clone(),
            }),
        }
    }

    plan.deletes.extend(candidates.into_values().map(|entry| entry.id));
    plan.deletes.sort();
    plan
}

fn changed(entry: &CatalogEntry, file: &DiskFile) -> Option<Update> {
    if entry.fingerprint == file.fingerprint && entry.format == file.format {
        return None;
    }
    // A missing fingerprint on either side (unreadable file) says nothing
    // about the content.
    let content_changed =
        entry.fingerprint.is_some() && file.fingerprint.is_some() && entry.fingerprint != file.fingerprint;
    Some(Update {
        id: entry.id,
        filename: file.filename.clone(),
        format: file.format,
        fingerprint: file.fingerprint.clone(),
        content_changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pikaraoke_catalog::EnrichmentStatus;

    fn entry(id: i64, path: &str, format: Format, fingerprint: Option<&str>) -> CatalogEntry {
        let filename = path.rsplit('/').next().unwrap().to_string();
        CatalogEntry {
            id: EntryId(id),
            path: path.to_string(),
            fingerprint: fingerprint.map(Fingerprint::new),
            title: Some(filename.clone()),
            filename,
            artist: None,
            variant: None,
            year: None,
            genre: None,
            external_id: None,
            format,
            search_blob: None,
            visible: true,
            status: EnrichmentStatus::Enriched,
        }
    }

    fn disk(files: &[(&str, Format, Option<&str>)]) -> DiskSet {
        files
            .iter()
            .map(|(path, format, fingerprint)| {
                let file = DiskFile {
                    filename: path.rsplit('/').next().unwrap().to_string(),
                    format: *format,
                    fingerprint: fingerprint.map(Fingerprint::new),
                };
                (path.to_string(), file)
            })
            .collect()
    }

    #[test]
    fn test_unchanged_is_empty() {
        let disk = disk(&[("a.zip", Format::Zip, Some("f1")), ("b.mp4", Format::Mp4, None)]);
        let catalog = vec![entry(1, "a.zip", Format::Zip, Some("f1")), entry(2, "b.mp4", Format::Mp4, None)];
        let plan = diff(&disk, catalog);
        assert!(plan.is_empty());
        assert_eq!(plan.stats(), ScanStats::default());
    }

    #[test]
    fn test_content_and_format_changes() {
        let disk = disk(&[
            ("a.zip", Format::Zip, Some("new")),
            ("b.mp4", Format::Mp4Ass, Some("f2")),
            ("c.mp4", Format::Mp4, None),
        ]);
        let catalog = vec![
            entry(1, "a.zip", Format::Zip, Some("old")),
            entry(2, "b.mp4", Format::Mp4, Some("f2")),
            entry(3, "c.mp4", Format::Mp4, Some("f3")),
        ];
        let plan = diff(&disk, catalog);
        let flags: Vec<(EntryId, bool)> = plan.updates.iter().map(|u| (u.id, u.content_changed)).collect();
        assert_eq!(flags, [(EntryId(1), true), (EntryId(2), false), (EntryId(3), false)]);
        assert_eq!(plan.updates[1].format, Format::Mp4Ass);
        assert_eq!(plan.updates[2].fingerprint, None);
        assert!(plan.moves.is_empty() && plan.inserts.is_empty() && plan.deletes.is_empty());
    }

    #[test]
    fn test_regained_fingerprint_keeps_status() {
        let disk = disk(&[("a.zip", Format::Zip, Some("f1"))]);
        let plan = diff(&disk, vec![entry(1, "a.zip", Format::Zip, None)]);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].fingerprint, Some(Fingerprint::new("f1")));
        assert!(!plan.updates[0].content_changed);
    }

    #[test]
    fn test_move_keeps_id() {
        let disk = disk(&[("Pop/a.mp4", Format::Mp4, Some("f1"))]);
        let plan = diff(&disk, vec![entry(7, "a.mp4", Format::Mp4Ass, Some("f1"))]);
        assert_eq!(
            plan.moves,
            [Move {
                id: EntryId(7),
                from: "a.mp4".to_string(),
                to: "Pop/a.mp4".to_string(),
                filename: "a.mp4".to_string(),
                format: Format::Mp4,
            }]
        );
        assert_eq!(plan.stats(), ScanStats { moved: 1, ..Default::default() });
    }

    #[test]
    fn test_duplicate_fingerprints_lowest_id_wins() {
        let disk = disk(&[("c.zip", Format::Zip, Some("dup"))]);
        let catalog = vec![entry(5, "b.zip", Format::Zip, Some("dup")), entry(2, "a.zip", Format::Zip, Some("dup"))];
        let plan = diff(&disk, catalog);
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].id, EntryId(2));
        assert_eq!(plan.deletes, [EntryId(5)]);
    }

    #[test]
    fn test_fingerprint_claimed_once() {
        let disk = disk(&[("x.zip", Format::Zip, Some("dup")), ("y.zip", Format::Zip, Some("dup"))]);
        let plan = diff(&disk, vec![entry(1, "a.zip", Format::Zip, Some("dup"))]);
        assert_eq!(plan.moves.len(), 1);
        // New paths are matched in path order.
        assert_eq!(plan.moves[0].to, "x.zip");
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].path, "y.zip");
    }

    #[test]
    fn test_unfingerprinted_never_move() {
        let disk = disk(&[("new.mp4", Format::Mp4, None), ("other.mp4", Format::Mp4, Some("f1"))]);
        let catalog = vec![entry(1, "old.mp4", Format::Mp4, None), entry(2, "gone.mp4", Format::Mp4, Some("f9"))];
        let plan = diff(&disk, catalog);
        assert!(plan.moves.is_empty());
        assert_eq!(plan.inserts.len(), 2);
        assert_eq!(plan.deletes, [EntryId(1), EntryId(2)]);
        assert_eq!(plan.stats(), ScanStats { added: 2, deleted: 2, ..Default::default() });
    }

    #[test]
    fn test_empty_disk_deletes_everything() {
        let catalog = vec![entry(1, "a.zip", Format::Zip, Some("f1")), entry(2, "b.zip", Format::Zip, None)];
        let plan = diff(&DiskSet::new(), catalog);
        assert_eq!(plan.deletes, [EntryId(1), EntryId(2)]);
    }
}
