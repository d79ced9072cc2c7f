//! Decides which files in a directory are catalogued media, and as what.
//!
//! | File                    | Companion in same directory | Format    |
//! |-------------------------|-----------------------------|-----------|
//! | `*.mp3`                 | `*.cdg` with the same stem  | `CDG`     |
//! | `*.zip`                 |                             | `ZIP`     |
//! | `*.mp4/.mkv/.avi/.webm` | `*.ass` with the same stem  | `MP4+ASS` |
//! | `*.mp4/.mkv/.avi/.webm` | none                        | `MP4`     |
//!
//! Companions (`.cdg`, `.ass`) are never catalogued on their own, and a bare
//! `.mp3` without its `.cdg` is not a karaoke track. Extension and companion
//! matching ignore case. Hidden files are ignored.

use crate::scan::Listing;
use pikaraoke_catalog::Format;
use std::collections::{BTreeMap, HashSet};

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "webm"];

/// Classify every file in one directory listing.
///
/// Returns a map from root-relative path to `(filename, format)` for the
/// files that are catalogued.
pub fn classify(listing: &Listing) -> BTreeMap<String, (String, Format)> {
    let siblings: HashSet<String> = listing.files.iter().map(|name| name.to_lowercase()).collect();
    listing
        .files
        .iter()
        .filter(|name| !name.starts_with('.'))
        .filter_map(|name| {
            let format = detect(name, &siblings)?;
            Some((listing.relative(name), (name.clone(), format)))
        })
        .collect()
}

/// Decide the format of `name` given the lowercased names of its siblings.
pub fn detect(name: &str, siblings: &HashSet<String>) -> Option<Format> {
    let (stem, extension) = name.rsplit_once('.').filter(|(stem, _)| !stem.is_empty())?;
    let stem = stem.to_lowercase();
    let has_companion = |companion: &str| siblings.contains(&format!("{stem}.{companion}"));
    match extension.to_lowercase().as_str() {
        "mp3" if has_companion("cdg") => Some(Format::Cdg),
        "zip" => Some(Format::Zip),
        ext if VIDEO_EXTENSIONS.contains(&ext) => {
            Some(if has_companion("ass") { Format::Mp4Ass } else { Format::Mp4 })
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    fn listing(dir: &str, files: &[&str]) -> Listing {
        Listing {
            dir: dir.to_string(),
            absolute: PathBuf::from("/songs").join(dir),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[rstest]
    #[case(&["song.mp3", "song.cdg"], "song.mp3", Some(Format::Cdg))]
    #[case(&["Song.MP3", "song.cdg"], "Song.MP3", Some(Format::Cdg))]
    #[case(&["song.mp3", "SONG.CDG"], "song.mp3", Some(Format::Cdg))]
    #[case(&["song.mp3"], "song.mp3", None)]
    #[case(&["song.mp3", "other.cdg"], "song.mp3", None)]
    #[case(&["song.zip"], "song.zip", Some(Format::Zip))]
    #[case(&["song.ZIP"], "song.ZIP", Some(Format::Zip))]
    #[case(&["song.mp4"], "song.mp4", Some(Format::Mp4))]
    #[case(&["song.mkv"], "song.mkv", Some(Format::Mp4))]
    #[case(&["song.avi"], "song.avi", Some(Format::Mp4))]
    #[case(&["song.webm", "song.ass"], "song.webm", Some(Format::Mp4Ass))]
    #[case(&["song.mp4", "song.ass"], "song.mp4", Some(Format::Mp4Ass))]
    #[case(&["song.cdg"], "song.cdg", None)]
    #[case(&["song.ass"], "song.ass", None)]
    #[case(&["readme.txt"], "readme.txt", None)]
    #[case(&["mp4"], "mp4", None)]
    #[case(&[".mp4"], ".mp4", None)]
    fn test_detect(#[case] files: &[&str], #[case] name: &str, #[case] expected: Option<Format>) {
        let siblings: HashSet<String> = files.iter().map(|f| f.to_lowercase()).collect();
        assert_eq!(detect(name, &siblings), expected);
    }

    #[test]
    fn test_classify_directory() {
        let listing = listing(
            "ABBA",
            &[".hidden.mp4", "SOS.mp4", "SOS.ass", "Waterloo.cdg", "Waterloo.mp3", "cover.jpg", "lonely.mp3"],
        );
        let classified = classify(&listing);
        let expected: BTreeMap<String, (String, Format)> = [
            ("ABBA/SOS.mp4".to_string(), ("SOS.mp4".to_string(), Format::Mp4Ass)),
            ("ABBA/Waterloo.mp3".to_string(), ("Waterloo.mp3".to_string(), Format::Cdg)),
        ]
        .into();
        assert_eq!(classified, expected);
    }

    #[test]
    fn test_classify_root() {
        let classified = classify(&listing("", &["track.zip"]));
        assert_eq!(classified.keys().collect::<Vec<_>>(), ["track.zip"]);
    }
}
