use crate::entry::{CatalogEntry, EntryId, Fingerprint};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) id: i64,
    pub(crate) path: String,
    pub(crate) fingerprint: Option<String>,
    pub(crate) filename: String,
    pub(crate) title: Option<String>,
    pub(crate) artist: Option<String>,
    pub(crate) variant: Option<String>,
    pub(crate) year: Option<i64>,
    pub(crate) genre: Option<String>,
    pub(crate) external_id: Option<String>,
    pub(crate) format: String,
    pub(crate) search_blob: Option<String>,
    pub(crate) visible: bool,
    pub(crate) status: String,
}
impl TryFrom<EntryRow> for CatalogEntry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EntryId(row.id),
            path: row.path,
            fingerprint: row.fingerprint.map(Fingerprint::new),
            filename: row.filename,
            title: row.title,
            artist: row.artist,
            variant: row.variant,
            year: row
                .year
                .map(|y| i32::try_from(y).or_raise(|| ErrorKind::InvalidData("year")))
                .transpose()?,
            genre: row.genre,
            external_id: row.external_id,
            format: row.format.parse()?,
            search_blob: row.search_blob,
            visible: row.visible,
            status: row.status.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EnrichmentStatus, Format};

    fn row() -> EntryRow {
        EntryRow {
            id: 7,
            path: "ABBA/Waterloo.mp3".to_string(),
            fingerprint: Some("af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262".to_string()),
            filename: "Waterloo.mp3".to_string(),
            title: Some("Waterloo".to_string()),
            artist: None,
            variant: None,
            year: Some(1974),
            genre: None,
            external_id: None,
            format: "CDG".to_string(),
            search_blob: None,
            visible: true,
            status: "pending".to_string(),
        }
    }

    #[test]
    fn test_row_to_model() {
        let model = CatalogEntry::try_from(row()).unwrap();
        assert_eq!(model.id, EntryId(7));
        assert_eq!(model.format, Format::Cdg);
        assert_eq!(model.status, EnrichmentStatus::Pending);
        assert_eq!(model.year, Some(1974));
        assert!(model.fingerprint.is_some());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let mut row = row();
        row.format = "KAR".to_string();
        let err = CatalogEntry::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("format")));
    }

    #[test]
    fn test_out_of_range_year_is_rejected() {
        let mut row = row();
        row.year = Some(i64::MAX);
        assert!(CatalogEntry::try_from(row).is_err());
    }
}
