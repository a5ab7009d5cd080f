//! Summary table in CSV form
//!
//! Header plus one row per pair or solo entry, CRLF line endings. Solo rows
//! leave the Song B columns empty.

use crate::error::Result;
use crate::mashup::naming::tenths;
use crate::types::{SummaryRow, SummarySide, SUMMARY_COLUMNS};
use csv::{Terminator, WriterBuilder};

/// Render summary rows as CSV bytes
pub fn write_summary_csv(rows: &[SummaryRow]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(SUMMARY_COLUMNS)?;
    for row in rows {
        let a = side_fields(Some(&row.song_a));
        let b = side_fields(row.song_b.as_ref());
        writer.write_record(a.iter().chain(b.iter()))?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(bytes)
}

fn side_fields(side: Option<&SummarySide>) -> [String; 5] {
    match side {
        Some(s) => [
            s.title.clone(),
            s.artist.clone(),
            s.key.clone(),
            tenths(s.tempo),
            s.path.clone(),
        ],
        None => Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(title: &str, tempo: f64, path: &str) -> SummarySide {
        SummarySide {
            title: title.to_string(),
            artist: "Unknown".to_string(),
            key: "C".to_string(),
            tempo,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_header_only() {
        let csv = String::from_utf8(write_summary_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            csv,
            "Song A Title,Song A Artist,Song A Key,Song A Tempo,Song A Path,\
             Song B Title,Song B Artist,Song B Key,Song B Tempo,Song B Path\r\n"
        );
    }

    #[test]
    fn test_solo_leaves_song_b_empty() {
        let rows = [SummaryRow {
            song_a: side("solo", 97.0, "C/solo/solo^Unknown^C^97^SongA.mid"),
            song_b: None,
        }];
        let csv = String::from_utf8(write_summary_csv(&rows).unwrap()).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert_eq!(line, "solo,Unknown,C,97.0,C/solo/solo^Unknown^C^97^SongA.mid,,,,,");
    }

    #[test]
    fn test_pair_row_and_quoting() {
        let rows = [SummaryRow {
            song_a: side("a", 80.0, "C/a + b/a.mid"),
            song_b: Some(side("b, \"live\"", 65.0, "C/a + b/b.mid")),
        }];
        let csv = String::from_utf8(write_summary_csv(&rows).unwrap()).unwrap();
        let line = csv.split("\r\n").nth(1).unwrap();
        assert_eq!(
            line,
            "a,Unknown,C,80.0,C/a + b/a.mid,\"b, \"\"live\"\"\",Unknown,C,65.0,C/a + b/b.mid"
        );
    }

    #[test]
    fn test_line_breaks_are_quoted() {
        let rows = [SummaryRow {
            song_a: side("two\r\nlines", 120.0, "C/x/x.mid"),
            song_b: None,
        }];
        let csv = String::from_utf8(write_summary_csv(&rows).unwrap()).unwrap();
        assert!(csv.contains("\"two\r\nlines\",Unknown,C,120.0,"));
        assert!(csv.ends_with(",,,,,\r\n"));
    }
}
