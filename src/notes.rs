// Note merging
// Collapses consecutive same-pitch segments into sustained notes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pitch::{round_millis, RawNote};

/// A transcribed note with times in seconds, rounded to milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub note_name: String,
    pub start: f64,
    pub end: f64,
}

impl Note {
    pub fn new(note_name: impl Into<String>, start: f64, end: f64) -> Self {
        Note {
            note_name: note_name.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:.3}, {:.3})", self.note_name, self.start, self.end)
    }
}

impl From<Note> for RawNote {
    fn from(note: Note) -> Self {
        RawNote {
            note_name: Some(note.note_name),
            start: note.start,
            end: note.end,
        }
    }
}

/// Merge raw notes in order
///
/// Unpitched entries are dropped. A note whose name matches the note being
/// held extends it to the incoming end time; any other name finalizes the held
/// note and starts a new one.
pub fn merge<I>(raw_notes: I) -> Vec<Note>
where
    I: IntoIterator<Item = RawNote>,
{
    let (mut finished, held) = raw_notes
        .into_iter()
        .filter_map(|raw| {
            raw.note_name
                .map(|name| Note::new(name, raw.start, raw.end))
        })
        .fold(
            (Vec::new(), None::<Note>),
            |(mut finished, held), incoming| match held {
                Some(mut current) if current.note_name == incoming.note_name => {
                    current.end = round_millis(incoming.end);
                    (finished, Some(current))
                }
                Some(current) => {
                    finished.push(current);
                    (finished, Some(incoming))
                }
                None => (finished, Some(incoming)),
            },
        );

    finished.extend(held);
    finished
}

/// Render notes as `[(A4, 0.000, 1.000), ...]`
pub fn format_notes(notes: &[Note]) -> String {
    let items: Vec<String> = notes.iter().map(Note::to_string).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: Option<&str>, start: f64, end: f64) -> RawNote {
        RawNote {
            note_name: name.map(str::to_string),
            start,
            end,
        }
    }

    #[test]
    fn test_single_note_unchanged() {
        let merged = merge(vec![raw(Some("A4"), 0.0, 1.5)]);
        assert_eq!(merged, vec![Note::new("A4", 0.0, 1.5)]);
    }

    #[test]
    fn test_merges_consecutive_same_names() {
        let merged = merge(vec![
            raw(Some("E2"), 0.0, 0.5),
            raw(Some("E2"), 0.5, 0.9),
            raw(Some("G2"), 0.9, 1.2),
            raw(Some("E2"), 1.2, 1.4),
            raw(Some("E2"), 1.4, 2.0),
        ]);

        assert_eq!(
            merged,
            vec![
                Note::new("E2", 0.0, 0.9),
                Note::new("G2", 0.9, 1.2),
                Note::new("E2", 1.2, 2.0),
            ]
        );
    }

    #[test]
    fn test_unpitched_segments_are_dropped() {
        let merged = merge(vec![
            raw(Some("A4"), 0.0, 0.5),
            raw(None, 0.5, 0.7),
            raw(Some("A4"), 0.7, 1.0),
            raw(None, 1.0, 1.2),
        ]);

        // The gap does not break the held note
        assert_eq!(merged, vec![Note::new("A4", 0.0, 1.0)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(Vec::new()).is_empty());
        assert!(merge(vec![raw(None, 0.0, 1.0)]).is_empty());
    }

    #[test]
    fn test_merge_is_maximal() {
        let input = vec![
            raw(Some("C4"), 0.0, 0.2),
            raw(Some("C4"), 0.2, 0.4),
            raw(Some("D4"), 0.4, 0.6),
            raw(None, 0.6, 0.8),
            raw(Some("D4"), 0.8, 1.0),
            raw(Some("C4"), 1.0, 1.3),
        ];

        let merged = merge(input);
        for pair in merged.windows(2) {
            assert_ne!(pair[0].note_name, pair[1].note_name);
            assert!(pair[0].start < pair[1].start);
        }
        assert!(merged.iter().all(|n| n.end >= n.start));

        let remerged = merge(merged.iter().cloned().map(RawNote::from));
        assert_eq!(remerged, merged);
    }

    #[test]
    fn test_extended_end_is_rounded() {
        let merged = merge(vec![
            raw(Some("B3"), 0.0, 0.5),
            raw(Some("B3"), 0.5, 0.7501),
        ]);
        assert_eq!(merged[0].end, 0.75);
    }

    #[test]
    fn test_display_and_format() {
        let note = Note::new("C#3", 0.5, 1.25);
        assert_eq!(note.to_string(), "(C#3, 0.500, 1.250)");
        assert_eq!(note.duration(), 0.75);

        assert_eq!(format_notes(&[]), "[]");
        assert_eq!(
            format_notes(&[Note::new("A4", 0.0, 1.0), Note::new("B4", 1.0, 2.0)]),
            "[(A4, 0.000, 1.000), (B4, 1.000, 2.000)]"
        );
    }
}
