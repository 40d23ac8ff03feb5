const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Fractional MIDI note number, A4 = 440 Hz = 69
pub fn frequency_to_midi(frequency: f32) -> f32 {
    69.0 + 12.0 * (frequency / 440.0).log2()
}

/// Name of the nearest equal-tempered note, e.g. `A4` or `C#3`
pub fn midi_to_note_name(midi_note: f32) -> String {
    let midi_number = midi_note.round() as i32;
    let note_index = midi_number.rem_euclid(12);
    let octave = midi_number.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[note_index as usize], octave)
}

/// Note name for a frequency in Hz; `None` for non-positive or non-finite input
pub fn frequency_to_note_name(frequency: f32) -> Option<String> {
    if frequency > 0.0 && frequency.is_finite() {
        Some(midi_to_note_name(frequency_to_midi(frequency)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitches() {
        assert_eq!(frequency_to_note_name(440.0).as_deref(), Some("A4"));
        assert_eq!(frequency_to_note_name(261.63).as_deref(), Some("C4"));
        assert_eq!(frequency_to_note_name(82.41).as_deref(), Some("E2"));
        assert_eq!(frequency_to_note_name(466.16).as_deref(), Some("A#4"));
    }

    #[test]
    fn test_rounds_to_nearest_semitone() {
        // A quarter tone above A4 is still closer to A4 than to A#4
        assert_eq!(frequency_to_note_name(452.0).as_deref(), Some("A4"));
        assert_eq!(frequency_to_note_name(428.0).as_deref(), Some("A4"));
    }

    #[test]
    fn test_low_octaves() {
        assert_eq!(midi_to_note_name(0.0), "C-1");
        assert_eq!(midi_to_note_name(-1.0), "B-2");
    }

    #[test]
    fn test_no_name_without_pitch() {
        assert_eq!(frequency_to_note_name(0.0), None);
        assert_eq!(frequency_to_note_name(-10.0), None);
        assert_eq!(frequency_to_note_name(f32::NAN), None);
    }
}
