//! Scale table: semitone offsets from the root for every scale the host can report.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleId {
    Major,
    Minor,
    Dorian,
    Mixolydian,
    Lydian,
    Phrygian,
    Locrian,
    Diminished,
    WholeTone,
    WholeHalf,
    HalfWhole,
    HarmonicMinor,
    MelodicMinor,
    SuperLocrian,
    Bhairav,
    HungarianMinor,
    MinorBlues,
    MajorBlues,
    MinorPentatonic,
    MajorPentatonic,
    Spanish,
    Gypsy,
    Arabian,
    Flamenco,
    Japanese,
    Egyptian,
    Blues,
    Chromatic,
}

impl ScaleId {
    pub const ALL: [ScaleId; 28] = [
        Self::Major,
        Self::Minor,
        Self::Dorian,
        Self::Mixolydian,
        Self::Lydian,
        Self::Phrygian,
        Self::Locrian,
        Self::Diminished,
        Self::WholeTone,
        Self::WholeHalf,
        Self::HalfWhole,
        Self::HarmonicMinor,
        Self::MelodicMinor,
        Self::SuperLocrian,
        Self::Bhairav,
        Self::HungarianMinor,
        Self::MinorBlues,
        Self::MajorBlues,
        Self::MinorPentatonic,
        Self::MajorPentatonic,
        Self::Spanish,
        Self::Gypsy,
        Self::Arabian,
        Self::Flamenco,
        Self::Japanese,
        Self::Egyptian,
        Self::Blues,
        Self::Chromatic,
    ];

    /// Name as the host reports it.
    pub fn name(self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Dorian => "Dorian",
            Self::Mixolydian => "Mixolydian",
            Self::Lydian => "Lydian",
            Self::Phrygian => "Phrygian",
            Self::Locrian => "Locrian",
            Self::Diminished => "Diminished",
            Self::WholeTone => "Whole Tone",
            Self::WholeHalf => "Whole-Half",
            Self::HalfWhole => "Half-Whole",
            Self::HarmonicMinor => "Harmonic Minor",
            Self::MelodicMinor => "Melodic Minor",
            Self::SuperLocrian => "Super Locrian",
            Self::Bhairav => "Bhairav",
            Self::HungarianMinor => "Hungarian Minor",
            Self::MinorBlues => "Minor Blues",
            Self::MajorBlues => "Major Blues",
            Self::MinorPentatonic => "Minor Pentatonic",
            Self::MajorPentatonic => "Major Pentatonic",
            Self::Spanish => "Spanish",
            Self::Gypsy => "Gypsy",
            Self::Arabian => "Arabian",
            Self::Flamenco => "Flamenco",
            Self::Japanese => "Japanese",
            Self::Egyptian => "Egyptian",
            Self::Blues => "Blues",
            Self::Chromatic => "Chromatic",
        }
    }

    /// Semitone intervals from the root note (root = 0).
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::Diminished => &[0, 2, 3, 5, 6, 8, 9, 11],
            Self::WholeTone => &[0, 2, 4, 6, 8, 10],
            Self::WholeHalf => &[0, 2, 3, 5, 6, 8, 9, 11],
            Self::HalfWhole => &[0, 1, 3, 4, 6, 7, 9, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Self::SuperLocrian => &[0, 1, 3, 4, 6, 8, 10],
            Self::Bhairav => &[0, 1, 4, 5, 7, 8, 11],
            Self::HungarianMinor => &[0, 2, 3, 6, 7, 8, 11],
            Self::MinorBlues => &[0, 3, 5, 6, 7, 10],
            Self::MajorBlues => &[0, 2, 3, 4, 7, 9],
            Self::MinorPentatonic => &[0, 3, 5, 7, 10],
            Self::MajorPentatonic => &[0, 2, 4, 7, 9],
            Self::Spanish => &[0, 1, 4, 5, 7, 8, 10],
            Self::Gypsy => &[0, 2, 3, 6, 7, 8, 11],
            Self::Arabian => &[0, 2, 4, 5, 6, 8, 10],
            Self::Flamenco => &[0, 1, 4, 5, 7, 8, 11],
            Self::Japanese => &[0, 1, 5, 7, 8],
            Self::Egyptian => &[0, 2, 5, 7, 10],
            Self::Blues => &[0, 3, 5, 6, 7, 10],
            Self::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// Looks a scale up by host name. Unknown names fall back to Major.
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(wanted))
            .unwrap_or(Self::Major)
    }
}

/// A root pitch class together with a scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub root: u8, // 0 = C, 1 = C#, … 11 = B
    pub scale: ScaleId,
}

impl Key {
    pub fn new(root: u8, scale: ScaleId) -> Self {
        Self {
            root: root % 12,
            scale,
        }
    }

    pub fn chromatic() -> Self {
        Self::new(0, ScaleId::Chromatic)
    }

    pub fn contains(&self, pitch: u8) -> bool {
        let rel = (pitch as i32 - self.root as i32).rem_euclid(12) as u8;
        self.scale.intervals().contains(&rel)
    }

    pub fn is_root(&self, pitch: u8) -> bool {
        pitch % 12 == self.root
    }

    pub fn root_name(&self) -> &'static str {
        pitch_class_name(self.root)
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::new(0, ScaleId::Major)
    }
}

pub fn pitch_class_name(pitch: u8) -> &'static str {
    ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"][(pitch % 12) as usize]
}
