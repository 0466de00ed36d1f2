//! APC40 mkII LED palette.
//!
//! RGB pads and scene buttons take a palette index as the note-on velocity.
//! Single-color buttons (track select, clip stop, master, stop all) only know
//! off/on/blink, see [`crate::midi`].

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u8);

impl Color {
    pub const OFF: Color = Color(0);
    pub const WHITE: Color = Color(3);
    pub const RED: Color = Color(5);
    pub const ORANGE: Color = Color(9);
    pub const DARK_BROWN: Color = Color(11);
    pub const YELLOW: Color = Color(13);
    pub const BROWN: Color = Color(17);
    pub const GREEN: Color = Color(21);
    pub const LIME: Color = Color(25);
    pub const TEAL: Color = Color(33);
    pub const CYAN: Color = Color(37);
    pub const AMBER: Color = Color(45);
    pub const DARK_PURPLE: Color = Color(49);
    pub const PEACH: Color = Color(53);
    pub const LIGHT_BLUE: Color = Color(55);
    pub const PINK: Color = Color(57);
    pub const BLUE: Color = Color(79);
    pub const PURPLE: Color = Color(81);

    pub fn is_off(self) -> bool {
        self.0 == 0
    }

    /// Approximate sRGB value, used by the mirror window.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::OFF => [24, 24, 24],
            Self::WHITE => [240, 240, 240],
            Self::RED => [230, 30, 30],
            Self::ORANGE => [250, 130, 20],
            Self::DARK_BROWN => [90, 50, 20],
            Self::YELLOW => [240, 220, 30],
            Self::BROWN => [140, 80, 30],
            Self::GREEN => [40, 210, 40],
            Self::LIME => [150, 230, 60],
            Self::TEAL => [30, 120, 120],
            Self::CYAN => [40, 220, 230],
            Self::AMBER => [230, 170, 40],
            Self::DARK_PURPLE => [80, 30, 120],
            Self::PEACH => [240, 160, 130],
            Self::LIGHT_BLUE => [120, 180, 250],
            Self::PINK => [240, 90, 180],
            Self::BLUE => [40, 70, 230],
            Self::PURPLE => [150, 60, 220],
            Color(v) => [v.saturating_mul(2), v.saturating_mul(2), v.saturating_mul(2)],
        }
    }
}

/// Level meter coloring for an intensity in 0.0..=1.0.
pub fn intensity_color(intensity: f32) -> Color {
    if intensity > 0.9 {
        Color::RED // clipping
    } else if intensity > 0.7 {
        Color::ORANGE
    } else if intensity > 0.5 {
        Color::YELLOW
    } else if intensity > 0.3 {
        Color::GREEN
    } else if intensity > 0.1 {
        Color::LIME
    } else {
        Color::OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_bands() {
        assert_eq!(intensity_color(0.95), Color::RED);
        assert_eq!(intensity_color(0.5), Color::GREEN);
        assert_eq!(intensity_color(0.0), Color::OFF);
    }
}
