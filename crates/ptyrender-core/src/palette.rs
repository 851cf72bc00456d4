//! Fixed 256-entry color palette.
//!
//! Entries 0-15 are the standard and bright ANSI colors. Entries 16-231 form
//! a 6x6x6 color cube and 232-255 a 24-step grayscale ramp; both ranges are
//! computed rather than tabulated so that the output is exactly reproducible.

/// Standard (0-7) and bright (8-15) colors.
const ANSI_16: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00),
    (0x80, 0x00, 0x00),
    (0x00, 0x80, 0x00),
    (0x80, 0x80, 0x00),
    (0x00, 0x00, 0x80),
    (0x80, 0x00, 0x80),
    (0x00, 0x80, 0x80),
    (0xc0, 0xc0, 0xc0),
    (0x80, 0x80, 0x80),
    (0xff, 0x00, 0x00),
    (0x00, 0xff, 0x00),
    (0xff, 0xff, 0x00),
    (0x00, 0x00, 0xff),
    (0xff, 0x00, 0xff),
    (0x00, 0xff, 0xff),
    (0xff, 0xff, 0xff),
];

/// Intensity of one color cube axis step (0-5).
pub fn cube_level(step: u8) -> u8 {
    if step == 0 {
        0
    } else {
        55 + 40 * step
    }
}

/// RGB components of a palette entry.
pub fn palette_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0..=15 => ANSI_16[index as usize],
        16..=231 => {
            let n = index - 16;
            (cube_level(n / 36), cube_level((n / 6) % 6), cube_level(n % 6))
        }
        _ => {
            let level = 8 + 10 * (index - 232);
            (level, level, level)
        }
    }
}

/// `#rrggbb` rendering of a palette entry.
pub fn resolve_palette(index: u8) -> String {
    let (r, g, b) = palette_rgb(index);
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors() {
        assert_eq!(resolve_palette(0), "#000000");
        assert_eq!(resolve_palette(1), "#800000");
        assert_eq!(resolve_palette(7), "#c0c0c0");
        assert_eq!(resolve_palette(8), "#808080");
        assert_eq!(resolve_palette(9), "#ff0000");
        assert_eq!(resolve_palette(15), "#ffffff");
    }

    #[test]
    fn test_cube_corners() {
        assert_eq!(resolve_palette(16), "#000000");
        assert_eq!(resolve_palette(21), "#0000ff");
        assert_eq!(resolve_palette(196), "#ff0000");
        assert_eq!(resolve_palette(231), "#ffffff");
        // 17 = (0,0,1) -> 55 + 40 = 95
        assert_eq!(resolve_palette(17), "#00005f");
    }

    #[test]
    fn test_grayscale_ramp() {
        assert_eq!(resolve_palette(232), "#080808");
        assert_eq!(resolve_palette(233), "#121212");
        assert_eq!(resolve_palette(255), "#eeeeee");
    }

    #[test]
    fn test_palette_is_deterministic_and_derived() {
        for index in 0..=255u8 {
            assert_eq!(resolve_palette(index), resolve_palette(index));
            let (r, g, b) = palette_rgb(index);
            if index >= 232 {
                let level = 8 + 10 * u32::from(index - 232);
                assert_eq!((u32::from(r), u32::from(g), u32::from(b)), (level, level, level));
            } else if index >= 16 {
                let n = u32::from(index - 16);
                let level = |c: u32| if c == 0 { 0 } else { 55 + 40 * c };
                assert_eq!(
                    (u32::from(r), u32::from(g), u32::from(b)),
                    (level(n / 36), level((n / 6) % 6), level(n % 6))
                );
            }
        }
    }
}
