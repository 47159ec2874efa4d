//! Translation of 8-bit sRGB channel values into the 11-bit linear levels
//! the bit-planes encode.
//!
//! Two curves are available per framebuffer: CIE1931 perceptual luminance
//! correction (the default, and the one that makes fades look even to the
//! eye) and a plain linear ramp. Both fold the 1–100 brightness scale into
//! the result. The corrected curve is served from a lazily built
//! 256×100 lookup table so the pixel path never evaluates a cube.

use spin::Once;

use crate::BIT_PLANES;

/// Largest value a channel can map to: all eleven planes on.
pub const MAX_LEVEL: u16 = (1 << BIT_PLANES) - 1;

static CIE1931_TABLE: Once<[[u16; 100]; 256]> = Once::new();

// CIE1931 lightness curve, inverted to give linear light for perceived
// brightness. The x <= 8 toe is the linear segment of the standard.
fn cie1931_level(c: u8, brightness: u8) -> u16 {
    let x = f32::from(c) * f32::from(brightness) / 255.0;
    let y = if x <= 8.0 {
        x / 903.3
    } else {
        libm::powf((x + 16.0) / 116.0, 3.0)
    };
    (f32::from(MAX_LEVEL) * y) as u16
}

fn cie1931_table() -> &'static [[u16; 100]; 256] {
    CIE1931_TABLE.call_once(|| {
        let mut table = [[0u16; 100]; 256];
        for (c, row) in table.iter_mut().enumerate() {
            for (b, level) in row.iter_mut().enumerate() {
                *level = cie1931_level(c as u8, b as u8 + 1);
            }
        }
        table
    })
}

#[cfg(feature = "invert-display")]
const fn color_out_bits(level: u16) -> u16 {
    level ^ MAX_LEVEL
}

#[cfg(not(feature = "invert-display"))]
const fn color_out_bits(level: u16) -> u16 {
    level
}

/// Map one channel value to its bit-plane level.
///
/// `brightness` must be in `1..=100` (the framebuffer guarantees this).
/// With `luminance_correct` the CIE1931 table is used; otherwise the value
/// is scaled by brightness and left-aligned into the planes. Under the
/// `invert-display` feature the result is complemented over all planes.
#[must_use]
pub fn map_color(c: u8, brightness: u8, luminance_correct: bool) -> u16 {
    debug_assert!(brightness >= 1 && brightness <= 100);
    let level = if luminance_correct {
        cie1931_table()[c as usize][usize::from(brightness) - 1]
    } else {
        let scaled = u16::from(c) * u16::from(brightness) / 100;
        scaled << (BIT_PLANES - 8)
    };
    color_out_bits(level)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    // Undo the invert option so the same expectations hold under every
    // feature combination.
    fn level(c: u8, brightness: u8, corrected: bool) -> u16 {
        color_out_bits(map_color(c, brightness, corrected))
    }

    #[test]
    fn test_corrected_endpoints() {
        // Black stays black at any brightness.
        assert_eq!(level(0, 100, true), 0);
        assert_eq!(level(0, 1, true), 0);
        // Full white at full brightness lands on x = 100, exactly the top
        // of the curve: ((100 + 16) / 116)^3 = 1.
        assert_eq!(level(255, 100, true), MAX_LEVEL);
    }

    #[test]
    fn test_corrected_linear_toe() {
        // 255 at brightness 1 gives x = 1.0, inside the toe:
        // 2047 * 1 / 903.3 = 2.26.
        assert_eq!(level(255, 1, true), 2);
        // x = 10 * 100 / 255 = 3.92: 2047 * 3.92 / 903.3 = 8.88.
        assert_eq!(level(10, 100, true), 8);
    }

    #[test]
    fn test_corrected_cube_segment() {
        // x = 128 * 100 / 255 = 50.196; ((x + 16) / 116)^3 = 0.18583;
        // 2047 * 0.18583 = 380.4.
        assert_eq!(level(128, 100, true), 380);
    }

    #[test]
    fn test_corrected_monotonic_in_channel() {
        for brightness in [1u8, 25, 50, 100] {
            let mut last = 0;
            for c in 0..=255u8 {
                let now = level(c, brightness, true);
                assert!(now >= last, "c={c} brightness={brightness}");
                last = now;
            }
        }
    }

    #[test]
    fn test_corrected_monotonic_in_brightness() {
        for c in [1u8, 64, 128, 255] {
            let mut last = 0;
            for brightness in 1..=100u8 {
                let now = level(c, brightness, true);
                assert!(now >= last, "c={c} brightness={brightness}");
                last = now;
            }
        }
    }

    #[test]
    fn test_linear_mode_left_aligns() {
        assert_eq!(level(255, 100, false), 2040); // 255 << 3
        assert_eq!(level(0, 100, false), 0);
        // 128 at brightness 50: 64 << 3 = 512, a single plane.
        assert_eq!(level(128, 50, false), 512);
        assert_eq!(level(128, 50, false).count_ones(), 1);
    }

    #[test]
    fn test_linear_mode_brightness_scaling() {
        assert_eq!(level(100, 100, false), 100 << 3);
        assert_eq!(level(100, 50, false), 50 << 3);
        assert_eq!(level(100, 1, false), 1 << 3);
    }

    #[test]
    fn test_table_matches_direct_evaluation() {
        for (c, brightness) in [(17u8, 3u8), (99, 42), (200, 77), (255, 100)] {
            assert_eq!(
                cie1931_table()[c as usize][usize::from(brightness) - 1],
                cie1931_level(c, brightness)
            );
        }
    }

    #[test]
    fn test_levels_fit_in_planes() {
        for c in (0..=255u8).step_by(5) {
            for brightness in (1..=100u8).step_by(7) {
                assert!(level(c, brightness, true) <= MAX_LEVEL);
                assert!(level(c, brightness, false) <= MAX_LEVEL);
            }
        }
    }

    #[cfg(feature = "invert-display")]
    #[test]
    fn test_invert_complements_over_planes() {
        assert_eq!(map_color(0, 100, true), MAX_LEVEL);
        assert_eq!(map_color(255, 100, true), 0);
        assert_eq!(map_color(128, 50, false), 512 ^ MAX_LEVEL);
    }
}
