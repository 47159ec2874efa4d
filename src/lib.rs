//! Bit-plane framebuffer and refresh engine for HUB75 RGB LED matrix panels
//! driven over plain GPIO.
//!
//! ## How HUB75 panels are driven
//!
//! HUB75 panels have no memory of their own beyond one row of shift
//! registers. The controller owns the whole image and continuously streams
//! it out:
//!
//! - **R1 G1 B1 / R2 G2 B2** – one serial color bit per channel for the
//!   upper and lower half of the addressed scan row
//! - **CLK** – shifts the color bits one column further on each rising edge
//! - **STB** (latch) – copies the shift registers onto the row drivers
//! - **OE** – active-low gate on the row drivers; the LEDs are lit only
//!   while OE is low
//! - **A..E** – scan-row address; each address lights two physical rows at
//!   once (one per sub-panel)
//!
//! A single pass over all scan rows lights every LED either fully on or
//! fully off. Intermediate brightness comes from Binary Code Modulation
//! (BCM): the 11-bit color value of each channel is split into bit-planes,
//! and plane *k* is displayed for `T0 << k` nanoseconds. Summed over one
//! frame, the on-time of an LED is proportional to its color value.
//!
//! ## What this crate provides
//!
//! - [`BcmFrameBuffer`]: the frame held in refresh-friendly form: for each
//!   scan row, eleven contiguous bit-planes of pre-packed GPIO words, one
//!   word per column. Writing a pixel is the expensive direction
//!   (color-correct, then scatter bits over the planes); the refresh pass is
//!   a straight memory walk.
//! - [`dump_to_matrix`](framebuffer::BcmFrameBuffer::dump_to_matrix): clocks
//!   one full frame into the panels through a [`Gpio`] backend, latching
//!   rows and gating them through the output-enable pulser.
//! - [`TimerPulser`]: generates the binary-weighted OE pulses from a
//!   nanosecond delay source.
//! - [`FrameSwap`](refresh::FrameSwap) and
//!   [`refresh_loop`](refresh::refresh_loop): double-buffered handoff
//!   between an application writer and a dedicated refresh task.
//! - [`mapping`]: fold one long chain of panels into a grid and draw on it
//!   as a single `embedded-graphics` canvas.
//!
//! Color input is 24-bit sRGB; values pass through CIE1931 perceptual
//! luminance correction (or a plain linear ramp) and a 1–100 brightness
//! scale before they are scattered into the planes.
//!
//! ## Hardware variants
//!
//! Board differences are compile-time Cargo features, mirroring how the
//! panels themselves differ at solder time rather than at runtime:
//! `single-chain-only`, `single-sub-panel`, `extended-chains-5`,
//! `swap-green-blue`, `invert-display` and `legacy-rev1-pinout`. See the
//! manifest for the exact effect of each.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

mod fmt;

pub mod framebuffer;
pub mod gpio;
pub mod luminance;
pub mod mapping;
mod pinout;
pub mod pulser;
pub mod refresh;

use embedded_graphics::pixelcolor::Rgb888;

pub use framebuffer::BcmFrameBuffer;
pub use gpio::Gpio;
pub use pulser::{OutputEnablePins, PinPulser, TimerPulser};
pub use refresh::{refresh_loop, FrameSource, FrameSwap, FrameWriter};

/// Color type accepted by all drawing operations.
pub type Color = Rgb888;

/// Maximum usable bit-planes per color channel.
///
/// Plane `k` is displayed for `BASE_TIME_NANOS << k`, so eleven planes span
/// three orders of magnitude of on-time; more would make the longest plane
/// visibly flicker.
pub const BIT_PLANES: usize = 11;

/// Physical rows lit per scan address: 2 on normal multiplexed panels,
/// 1 with the `single-sub-panel` feature.
pub const SUB_PANELS: usize = if cfg!(feature = "single-sub-panel") {
    1
} else {
    2
};

/// Highest supported number of parallel chains for the active pinout.
pub const MAX_PARALLEL: usize = if cfg!(feature = "single-chain-only") {
    1
} else if cfg!(feature = "extended-chains-5") {
    5
} else {
    3
};

/// Computes the number of scan addresses (`NROWS`) for a panel height.
///
/// # Example
/// ```rust
/// assert_eq!(hub75_matrix::compute_double_rows(32), 32 / hub75_matrix::SUB_PANELS);
/// ```
#[must_use]
pub const fn compute_double_rows(rows: usize) -> usize {
    rows / SUB_PANELS
}

/// Rejected runtime configuration values.
///
/// Geometry problems are construction-time panics; only the two runtime
/// knobs are recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `set_pwm_bits` outside `1..=11`.
    PwmBits(u8),
    /// `set_brightness` outside `1..=100`.
    Brightness(u8),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PwmBits(v) => write!(f, "pwm bits {v} outside 1..=11"),
            Self::Brightness(v) => write!(f, "brightness {v} outside 1..=100"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::PwmBits(v) => defmt::write!(f, "pwm bits {} outside 1..=11", v),
            Self::Brightness(v) => defmt::write!(f, "brightness {} outside 1..=100", v),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::format;

    use super::*;

    #[test]
    fn test_compute_double_rows() {
        for rows in [8, 16, 32, 64] {
            assert_eq!(compute_double_rows(rows), rows / SUB_PANELS);
        }
    }

    #[test]
    fn test_double_rows_are_powers_of_two() {
        // The pixel path relies on `y & (NROWS - 1)` row masking.
        for rows in [8usize, 16, 32, 64] {
            let double_rows = compute_double_rows(rows);
            assert!(double_rows.is_power_of_two());
        }
    }

    #[test]
    fn test_parallel_limit_matches_pinout() {
        #[cfg(feature = "single-chain-only")]
        assert_eq!(MAX_PARALLEL, 1);
        #[cfg(all(feature = "extended-chains-5", not(feature = "single-chain-only")))]
        assert_eq!(MAX_PARALLEL, 5);
        #[cfg(not(any(feature = "extended-chains-5", feature = "single-chain-only")))]
        assert_eq!(MAX_PARALLEL, 3);
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            format!("{}", ConfigError::PwmBits(12)),
            "pwm bits 12 outside 1..=11"
        );
        assert_eq!(
            format!("{}", ConfigError::Brightness(0)),
            "brightness 0 outside 1..=100"
        );
    }
}
