//! The bit-plane framebuffer and the refresh pass that feeds it to the
//! panels.
//!
//! # Internal format
//!
//! The frame is not stored as pixels. It is stored as the exact GPIO words
//! the refresh engine will emit: for every scan row, [`BIT_PLANES`]
//! contiguous planes of `COLS` packed words, each word carrying the color
//! lanes of every parallel chain for one column. Writing a pixel therefore
//! does all the expensive work once (luminance-correct the channels,
//! scatter their bits across the planes, merge them into the right lane
//! positions) and the refresh pass degenerates into a linear walk emitting
//! one word per column.
//!
//! Plane `b` of scan row `r` lives at word offset `r·COLS·11 + b·COLS`, so
//! a (row, plane) pair is one contiguous slice: the unit the inner refresh
//! loop consumes.
//!
//! # Refresh
//!
//! [`BcmFrameBuffer::dump_to_matrix`] clocks one whole frame out. Per scan
//! row it selects the address once (row switches mid-pulse cause ghosting),
//! then walks the displayed planes: shift in the next plane's columns while
//! the previous plane is still lit, wait out the previous output-enable
//! pulse, latch, and pulse the new plane for its binary-weighted interval.
//!
//! # Example
//! ```rust
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{Circle, PrimitiveStyle};
//! use hub75_matrix::{compute_double_rows, BcmFrameBuffer, Color};
//!
//! const ROWS: usize = 32;
//! const COLS: usize = 64;
//! const NROWS: usize = compute_double_rows(ROWS);
//!
//! let mut fb = BcmFrameBuffer::<ROWS, COLS, NROWS, 1>::new();
//! fb.clear();
//! fb.set_pixel(Point::new(3, 7), Color::new(255, 80, 0));
//!
//! // Or treat it as an embedded-graphics canvas.
//! Circle::new(Point::new(20, 8), 12)
//!     .into_styled(PrimitiveStyle::with_fill(Color::new(0, 0, 255)))
//!     .draw(&mut fb)
//!     .unwrap();
//! ```

use core::convert::Infallible;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

use crate::gpio::Gpio;
use crate::luminance::map_color;
use crate::pinout::{self, IoWord0, CHAINS_WORD0};
#[cfg(feature = "extended-chains-5")]
use crate::pinout::IoWord1;
use crate::pulser::{OutputEnablePins, PinPulser};
use crate::{Color, ConfigError, BIT_PLANES, MAX_PARALLEL, SUB_PANELS};

/// One scan row: all bit-planes, each a contiguous run of column words.
#[derive(Clone, Copy)]
#[repr(C)]
struct ScanRow<W, const COLS: usize> {
    planes: [[W; COLS]; BIT_PLANES],
}

impl<W: Copy, const COLS: usize> ScanRow<W, COLS> {
    const fn filled(word: W) -> Self {
        Self {
            planes: [[word; COLS]; BIT_PLANES],
        }
    }
}

/// Bit-plane framebuffer for a chain of HUB75 panels.
///
/// # Type parameters
/// - `ROWS`: scan height of a single panel (8, 16, 32 or 64)
/// - `COLS`: total pixel width of a chain
/// - `NROWS`: scan addresses per panel; always
///   [`compute_double_rows(ROWS)`](crate::compute_double_rows)
/// - `PARALLEL`: independent chains on disjoint color lanes (1 to
///   [`MAX_PARALLEL`])
///
/// The drawable canvas is `COLS` × `ROWS * PARALLEL` pixels; chain `n`
/// owns rows `n*ROWS..(n+1)*ROWS`.
///
/// Geometry is validated in [`new`](Self::new); violations panic at
/// construction. The two runtime knobs, [`set_pwm_bits`](Self::set_pwm_bits)
/// and [`set_brightness`](Self::set_brightness), validate recoverably.
pub struct BcmFrameBuffer<
    const ROWS: usize,
    const COLS: usize,
    const NROWS: usize,
    const PARALLEL: usize,
> {
    rows0: [ScanRow<IoWord0, COLS>; NROWS],
    #[cfg(feature = "extended-chains-5")]
    rows1: [ScanRow<IoWord1, COLS>; NROWS],
    pwm_bits: u8,
    brightness: u8,
    luminance_correct: bool,
}

impl<const ROWS: usize, const COLS: usize, const NROWS: usize, const PARALLEL: usize> Default
    for BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize, const NROWS: usize, const PARALLEL: usize>
    BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>
{
    /// Create a zeroed framebuffer.
    ///
    /// Call [`clear`](Self::clear) before first use; with the
    /// `invert-display` feature the all-off state is not all-zeroes.
    #[must_use]
    pub const fn new() -> Self {
        assert!(ROWS == 8 || ROWS == 16 || ROWS == 32 || ROWS == 64);
        assert!(NROWS == ROWS / SUB_PANELS);
        assert!(PARALLEL >= 1 && PARALLEL <= MAX_PARALLEL);
        Self {
            rows0: [ScanRow::filled(IoWord0::new()); NROWS],
            #[cfg(feature = "extended-chains-5")]
            rows1: [ScanRow::filled(IoWord1::new()); NROWS],
            pwm_bits: BIT_PLANES as u8,
            brightness: 100,
            luminance_correct: true,
        }
    }

    /// Canvas width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        COLS
    }

    /// Canvas height in pixels, across all parallel chains.
    #[must_use]
    pub const fn height(&self) -> usize {
        ROWS * PARALLEL
    }

    /// Bit-planes currently displayed per frame.
    #[must_use]
    pub const fn pwm_bits(&self) -> u8 {
        self.pwm_bits
    }

    /// Current brightness in percent.
    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Whether CIE1931 luminance correction is applied.
    #[must_use]
    pub const fn luminance_correct(&self) -> bool {
        self.luminance_correct
    }

    /// Select how many of the 11 bit-planes are displayed.
    ///
    /// Fewer planes trade brightness resolution for refresh rate. Takes
    /// effect for pixels written afterwards and for the next frame the
    /// refresh engine starts.
    pub fn set_pwm_bits(&mut self, bits: u8) -> Result<(), ConfigError> {
        if bits < 1 || usize::from(bits) > BIT_PLANES {
            return Err(ConfigError::PwmBits(bits));
        }
        trace!("pwm bits -> {}", bits);
        self.pwm_bits = bits;
        Ok(())
    }

    /// Set brightness in percent (1 to 100); applies to pixels written
    /// afterwards.
    pub fn set_brightness(&mut self, brightness: u8) -> Result<(), ConfigError> {
        if brightness < 1 || brightness > 100 {
            return Err(ConfigError::Brightness(brightness));
        }
        self.brightness = brightness;
        Ok(())
    }

    /// Toggle CIE1931 luminance correction (on by default); applies to
    /// pixels written afterwards.
    pub fn set_luminance_correct(&mut self, on: bool) {
        self.luminance_correct = on;
    }

    /// Map a drawing color onto per-channel plane levels, honoring
    /// brightness, the correction curve and the green/blue swap option.
    fn map_rgb(&self, color: Color) -> (u16, u16, u16) {
        let (green_in, blue_in) = if cfg!(feature = "swap-green-blue") {
            (color.b(), color.g())
        } else {
            (color.g(), color.b())
        };
        (
            map_color(color.r(), self.brightness, self.luminance_correct),
            map_color(green_in, self.brightness, self.luminance_correct),
            map_color(blue_in, self.brightness, self.luminance_correct),
        )
    }

    /// Reset the whole canvas to all-off.
    ///
    /// Unlike [`fill`](Self::fill) with black this covers every plane, not
    /// only the displayed ones, so no stale bits survive a later
    /// `set_pwm_bits`.
    pub fn clear(&mut self) {
        let off = if cfg!(feature = "invert-display") {
            // Inverted zero: every lane on in every plane.
            pinout::plane_template(PARALLEL, true, true, true)
        } else {
            IoWord0::new()
        };
        for row in &mut self.rows0 {
            for plane in &mut row.planes {
                for word in plane.iter_mut() {
                    *word = off;
                }
            }
        }
        #[cfg(feature = "extended-chains-5")]
        {
            let off1 = if cfg!(feature = "invert-display") {
                pinout::plane_template1(PARALLEL, true, true, true)
            } else {
                IoWord1::new()
            };
            for row in &mut self.rows1 {
                for plane in &mut row.planes {
                    for word in plane.iter_mut() {
                        *word = off1;
                    }
                }
            }
        }
    }

    /// Set every pixel of every chain to `color`.
    ///
    /// Only the displayed planes are touched; planes below the current
    /// `pwm_bits` range keep their content.
    pub fn fill(&mut self, color: Color) {
        let (red, green, blue) = self.map_rgb(color);
        let min_plane = BIT_PLANES - usize::from(self.pwm_bits);
        for bit in min_plane..BIT_PLANES {
            let mask = 1u16 << bit;
            let template = pinout::plane_template(
                PARALLEL,
                (red & mask) != 0,
                (green & mask) != 0,
                (blue & mask) != 0,
            );
            for row in &mut self.rows0 {
                for word in row.planes[bit].iter_mut() {
                    *word = template;
                }
            }
            #[cfg(feature = "extended-chains-5")]
            {
                let template1 = pinout::plane_template1(
                    PARALLEL,
                    (red & mask) != 0,
                    (green & mask) != 0,
                    (blue & mask) != 0,
                );
                for row in &mut self.rows1 {
                    for word in row.planes[bit].iter_mut() {
                        *word = template1;
                    }
                }
            }
        }
    }

    /// Set one pixel. Out-of-range coordinates are a silent no-op.
    pub fn set_pixel(&mut self, p: Point, color: Color) {
        if p.x < 0 || p.y < 0 {
            return;
        }
        self.set_pixel_internal(p.x as usize, p.y as usize, color);
    }

    fn set_pixel_internal(&mut self, x: usize, y: usize, color: Color) {
        if x >= COLS || y >= ROWS * PARALLEL {
            return;
        }
        let (red, green, blue) = self.map_rgb(color);

        let chain = y / ROWS;
        let y_in_chain = y % ROWS;
        let upper = y_in_chain < NROWS;
        let double_row = y_in_chain & (NROWS - 1);
        let min_plane = BIT_PLANES - usize::from(self.pwm_bits);

        // Only this pixel's lanes are written; bits of other chains and
        // sub-panels sharing the word belong to other pixels.
        if chain < CHAINS_WORD0 {
            let row = &mut self.rows0[double_row];
            for bit in min_plane..BIT_PLANES {
                let mask = 1u16 << bit;
                row.planes[bit][x].set_color(
                    chain,
                    upper,
                    (red & mask) != 0,
                    (green & mask) != 0,
                    (blue & mask) != 0,
                );
            }
        }
        #[cfg(feature = "extended-chains-5")]
        if chain >= CHAINS_WORD0 {
            let row = &mut self.rows1[double_row];
            for bit in min_plane..BIT_PLANES {
                let mask = 1u16 << bit;
                row.planes[bit][x].set_color(
                    chain,
                    upper,
                    (red & mask) != 0,
                    (green & mask) != 0,
                    (blue & mask) != 0,
                );
            }
        }
    }

    /// Declare every pin the refresh engine will drive for this geometry.
    ///
    /// Returns the output-enable pins for pulser construction.
    ///
    /// # Panics
    /// If the backend does not support all required pins as outputs; the
    /// wiring is wrong and there is nothing to recover.
    pub fn init_gpio<G: Gpio>(io: &mut G) -> OutputEnablePins {
        let mask0 = pinout::init_mask0(PARALLEL, NROWS);
        let supported0 = io.init_outputs0(mask0.raw());
        assert!(
            supported0 == mask0.raw(),
            "GPIO backend rejected required word-0 output pins"
        );
        #[cfg(feature = "extended-chains-5")]
        {
            let mask1 = pinout::init_mask1(PARALLEL);
            let supported1 = io.init_outputs1(mask1.raw());
            assert!(
                supported1 == mask1.raw(),
                "GPIO backend rejected required word-1 output pins"
            );
        }
        debug!(
            "declared {} word-0 output pins for {} chain(s)",
            mask0.raw().count_ones(),
            PARALLEL
        );
        OutputEnablePins::new()
    }

    /// Clock one full frame into the panels.
    ///
    /// The number of displayed planes is latched on entry, so a concurrent
    /// `set_pwm_bits` never produces a fractional frame. Column writes go
    /// out under the color+clock mask only; address lines move once per
    /// scan row, and the output-enable line is exclusively the pulser's.
    pub fn dump_to_matrix<G: Gpio, P: PinPulser>(&self, io: &mut G, pulser: &mut P) {
        let color_clk_mask0 = pinout::color_clock_mask(PARALLEL);
        #[cfg(feature = "extended-chains-5")]
        let color_clk_mask1 = pinout::color_clock_mask1(PARALLEL);
        let row_mask = pinout::address_mask(NROWS);
        let clock = pinout::clock_word();
        let strobe = pinout::strobe_word();

        let pwm_to_show = usize::from(self.pwm_bits);
        for double_row in 0..NROWS {
            io.write_masked_bits(
                pinout::address_word(double_row).raw(),
                row_mask.raw(),
                0,
                0,
            );

            // The full PWM sequence of one row runs before the address
            // moves again; row switches under a lit panel ghost.
            for bit in (BIT_PLANES - pwm_to_show)..BIT_PLANES {
                let words0 = &self.rows0[double_row].planes[bit];
                #[cfg(feature = "extended-chains-5")]
                let words1 = &self.rows1[double_row].planes[bit];

                // While the previous plane is still lit we can already
                // shift in this one.
                for col in 0..COLS {
                    #[cfg(feature = "extended-chains-5")]
                    io.write_masked_bits(
                        words0[col].raw(),
                        color_clk_mask0.raw(),
                        words1[col].raw(),
                        color_clk_mask1.raw(),
                    );
                    #[cfg(not(feature = "extended-chains-5"))]
                    io.write_masked_bits(words0[col].raw(), color_clk_mask0.raw(), 0, 0);
                    io.set_bits(clock.raw(), 0); // rising edge shifts the column in
                }
                #[cfg(feature = "extended-chains-5")]
                io.clear_bits(color_clk_mask0.raw(), color_clk_mask1.raw());
                #[cfg(not(feature = "extended-chains-5"))]
                io.clear_bits(color_clk_mask0.raw(), 0);

                // The previous plane's display interval must be over
                // before the freshly shifted data is latched.
                pulser.wait_pulse_finished(io);
                io.set_bits(strobe.raw(), 0);
                io.clear_bits(strobe.raw(), 0);

                pulser.send_pulse(io, bit);
            }
            pulser.wait_pulse_finished(io);
        }
    }

    /// Leave the panels dark: shift an all-off row into every scan address
    /// and latch it, without pulsing output-enable.
    pub fn shut_down<G: Gpio>(io: &mut G) {
        let color_clk_mask0 = pinout::color_clock_mask(PARALLEL);
        #[cfg(feature = "extended-chains-5")]
        let color_clk_mask1 = pinout::color_clock_mask1(PARALLEL);
        let row_mask = pinout::address_mask(NROWS);
        let clock = pinout::clock_word();
        let strobe = pinout::strobe_word();

        let off0 = if cfg!(feature = "invert-display") {
            pinout::plane_template(PARALLEL, true, true, true).raw()
        } else {
            0
        };
        #[cfg(feature = "extended-chains-5")]
        let off1 = if cfg!(feature = "invert-display") {
            pinout::plane_template1(PARALLEL, true, true, true).raw()
        } else {
            0
        };

        for double_row in 0..NROWS {
            io.write_masked_bits(
                pinout::address_word(double_row).raw(),
                row_mask.raw(),
                0,
                0,
            );
            for _col in 0..COLS {
                #[cfg(feature = "extended-chains-5")]
                io.write_masked_bits(off0, color_clk_mask0.raw(), off1, color_clk_mask1.raw());
                #[cfg(not(feature = "extended-chains-5"))]
                io.write_masked_bits(off0, color_clk_mask0.raw(), 0, 0);
                io.set_bits(clock.raw(), 0);
            }
            #[cfg(feature = "extended-chains-5")]
            io.clear_bits(color_clk_mask0.raw(), color_clk_mask1.raw());
            #[cfg(not(feature = "extended-chains-5"))]
            io.clear_bits(color_clk_mask0.raw(), 0);
            io.set_bits(strobe.raw(), 0);
            io.clear_bits(strobe.raw(), 0);
        }
    }
}

impl<const ROWS: usize, const COLS: usize, const NROWS: usize, const PARALLEL: usize>
    OriginDimensions for BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>
{
    fn size(&self) -> Size {
        Size::new(COLS as u32, (ROWS * PARALLEL) as u32)
    }
}

impl<const ROWS: usize, const COLS: usize, const NROWS: usize, const PARALLEL: usize> DrawTarget
    for BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>
{
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel.0, pixel.1);
        }
        Ok(())
    }
}

impl<const ROWS: usize, const COLS: usize, const NROWS: usize, const PARALLEL: usize>
    core::fmt::Debug for BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BcmFrameBuffer")
            .field("rows", &ROWS)
            .field("cols", &COLS)
            .field("double_rows", &NROWS)
            .field("parallel", &PARALLEL)
            .field("pwm_bits", &self.pwm_bits)
            .field("brightness", &self.brightness)
            .field("luminance_correct", &self.luminance_correct)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize, const COLS: usize, const NROWS: usize, const PARALLEL: usize>
    defmt::Format for BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>
{
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "BcmFrameBuffer<{}, {}, {}, {}>",
            ROWS,
            COLS,
            NROWS,
            PARALLEL
        );
        defmt::write!(
            f,
            " pwm_bits: {} brightness: {} luminance_correct: {}",
            self.pwm_bits,
            self.brightness,
            self.luminance_correct
        );
    }
}
