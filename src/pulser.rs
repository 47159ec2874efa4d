//! Output-enable pulse generation.
//!
//! Brightness correctness hangs on this module: the display interval of
//! bit-plane `k` must be `BASE_TIME_NANOS << k`, and the OFF edge must have
//! happened before the refresh engine strobes the next plane. Plane times
//! span three orders of magnitude, from ~130 ns to ~133 µs, so the delay
//! source backing the pulser has to be nanosecond-class: a calibrated spin
//! or a hardware timer, whatever the platform's `DelayNs` provides.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;

use crate::gpio::Gpio;
use crate::pinout;
use crate::BIT_PLANES;

/// Base display time of the least significant bit-plane, in nanoseconds.
///
/// Lower values raise the refresh rate at the cost of overall brightness.
/// Good values are between 100 and 200.
pub const BASE_TIME_NANOS: u32 = 130;

/// On-time of bit-plane `plane`: `BASE_TIME_NANOS << plane`.
#[must_use]
pub const fn pulse_nanos(plane: usize) -> u32 {
    BASE_TIME_NANOS << plane
}

/// Generator of binary-weighted ON-pulses on the output-enable pin(s).
///
/// `send_pulse` starts the pulse for one bit-plane; `wait_pulse_finished`
/// blocks until the in-flight pulse (if any) has completed its OFF edge and
/// is idempotent when none is active. Pulses never overlap on one pulser.
pub trait PinPulser {
    /// Display bit-plane `plane` for its binary-weighted interval.
    fn send_pulse<G: Gpio>(&mut self, io: &mut G, plane: usize);

    /// Block until the pulse started by the last `send_pulse` is over.
    fn wait_pulse_finished<G: Gpio>(&mut self, io: &mut G);
}

/// The output-enable pins declared by
/// [`BcmFrameBuffer::init_gpio`](crate::framebuffer::BcmFrameBuffer::init_gpio),
/// ready to hand to a pulser.
#[derive(Debug, Clone, Copy)]
pub struct OutputEnablePins {
    pub(crate) word0: u32,
}

#[cfg(feature = "defmt")]
impl defmt::Format for OutputEnablePins {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "OutputEnablePins({})", self.word0);
    }
}

impl OutputEnablePins {
    pub(crate) fn new() -> Self {
        Self {
            word0: pinout::output_enable_mask().raw(),
        }
    }
}

static OE_PULSER_TAKEN: AtomicBool = AtomicBool::new(false);

/// Busy-wait pulser driven by a nanosecond delay source.
///
/// OE is active low, so the pulse is clear-bits, spin, set-bits; the OFF
/// edge has happened by the time `send_pulse` returns, which makes
/// `wait_pulse_finished` a no-op. A platform with a one-shot hardware timer
/// can provide its own [`PinPulser`] instead and reclaim the spin time of
/// the long planes.
pub struct TimerPulser<D> {
    delay: D,
    oe0: u32,
    timings: [u32; BIT_PLANES],
}

impl<D: DelayNs> TimerPulser<D> {
    /// Claim the process-wide pulser.
    ///
    /// The output-enable line is a physical resource, so only the first
    /// call succeeds; later calls return `None`. Thread-safe.
    pub fn take(pins: OutputEnablePins, delay: D) -> Option<Self> {
        if OE_PULSER_TAKEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(Self::new(pins, delay))
        } else {
            None
        }
    }

    pub(crate) fn new(pins: OutputEnablePins, delay: D) -> Self {
        let mut timings = [0u32; BIT_PLANES];
        let mut plane = 0;
        while plane < BIT_PLANES {
            timings[plane] = pulse_nanos(plane);
            plane += 1;
        }
        Self {
            delay,
            oe0: pins.word0,
            timings,
        }
    }
}

impl<D: DelayNs> PinPulser for TimerPulser<D> {
    fn send_pulse<G: Gpio>(&mut self, io: &mut G, plane: usize) {
        io.clear_bits(self.oe0, 0); // active low: on
        self.delay.delay_ns(self.timings[plane]);
        io.set_bits(self.oe0, 0); // off edge before returning
    }

    fn wait_pulse_finished<G: Gpio>(&mut self, _io: &mut G) {}
}
