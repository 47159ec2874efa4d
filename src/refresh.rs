//! Continuous refresh: a dedicated task scans frames out forever while the
//! application draws into a back buffer.
//!
//! The engine and the writer never touch the same buffer. [`FrameSwap`]
//! owns two framebuffers; the writer mutates the back one and publishes it
//! with [`FrameWriter::swap`], and the engine adopts the publication at the
//! top of its next frame; the swap is a pointer-sized flag flip, never a
//! copy. Release/acquire ordering on that flag is what makes the handoff
//! safe on weakly ordered cores: the engine always observes a completely
//! written frame.
//!
//! The refresh task is expected to be the only busy thing on its core (or
//! pinned to a real-time priority); it blocks nowhere except inside the
//! pulser while a long plane is lit.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::framebuffer::BcmFrameBuffer;
use crate::gpio::Gpio;
use crate::pulser::PinPulser;

/// Double buffer shared between one writer and one refresh engine.
///
/// Create it with both buffers, then [`split`](Self::split) it into the two
/// role handles. The struct itself is typically placed in a `static` or on
/// a stack frame outliving both tasks.
pub struct FrameSwap<FB> {
    buffers: [UnsafeCell<FB>; 2],
    front: AtomicUsize,
    pending: AtomicBool,
}

// The writer handle only ever dereferences the back buffer and the source
// handle only the front one; the `pending` flag hands a buffer from one
// side to the other with release/acquire ordering.
unsafe impl<FB: Send> Sync for FrameSwap<FB> {}

impl<FB> FrameSwap<FB> {
    /// Wrap two framebuffers; the first starts out as the displayed one.
    pub const fn new(front: FB, back: FB) -> Self {
        Self {
            buffers: [UnsafeCell::new(front), UnsafeCell::new(back)],
            front: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Split into the writer handle and the refresh engine's handle.
    pub fn split(&mut self) -> (FrameWriter<'_, FB>, FrameSource<'_, FB>) {
        let shared: &Self = self;
        (FrameWriter { swap: shared }, FrameSource { swap: shared })
    }
}

/// The application side of a [`FrameSwap`]: draw, then publish.
pub struct FrameWriter<'a, FB> {
    swap: &'a FrameSwap<FB>,
}

impl<FB> FrameWriter<'_, FB> {
    /// Borrow the back buffer for drawing.
    ///
    /// If a swap is still pending this spins until the engine has picked it
    /// up; with a running engine that is at most one frame.
    pub fn frame(&mut self) -> &mut FB {
        while self.swap.pending.load(Ordering::Acquire) {
            core::hint::spin_loop();
        }
        let back = 1 - self.swap.front.load(Ordering::Acquire);
        unsafe { &mut *self.swap.buffers[back].get() }
    }

    /// Publish the back buffer.
    ///
    /// The refresh engine switches to it at the top of its next frame;
    /// until then the back buffer is in handoff and
    /// [`frame`](Self::frame) waits. Calling `swap` twice without drawing
    /// in between is harmless.
    pub fn swap(&mut self) {
        trace!("frame published");
        self.swap.pending.store(true, Ordering::Release);
    }
}

/// The refresh engine's side of a [`FrameSwap`].
pub struct FrameSource<'a, FB> {
    swap: &'a FrameSwap<FB>,
}

impl<FB> FrameSource<'_, FB> {
    /// Adopt a pending swap, if any, and borrow the frame to display.
    ///
    /// Called once at the top of every frame; a publication between two
    /// `latch` calls takes effect on the next one.
    pub fn latch(&mut self) -> &FB {
        if self.swap.pending.load(Ordering::Acquire) {
            let front = self.swap.front.load(Ordering::Acquire);
            self.swap.front.store(1 - front, Ordering::Release);
            self.swap.pending.store(false, Ordering::Release);
        }
        let front = self.swap.front.load(Ordering::Acquire);
        unsafe { &*self.swap.buffers[front].get() }
    }
}

/// Scan frames out until `running` goes false, then leave the panels dark.
///
/// This is the body of the dedicated refresh task. A frame in progress when
/// the flag drops is completed (stopping mid-row would leave stale
/// shift-register contents lit indefinitely) and one final all-off frame
/// is clocked in on the way out.
pub fn refresh_loop<
    const ROWS: usize,
    const COLS: usize,
    const NROWS: usize,
    const PARALLEL: usize,
    G: Gpio,
    P: PinPulser,
>(
    source: &mut FrameSource<'_, BcmFrameBuffer<ROWS, COLS, NROWS, PARALLEL>>,
    io: &mut G,
    pulser: &mut P,
    running: &AtomicBool,
) {
    info!("refresh loop running");
    while running.load(Ordering::Acquire) {
        let frame = source.latch();
        frame.dump_to_matrix(io, pulser);
    }
    BcmFrameBuffer::<ROWS, COLS, NROWS, PARALLEL>::shut_down(io);
    info!("refresh loop stopped, panels blanked");
}
