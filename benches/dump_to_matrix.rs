// Run with:  cargo bench --bench dump_to_matrix
//
// Frame scan-out against a do-nothing GPIO backend: measures the pure
// memory-walk cost of the refresh pass, i.e. the refresh-rate ceiling.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_hal::delay::DelayNs;
use hub75_matrix::{compute_double_rows, BcmFrameBuffer, Color, Gpio, TimerPulser};

const ROWS: usize = 32;
const COLS: usize = 64;
const NROWS: usize = compute_double_rows(ROWS);

type FrameBuffer = BcmFrameBuffer<ROWS, COLS, NROWS, 1>;

struct NullGpio;

impl Gpio for NullGpio {
    fn init_outputs0(&mut self, mask: u32) -> u32 {
        mask
    }
    fn init_outputs1(&mut self, mask: u32) -> u32 {
        mask
    }
    fn write_masked_bits(&mut self, value0: u32, mask0: u32, value1: u32, mask1: u32) {
        black_box((value0, mask0, value1, mask1));
    }
    fn set_bits(&mut self, bits0: u32, bits1: u32) {
        black_box((bits0, bits1));
    }
    fn clear_bits(&mut self, bits0: u32, bits1: u32) {
        black_box((bits0, bits1));
    }
}

struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fn dump_to_matrix(c: &mut Criterion) {
    let mut io = NullGpio;
    let pins = FrameBuffer::init_gpio(&mut io);
    let mut pulser = TimerPulser::take(pins, NoopDelay).expect("first take");

    let mut fb = FrameBuffer::new();
    fb.clear();
    fb.fill(Color::new(200, 100, 50));

    let mut group = c.benchmark_group("dump_to_matrix");
    group.throughput(Throughput::Elements((ROWS * COLS) as u64));

    group.bench_function("full_depth", |b| {
        b.iter(|| {
            black_box(&fb).dump_to_matrix(&mut io, &mut pulser);
        });
    });

    group.bench_function("eight_planes", |b| {
        fb.set_pwm_bits(8).unwrap();
        b.iter(|| {
            black_box(&fb).dump_to_matrix(&mut io, &mut pulser);
        });
    });

    group.finish();
}

criterion_group!(benches, dump_to_matrix);
criterion_main!(benches);
