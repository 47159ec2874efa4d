// Run with:  cargo bench --bench set_pixel

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use embedded_graphics::prelude::Point;
use hub75_matrix::{compute_double_rows, BcmFrameBuffer, Color};

const ROWS: usize = 32;
const COLS: usize = 64;
const NROWS: usize = compute_double_rows(ROWS);

fn set_pixel(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_pixel");
    group.throughput(Throughput::Elements((ROWS * COLS) as u64));

    group.bench_function("bcm_framebuffer", |b| {
        let mut fb = BcmFrameBuffer::<ROWS, COLS, NROWS, 1>::new();
        fb.clear();

        b.iter(|| {
            for y in 0..ROWS {
                for x in 0..COLS {
                    black_box(&mut fb).set_pixel(
                        black_box(Point::new(x as i32, y as i32)),
                        black_box(Color::new(255, 40, 0)),
                    );
                }
            }
        });
    });

    group.finish();
}

criterion_group!(benches, set_pixel);
criterion_main!(benches);
