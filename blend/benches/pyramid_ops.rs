#![allow(unused)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use multiblend::pixel::Pixel;
use multiblend::pyramid_ops::{Boundary, ExpandOp, LPImage, expand, reduce};

fn checkerboard(width: usize, height: usize) -> LPImage {
  let mut img = LPImage::new(width, height);
  for y in 0..height {
    for x in 0..width {
      let v = if (x + y) % 2 == 0 { 200 } else { 40 };
      img.set(x, y, Pixel::new(v, v, v, 255).to_lp());
    }
  }
  img
}

fn pyramid_ops_benchmark(c: &mut Criterion) {
  let src = checkerboard(1024, 1024);

  c.bench_function("reduce_1024_clamp", |b| {
    b.iter(|| black_box(reduce(black_box(&src), Boundary::Clamp)));
  });

  c.bench_function("reduce_1024_wraparound", |b| {
    b.iter(|| black_box(reduce(black_box(&src), Boundary::Wraparound)));
  });

  let reduced = reduce(&src, Boundary::Clamp);
  c.bench_function("expand_512_to_1024", |b| {
    b.iter_batched(
      || src.clone(),
      |mut dst| {
        expand(black_box(&reduced), &mut dst, ExpandOp::Subtract, Boundary::Clamp);
        black_box(dst);
      },
      criterion::BatchSize::SmallInput,
    );
  });
}

criterion_group!(benches, pyramid_ops_benchmark);
criterion_main!(benches);
