use criterion::{criterion_group, criterion_main, Criterion};
use haarcam::{
    convert::{convert, convert_reference},
    lut::ColorLookupTable,
    pixel::{Frame16, Packed16, Yuv422Frame},
};
use std::hint::black_box;

fn yuyv_pattern(width: u32, height: u32) -> Vec<u8> {
    (0..width as usize * height as usize * 2)
        .map(|i| (i * 7 % 251) as u8)
        .collect()
}

pub fn benchmark_convert(c: &mut Criterion) {
    let dims = [(320, 240), (432, 240), (640, 480)];
    let lut = ColorLookupTable::build();

    let mut group = c.benchmark_group("convert");
    for (width, height) in dims.iter().copied() {
        let data = yuyv_pattern(width, height);
        let mut out = Frame16::new(width, height, Packed16::BLACK);

        group.bench_function(format!("lut/{}x{}", width, height), |b| {
            b.iter(|| {
                let frame = Yuv422Frame::new(black_box(&data)).unwrap();
                convert(frame, &lut, &mut out).unwrap()
            })
        });
        group.bench_function(format!("reference/{}x{}", width, height), |b| {
            b.iter(|| {
                let frame = Yuv422Frame::new(black_box(&data)).unwrap();
                convert_reference(frame, &mut out).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_convert);
criterion_main!(benches);
