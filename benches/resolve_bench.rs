use byteorder::{LittleEndian, WriteBytesExt};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kw6::Reader;
use std::io::Cursor;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// `frames` positions with one camera each. With `vary`, every 5th
/// position carries a second camera.
fn recording(frames: i64, vary: bool) -> Vec<u8> {
    let mut buf = b"KW6FileClassVer1.0 ".to_vec();
    for frame_index in 0..frames {
        let n_cameras = if vary && frame_index % 5 == 0 { 2 } else { 1 };
        let len = 48 + n_cameras * (272 + (WIDTH * HEIGHT) as u64);
        for value in [len as f64, 1.0, frame_index as f64, -0.5, -1.5, n_cameras as f64] {
            buf.write_f64::<LittleEndian>(value).unwrap();
        }
        for camera_index in 0..n_cameras {
            for i in 0..17 {
                let value = match i {
                    1 => camera_index as f64,
                    12 => WIDTH as f64,
                    13 => HEIGHT as f64,
                    _ => 0.5,
                };
                buf.write_f64::<LittleEndian>(value).unwrap();
            }
            buf.extend(std::iter::repeat(0u8).take(136));
            buf.extend((0..WIDTH * HEIGHT).map(|p| (p % 251) as u8));
        }
    }
    buf
}

fn bench_random_access(c: &mut Criterion) {
    let constant = recording(2_000, false);
    let variable = recording(2_000, true);

    c.bench_function("resolve_constant_cold", |b| {
        b.iter(|| {
            let mut reader = Reader::new(Cursor::new(constant.as_slice())).unwrap();
            reader.resolve(black_box(1_777)).unwrap();
        })
    });

    c.bench_function("resolve_variable_cold", |b| {
        b.iter(|| {
            let mut reader = Reader::new(Cursor::new(variable.as_slice())).unwrap();
            reader.resolve(black_box(1_777)).unwrap();
        })
    });

    c.bench_function("resolve_variable_warm", |b| {
        let mut reader = Reader::new(Cursor::new(variable.as_slice())).unwrap();
        reader.resolve(1_999).unwrap();
        b.iter(|| reader.resolve(black_box(1_777)).unwrap())
    });
}

fn bench_sequential(c: &mut Criterion) {
    let variable = recording(2_000, true);

    c.bench_function("iterate_2000_positions", |b| {
        b.iter(|| {
            let mut reader = Reader::new(Cursor::new(variable.as_slice())).unwrap();
            reader.positions().count()
        })
    });

    c.bench_function("scan_2000_headers", |b| {
        b.iter(|| {
            let mut reader = Reader::new(Cursor::new(variable.as_slice())).unwrap();
            reader.scan_length().unwrap()
        })
    });

    c.bench_function("infer_length_constant", |b| {
        let constant = recording(2_000, false);
        b.iter(|| {
            let mut reader = Reader::new(Cursor::new(constant.as_slice())).unwrap();
            reader.assumptuous_length().unwrap()
        })
    });
}

criterion_group!(benches, bench_random_access, bench_sequential);
criterion_main!(benches);
