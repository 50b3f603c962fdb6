use criterion::{black_box, criterion_group, criterion_main, Criterion};
use swap_or_not_shuffle::{compute_shuffled_index, shuffle_list as fast_shuffle};

const SHUFFLE_ROUND_COUNT: u8 = 90;

fn shuffle_list(seed: &[u8], list_size: usize) -> Vec<usize> {
    let mut output = Vec::with_capacity(list_size);
    for i in 0..list_size {
        output.push(compute_shuffled_index(i, list_size, seed, SHUFFLE_ROUND_COUNT).unwrap());
    }
    output
}

fn shuffles(c: &mut Criterion) {
    let seed = [42; 32];

    c.bench_function("single swap", |b| {
        b.iter(|| black_box(compute_shuffled_index(0, 10, &seed, SHUFFLE_ROUND_COUNT)))
    });

    c.bench_function("whole list of size 8", |b| {
        b.iter(|| black_box(shuffle_list(&seed, 8)))
    });

    for size in [512, 16_384, 1_000_000] {
        c.bench_function(&format!("_fast_ whole list of size {}", size), |b| {
            let list: Vec<usize> = (0..size).collect();
            b.iter(|| black_box(fast_shuffle(list.clone(), SHUFFLE_ROUND_COUNT, &seed, true)))
        });
    }
}

criterion_group!(benches, shuffles);
criterion_main!(benches);
