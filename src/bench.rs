use std::io;
use std::time::Instant;

use crate::{Config, Coordinator, Xorshift1024};

#[test]
#[ignore]
fn bench() {
    // Compare raw single-stream throughput with the pool at several thread counts.
    // Run with `cargo test bench --release -- --ignored --nocapture`
    const BUFSIZE: usize = 0x20000;
    const ROUNDS: u64 = 256;

    let gigs = |bytes: usize| bytes as f64 / ((1 << 30) as f64);

    let mut rng = Xorshift1024::from_entropy().unwrap();
    rng.warmup();
    let mut buffer = vec![0; BUFSIZE];
    let start = Instant::now();
    for _ in 0..ROUNDS {
        rng.fill(&mut buffer);
    }
    let secs = start.elapsed().as_secs_f64();
    let single = gigs(ROUNDS as usize * BUFSIZE * 8) / secs;

    println!("\nThroughputs:");
    println!("     fill: {single:.3} GB/s");

    let available = std::thread::available_parallelism().map_or(1, |n| n.get());
    for threads in [1, 2, 4, 8, 16].into_iter().filter(|&t| t <= available) {
        let config = Config::new(threads, BUFSIZE, ROUNDS);
        let mut coordinator = Coordinator::new(config).unwrap();
        let start = Instant::now();
        coordinator.run(&mut io::sink()).unwrap();
        let secs = start.elapsed().as_secs_f64();
        let rate = gigs(ROUNDS as usize * threads * BUFSIZE * 8) / secs;
        println!("{threads:>3} thr: {rate:.3} GB/s ({:.2}x)", rate / single);
    }
}
