use sharedlibs::{Enumerator, LibraryFilter, SharedLibRegistry};
use std::sync::{Arc, Barrier};
use std::thread;

fn main() {
    unsafe { std::env::set_var("RUST_LOG", "info") };
    env_logger::init();

    let registry = Arc::new(SharedLibRegistry::new());
    let enumerator = Enumerator::new().with_filter(LibraryFilter::Versioned);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let enumerator = enumerator.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                enumerator.refresh(&registry)
            })
        })
        .collect();

    for handle in handles {
        match handle.join().unwrap() {
            Ok(report) => println!(
                "inserted={} known={} raced={}",
                report.inserted, report.known, report.raced
            ),
            Err(err) => println!("refresh failed: {}", err),
        }
    }
    println!("{} libraries registered", registry.len());
}
