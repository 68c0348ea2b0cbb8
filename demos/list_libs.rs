use sharedlibs::{LibraryFilter, Result, global};

fn main() -> Result<()> {
    unsafe { std::env::set_var("RUST_LOG", "debug") };
    env_logger::init();

    let report = global::refresh()?;
    println!("{:?}", report);

    let mut libs = global::all_shared_libs();
    libs.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, data) in &libs {
        println!(
            "{:<32} bias=0x{:x} symbols={:?} soname={:?}",
            name,
            data.load_bias(),
            data.symbol_count(),
            data.soname()
        );
    }

    // Desktop distributions ship versioned sonames, which the default `.so` filter skips.
    let versioned = sharedlibs::Enumerator::new().with_filter(LibraryFilter::Versioned);
    let report = versioned.refresh(global::shared_libs())?;
    println!("versioned pass added {} more", report.inserted);
    Ok(())
}
