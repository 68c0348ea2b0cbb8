use sharedlibs::{
    Enumerator, LibraryFilter, LinkMapStrategy, PhdrIterStrategy, Result, SharedLibRegistry,
};

fn main() -> Result<()> {
    unsafe { std::env::set_var("RUST_LOG", "trace") };
    env_logger::init();

    let Some(legacy) = LinkMapStrategy::host() else {
        println!("no legacy module-list layout is known for this host");
        return Ok(());
    };
    println!("using layout {:?}", legacy.layout());

    // Pretend the loader does not export `dl_iterate_phdr` and the OS is old.
    let enumerator = Enumerator::new()
        .with_strategy(PhdrIterStrategy::with_symbol(c"dl_iterate_phdr_unavailable"))
        .with_legacy(legacy)
        .with_os_version(Some(19))
        .with_filter(LibraryFilter::Versioned);
    println!("capabilities: {:?}", enumerator.probe());

    let registry = SharedLibRegistry::new();
    let report = enumerator.refresh(&registry)?;
    println!("{:?}", report);
    for (name, data) in registry.snapshot() {
        println!("{} -> {:?}", name, data);
    }
    Ok(())
}
