//! The refresh pass.
//!
//! An [`Enumerator`] probes the host, selects a [`DiscoveryStrategy`], and
//! feeds every discovered shared library through the add-if-new sequence:
//! skip names already registered, extract metadata for the rest, and insert
//! the result unless another refresh got there first. A library that fails to
//! parse is logged and skipped; it never aborts the pass.

use crate::{
    Result, api_unavailable,
    discovery::{DiscoveryStrategy, LibraryFilter, LinkMapStrategy, PhdrIterStrategy},
    metadata::{DynamicExtractor, LibraryDescriptor, MetadataExtractor},
    os,
    registry::{SharedLibRegistry, base_name},
    sync::Arc,
};
use alloc::format;
use bitflags::bitflags;

/// API level from which Android ships a usable `dl_iterate_phdr` (5.0).
pub const DEFAULT_API_THRESHOLD: u32 = 21;

#[cfg(not(feature = "portable-atomic"))]
pub(crate) type DynStrategy = Arc<dyn DiscoveryStrategy>;
#[cfg(feature = "portable-atomic")]
pub(crate) type DynStrategy = Arc<alloc::boxed::Box<dyn DiscoveryStrategy>>;

#[cfg(not(feature = "portable-atomic"))]
fn dyn_strategy<S: DiscoveryStrategy + 'static>(strategy: S) -> DynStrategy {
    Arc::new(strategy)
}

#[cfg(feature = "portable-atomic")]
fn dyn_strategy<S: DiscoveryStrategy + 'static>(strategy: S) -> DynStrategy {
    Arc::new(alloc::boxed::Box::new(strategy))
}

#[cfg(not(feature = "portable-atomic"))]
#[inline]
fn as_dyn(strategy: &DynStrategy) -> &dyn DiscoveryStrategy {
    &**strategy
}

#[cfg(feature = "portable-atomic")]
#[inline]
fn as_dyn(strategy: &DynStrategy) -> &dyn DiscoveryStrategy {
    &***strategy
}

bitflags! {
    /// What the host offers for discovering mapped libraries.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// The loader-iteration strategy resolved.
        const PHDR_ITER = 1;
        /// A legacy module-list strategy is configured, permitted, and its
        /// layout verified. Never probed when the OS version forbids it.
        const LEGACY_WALK = 2;
        /// The OS version allows falling back to the legacy walk.
        const LEGACY_PERMITTED = 4;
    }
}

/// Where the OS version used for strategy selection comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OsVersion {
    Detect,
    Fixed(Option<u32>),
}

/// Counters describing one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Name of the strategy that ran.
    pub strategy: &'static str,
    /// Objects reported by the strategy.
    pub discovered: usize,
    /// Objects rejected by the [`LibraryFilter`].
    pub filtered: usize,
    /// Candidates whose base filename was already registered; not re-parsed.
    pub known: usize,
    /// Candidates newly added to the registry.
    pub inserted: usize,
    /// Candidates the extractor could not parse.
    pub failed: usize,
    /// Candidates parsed but beaten to the insert by another path or refresh.
    pub raced: usize,
}

/// Selects a discovery strategy and populates a [`SharedLibRegistry`].
///
/// The loader-iteration API is always probed first and wins whenever it
/// resolves. The legacy module-list walk is used only when that probe fails
/// and the OS version is below the configured threshold.
///
/// # Examples
/// ```rust,no_run
/// use sharedlibs::{Enumerator, LibraryFilter, SharedLibRegistry};
///
/// let registry = SharedLibRegistry::new();
/// let report = Enumerator::new()
///     .with_filter(LibraryFilter::Versioned)
///     .refresh(&registry)?;
/// println!("{} new libraries via {}", report.inserted, report.strategy);
/// # Ok::<(), sharedlibs::Error>(())
/// ```
#[derive(Clone)]
pub struct Enumerator<X = DynamicExtractor> {
    extractor: X,
    filter: LibraryFilter,
    modern: DynStrategy,
    legacy: Option<DynStrategy>,
    api_threshold: Option<u32>,
    os_version: OsVersion,
}

impl<X> core::fmt::Debug for Enumerator<X> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Enumerator")
            .field("filter", &self.filter)
            .field("modern", &self.modern.name())
            .field("legacy", &self.legacy.as_ref().map(|s| s.name()))
            .field("api_threshold", &self.api_threshold)
            .field("os_version", &self.os_version)
            .finish()
    }
}

impl Default for Enumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Enumerator {
    /// An enumerator using `dl_iterate_phdr`, the host's legacy layout if
    /// one is known, the `.so` suffix filter and [`DynamicExtractor`].
    pub fn new() -> Self {
        Self {
            extractor: DynamicExtractor,
            filter: LibraryFilter::default(),
            modern: dyn_strategy(PhdrIterStrategy::new()),
            legacy: LinkMapStrategy::host().map(dyn_strategy),
            api_threshold: Some(DEFAULT_API_THRESHOLD),
            os_version: OsVersion::Detect,
        }
    }
}

impl<X: MetadataExtractor> Enumerator<X> {
    /// Replaces the metadata extractor.
    pub fn with_extractor<Y: MetadataExtractor>(self, extractor: Y) -> Enumerator<Y> {
        Enumerator {
            extractor,
            filter: self.filter,
            modern: self.modern,
            legacy: self.legacy,
            api_threshold: self.api_threshold,
            os_version: self.os_version,
        }
    }

    /// Sets which discovered names count as shared libraries.
    pub fn with_filter(mut self, filter: LibraryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replaces the primary (loader-iteration) strategy.
    pub fn with_strategy<S: DiscoveryStrategy + 'static>(mut self, strategy: S) -> Self {
        self.modern = dyn_strategy(strategy);
        self
    }

    /// Replaces the fallback strategy used when the primary one is unavailable.
    pub fn with_legacy<S: DiscoveryStrategy + 'static>(mut self, strategy: S) -> Self {
        self.legacy = Some(dyn_strategy(strategy));
        self
    }

    /// Disables the fallback strategy entirely.
    pub fn without_legacy(mut self) -> Self {
        self.legacy = None;
        self
    }

    /// Sets the OS version below which the legacy walk may be used.
    ///
    /// `None` removes the version gate: the fallback is tried whenever the
    /// primary strategy fails its probe.
    pub fn with_api_threshold(mut self, threshold: Option<u32>) -> Self {
        self.api_threshold = threshold;
        self
    }

    /// Overrides OS version detection. `None` means "unknown".
    pub fn with_os_version(mut self, version: Option<u32>) -> Self {
        self.os_version = OsVersion::Fixed(version);
        self
    }

    #[inline]
    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    #[inline]
    pub fn filter(&self) -> LibraryFilter {
        self.filter
    }

    /// The OS version used for strategy selection.
    pub fn os_version(&self) -> Option<u32> {
        match self.os_version {
            OsVersion::Detect => os::api_level(),
            OsVersion::Fixed(version) => version,
        }
    }

    fn legacy_permitted(&self) -> bool {
        match self.api_threshold {
            None => true,
            Some(threshold) => self.os_version().is_some_and(|v| v < threshold),
        }
    }

    /// Probes the configured strategies without touching any registry.
    ///
    /// The legacy strategy reads undocumented loader memory, so it is only
    /// probed when the OS version permits the fallback.
    pub fn probe(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        if self.modern.probe().is_ok() {
            caps |= Capabilities::PHDR_ITER;
        }
        if self.legacy_permitted() {
            caps |= Capabilities::LEGACY_PERMITTED;
            if self.legacy.as_ref().is_some_and(|s| s.probe().is_ok()) {
                caps |= Capabilities::LEGACY_WALK;
            }
        }
        caps
    }

    /// Picks the strategy a refresh would run.
    ///
    /// # Errors
    /// [`Error::ApiUnavailable`](crate::Error::ApiUnavailable) if the primary
    /// strategy fails its probe and no permitted, verified fallback exists.
    pub fn select(&self) -> Result<&dyn DiscoveryStrategy> {
        self.choose(true)
    }

    /// With `verify_legacy` unset the fallback is returned unprobed; its
    /// `discover` verifies the whole list before reporting anything.
    fn choose(&self, verify_legacy: bool) -> Result<&dyn DiscoveryStrategy> {
        let err = match self.modern.probe() {
            Ok(()) => return Ok(as_dyn(&self.modern)),
            Err(err) => err,
        };
        #[cfg(feature = "log")]
        log::debug!("{} unavailable: {}", self.modern.name(), err);

        if !self.legacy_permitted() {
            return Err(err);
        }
        let Some(legacy) = self.legacy.as_ref() else {
            return Err(api_unavailable(format!(
                "{} unavailable and no legacy layout configured",
                self.modern.name()
            )));
        };
        if verify_legacy {
            legacy.probe()?;
        }
        #[cfg(feature = "log")]
        log::info!(
            "Falling back to {} (os version {:?})",
            legacy.name(),
            self.os_version()
        );
        Ok(as_dyn(legacy))
    }

    /// Runs one discovery pass, adding every new shared library to `registry`.
    ///
    /// Existing entries are never replaced or removed, so repeated refreshes
    /// converge on the same registry state.
    ///
    /// # Errors
    /// [`Error::ApiUnavailable`](crate::Error::ApiUnavailable) when no
    /// strategy can run; the registry is left untouched in that case.
    pub fn refresh(&self, registry: &SharedLibRegistry) -> Result<RefreshReport> {
        let strategy = self.choose(false)?;

        #[cfg(feature = "log")]
        log::info!("Refreshing shared libraries via {}", strategy.name());

        let mut report = RefreshReport {
            strategy: strategy.name(),
            ..Default::default()
        };
        strategy.discover(&mut |name: &str, desc: &LibraryDescriptor<'_>| {
            self.add_if_new(registry, name, desc, &mut report)
        })?;

        #[cfg(feature = "log")]
        log::info!("Finished refreshing shared libraries: {:?}", report);
        Ok(report)
    }

    fn add_if_new(
        &self,
        registry: &SharedLibRegistry,
        name: &str,
        desc: &LibraryDescriptor<'_>,
        report: &mut RefreshReport,
    ) {
        report.discovered += 1;
        if !self.filter.matches(name) {
            report.filtered += 1;
            return;
        }
        let short = base_name(name);
        if registry.contains(short) {
            #[cfg(feature = "log")]
            log::trace!("Shared library already exists: {}", short);
            report.known += 1;
            return;
        }

        match self.extractor.extract(name, desc) {
            Ok(data) => {
                if registry.insert_if_absent(short, data) {
                    #[cfg(feature = "log")]
                    log::debug!("Added shared library: {} ({})", short, name);
                    report.inserted += 1;
                } else {
                    #[cfg(feature = "log")]
                    log::trace!("Shared library {} was added concurrently", short);
                    report.raced += 1;
                }
            }
            Err(_err) => {
                #[cfg(feature = "log")]
                log::warn!("Failed to parse shared library {}: {}", name, _err);
                report.failed += 1;
            }
        }
    }
}
