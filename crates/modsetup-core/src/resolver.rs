//! Dependency resolution for modules being read
//!
//! Every module read gets its own [`EmbeddedResolver`], which looks for a
//! referenced module among the payloads embedded in the module itself before
//! falling back to a search directory. Results, including misses, are memoized
//! for the lifetime of the resolver.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::BaseRuntime;
use crate::module::{AssemblyReference, Module, ModuleFormat};

/// Outcome of resolving one reference
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Arc<Module>),
    /// Intentionally unresolved (base runtime with a different major version)
    Skipped,
    NotFound,
}

impl Resolution {
    pub fn module(&self) -> Option<&Arc<Module>> {
        match self {
            Resolution::Resolved(module) => Some(module),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Resolution::Skipped)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }
}

pub trait AssemblyResolver: Send + Sync {
    fn resolve(&self, reference: &AssemblyReference) -> Resolution;
}

/// Resolver used when no search directory is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl AssemblyResolver for NullResolver {
    fn resolve(&self, _reference: &AssemblyReference) -> Resolution {
        Resolution::NotFound
    }
}

/// Looks for `<dir>/<name>.dll` on disk
pub struct DirectoryResolver {
    dir: PathBuf,
    format: Arc<dyn ModuleFormat>,
}

impl DirectoryResolver {
    pub fn new(dir: impl Into<PathBuf>, format: Arc<dyn ModuleFormat>) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AssemblyResolver for DirectoryResolver {
    fn resolve(&self, reference: &AssemblyReference) -> Resolution {
        let candidate = self.dir.join(format!("{}.dll", reference.name));
        let bytes = match std::fs::read(&candidate) {
            Ok(bytes) => bytes,
            Err(_) => return Resolution::NotFound,
        };

        match self.format.parse(&candidate, &bytes) {
            Ok(module) => Resolution::Resolved(Arc::new(module)),
            Err(e) => {
                warn!("Ignoring unreadable dependency {:?}: {}", candidate, e);
                Resolution::NotFound
            }
        }
    }
}

/// Counts of how a module's references resolved, including references
/// reached through dependencies that resolved
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionReport {
    pub resolved: usize,
    pub skipped: usize,
    pub not_found: usize,
}

/// Resolves references of one module, preferring payloads it embeds
pub struct EmbeddedResolver {
    owner: Arc<Module>,
    format: Arc<dyn ModuleFormat>,
    fallback: Arc<dyn AssemblyResolver>,
    runtime: BaseRuntime,
    cache: Mutex<FxHashMap<String, Resolution>>,
}

impl EmbeddedResolver {
    pub fn new(
        owner: Arc<Module>,
        format: Arc<dyn ModuleFormat>,
        fallback: Arc<dyn AssemblyResolver>,
        runtime: BaseRuntime,
    ) -> Self {
        Self {
            owner,
            format,
            fallback,
            runtime,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn owner(&self) -> &Arc<Module> {
        &self.owner
    }

    /// Number of distinct references resolved so far
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolve the owner's references and then the references of every module
    /// they resolve to, one dependency level at a time
    ///
    /// Each distinct full name is visited once, so reference cycles terminate.
    /// References within a level are resolved in parallel.
    pub fn resolve_all(&self) -> ResolutionReport {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        seen.insert(AssemblyReference::new(self.owner.name.clone(), self.owner.version).full_name());

        let mut pending: Vec<AssemblyReference> = self
            .owner
            .references
            .iter()
            .filter(|r| seen.insert(r.full_name()))
            .cloned()
            .collect();

        let mut report = ResolutionReport::default();
        while !pending.is_empty() {
            let outcomes: Vec<Resolution> = pending
                .par_iter()
                .map(|reference| self.resolve(reference))
                .collect();

            let mut next = Vec::new();
            for outcome in outcomes {
                match outcome {
                    Resolution::Resolved(module) => {
                        report.resolved += 1;
                        next.extend(
                            module
                                .references
                                .iter()
                                .filter(|r| seen.insert(r.full_name()))
                                .cloned(),
                        );
                    }
                    Resolution::Skipped => report.skipped += 1,
                    Resolution::NotFound => report.not_found += 1,
                }
            }
            pending = next;
        }
        report
    }

    fn is_foreign_runtime(&self, reference: &AssemblyReference) -> bool {
        reference.name == self.runtime.name && reference.version.major != self.runtime.major_version
    }

    fn find_embedded(&self, reference: &AssemblyReference) -> Option<Arc<Module>> {
        let suffix = format!("{}.dll", reference.name);
        let (_, resource) = self
            .owner
            .embedded_resources()
            .find(|(_, r)| r.name.ends_with(&suffix))?;

        match self.format.parse(Path::new(&resource.name), &resource.data) {
            Ok(module) => Some(Arc::new(module)),
            Err(e) => {
                warn!(
                    "Embedded payload {} in {} is not a module: {}",
                    resource.name, self.owner.name, e
                );
                None
            }
        }
    }
}

impl AssemblyResolver for EmbeddedResolver {
    fn resolve(&self, reference: &AssemblyReference) -> Resolution {
        let key = reference.full_name();

        // Held for the whole lookup-or-populate sequence so concurrent requests
        // for the same name never both take the slow path.
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }

        let outcome = if self.is_foreign_runtime(reference) {
            debug!(
                "Skipping {}: base runtime major version differs from {}",
                key, self.runtime.major_version
            );
            Resolution::Skipped
        } else if let Some(module) = self.find_embedded(reference) {
            debug!("Resolved {} from payload embedded in {}", key, self.owner.name);
            Resolution::Resolved(module)
        } else {
            let outcome = self.fallback.resolve(reference);
            if outcome.is_not_found() {
                warn!("Could not resolve {} referenced by {}", key, self.owner.name);
            }
            outcome
        };

        cache.insert(key, outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ImageFormat, Resource, Version};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFallback {
        calls: AtomicUsize,
    }

    impl AssemblyResolver for CountingFallback {
        fn resolve(&self, _reference: &AssemblyReference) -> Resolution {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Resolution::NotFound
        }
    }

    fn runtime() -> BaseRuntime {
        BaseRuntime {
            name: "System.Runtime".to_string(),
            major_version: 8,
        }
    }

    fn resolver_for(owner: Module, fallback: Arc<dyn AssemblyResolver>) -> EmbeddedResolver {
        EmbeddedResolver::new(Arc::new(owner), Arc::new(ImageFormat), fallback, runtime())
    }

    #[test]
    fn test_resolves_embedded_payload() {
        let dep = Module::new("ReLogic", Version::new(1, 0, 0, 0));
        let mut owner = Module::new("Terraria", Version::new(1, 4, 4, 9));
        owner.resources.push(Resource::embedded(
            "Terraria.Libraries.ReLogic.dll",
            ImageFormat::encode(&dep).unwrap(),
        ));

        let resolver = resolver_for(owner, Arc::new(NullResolver));
        let outcome = resolver.resolve(&AssemblyReference::new("ReLogic", Version::new(1, 0, 0, 0)));

        assert_eq!(outcome.module().unwrap().name, "ReLogic");
    }

    #[test]
    fn test_not_found_is_cached() {
        let fallback = Arc::new(CountingFallback {
            calls: AtomicUsize::new(0),
        });
        let resolver = resolver_for(Module::new("Terraria", Version::default()), fallback.clone());
        let reference = AssemblyReference::new("Missing", Version::new(2, 0, 0, 0));

        assert!(resolver.resolve(&reference).is_not_found());
        assert!(resolver.resolve(&reference).is_not_found());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn test_versions_are_cached_separately() {
        let fallback = Arc::new(CountingFallback {
            calls: AtomicUsize::new(0),
        });
        let resolver = resolver_for(Module::new("Terraria", Version::default()), fallback.clone());

        resolver.resolve(&AssemblyReference::new("Lib", Version::new(1, 0, 0, 0)));
        resolver.resolve(&AssemblyReference::new("Lib", Version::new(2, 0, 0, 0)));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_foreign_runtime_is_skipped() {
        let fallback = Arc::new(CountingFallback {
            calls: AtomicUsize::new(0),
        });
        let resolver = resolver_for(Module::new("Terraria", Version::default()), fallback.clone());

        let outcome = resolver.resolve(&AssemblyReference::new(
            "System.Runtime",
            Version::new(4, 2, 2, 0),
        ));
        assert!(outcome.is_skipped());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);

        let same_major = resolver.resolve(&AssemblyReference::new(
            "System.Runtime",
            Version::new(8, 0, 0, 0),
        ));
        assert!(same_major.is_not_found());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_corrupt_embedded_payload_falls_back() {
        let mut owner = Module::new("Terraria", Version::default());
        owner
            .resources
            .push(Resource::embedded("Terraria.Libraries.Broken.dll", b"nope".to_vec()));
        let fallback = Arc::new(CountingFallback {
            calls: AtomicUsize::new(0),
        });
        let resolver = resolver_for(owner, fallback.clone());

        let outcome = resolver.resolve(&AssemblyReference::new("Broken", Version::default()));
        assert!(outcome.is_not_found());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_directory_resolver() {
        let dir = tempfile::TempDir::new().unwrap();
        let dep = Module::new("FNA", Version::new(23, 0, 0, 0));
        ImageFormat::write(&dep, &dir.path().join("FNA.dll")).unwrap();

        let resolver = DirectoryResolver::new(dir.path(), Arc::new(ImageFormat));
        let found = resolver.resolve(&AssemblyReference::new("FNA", Version::new(23, 0, 0, 0)));
        assert_eq!(found.module().unwrap().name, "FNA");

        let missing = resolver.resolve(&AssemblyReference::new("Steamworks", Version::default()));
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_resolve_all_follows_dependencies() {
        let relogic_ref = AssemblyReference::new("ReLogic", Version::new(1, 0, 0, 0));
        let mut dep = Module::new("ReLogic", Version::new(1, 0, 0, 0));
        dep.references = vec![
            AssemblyReference::new("FNA", Version::new(1, 0, 0, 0)),
            relogic_ref.clone(),
            AssemblyReference::new("Terraria", Version::new(1, 4, 4, 9)),
        ];
        let mut owner = Module::new("Terraria", Version::new(1, 4, 4, 9));
        owner.references = vec![relogic_ref.clone()];
        owner.resources.push(Resource::embedded(
            "Terraria.Libraries.ReLogic.dll",
            ImageFormat::encode(&dep).unwrap(),
        ));
        let fallback = Arc::new(CountingFallback {
            calls: AtomicUsize::new(0),
        });
        let resolver = resolver_for(owner, fallback.clone());

        let report = resolver.resolve_all();

        // FNA is only reachable through ReLogic; the cycles back to ReLogic and
        // Terraria are not followed
        assert_eq!(
            report,
            ResolutionReport {
                resolved: 1,
                skipped: 0,
                not_found: 1,
            }
        );
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn test_resolve_all_report() {
        let mut owner = Module::new("Terraria", Version::default());
        owner.references = vec![
            AssemblyReference::new("System.Runtime", Version::new(4, 0, 0, 0)),
            AssemblyReference::new("Missing", Version::default()),
        ];
        let resolver = resolver_for(owner, Arc::new(NullResolver));

        let report = resolver.resolve_all();
        assert_eq!(
            report,
            ResolutionReport {
                resolved: 0,
                skipped: 1,
                not_found: 1,
            }
        );
    }
}
