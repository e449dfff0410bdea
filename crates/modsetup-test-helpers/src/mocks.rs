//! Mock implementations for testing

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use modsetup_core::config::FormattingOptions;
use modsetup_core::decompiler::{Decompiler, SkeletonDecompiler};
use modsetup_core::errors::{Result, SetupError};
use modsetup_core::module::{AssemblyReference, ImageFormat, Module, ModuleFormat, TypeDefinition};
use modsetup_core::resolver::{AssemblyResolver, NullResolver, Resolution};
use modsetup_core::scheduler::CancellationToken;

/// Image format that counts how often it parses
#[derive(Debug, Default)]
pub struct CountingFormat {
    parses: AtomicUsize,
}

impl CountingFormat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}

impl ModuleFormat for CountingFormat {
    fn parse(&self, origin: &Path, bytes: &[u8]) -> Result<Module> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        ImageFormat.parse(origin, bytes)
    }
}

/// Fallback resolver that counts lookups and records the names asked for
pub struct CountingResolver {
    inner: Arc<dyn AssemblyResolver>,
    requests: Mutex<Vec<String>>,
}

impl CountingResolver {
    pub fn new(inner: Arc<dyn AssemblyResolver>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Counting resolver that never finds anything
    pub fn missing() -> Arc<Self> {
        Self::new(Arc::new(NullResolver))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl AssemblyResolver for CountingResolver {
    fn resolve(&self, reference: &AssemblyReference) -> Resolution {
        self.requests.lock().unwrap().push(reference.name.clone());
        self.inner.resolve(reference)
    }
}

/// Skeleton output stamped with the producing module's name
///
/// Also asks the resolver it is handed for each of the module's references
/// and remembers which ones came back resolved.
#[derive(Debug, Default)]
pub struct RecordingDecompiler {
    calls: Mutex<Vec<String>>,
    resolved: Mutex<Vec<String>>,
}

impl RecordingDecompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `Module:Namespace.Type` for every type decompiled, sorted
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }

    /// `Module->Dependency` for every reference a decompilation saw resolved,
    /// sorted and deduplicated
    pub fn resolved(&self) -> Vec<String> {
        let mut resolved = self.resolved.lock().unwrap().clone();
        resolved.sort();
        resolved.dedup();
        resolved
    }
}

impl Decompiler for RecordingDecompiler {
    fn decompile_types(
        &self,
        module: &Module,
        types: &[&TypeDefinition],
        resolver: &dyn AssemblyResolver,
        options: &FormattingOptions,
        token: &CancellationToken,
    ) -> Result<String> {
        {
            let mut calls = self.calls.lock().unwrap();
            for ty in types {
                calls.push(format!("{}:{}", module.name, ty.full_name()));
            }
        }
        for reference in &module.references {
            if let Some(dep) = resolver.resolve(reference).module() {
                self.resolved
                    .lock()
                    .unwrap()
                    .push(format!("{}->{}", module.name, dep.name));
            }
        }
        let body = SkeletonDecompiler.decompile_types(module, types, resolver, options, token)?;
        Ok(format!("// {}{}{}", module.name, options.newline, body))
    }

    fn decompile_module_metadata(
        &self,
        module: &Module,
        options: &FormattingOptions,
    ) -> Result<String> {
        SkeletonDecompiler.decompile_module_metadata(module, options)
    }
}

/// Fails on one named type, or on module metadata, and succeeds on everything else
#[derive(Debug)]
pub struct FailingDecompiler {
    type_name: Option<String>,
    metadata: bool,
}

impl FailingDecompiler {
    pub fn on(type_name: &str) -> Arc<Self> {
        Arc::new(Self {
            type_name: Some(type_name.to_string()),
            metadata: false,
        })
    }

    pub fn on_metadata() -> Arc<Self> {
        Arc::new(Self {
            type_name: None,
            metadata: true,
        })
    }
}

impl Decompiler for FailingDecompiler {
    fn decompile_types(
        &self,
        module: &Module,
        types: &[&TypeDefinition],
        resolver: &dyn AssemblyResolver,
        options: &FormattingOptions,
        token: &CancellationToken,
    ) -> Result<String> {
        if let Some(name) = &self.type_name {
            if types.iter().any(|t| &t.name == name) {
                return Err(SetupError::Decompile(format!(
                    "unsupported construct in {}",
                    name
                )));
            }
        }
        SkeletonDecompiler.decompile_types(module, types, resolver, options, token)
    }

    fn decompile_module_metadata(
        &self,
        module: &Module,
        options: &FormattingOptions,
    ) -> Result<String> {
        if self.metadata {
            return Err(SetupError::Decompile(format!(
                "unreadable attributes on {}",
                module.name
            )));
        }
        SkeletonDecompiler.decompile_module_metadata(module, options)
    }
}

/// Cancels the run from inside the first decompilation it is handed
#[derive(Debug)]
pub struct CancellingDecompiler {
    token: CancellationToken,
    calls: AtomicUsize,
}

impl CancellingDecompiler {
    pub fn new(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            token,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decompiler for CancellingDecompiler {
    fn decompile_types(
        &self,
        module: &Module,
        types: &[&TypeDefinition],
        resolver: &dyn AssemblyResolver,
        options: &FormattingOptions,
        token: &CancellationToken,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        SkeletonDecompiler.decompile_types(module, types, resolver, options, token)
    }

    fn decompile_module_metadata(
        &self,
        module: &Module,
        options: &FormattingOptions,
    ) -> Result<String> {
        SkeletonDecompiler.decompile_module_metadata(module, options)
    }
}
