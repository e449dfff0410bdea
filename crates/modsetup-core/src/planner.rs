//! File layout planning
//!
//! Maps every eligible type and embedded resource of a module to a relative
//! output path. Planning is a pure function of the module: it performs no I/O
//! and never fails, so two runs over the same input yield the same plan.

use indexmap::IndexMap;
use std::fmt;

use crate::culture::is_culture_name;
use crate::errors::{Result, SetupError};
use crate::module::{Module, TypeDefinition};

/// Extension of generated source files
pub const SOURCE_EXTENSION: &str = "cs";

/// Resource name prefixes rewritten into directories
const LIBRARY_PREFIXES: &[(&str, &str)] = &[
    ("Libraries.Native.", "Libraries/Native/"),
    ("Libraries.Common.", "Libraries/Common/"),
    ("Libraries.", "Libraries/"),
];

/// Decides whether a type gets its own source file
pub trait TypeFilter: Send + Sync {
    fn include(&self, module: &Module, ty: &TypeDefinition) -> bool;
}

/// Skips the `<Module>` pseudo type, compiler-generated types and nested
/// types (those are emitted inside their declaring type)
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTypeFilter;

impl TypeFilter for DefaultTypeFilter {
    fn include(&self, _module: &Module, ty: &TypeDefinition) -> bool {
        !ty.is_compiler_generated && !ty.is_nested() && !ty.name.contains('<')
    }
}

/// Case-insensitive identity of a relative output path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    pub fn new(path: &str) -> Self {
        Self(path.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the content of a planned file comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Indices into `Module::types`, decompiled together
    Types(Vec<usize>),
    /// Index into `Module::resources`, copied verbatim
    Resource(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlanEntry {
    /// Relative path using `/` separators
    pub path: String,
    pub source: ContentSource,
}

impl FilePlanEntry {
    pub fn key(&self) -> PathKey {
        PathKey::new(&self.path)
    }

    pub fn is_source(&self) -> bool {
        matches!(self.source, ContentSource::Types(_))
    }
}

/// Planned files of one module, in deterministic order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePlan {
    entries: Vec<FilePlanEntry>,
}

impl FilePlan {
    pub fn new(entries: Vec<FilePlanEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[FilePlanEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<FilePlanEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &FilePlanEntry> {
        self.entries.iter().filter(|e| e.is_source())
    }

    pub fn resources(&self) -> impl Iterator<Item = &FilePlanEntry> {
        self.entries.iter().filter(|e| !e.is_source())
    }

    /// Assert that no two entries share a path
    pub fn validate(&self, module: &str) -> Result<()> {
        let mut seen = rustc_hash::FxHashSet::default();
        for entry in &self.entries {
            if !seen.insert(entry.key()) {
                return Err(SetupError::PlanningCollision {
                    module: module.to_string(),
                    path: entry.path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Plan the output files of `module`
pub fn plan(module: &Module, filter: &dyn TypeFilter) -> FilePlan {
    let mut planned: IndexMap<PathKey, FilePlanEntry> = IndexMap::new();

    for (index, ty) in module.types.iter().enumerate() {
        if !filter.include(module, ty) {
            continue;
        }

        let path = type_path(ty);
        match planned.get_mut(&PathKey::new(&path)) {
            Some(FilePlanEntry {
                source: ContentSource::Types(group),
                ..
            }) => group.push(index),
            _ => {
                planned.insert(
                    PathKey::new(&path),
                    FilePlanEntry {
                        path,
                        source: ContentSource::Types(vec![index]),
                    },
                );
            }
        }
    }

    for (index, resource) in module.embedded_resources() {
        let base = resource_path(module, &resource.name);
        let path = disambiguate(&base, |candidate| {
            planned.contains_key(&PathKey::new(candidate))
        });
        planned.insert(
            PathKey::new(&path),
            FilePlanEntry {
                path,
                source: ContentSource::Resource(index),
            },
        );
    }

    FilePlan::new(planned.into_values().collect())
}

/// Relative source path of a type: `Namespace/Dirs/Name.cs`
pub fn type_path(ty: &TypeDefinition) -> String {
    let simple = ty.name.split('`').next().unwrap_or(&ty.name);
    let file = format!("{}.{}", clean_file_name(simple), SOURCE_EXTENSION);

    if ty.namespace.is_empty() {
        file
    } else {
        let dir: Vec<String> = ty.namespace.split('.').map(clean_file_name).collect();
        format!("{}/{}", dir.join("/"), file)
    }
}

/// Relative output path of an embedded resource
pub fn resource_path(module: &Module, name: &str) -> String {
    let root = format!("{}.", module.name);
    let mut path = name.strip_prefix(root.as_str()).unwrap_or(name).to_string();

    for (prefix, dir) in LIBRARY_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            path = format!("{}{}", dir, rest);
            break;
        }
    }

    if let Some(without_ext) = path.strip_suffix(".dll") {
        let (dir, stem) = match without_ext.rfind('/') {
            Some(i) => without_ext.split_at(i + 1),
            None => ("", without_ext),
        };
        if module.references.iter().any(|r| r.name == stem) {
            path = format!("{}{}/{}.dll", dir, stem, stem);
        }
    }

    let path = insert_culture_qualifier(&path);
    path.split('/')
        .map(clean_file_name)
        .collect::<Vec<_>>()
        .join("/")
}

/// `X.Strings.en-US.bin` becomes `X.Strings.Main.en-US.bin`; names whose
/// secondary extension is not a culture are returned unchanged
pub fn insert_culture_qualifier(path: &str) -> String {
    let (dir, file) = match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    };

    let parts: Vec<&str> = file.split('.').collect();
    if parts.len() < 3 {
        return path.to_string();
    }

    let culture_at = parts.len() - 2;
    if !is_culture_name(parts[culture_at]) {
        return path.to_string();
    }

    let mut spliced = parts[..culture_at].to_vec();
    spliced.push("Main");
    spliced.extend_from_slice(&parts[culture_at..]);
    format!("{}{}", dir, spliced.join("."))
}

/// Make one path segment safe on common filesystems
///
/// Reserved characters, device names and trailing dots are replaced with `-`
/// and the segment is truncated to 255 bytes.
pub fn clean_file_name(name: &str) -> String {
    let cleaned = sanitize_filename::sanitize_with_options(
        name,
        sanitize_filename::Options {
            windows: true,
            truncate: true,
            replacement: "-",
        },
    );

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// First of `path`, `stem-1.ext`, `stem-2.ext`, ... not yet taken
fn disambiguate(path: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(path) {
        return path.to_string();
    }

    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (stem, ext) = match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(file_start + dot),
        _ => (path, ""),
    };

    let mut n = 1;
    loop {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{AssemblyReference, Resource, TypeKind, Version};

    fn module_with_types(types: &[(&str, &str)]) -> Module {
        let mut module = Module::new("Terraria", Version::new(1, 4, 4, 9));
        for (ns, name) in types {
            module
                .types
                .push(TypeDefinition::new(*ns, *name, TypeKind::Class));
        }
        module
    }

    #[test]
    fn test_type_paths() {
        let plan = plan(
            &module_with_types(&[("Terraria.GameContent.UI", "Chat"), ("", "Program")]),
            &DefaultTypeFilter,
        );
        let paths: Vec<_> = plan.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Terraria/GameContent/UI/Chat.cs", "Program.cs"]);
    }

    #[test]
    fn test_generic_arity_is_stripped() {
        let ty = TypeDefinition::new("ReLogic.Content", "Asset`1", TypeKind::Class);
        assert_eq!(type_path(&ty), "ReLogic/Content/Asset.cs");
    }

    #[test]
    fn test_case_insensitive_grouping() {
        let plan = plan(
            &module_with_types(&[("N", "Foo"), ("N", "foo"), ("N", "Foo`1"), ("N", "Bar")]),
            &DefaultTypeFilter,
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.entries()[0].path, "N/Foo.cs");
        assert_eq!(plan.entries()[0].source, ContentSource::Types(vec![0, 1, 2]));
        assert!(plan.validate("Terraria").is_ok());
    }

    #[test]
    fn test_filter_skips_generated_and_nested() {
        let mut module = module_with_types(&[("", "<Module>"), ("N", "Outer")]);
        let mut nested = TypeDefinition::new("N", "Inner", TypeKind::Class);
        nested.declaring_type = Some("N.Outer".to_string());
        module.types.push(nested);
        let mut generated = TypeDefinition::new("N", "Closure", TypeKind::Class);
        generated.is_compiler_generated = true;
        module.types.push(generated);

        let plan = plan(&module, &DefaultTypeFilter);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries()[0].path, "N/Outer.cs");
    }

    #[test]
    fn test_resource_library_relocation() {
        let mut module = Module::new("Terraria", Version::default());
        module
            .references
            .push(AssemblyReference::new("ReLogic", Version::default()));

        assert_eq!(
            resource_path(&module, "Terraria.Libraries.ReLogic.dll"),
            "Libraries/ReLogic/ReLogic.dll"
        );
        assert_eq!(
            resource_path(&module, "Terraria.Libraries.Native.Windows.dll"),
            "Libraries/Native/Windows.dll"
        );
        assert_eq!(
            resource_path(&module, "Terraria.Libraries.Common.SteelSeriesEngineWrapper.dll"),
            "Libraries/Common/SteelSeriesEngineWrapper.dll"
        );
    }

    #[test]
    fn test_resource_culture_qualifier() {
        let module = Module::new("Terraria", Version::default());
        assert_eq!(
            resource_path(&module, "Terraria.Localization.Strings.en-US.bin"),
            "Localization.Strings.Main.en-US.bin"
        );
        assert_eq!(
            resource_path(&module, "Terraria.Localization.Content.json"),
            "Localization.Content.json"
        );
        assert_eq!(insert_culture_qualifier("a/X.Strings.de.resx"), "a/X.Strings.Main.de.resx");
        assert_eq!(insert_culture_qualifier("a/X.Strings.bin"), "a/X.Strings.bin");
    }

    #[test]
    fn test_resource_collision_gets_suffix() {
        let mut module = Module::new("Terraria", Version::default());
        module.resources.push(Resource::embedded("Icon.png", vec![1]));
        module.resources.push(Resource::embedded("ICON.png", vec![2]));

        let plan = plan(&module, &DefaultTypeFilter);
        let paths: Vec<_> = plan.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Icon.png", "ICON-1.png"]);
    }

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("a<b>c"), "a-b-c");
        assert_eq!(clean_file_name("a\u{7}b"), "a-b");
        assert_eq!(clean_file_name("name. "), "name-");
        assert_eq!(clean_file_name("CON"), "-");
        assert_eq!(clean_file_name("Console"), "Console");
        assert_eq!(clean_file_name(".."), "-");
        assert_eq!(clean_file_name(""), "_");
        assert_eq!(clean_file_name(&"x".repeat(300)).len(), 255);
    }

    #[test]
    fn test_validate_detects_collision() {
        let plan = FilePlan::new(vec![
            FilePlanEntry {
                path: "A.cs".to_string(),
                source: ContentSource::Types(vec![0]),
            },
            FilePlanEntry {
                path: "a.cs".to_string(),
                source: ContentSource::Types(vec![1]),
            },
        ]);
        assert!(matches!(
            plan.validate("M"),
            Err(SetupError::PlanningCollision { .. })
        ));
    }
}
