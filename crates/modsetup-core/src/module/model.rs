use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Four-part module version (`major.minor.build.revision`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for Version {
    type Err = String;

    /// Missing trailing components default to 0 ("1.4" is "1.4.0.0").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty version string".to_string());
        }

        let mut parts = [0u16; 4];
        let mut count = 0;
        for part in s.split('.') {
            if count == 4 {
                return Err(format!("too many version components in '{}'", s));
            }
            parts[count] = part
                .parse()
                .map_err(|_| format!("invalid version component '{}' in '{}'", part, s))?;
            count += 1;
        }

        Ok(Version::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

impl TypeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Delegate => "delegate",
        }
    }
}

/// A type definition contained in a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Dotted namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name, possibly with a generic arity suffix (`List`1`)
    pub name: String,
    pub kind: TypeKind,
    /// Full name of the enclosing type for nested types
    pub declaring_type: Option<String>,
    pub is_compiler_generated: bool,
}

impl TypeDefinition {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            declaring_type: None,
            is_compiler_generated: false,
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_nested(&self) -> bool {
        self.declaring_type.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Embedded,
    Linked,
}

/// A payload bundled inside a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub data: Vec<u8>,
}

impl Resource {
    pub fn embedded(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Embedded,
            data: data.into(),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.kind == ResourceKind::Embedded
    }
}

/// A declared dependency on another module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblyReference {
    pub name: String,
    pub version: Version,
}

impl AssemblyReference {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Name including version; resolution results are cached under this key
    pub fn full_name(&self) -> String {
        format!("{}, Version={}", self.name, self.version)
    }
}

/// In-memory representation of one compiled module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub version: Version,
    pub types: Vec<TypeDefinition>,
    pub resources: Vec<Resource>,
    pub references: Vec<AssemblyReference>,
}

impl Module {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            types: Vec::new(),
            resources: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn embedded_resources(&self) -> impl Iterator<Item = (usize, &Resource)> {
        self.resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_embedded())
    }

    /// References ordered by name, leaving the module's own list untouched
    pub fn sorted_references(&self) -> Vec<AssemblyReference> {
        let mut refs = self.references.clone();
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!("1.4.4.9".parse::<Version>(), Ok(Version::new(1, 4, 4, 9)));
        assert_eq!("8.0".parse::<Version>(), Ok(Version::new(8, 0, 0, 0)));
        assert!("1.x".parse::<Version>().is_err());
        assert!("1.2.3.4.5".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(1, 4, 0, 0).to_string(), "1.4.0.0");
    }

    #[test]
    fn test_version_serializes_as_string() {
        let json = serde_json::to_string(&Version::new(2, 1, 0, 3)).unwrap();
        assert_eq!(json, "\"2.1.0.3\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new(2, 1, 0, 3));
    }

    #[test]
    fn test_full_names() {
        let ty = TypeDefinition::new("Terraria.UI", "UIElement", TypeKind::Class);
        assert_eq!(ty.full_name(), "Terraria.UI.UIElement");

        let global = TypeDefinition::new("", "Program", TypeKind::Class);
        assert_eq!(global.full_name(), "Program");

        let reference = AssemblyReference::new("ReLogic", Version::new(1, 0, 0, 0));
        assert_eq!(reference.full_name(), "ReLogic, Version=1.0.0.0");
    }

    #[test]
    fn test_sorted_references_does_not_mutate() {
        let mut module = Module::new("Game", Version::default());
        module
            .references
            .push(AssemblyReference::new("Zeta", Version::default()));
        module
            .references
            .push(AssemblyReference::new("Alpha", Version::default()));

        let sorted = module.sorted_references();
        assert_eq!(sorted[0].name, "Alpha");
        assert_eq!(sorted[1].name, "Zeta");
        assert_eq!(module.references[0].name, "Zeta");
    }
}
