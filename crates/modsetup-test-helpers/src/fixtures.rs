//! Test fixtures - sample modules and on-disk workspaces

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use modsetup_core::config::{ModuleInput, SetupConfig};
use modsetup_core::module::{
    AssemblyReference, ImageFormat, Module, Resource, TypeDefinition, TypeKind, Version,
};
use tempfile::TempDir;

/// Version both sample modules declare
pub const GAME_VERSION: Version = Version::new(1, 4, 4, 9);

/// Fluent construction of in-memory modules
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            module: Module::new(name, version),
        }
    }

    pub fn class(self, namespace: &str, name: &str) -> Self {
        self.type_def(TypeDefinition::new(namespace, name, TypeKind::Class))
    }

    pub fn type_def(mut self, ty: TypeDefinition) -> Self {
        self.module.types.push(ty);
        self
    }

    pub fn nested(self, namespace: &str, name: &str, declaring: &str) -> Self {
        let mut ty = TypeDefinition::new(namespace, name, TypeKind::Class);
        ty.declaring_type = Some(declaring.to_string());
        self.type_def(ty)
    }

    pub fn compiler_generated(self, name: &str) -> Self {
        let mut ty = TypeDefinition::new("", name, TypeKind::Class);
        ty.is_compiler_generated = true;
        self.type_def(ty)
    }

    pub fn resource(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.module.resources.push(Resource::embedded(name, data.into()));
        self
    }

    /// Embed `dependency` as a module image under `resource_name`
    pub fn embed(self, resource_name: &str, dependency: &Module) -> Self {
        let bytes = ImageFormat::encode(dependency).expect("encode embedded module");
        self.resource(resource_name, bytes)
    }

    pub fn reference(mut self, name: &str, version: Version) -> Self {
        self.module
            .references
            .push(AssemblyReference::new(name, version));
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// Library embedded by both sample modules
pub fn relogic_module() -> Module {
    ModuleBuilder::new("ReLogic", Version::new(1, 0, 0, 0))
        .class("ReLogic.Content", "AssetRepository")
        .build()
}

/// Client sample: shares `Terraria.Main` and `Terraria.Utilities.UnifiedRandom`
/// with the server and references an older base runtime
pub fn client_module() -> Module {
    ModuleBuilder::new("Terraria", GAME_VERSION)
        .class("Terraria", "Main")
        .nested("Terraria", "Nested", "Terraria.Main")
        .class("Terraria", "Player")
        .class("Terraria.Utilities", "UnifiedRandom")
        .class("Terraria.Initializers", "ClientInit")
        .compiler_generated("<PrivateImplementationDetails>")
        .embed("Terraria.Libraries.ReLogic.dll", &relogic_module())
        .resource("Terraria.Localization.Content.en-US.json", b"{}".to_vec())
        .reference("System.Runtime", Version::new(4, 2, 2, 0))
        .reference("ReLogic", Version::new(1, 0, 0, 0))
        .build()
}

pub fn server_module() -> Module {
    ModuleBuilder::new("TerrariaServer", GAME_VERSION)
        .class("Terraria", "Main")
        .class("Terraria.Utilities", "UnifiedRandom")
        .class("Terraria.Server", "Game")
        .embed("TerrariaServer.Libraries.ReLogic.dll", &relogic_module())
        .reference("ReLogic", Version::new(1, 0, 0, 0))
        .reference("System.Runtime", Version::new(8, 0, 0, 0))
        .build()
}

/// Temporary directory holding module images and the output tree
pub struct Workspace {
    dir: TempDir,
    pub client_path: PathBuf,
    pub server_path: PathBuf,
}

impl Workspace {
    /// Workspace with the sample client and server modules
    pub fn new() -> Self {
        Self::with_modules(&client_module(), &server_module())
    }

    pub fn with_modules(client: &Module, server: &Module) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let client_path = dir.path().join("Terraria.exe");
        let server_path = dir.path().join("TerrariaServer.exe");
        ImageFormat::write(client, &client_path).expect("write client image");
        ImageFormat::write(server, &server_path).expect("write server image");
        Self {
            dir,
            client_path,
            server_path,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("src").join("decompiled")
    }

    /// Configuration pointing at both images and this workspace's output
    pub fn config(&self) -> SetupConfig {
        SetupConfig {
            client: Some(ModuleInput {
                path: self.client_path.clone(),
                version: GAME_VERSION,
            }),
            server: Some(ModuleInput {
                path: self.server_path.clone(),
                version: GAME_VERSION,
            }),
            out_dir: self.out_dir(),
            ..Default::default()
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Every file under `root` keyed by its `/`-separated relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).expect("read dir") {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("path under root")
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.insert(relative, std::fs::read(&path).expect("read file"));
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}

/// Content of one output file as text
pub fn read_text(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).expect("read output file")
}
