//! Module model, image format and reader

mod image;
mod model;
mod reader;

pub use image::{ImageFormat, ModuleFormat, IMAGE_MAGIC};
pub use model::{
    AssemblyReference, Module, Resource, ResourceKind, TypeDefinition, TypeKind, Version,
};
pub use reader::{ModuleReader, ReadModule};
