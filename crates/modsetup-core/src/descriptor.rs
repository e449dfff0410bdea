//! Build descriptors
//!
//! Each module gets a project file listing its sources, embedded resources and
//! references, plus a local-environment file carrying debug settings. Output
//! depends only on the module and its plan, so identical inputs give
//! byte-identical descriptors.

use std::fmt::Write as _;
use std::path::Path;

use crate::errors::Result;
use crate::fs::{join_relative, write_atomic};
use crate::module::Module;
use crate::planner::{clean_file_name, ContentSource, FilePlan};

/// Fallback debug working directory when none is configured
const DEFAULT_WORKING_DIR: &str = "$(MSBuildProjectDirectory)";

pub fn project_file_name(module: &Module) -> String {
    format!("{}.csproj", clean_file_name(&module.name))
}

pub fn user_file_name(module: &Module) -> String {
    format!("{}.user", project_file_name(module))
}

/// Relative path of the generated module metadata source
pub fn metadata_path(module: &Module) -> String {
    format!("Properties/{}/AssemblyInfo.cs", clean_file_name(&module.name))
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Project files use Windows-style separators in `Include`
fn include_path(path: &str) -> String {
    escape_xml(&path.replace('/', "\\"))
}

/// Render the project descriptor for `module`
pub fn render_project(module: &Module, plan: &FilePlan) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "<Project Sdk=\"Microsoft.NET.Sdk\">");
    let _ = writeln!(out);
    let _ = writeln!(out, "  <PropertyGroup>");
    let _ = writeln!(
        out,
        "    <AssemblyName>{}</AssemblyName>",
        escape_xml(&module.name)
    );
    let _ = writeln!(out, "    <Version>{}</Version>", module.version);
    let _ = writeln!(out, "    <EnableDefaultItems>false</EnableDefaultItems>");
    let _ = writeln!(out, "  </PropertyGroup>");

    let references = module.sorted_references();
    if !references.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  <ItemGroup>");
        for reference in &references {
            let _ = writeln!(
                out,
                "    <Reference Include=\"{}\" />",
                escape_xml(&reference.full_name())
            );
        }
        let _ = writeln!(out, "  </ItemGroup>");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  <ItemGroup>");
    let _ = writeln!(
        out,
        "    <Compile Include=\"{}\" />",
        include_path(&metadata_path(module))
    );
    for entry in plan.sources() {
        let _ = writeln!(out, "    <Compile Include=\"{}\" />", include_path(&entry.path));
    }
    let _ = writeln!(out, "  </ItemGroup>");

    let mut resources = plan.resources().peekable();
    if resources.peek().is_some() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  <ItemGroup>");
        for entry in resources {
            let logical = match entry.source {
                ContentSource::Resource(index) => module.resources.get(index).map(|r| r.name.as_str()),
                ContentSource::Types(_) => None,
            };
            match logical {
                Some(name) => {
                    let _ = writeln!(
                        out,
                        "    <EmbeddedResource Include=\"{}\" LogicalName=\"{}\" />",
                        include_path(&entry.path),
                        escape_xml(name)
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "    <EmbeddedResource Include=\"{}\" />",
                        include_path(&entry.path)
                    );
                }
            }
        }
        let _ = writeln!(out, "  </ItemGroup>");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "</Project>");
    out
}

/// Render the local-environment descriptor
pub fn render_user(working_dir: Option<&Path>) -> String {
    let dir = working_dir
        .map(|d| d.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_WORKING_DIR.to_string());

    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    let _ = writeln!(out, "<Project ToolsVersion=\"Current\">");
    let _ = writeln!(out, "  <PropertyGroup>");
    let _ = writeln!(
        out,
        "    <StartWorkingDirectory>{}</StartWorkingDirectory>",
        escape_xml(&dir)
    );
    let _ = writeln!(out, "  </PropertyGroup>");
    let _ = writeln!(out, "</Project>");
    out
}

/// Write `<Name>.csproj` under `root`
pub fn write_project(module: &Module, plan: &FilePlan, root: &Path) -> Result<()> {
    let path = join_relative(root, &project_file_name(module));
    write_atomic(&path, render_project(module, plan).as_bytes())
}

/// Write `<Name>.csproj.user` under `root`
pub fn write_user(module: &Module, working_dir: Option<&Path>, root: &Path) -> Result<()> {
    let path = join_relative(root, &user_file_name(module));
    write_atomic(&path, render_user(working_dir).as_bytes())
}
