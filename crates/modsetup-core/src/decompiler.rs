use std::fmt::Write as _;

use crate::config::{BraceStyle, FormattingOptions};
use crate::errors::Result;
use crate::module::{Module, TypeDefinition, TypeKind};
use crate::resolver::AssemblyResolver;
use crate::scheduler::CancellationToken;

/// Source generation for a module's types and metadata
///
/// Implementations must be deterministic for identical input and options.
pub trait Decompiler: Send + Sync {
    /// Source text of one file holding `types`
    ///
    /// `resolver` is bound to `module` and answers for the modules it
    /// references, embedded or found on the search path.
    fn decompile_types(
        &self,
        module: &Module,
        types: &[&TypeDefinition],
        resolver: &dyn AssemblyResolver,
        options: &FormattingOptions,
        token: &CancellationToken,
    ) -> Result<String>;

    /// Source text of the module-level metadata file
    fn decompile_module_metadata(&self, module: &Module, options: &FormattingOptions)
        -> Result<String>;
}

/// Emits declaration skeletons without member bodies
#[derive(Debug, Default, Clone, Copy)]
pub struct SkeletonDecompiler;

impl SkeletonDecompiler {
    pub fn new() -> Self {
        Self
    }
}

struct SourceWriter<'a> {
    out: String,
    depth: usize,
    options: &'a FormattingOptions,
}

impl<'a> SourceWriter<'a> {
    fn new(options: &'a FormattingOptions) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            options,
        }
    }

    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(&self.options.indent);
            }
            self.out.push_str(text);
        }
        self.out.push_str(&self.options.newline);
    }

    fn open(&mut self, header: &str) {
        match self.options.brace_style {
            BraceStyle::NextLine => {
                self.line(header);
                self.line("{");
            }
            BraceStyle::EndOfLine => self.line(&format!("{} {{", header)),
        }
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }
}

/// Arity suffixes above this are treated as part of the name
const MAX_GENERIC_ARITY: usize = 64;

fn declaration(ty: &TypeDefinition) -> String {
    let mut name = ty.name.clone();
    if let Some((simple, arity)) = ty.name.split_once('`') {
        let count = arity
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_GENERIC_ARITY).contains(n));
        if let Some(count) = count {
            let params: Vec<String> = (0..count)
                .map(|i| if count == 1 { "T".to_string() } else { format!("T{}", i + 1) })
                .collect();
            name = format!("{}<{}>", simple, params.join(", "));
        }
    }

    match ty.kind {
        TypeKind::Delegate => format!("public delegate void {}();", name),
        kind => format!("public {} {}", kind.keyword(), name),
    }
}

impl Decompiler for SkeletonDecompiler {
    fn decompile_types(
        &self,
        _module: &Module,
        types: &[&TypeDefinition],
        _resolver: &dyn AssemblyResolver,
        options: &FormattingOptions,
        token: &CancellationToken,
    ) -> Result<String> {
        let mut w = SourceWriter::new(options);
        let namespace = types.first().map(|t| t.namespace.as_str()).unwrap_or("");

        if !namespace.is_empty() {
            w.open(&format!("namespace {}", namespace));
        }

        for (i, ty) in types.iter().enumerate() {
            token.check()?;
            if i > 0 {
                w.line("");
            }
            let decl = declaration(ty);
            if ty.kind == TypeKind::Delegate {
                w.line(&decl);
            } else {
                w.open(&decl);
                w.close();
            }
        }

        if !namespace.is_empty() {
            w.close();
        }

        Ok(w.out)
    }

    fn decompile_module_metadata(
        &self,
        module: &Module,
        options: &FormattingOptions,
    ) -> Result<String> {
        let mut out = String::new();
        let nl = &options.newline;
        // Writing into a String cannot fail
        let _ = write!(out, "using System.Reflection;{nl}{nl}");
        let _ = write!(out, "[assembly: AssemblyTitle(\"{}\")]{nl}", module.name);
        let _ = write!(out, "[assembly: AssemblyVersion(\"{}\")]{nl}", module.version);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SetupError;
    use crate::module::Version;
    use crate::resolver::NullResolver;

    #[test]
    fn test_skeleton_output() {
        let module = Module::new("Terraria", Version::new(1, 4, 4, 9));
        let a = TypeDefinition::new("Terraria.UI", "UIElement", TypeKind::Class);
        let b = TypeDefinition::new("Terraria.UI", "uielement`2", TypeKind::Struct);
        let options = FormattingOptions {
            indent: "  ".to_string(),
            ..Default::default()
        };

        let text = SkeletonDecompiler
            .decompile_types(&module, &[&a, &b], &NullResolver, &options, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            text,
            "namespace Terraria.UI\n{\n  public class UIElement\n  {\n  }\n\n  public struct uielement<T1, T2>\n  {\n  }\n}\n"
        );
    }

    #[test]
    fn test_end_of_line_braces() {
        let module = Module::new("Terraria", Version::default());
        let ty = TypeDefinition::new("", "Program", TypeKind::Interface);
        let options = FormattingOptions {
            brace_style: BraceStyle::EndOfLine,
            ..Default::default()
        };

        let text = SkeletonDecompiler
            .decompile_types(&module, &[&ty], &NullResolver, &options, &CancellationToken::new())
            .unwrap();
        assert_eq!(text, "public interface Program {\n}\n");
    }

    #[test]
    fn test_implausible_arity_keeps_raw_name() {
        let huge = TypeDefinition::new("N", "Foo`4000000000", TypeKind::Class);
        assert_eq!(declaration(&huge), "public class Foo`4000000000");

        let zero = TypeDefinition::new("N", "Foo`0", TypeKind::Class);
        assert_eq!(declaration(&zero), "public class Foo`0");

        let junk = TypeDefinition::new("N", "Foo`x", TypeKind::Class);
        assert_eq!(declaration(&junk), "public class Foo`x");

        let single = TypeDefinition::new("N", "Foo`1", TypeKind::Class);
        assert_eq!(declaration(&single), "public class Foo<T>");
    }

    #[test]
    fn test_observes_cancellation() {
        let module = Module::new("Terraria", Version::default());
        let ty = TypeDefinition::new("N", "Foo", TypeKind::Class);
        let token = CancellationToken::new();
        token.cancel();

        let err = SkeletonDecompiler
            .decompile_types(&module, &[&ty], &NullResolver, &FormattingOptions::default(), &token)
            .unwrap_err();
        assert!(matches!(err, SetupError::Cancelled));
    }

    #[test]
    fn test_module_metadata() {
        let module = Module::new("Terraria", Version::new(1, 4, 4, 9));
        let text = SkeletonDecompiler
            .decompile_module_metadata(&module, &FormattingOptions::default())
            .unwrap();
        assert!(text.contains("[assembly: AssemblyTitle(\"Terraria\")]"));
        assert!(text.contains("[assembly: AssemblyVersion(\"1.4.4.9\")]"));
    }
}
