//! Pre-seeded external function signatures
//!
//! Recognizing `#include <stdio.h>` or `<stdlib.h>` installs a fixed set of
//! library functions as external symbols. The set lives in an embedded TOML
//! manifest so the name/return-type table is data, not code. External
//! functions bypass argument-count checking; a handful get targeted strict
//! checks in the semantic layer instead.

use crate::symbols::SymbolTable;
use serde::Deserialize;

/// Embedded default manifest.
pub static DEFAULT_EXTERNS: &str = include_str!("externs.toml");

fn default_return_type() -> String {
    "int".to_string()
}

/// One library function binding.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternFunction {
    pub name: String,
    /// Return type; defaults to `int`, the common case for libc.
    #[serde(default = "default_return_type")]
    pub returns: String,
}

/// All functions unlocked by one header.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderBinding {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<ExternFunction>,
}

/// The parsed manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternManifest {
    #[serde(default, rename = "header")]
    pub headers: Vec<HeaderBinding>,
}

impl ExternManifest {
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Failed to parse externs manifest: {}", e))
    }

    /// Parse the embedded manifest. The embedded table is part of the
    /// build, so a parse failure here is a packaging defect.
    pub fn embedded() -> Result<Self, String> {
        Self::parse(DEFAULT_EXTERNS)
    }

    pub fn header(&self, name: &str) -> Option<&HeaderBinding> {
        self.headers.iter().find(|h| h.name == name)
    }

    /// Install every function of `header` as an external symbol.
    /// Returns false when the header is not in the manifest.
    pub fn register_header(&self, symtab: &mut SymbolTable, header: &str) -> bool {
        match self.header(header) {
            Some(binding) => {
                for func in &binding.functions {
                    symtab.insert_external_function(&func.name, &func.returns);
                }
                true
            }
            None => false,
        }
    }
}

/// Externals with strict argument checks despite being external: the
/// expected argument count and parameter type.
pub fn strict_signature(name: &str) -> Option<(usize, &'static str)> {
    match name {
        "atoi" | "atol" | "atof" => Some((1, "char*")),
        "abs" => Some((1, "int")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_manifest_parses() {
        let manifest = ExternManifest::embedded().unwrap();
        assert_eq!(manifest.headers.len(), 2);
        assert!(manifest.header("stdio.h").is_some());
        assert!(manifest.header("stdlib.h").is_some());
        assert!(manifest.header("string.h").is_none());
    }

    #[test]
    fn test_specific_return_types() {
        let manifest = ExternManifest::embedded().unwrap();
        let stdlib = manifest.header("stdlib.h").unwrap();
        let ret = |name: &str| {
            stdlib
                .functions
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.returns.clone())
        };
        assert_eq!(ret("malloc").as_deref(), Some("void*"));
        assert_eq!(ret("free").as_deref(), Some("void"));
        assert_eq!(ret("atof").as_deref(), Some("double"));
        assert_eq!(ret("atol").as_deref(), Some("long"));
        assert_eq!(ret("atoi").as_deref(), Some("int"));

        let stdio = manifest.header("stdio.h").unwrap();
        let fopen = stdio.functions.iter().find(|f| f.name == "fopen").unwrap();
        assert_eq!(fopen.returns, "FILE*");
        let fgets = stdio.functions.iter().find(|f| f.name == "fgets").unwrap();
        assert_eq!(fgets.returns, "char*");
    }

    #[test]
    fn test_register_header_installs_externals() {
        let manifest = ExternManifest::embedded().unwrap();
        let mut symtab = SymbolTable::new();
        assert!(manifest.register_header(&mut symtab, "stdio.h"));

        let printf = symtab.lookup("printf").unwrap();
        assert!(printf.is_external());
        assert_eq!(printf.return_type(), Some("int"));

        // Unknown header registers nothing.
        assert!(!manifest.register_header(&mut symtab, "math.h"));
    }

    #[test]
    fn test_register_twice_is_idempotent() {
        let manifest = ExternManifest::embedded().unwrap();
        let mut symtab = SymbolTable::new();
        manifest.register_header(&mut symtab, "stdlib.h");
        let count = symtab.symbols().len();
        manifest.register_header(&mut symtab, "stdlib.h");
        assert_eq!(symtab.symbols().len(), count);
    }

    #[test]
    fn test_strict_signatures() {
        assert_eq!(strict_signature("atoi"), Some((1, "char*")));
        assert_eq!(strict_signature("abs"), Some((1, "int")));
        assert_eq!(strict_signature("printf"), None);
    }
}
