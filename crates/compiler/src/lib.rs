//! MiniC Compiler Library
//!
//! Front end for a C-like language: a single translation unit is parsed
//! into a typed AST with scoped name resolution and static type checking,
//! then lowered to a linear three-address IR, with optional basic-block and
//! next-use analysis over the emitted code.
//!
//! Pipeline, in order:
//! 1. [`parser::Parser`] drives the reductions: it builds the AST and populates
//!    the [`symbols::SymbolTable`], and runs the [`semantics`] checks.
//! 2. If no errors were counted, [`irgen::generate`] walks the tree into an
//!    [`ir::IrProgram`].
//! 3. [`blocks::analyze`] partitions the IR into basic blocks and computes
//!    next-use information for each instruction.
//!
//! ```rust
//! use minicc::compile_to_ir;
//!
//! let ir = compile_to_ir("int main() { return 0; }").unwrap();
//! assert!(ir.contains("func_begin main"));
//! ```

pub mod ast;
pub mod blocks;
pub mod diagnostics;
pub mod externs;
pub mod ir;
pub mod irgen;
pub mod lexer;
pub mod parser;
pub mod semantics;
pub mod symbols;
pub mod types;

pub use ast::{AstNode, NodeKind};
pub use blocks::{BasicBlock, FlowAnalysis, NextUse};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use externs::ExternManifest;
pub use ir::{IrOp, IrProgram, Quadruple};
pub use parser::Parser;
pub use symbols::{Symbol, SymbolKind, SymbolTable};

/// Everything one compilation produces. The IR is present only when the
/// front end finished without errors.
pub struct Compilation {
    pub ast: AstNode,
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
    pub ir: Option<IrProgram>,
}

impl Compilation {
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Run the front end over one translation unit. Lexical failures abort
/// immediately; syntactic and semantic problems are collected in the
/// returned diagnostics and suppress IR emission.
pub fn compile_source(source: &str) -> Result<Compilation, String> {
    let mut parser = Parser::new(source)?;
    let ast = parser.parse();
    let symbols = parser.symtab;
    let diagnostics = parser.diags;

    let ir = if diagnostics.has_errors() {
        None
    } else {
        Some(irgen::generate(&symbols, &ast))
    };

    Ok(Compilation {
        ast,
        symbols,
        diagnostics,
        ir,
    })
}

/// Compile a source string to the textual IR format, or the collected
/// diagnostics as one error string.
pub fn compile_to_ir(source: &str) -> Result<String, String> {
    let compilation = compile_source(source)?;
    match compilation.ir {
        Some(ir) => Ok(ir.render()),
        None => Err(compilation.diagnostics.render()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_program_compiles() {
        let ir = compile_to_ir("int main() { return 0; }").unwrap();
        assert!(ir.starts_with("# Three-Address Code (Intermediate Representation)"));
        assert!(ir.contains("func_begin main"));
        assert!(ir.contains("    return 0"));
        assert!(ir.contains("func_end main"));
    }

    #[test]
    fn test_errors_suppress_ir() {
        // Scenario: goto to an undefined label yields exactly one
        // diagnostic and no IR.
        let compilation = compile_source("int f(){ goto L; return 1; }").unwrap();
        assert!(!compilation.succeeded());
        assert!(compilation.ir.is_none());
        assert_eq!(compilation.diagnostics.semantic_error_count, 1);
        assert!(
            compilation
                .diagnostics
                .render()
                .contains("Undefined label 'L'")
        );
    }

    #[test]
    fn test_scoped_shadowing_end_to_end() {
        let source = "int main() {\n  int x = 1;\n  { int x = 2; { int x = 3; } }\n  return x;\n}";
        let compilation = compile_source(source).unwrap();
        assert!(compilation.succeeded());
        assert_eq!(compilation.diagnostics.error_count, 0);

        let xs: Vec<&Symbol> = compilation
            .symbols
            .symbols()
            .iter()
            .filter(|s| s.name == "x")
            .collect();
        assert_eq!(xs.len(), 3);
        assert_eq!(
            xs.iter().map(|s| s.scope_level).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        let mut blocks: Vec<u32> = xs.iter().map(|s| s.block_id).collect();
        blocks.dedup();
        assert_eq!(blocks.len(), 3, "each x sits in its own block");

        assert!(compilation.ir.is_some());
    }

    #[test]
    fn test_array_argument_decays_end_to_end() {
        let source = "void f(int *p) {}\nint main(){ int a[3]; f(a); return 0; }";
        let ir = compile_to_ir(source).unwrap();
        assert!(ir.contains("    param a"));
        assert!(ir.contains("    call f, 1"));
        assert!(!ir.contains("&a"));
    }

    #[test]
    fn test_short_circuit_or_end_to_end() {
        let source = "int main() { int a = 1; int b = 0; if (a || b) { return 1; } return 0; }";
        let ir = compile_to_ir(source).unwrap();
        // Both operands branch to the shared true label; the result temp
        // feeds the if.
        assert!(ir.contains("if a != 0 goto"));
        assert!(ir.contains("if b != 0 goto"));
        assert!(ir.contains("t0 = 0"));
        assert!(ir.contains("t0 = 1"));
        assert!(ir.contains("if t0 == 0 goto"));
    }

    #[test]
    fn test_switch_dispatch_end_to_end() {
        let source =
            "int main() { int x = 2; switch(x){case 1: break; case -2: break; default: break;} return 0; }";
        let ir = compile_to_ir(source).unwrap();
        assert!(ir.contains("goto SWITCH_0_CASE_1"));
        assert!(ir.contains("goto SWITCH_0_CASE_NEG_2"));
        assert!(ir.contains("goto SWITCH_0_DEFAULT"));
        assert!(ir.contains("SWITCH_0_CASE_1:"));
        assert!(ir.contains("SWITCH_0_CASE_NEG_2:"));
        assert!(ir.contains("SWITCH_0_DEFAULT:"));
    }

    #[test]
    fn test_struct_member_via_array_end_to_end() {
        let source = "struct S { int a; int m; int z; };\nint main() { struct S arr[4]; int i = 2; arr[i].m = 7; return 0; }";
        let compilation = compile_source(source).unwrap();
        assert!(compilation.succeeded());
        let ir = compilation.ir.unwrap();
        // MUL i, 12, t; ADD arr, t, t2; STORE_OFFSET t2, 4, 7
        let mul = ir
            .quads
            .iter()
            .find(|q| q.op == IrOp::Mul && q.arg1 == "i")
            .expect("scaled index");
        assert_eq!(mul.arg2, "12");
        let store = ir
            .quads
            .iter()
            .find(|q| q.op == IrOp::StoreOffset)
            .expect("member store");
        assert_eq!(store.arg2, "4");
        assert_eq!(store.result, "7");
    }

    #[test]
    fn test_data_section_lists_statics_and_globals() {
        let source = "int limit = 9;\nint bump() { static int calls = 0; calls += 1; return calls; }\nint main() { return bump(); }";
        let ir = compile_to_ir(source).unwrap();
        assert!(ir.contains("DATA:"));
        assert!(ir.contains("    bump.calls = 0"));
        assert!(ir.contains("    limit = 9"));
    }

    #[test]
    fn test_block_analysis_on_compiled_ir() {
        let source =
            "int main() { int i = 0; int s = 0; while (i < 5) { s = s + i; i = i + 1; } return s; }";
        let compilation = compile_source(source).unwrap();
        let ir = compilation.ir.unwrap();
        let analysis = blocks::analyze(&ir);
        assert!(analysis.blocks.len() >= 3);
        // The loop produces a back edge.
        assert!(
            analysis
                .blocks
                .iter()
                .any(|b| b.successors.iter().any(|&s| s <= b.id))
        );
    }

    #[test]
    fn test_multiple_errors_all_surface() {
        let source = "int main() { int x = y; int *p = 5; break; return x; }";
        let compilation = compile_source(source).unwrap();
        assert!(compilation.diagnostics.semantic_error_count >= 3);
        let rendered = compilation.diagnostics.render();
        assert!(rendered.contains("undeclared"));
        assert!(rendered.contains("pointer from integer"));
        assert!(rendered.contains("break"));
    }

    #[test]
    fn test_symbol_dump_renders() {
        let compilation =
            compile_source("int g;\nint main() { int local = 1; return local; }").unwrap();
        let dump = compilation.symbols.render();
        assert!(dump.contains("GLOBAL SCOPE"));
        assert!(dump.contains("main"));
        assert!(dump.contains("local"));
    }

    #[test]
    fn test_lex_error_is_hard_failure() {
        assert!(compile_source("int main() { char *s = \"unterminated; }").is_err());
    }
}
