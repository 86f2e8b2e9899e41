//! Recursive-descent parser for MiniC
//!
//! The parser drives the whole front half of the pipeline: each reduction
//! builds AST nodes, consults the semantic checks, and mutates the symbol
//! table, so by the time `parse` returns, the tree is typed and every
//! declaration is recorded. Syntax errors use panic-mode recovery (skip to
//! the next `;` or `}`) with the diagnostics sink suppressing cascades
//! inside one recovery window.
//!
//! Grammar notes:
//! - `#include <stdio.h>` / `<stdlib.h>` pre-register library functions
//!   from the embedded manifest; other preprocessor lines are gone by the
//!   time the token stream arrives.
//! - Typedef names are recognized by consulting the symbol table at parse
//!   time (the classic lexer-feedback problem, solved on the parser side).
//! - `do … until (e);` is accepted alongside `do … while (e);`.

use crate::ast::{AstNode, NodeKind};
use crate::diagnostics::Diagnostics;
use crate::externs::ExternManifest;
use crate::lexer::{self, Token, TokenKind};
use crate::semantics::{self, StatementContext};
use crate::symbols::{FunctionSignature, Parameter, SymbolKind, SymbolTable, VariableDecl};
use crate::types;

/// Parsed declaration specifiers: the base type plus storage/qualifier
/// flags that apply to every declarator in the declaration.
#[derive(Debug, Clone)]
struct SpecInfo {
    base_type: String,
    is_static: bool,
    is_typedef: bool,
    is_const: bool,
    node: AstNode,
    line: usize,
}

/// Summary of one parsed declarator.
#[derive(Debug, Clone)]
struct DeclaratorInfo {
    name: String,
    ptr_level: u32,
    is_reference: bool,
    is_const_ptr: bool,
    dims: Vec<i64>,
    has_empty_dim: bool,
    /// Parameter list when this declares a function or function pointer.
    params: Option<Vec<Parameter>>,
    is_function_pointer: bool,
    node: AstNode,
    line: usize,
}

impl DeclaratorInfo {
    fn is_function(&self) -> bool {
        self.params.is_some() && !self.is_function_pointer
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub symtab: SymbolTable,
    pub diags: Diagnostics,
    pub ctx: StatementContext,
    externs: ExternManifest,
    anon_struct_counter: usize,
    anon_union_counter: usize,
    /// One set of folded case values per active switch, innermost last.
    switch_case_values: Vec<Vec<String>>,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, String> {
        let tokens = lexer::tokenize(source)?;
        Ok(Parser {
            tokens,
            pos: 0,
            symtab: SymbolTable::new(),
            diags: Diagnostics::new(),
            ctx: StatementContext::new(),
            externs: ExternManifest::embedded()?,
            anon_struct_counter: 0,
            anon_union_counter: 0,
            switch_case_values: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_text(&self) -> &str {
        self.peek().map(|t| t.text.as_str()).unwrap_or("")
    }

    fn peek_is(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.text == text)
    }

    fn line(&self) -> usize {
        self.peek()
            .map(|t| t.line)
            .or_else(|| self.tokens.last().map(|t| t.line))
            .unwrap_or(1)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek_is(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> bool {
        if self.eat(text) {
            return true;
        }
        let found = if self.at_end() {
            "end of input".to_string()
        } else {
            format!("'{}'", self.peek_text())
        };
        self.diags
            .syntax_error(self.line(), format!("expected '{}', found {}", text, found));
        false
    }

    /// Panic-mode recovery: skip to just past the next `;` or to a `}`.
    fn synchronize(&mut self) {
        while !self.at_end() {
            let text = self.peek_text().to_string();
            if text == ";" {
                self.pos += 1;
                break;
            }
            if text == "}" {
                break;
            }
            self.pos += 1;
        }
        self.diags.recovered();
    }

    // ------------------------------------------------------------------
    // Translation unit
    // ------------------------------------------------------------------

    pub fn parse(&mut self) -> AstNode {
        let mut program = AstNode::new(NodeKind::Program, "program", 1);
        while !self.at_end() {
            if self.peek().is_some_and(|t| t.kind == TokenKind::Include) {
                let header = self.advance();
                self.externs.register_header(&mut self.symtab, &header.text);
                continue;
            }
            let before = self.pos;
            if let Some(decl) = self.parse_external_declaration() {
                program.push(decl);
            }
            if self.pos == before {
                // Whatever this is, it is not a declaration; report once and
                // move past it.
                self.diags.syntax_error(
                    self.line(),
                    format!("unexpected token '{}'", self.peek_text()),
                );
                self.synchronize();
                if self.pos == before {
                    self.pos += 1;
                }
            }
        }
        program
    }

    fn parse_external_declaration(&mut self) -> Option<AstNode> {
        if !self.starts_type() {
            return None;
        }
        let specs = self.parse_declaration_specifiers();

        if self.eat(";") {
            if specs.is_typedef {
                self.diags
                    .semantic_error(specs.line, "typedef declaration does not declare anything");
            }
            let mut decl = AstNode::new(NodeKind::Declaration, "", specs.line);
            decl.push(specs.node);
            return Some(decl);
        }

        let declarator = self.parse_declarator(&specs);

        if declarator.is_function() && self.peek_is("{") {
            return Some(self.parse_function_definition(specs, declarator));
        }

        Some(self.parse_declaration_tail(specs, declarator))
    }

    /// Everything after the first declarator of a non-function declaration.
    fn parse_declaration_tail(&mut self, specs: SpecInfo, first: DeclaratorInfo) -> AstNode {
        let mut decl = AstNode::new(NodeKind::Declaration, "", specs.line);
        decl.push(specs.node.clone());

        let item = self.parse_init_declarator(&specs, first);
        decl.push(item);
        while self.eat(",") {
            let next = self.parse_declarator(&specs);
            let item = self.parse_init_declarator(&specs, next);
            decl.push(item);
        }
        if !self.expect(";") {
            self.synchronize();
        }
        decl
    }

    // ------------------------------------------------------------------
    // Declaration specifiers
    // ------------------------------------------------------------------

    /// Does the upcoming token start a declaration?
    fn starts_type(&self) -> bool {
        let Some(tok) = self.peek() else {
            return false;
        };
        match tok.kind {
            TokenKind::Keyword => matches!(
                tok.text.as_str(),
                "void"
                    | "char"
                    | "short"
                    | "int"
                    | "long"
                    | "float"
                    | "double"
                    | "signed"
                    | "unsigned"
                    | "struct"
                    | "union"
                    | "enum"
                    | "typedef"
                    | "static"
                    | "extern"
                    | "auto"
                    | "register"
                    | "const"
                    | "volatile"
            ),
            TokenKind::Identifier => self.symtab.is_type_name(&tok.text),
            _ => false,
        }
    }

    fn parse_declaration_specifiers(&mut self) -> SpecInfo {
        let line = self.line();
        let mut node = AstNode::new(NodeKind::DeclarationSpecifiers, "", line);
        let mut base: Option<String> = None;
        let mut is_static = false;
        let mut is_typedef = false;
        let mut is_const = false;
        let mut long_count = 0;
        let mut saw_short = false;

        loop {
            let text = self.peek_text().to_string();
            match text.as_str() {
                "typedef" => {
                    is_typedef = true;
                    node.push(AstNode::new(NodeKind::StorageClassSpecifier, "typedef", self.line()));
                    self.advance();
                }
                "static" => {
                    is_static = true;
                    node.push(AstNode::new(NodeKind::StorageClassSpecifier, "static", self.line()));
                    self.advance();
                }
                "extern" | "auto" | "register" => {
                    node.push(AstNode::new(NodeKind::StorageClassSpecifier, &text, self.line()));
                    self.advance();
                }
                "const" => {
                    is_const = true;
                    node.push(AstNode::new(NodeKind::TypeQualifier, "const", self.line()));
                    self.advance();
                }
                "volatile" | "signed" | "unsigned" => {
                    node.push(AstNode::new(NodeKind::TypeQualifier, &text, self.line()));
                    self.advance();
                }
                "void" | "char" | "int" | "float" | "double" => {
                    // "long int" / "short int" collapse onto the modifier.
                    if !(text == "int" && (long_count > 0 || saw_short)) {
                        base = Some(text.clone());
                    }
                    node.push(AstNode::new(NodeKind::TypeSpecifier, &text, self.line()));
                    self.advance();
                }
                "short" => {
                    saw_short = true;
                    base = Some("short".to_string());
                    node.push(AstNode::new(NodeKind::TypeSpecifier, "short", self.line()));
                    self.advance();
                }
                "long" => {
                    long_count += 1;
                    base = Some("long".to_string());
                    node.push(AstNode::new(NodeKind::TypeSpecifier, "long", self.line()));
                    self.advance();
                }
                "struct" | "union" => {
                    let (ty, spec_node) = self.parse_record_specifier(text == "union");
                    base = Some(ty);
                    node.push(spec_node);
                }
                "enum" => {
                    let spec_node = self.parse_enum_specifier();
                    base = Some("int".to_string());
                    node.push(spec_node);
                }
                _ => {
                    // A typedef name can serve as the base type, once.
                    if base.is_none()
                        && self
                            .peek()
                            .is_some_and(|t| t.kind == TokenKind::Identifier)
                        && self.symtab.is_type_name(&text)
                    {
                        base = Some(text.clone());
                        node.push(AstNode::new(NodeKind::TypeName, &text, self.line()));
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let base_type = base.unwrap_or_else(|| "int".to_string());
        self.symtab.set_current_type(&base_type);
        SpecInfo {
            base_type,
            is_static,
            is_typedef,
            is_const,
            node,
            line,
        }
    }

    /// `struct Tag { members }` / `union Tag` / anonymous bodies.
    fn parse_record_specifier(&mut self, is_union: bool) -> (String, AstNode) {
        let line = self.line();
        self.advance(); // struct | union
        let keyword = if is_union { "union" } else { "struct" };

        let tag = if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
            self.advance().text
        } else if is_union {
            self.anon_union_counter += 1;
            format!("__anon_union_{}", self.anon_union_counter)
        } else {
            self.anon_struct_counter += 1;
            format!("__anon_struct_{}", self.anon_struct_counter)
        };

        let kind = if is_union {
            NodeKind::UnionSpecifier
        } else {
            NodeKind::StructSpecifier
        };
        let node = AstNode::new(kind, &tag, line);

        if self.eat("{") {
            let members = self.parse_member_list();
            self.expect("}");
            if is_union {
                self.symtab.insert_union(&tag, members);
            } else {
                self.symtab.insert_struct(&tag, members);
            }
        }
        (format!("{} {}", keyword, tag), node)
    }

    /// Struct/union member declarations up to the closing brace.
    fn parse_member_list(&mut self) -> Vec<(String, String)> {
        let mut members = Vec::new();
        while !self.peek_is("}") && !self.at_end() {
            if !self.starts_type() {
                self.diags.syntax_error(
                    self.line(),
                    format!("expected member declaration, found '{}'", self.peek_text()),
                );
                self.synchronize();
                continue;
            }
            let specs = self.parse_declaration_specifiers();
            loop {
                let d = self.parse_declarator(&specs);
                let mut ty = specs.base_type.clone();
                for _ in 0..d.ptr_level {
                    ty.push('*');
                }
                for dim in &d.dims {
                    ty.push_str(&format!("[{}]", dim));
                }
                if !d.name.is_empty() {
                    members.push((d.name, ty));
                }
                if !self.eat(",") {
                    break;
                }
            }
            if !self.expect(";") {
                self.synchronize();
            }
        }
        members
    }

    /// `enum Tag { A, B = expr, … }`: registers the constants with their
    /// running values.
    fn parse_enum_specifier(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // enum
        let tag = if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
            self.advance().text
        } else {
            String::new()
        };
        let mut node = AstNode::new(NodeKind::EnumSpecifier, &tag, line);

        if self.eat("{") {
            let mut next_value: i64 = 0;
            while !self.peek_is("}") && !self.at_end() {
                if !self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
                    self.diags.syntax_error(
                        self.line(),
                        format!("expected enumerator name, found '{}'", self.peek_text()),
                    );
                    self.synchronize();
                    break;
                }
                let name_tok = self.advance();
                if self.eat("=") {
                    let expr = self.parse_conditional();
                    match semantics::constant_value(&expr, &self.symtab)
                        .and_then(|v| v.parse::<i64>().ok())
                    {
                        Some(v) => next_value = v,
                        None => self.diags.semantic_error(
                            name_tok.line,
                            format!("enumerator value for '{}' is not a constant", name_tok.text),
                        ),
                    }
                }
                self.symtab.insert_enum_constant(&name_tok.text, next_value);
                node.push(AstNode::new(NodeKind::Enumerator, &name_tok.text, name_tok.line));
                next_value += 1;
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("}");
        }
        node
    }

    // ------------------------------------------------------------------
    // Declarators
    // ------------------------------------------------------------------

    fn parse_declarator(&mut self, specs: &SpecInfo) -> DeclaratorInfo {
        let line = self.line();
        let mut ptr_level: u32 = 0;
        let mut is_reference = false;
        let mut is_const_ptr = false;
        let mut shape_children: Vec<AstNode> = Vec::new();

        loop {
            if self.eat("*") {
                ptr_level += 1;
                if self.eat("const") {
                    is_const_ptr = true;
                }
                shape_children.push(AstNode::new(NodeKind::Pointer, "*", line));
            } else if self.eat("&") {
                is_reference = true;
                shape_children.push(AstNode::new(NodeKind::Pointer, "&", line));
            } else {
                break;
            }
        }

        // Function-pointer declarator: (*name)(params)
        if self.peek_is("(") && self.peek_at(1).is_some_and(|t| t.text == "*") {
            self.advance(); // (
            self.advance(); // *
            let name = if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
                self.advance().text
            } else {
                String::new()
            };
            self.expect(")");
            let params = if self.expect("(") {
                let p = self.parse_parameter_list();
                self.expect(")");
                Some(p)
            } else {
                None
            };
            let mut node = AstNode::new(NodeKind::Declarator, &name, line);
            let mut inner = AstNode::new(NodeKind::Pointer, "*", line);
            inner.push(AstNode::new(NodeKind::Identifier, &name, line));
            node.push(inner);
            node.push(AstNode::new(NodeKind::ParameterList, "params", line));
            return DeclaratorInfo {
                name,
                ptr_level,
                is_reference,
                is_const_ptr,
                dims: Vec::new(),
                has_empty_dim: false,
                params,
                is_function_pointer: true,
                node,
                line,
            };
        }

        // A typedef name in declarator position still names the entity.
        let name = if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
            self.advance().text
        } else {
            String::new()
        };

        let mut dims: Vec<i64> = Vec::new();
        let mut has_empty_dim = false;
        let mut params: Option<Vec<Parameter>> = None;
        let mut direct = AstNode::new(NodeKind::Identifier, &name, line);

        loop {
            if self.eat("[") {
                if self.eat("]") {
                    has_empty_dim = true;
                    let mut arr = AstNode::new(NodeKind::DirectDeclarator, "array[]", line);
                    arr.push(direct);
                    direct = arr;
                    continue;
                }
                let dim_expr = self.parse_conditional();
                let dim_line = dim_expr.line;
                let dim = match semantics::constant_value(&dim_expr, &self.symtab) {
                    Some(v) if v.contains('.') => {
                        self.diags
                            .semantic_error(dim_line, "invalid array size (non-integer type)");
                        1
                    }
                    Some(v) => match v.parse::<i64>() {
                        Ok(n) if n < 0 => {
                            self.diags.semantic_error(dim_line, "negative array size");
                            1
                        }
                        Ok(n) => n,
                        Err(_) => {
                            self.diags
                                .semantic_error(dim_line, format!("invalid array size '{}'", v));
                            1
                        }
                    },
                    None => {
                        self.diags
                            .semantic_error(dim_line, "invalid array size (non-integer type)");
                        1
                    }
                };
                self.expect("]");
                dims.push(dim);
                let mut arr = AstNode::new(NodeKind::DirectDeclarator, "array", line);
                arr.push(direct);
                arr.push(dim_expr);
                direct = arr;
            } else if self.peek_is("(") && params.is_none() && !name.is_empty() {
                self.advance();
                let p = self.parse_parameter_list();
                self.expect(")");
                params = Some(p);
                let mut fun = AstNode::new(NodeKind::DirectDeclarator, "params", line);
                fun.push(direct);
                direct = fun;
            } else {
                break;
            }
        }

        let mut node = AstNode::new(NodeKind::Declarator, &name, line);
        for shape in shape_children {
            node.push(shape);
        }
        node.push(direct);
        // Carry the declared base type for downstream passes.
        node.data_type = Some(specs.base_type.clone());

        DeclaratorInfo {
            name,
            ptr_level,
            is_reference,
            is_const_ptr,
            dims,
            has_empty_dim,
            params,
            is_function_pointer: false,
            node,
            line,
        }
    }

    /// `( parameter-declaration, … )` minus the parentheses. Also accepts
    /// `void` and an empty list.
    fn parse_parameter_list(&mut self) -> Vec<Parameter> {
        let mut params = Vec::new();
        if self.peek_is(")") {
            return params;
        }
        if self.peek_is("void") && self.peek_at(1).is_some_and(|t| t.text == ")") {
            self.advance();
            return params;
        }
        loop {
            if !self.starts_type() {
                self.diags.syntax_error(
                    self.line(),
                    format!("expected parameter declaration, found '{}'", self.peek_text()),
                );
                break;
            }
            let specs = self.parse_declaration_specifiers();
            if specs.is_static {
                self.diags.semantic_error(
                    specs.line,
                    "Illegal storage class 'static' on function parameter",
                );
            }
            let d = self.parse_declarator(&specs);

            // Arrays decay to pointers in parameter position.
            let total_ptr = d.ptr_level + d.dims.len() as u32 + u32::from(d.has_empty_dim);
            let ty = if d.is_reference {
                format!("{} &", specs.base_type)
            } else {
                let mut t = specs.base_type.clone();
                for _ in 0..total_ptr {
                    t.push('*');
                }
                t
            };
            params.push(Parameter {
                name: d.name,
                ty,
                is_reference: d.is_reference,
            });
            if !self.eat(",") {
                break;
            }
        }
        params
    }

    // ------------------------------------------------------------------
    // Function definitions and declarations
    // ------------------------------------------------------------------

    fn parse_function_definition(&mut self, specs: SpecInfo, decl: DeclaratorInfo) -> AstNode {
        let name = decl.name.clone();
        let mut return_type = specs.base_type.clone();
        for _ in 0..decl.ptr_level {
            return_type.push('*');
        }
        let params = decl.params.clone().unwrap_or_default();

        self.symtab
            .insert_function(&name, &return_type, params.clone(), specs.is_static);
        self.symtab.enter_function_scope(&name);
        for p in &params {
            if p.name.is_empty() {
                continue;
            }
            let ptr_level = p.ty.matches('*').count() as u32;
            self.symtab
                .insert_parameter(&p.name, &p.ty, ptr_level, p.is_reference);
        }

        let body = self.parse_compound_statement();
        let closing_line = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.line)
            .unwrap_or(decl.line);

        // Gotos resolve against the function's labels once the body is done.
        for (_goto_line, message) in self.ctx.resolve_gotos(&self.symtab, &name) {
            self.diags.semantic_error(closing_line, message);
        }

        self.symtab.exit_function_scope();

        let mut node = AstNode::new(NodeKind::FunctionDefinition, &name, specs.line);
        node.push(specs.node);
        node.push(decl.node);
        node.push(body);
        node
    }

    /// One `declarator [= initializer]` of a declaration: symbol insertion
    /// plus every declaration-site semantic rule.
    fn parse_init_declarator(&mut self, specs: &SpecInfo, decl: DeclaratorInfo) -> AstNode {
        let line = decl.line;

        if specs.is_typedef {
            let mut underlying = specs.base_type.clone();
            for _ in 0..decl.ptr_level {
                underlying.push('*');
            }
            for dim in &decl.dims {
                underlying.push_str(&format!("[{}]", dim));
            }
            if decl.name.is_empty() {
                self.diags
                    .semantic_error(line, "typedef declaration does not declare anything");
            } else {
                self.symtab.insert_typedef(&decl.name, &underlying);
            }
            return decl.node;
        }

        // Function pointer: register the symbol and the flat name registry.
        if decl.is_function_pointer {
            match &decl.params {
                Some(params) => {
                    let mut return_type = specs.base_type.clone();
                    for _ in 0..decl.ptr_level {
                        return_type.push('*');
                    }
                    self.symtab.insert_function_pointer(
                        &decl.name,
                        FunctionSignature {
                            return_type,
                            params: params.clone(),
                        },
                    );
                }
                None => {
                    self.diags.semantic_error(
                        line,
                        format!("malformed function pointer declarator for '{}'", decl.name),
                    );
                }
            }
            if self.eat("=") {
                let init = self.parse_assignment();
                let mut node = AstNode::new(NodeKind::Initializer, "=", line);
                node.push(decl.node);
                node.push(init);
                return node;
            }
            return decl.node;
        }

        // Function prototype.
        if decl.is_function() {
            let mut return_type = specs.base_type.clone();
            for _ in 0..decl.ptr_level {
                return_type.push('*');
            }
            self.symtab.insert_function(
                &decl.name,
                &return_type,
                decl.params.clone().unwrap_or_default(),
                specs.is_static,
            );
            return decl.node;
        }

        // Variable declaration: redeclaration rules first.
        if let Some(prev) = self.symtab.lookup(&decl.name) {
            if prev.kind == SymbolKind::Typedef {
                self.diags.semantic_error(
                    line,
                    format!(
                        "redeclaration of '{}' as different kind of symbol (was typedef)",
                        decl.name
                    ),
                );
            } else if prev.kind == SymbolKind::Variable
                && prev.scope_level != self.symtab.current_scope()
                && prev.is_static != specs.is_static
            {
                self.diags.semantic_error(
                    line,
                    format!(
                        "Conflicting storage class for re-declaration of '{}'",
                        decl.name
                    ),
                );
            }
        }

        let mut dims = decl.dims.clone();
        let has_initializer = self.peek_is("=");

        if decl.has_empty_dim && !has_initializer {
            self.diags
                .semantic_error(line, "array size missing and no initializer");
        }

        let mut init_expr: Option<AstNode> = None;
        if self.eat("=") {
            let init = self.parse_initializer();

            // Infer [] size from the initializer.
            if decl.has_empty_dim {
                dims.insert(0, initializer_element_count(&init));
            }
            init_expr = Some(init);
        }

        let var_ty = if decl.is_reference {
            format!("{} &", specs.base_type)
        } else {
            let mut t = specs.base_type.clone();
            for _ in 0..decl.ptr_level {
                t.push('*');
            }
            t
        };
        self.symtab.insert_variable(&VariableDecl {
            name: decl.name.clone(),
            ty: var_ty.clone(),
            dims: dims.clone(),
            ptr_level: decl.ptr_level,
            is_static: specs.is_static,
            points_to_const: specs.is_const,
            is_const_ptr: decl.is_const_ptr,
            is_reference: decl.is_reference,
        });

        let Some(init) = init_expr else {
            return decl.node;
        };

        self.check_initializer(specs, &decl, &dims, &var_ty, &init, line);

        let mut node = AstNode::new(NodeKind::Initializer, "=", line);
        node.push(decl.node);
        node.push(init);
        node
    }

    /// Declaration-site initializer rules: constness for statics, element
    /// counts for arrays, convertibility for scalars.
    fn check_initializer(
        &mut self,
        specs: &SpecInfo,
        decl: &DeclaratorInfo,
        dims: &[i64],
        var_ty: &str,
        init: &AstNode,
        line: usize,
    ) {
        let is_global = self.symtab.current_function.is_empty();
        if (specs.is_static || is_global)
            && !semantics::is_constant_expression(init, &self.symtab)
        {
            self.diags
                .semantic_error(line, "Initializer for static storage must be constant");
        }

        if !dims.is_empty() {
            let declared = dims[0];
            let count = initializer_element_count(init);
            let is_char_string = types::is_char_type(&specs.base_type)
                && init.kind == NodeKind::StringLiteral;
            if !decl.has_empty_dim && count > declared && (!is_char_string || count - 1 > declared)
            {
                self.diags.semantic_error(
                    line,
                    format!("too many initializers for '{}[{}]'", decl.name, declared),
                );
            }
            return;
        }

        let init_ty = init.type_or_int();
        if types::is_void(init_ty) {
            self.diags
                .semantic_error(line, "void value not ignored as it ought to be");
            return;
        }
        if init.kind == NodeKind::Initializer && init.value == "init_list" {
            // Struct initializer lists are checked member-wise by count only.
            return;
        }
        let lt = types::strip_reference(var_ty);
        if types::is_array_type(init_ty) && !types::is_pointer_type(&lt) {
            self.diags.semantic_error(
                line,
                format!("cannot convert array type '{}' to '{}'", init_ty, lt),
            );
            return;
        }
        let rt = types::decay(init_ty);
        if types::is_pointer_type(&lt)
            && types::is_integer_type(&rt)
            && !semantics::is_null_pointer_constant(init)
        {
            self.diags
                .semantic_error(line, "initialization makes pointer from integer without a cast");
            return;
        }
        if types::is_integer_type(&lt) && types::is_pointer_type(&rt) {
            self.diags
                .semantic_error(line, "initialization makes integer from pointer without a cast");
            return;
        }
        if types::is_pointer_type(&lt)
            && types::is_pointer_type(&rt)
            && !types::pointer_compatible(&lt, &rt)
        {
            self.diags.warning(
                line,
                format!("initialization from incompatible pointer type ('{}' from '{}')", lt, rt),
            );
        }
        if types::is_char_type(&lt) && types::is_arithmetic_type(&rt) && rt != "char" {
            self.diags
                .warning(line, format!("conversion from '{}' to 'char' may change value", rt));
        }
    }

    /// `{ a, b, … }` (possibly nested) or a single assignment expression.
    fn parse_initializer(&mut self) -> AstNode {
        if self.eat("{") {
            let line = self.line();
            let mut list = AstNode::new(NodeKind::Initializer, "init_list", line);
            if !self.peek_is("}") {
                loop {
                    list.push(self.parse_initializer());
                    if !self.eat(",") {
                        break;
                    }
                    if self.peek_is("}") {
                        break; // trailing comma
                    }
                }
            }
            self.expect("}");
            return list;
        }
        self.parse_assignment()
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_compound_statement(&mut self) -> AstNode {
        let line = self.line();
        self.expect("{");
        self.symtab.enter_scope();
        let mut node = AstNode::new(NodeKind::CompoundStatement, "", line);
        while !self.peek_is("}") && !self.at_end() {
            let before = self.pos;
            node.push(self.parse_statement());
            if self.pos == before {
                // Safety valve against a stuck parse.
                self.pos += 1;
            }
        }
        self.expect("}");
        self.symtab.exit_scope();
        node
    }

    fn parse_statement(&mut self) -> AstNode {
        let line = self.line();

        if self.peek_is("{") {
            return self.parse_compound_statement();
        }

        if self.starts_type() {
            let specs = self.parse_declaration_specifiers();
            if self.eat(";") {
                if specs.is_typedef {
                    self.diags
                        .semantic_error(specs.line, "typedef declaration does not declare anything");
                }
                let mut decl = AstNode::new(NodeKind::Declaration, "", specs.line);
                decl.push(specs.node);
                return decl;
            }
            let declarator = self.parse_declarator(&specs);
            return self.parse_declaration_tail(specs, declarator);
        }

        match self.peek_text() {
            "if" => return self.parse_if_statement(),
            "switch" => return self.parse_switch_statement(),
            "while" => return self.parse_while_statement(),
            "do" => return self.parse_do_statement(),
            "for" => return self.parse_for_statement(),
            "break" => {
                self.advance();
                if let Err(msg) = self.ctx.check_break() {
                    self.diags.semantic_error(line, msg);
                }
                self.expect(";");
                return AstNode::new(NodeKind::JumpStatement, "break", line);
            }
            "continue" => {
                self.advance();
                if let Err(msg) = self.ctx.check_continue() {
                    self.diags.semantic_error(line, msg);
                }
                self.expect(";");
                return AstNode::new(NodeKind::JumpStatement, "continue", line);
            }
            "return" => {
                self.advance();
                let mut node = AstNode::new(NodeKind::JumpStatement, "return", line);
                if !self.peek_is(";") {
                    node.push(self.parse_expression());
                }
                self.expect(";");
                return node;
            }
            "goto" => {
                self.advance();
                let mut node = AstNode::new(NodeKind::JumpStatement, "goto", line);
                if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
                    let label = self.advance();
                    self.ctx.record_goto(&label.text, label.line);
                    node.push(AstNode::new(NodeKind::Identifier, &label.text, label.line));
                } else {
                    self.diags
                        .syntax_error(line, "expected label name after 'goto'");
                }
                self.expect(";");
                return node;
            }
            "case" => return self.parse_case_label(),
            "default" => {
                self.advance();
                self.expect(":");
                let mut node = AstNode::new(NodeKind::LabeledStatement, "default", line);
                node.push(self.parse_statement());
                return node;
            }
            _ => {}
        }

        // Plain label: IDENT ':' statement
        if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier)
            && self.peek_at(1).is_some_and(|t| t.text == ":")
        {
            let label = self.advance();
            self.advance(); // :
            if let Err(msg) = self.symtab.insert_label(&label.text) {
                self.diags.semantic_error(label.line, msg);
            }
            let mut node = AstNode::new(NodeKind::LabeledStatement, "label", label.line);
            node.push(AstNode::new(NodeKind::Identifier, &label.text, label.line));
            node.push(self.parse_statement());
            return node;
        }

        // Expression statement (possibly empty).
        let mut node = AstNode::new(NodeKind::ExpressionStatement, "", line);
        if !self.peek_is(";") {
            node.push(self.parse_expression());
        }
        if !self.expect(";") {
            self.synchronize();
        }
        node
    }

    fn parse_condition(&mut self) -> AstNode {
        self.expect("(");
        let cond = self.parse_expression();
        if let Err(msg) = semantics::check_condition(cond.type_or_int()) {
            self.diags.semantic_error(cond.line, msg);
        }
        self.expect(")");
        cond
    }

    fn parse_if_statement(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // if
        let cond = self.parse_condition();
        let then_branch = self.parse_statement();
        if self.eat("else") {
            let else_branch = self.parse_statement();
            AstNode::with_children(
                NodeKind::SelectionStatement,
                "if_else",
                line,
                vec![cond, then_branch, else_branch],
            )
        } else {
            AstNode::with_children(
                NodeKind::SelectionStatement,
                "if",
                line,
                vec![cond, then_branch],
            )
        }
    }

    fn parse_switch_statement(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // switch
        let cond = self.parse_condition();
        self.ctx.enter_switch();
        self.switch_case_values.push(Vec::new());
        let body = self.parse_statement();
        self.switch_case_values.pop();
        self.ctx.leave_switch();
        AstNode::with_children(NodeKind::SelectionStatement, "switch", line, vec![cond, body])
    }

    fn parse_case_label(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // case
        let expr = self.parse_conditional();
        if self.ctx.switch_depth == 0 {
            self.diags
                .semantic_error(line, "case label not within a switch statement");
        } else {
            match semantics::check_case_label(&expr, &self.symtab) {
                Ok(value) => {
                    let seen = self.switch_case_values.last_mut().expect("switch stack");
                    if seen.contains(&value) {
                        self.diags.semantic_error(
                            line,
                            format!("duplicate case value '{}' in switch statement", value),
                        );
                    } else {
                        seen.push(value);
                    }
                }
                Err(msg) => self.diags.semantic_error(line, msg),
            }
        }
        self.expect(":");
        let mut node = AstNode::new(NodeKind::LabeledStatement, "case", line);
        node.push(expr);
        node.push(self.parse_statement());
        node
    }

    fn parse_while_statement(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // while
        let cond = self.parse_condition();
        self.ctx.enter_loop();
        let body = self.parse_statement();
        self.ctx.leave_loop();
        AstNode::with_children(NodeKind::IterationStatement, "while", line, vec![cond, body])
    }

    fn parse_do_statement(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // do
        self.ctx.enter_loop();
        let body = self.parse_statement();
        self.ctx.leave_loop();

        let tag = if self.eat("until") {
            "do_until"
        } else {
            self.expect("while");
            "do_while"
        };
        let cond = self.parse_condition();
        self.expect(";");
        AstNode::with_children(NodeKind::IterationStatement, tag, line, vec![cond, body])
    }

    fn parse_for_statement(&mut self) -> AstNode {
        let line = self.line();
        self.advance(); // for
        self.expect("(");

        let init = if self.peek_is(";") {
            AstNode::new(NodeKind::ExpressionStatement, "", self.line())
        } else {
            let mut n = AstNode::new(NodeKind::ExpressionStatement, "", self.line());
            n.push(self.parse_expression());
            n
        };
        self.expect(";");

        let cond = if self.peek_is(";") {
            AstNode::new(NodeKind::ExpressionStatement, "", self.line())
        } else {
            let c = self.parse_expression();
            if let Err(msg) = semantics::check_condition(c.type_or_int()) {
                self.diags.semantic_error(c.line, msg);
            }
            c
        };
        self.expect(";");

        let step = if self.peek_is(")") {
            AstNode::new(NodeKind::ExpressionStatement, "", self.line())
        } else {
            let mut n = AstNode::new(NodeKind::ExpressionStatement, "", self.line());
            n.push(self.parse_expression());
            n
        };
        self.expect(")");

        self.ctx.enter_loop();
        let body = self.parse_statement();
        self.ctx.leave_loop();
        AstNode::with_children(
            NodeKind::IterationStatement,
            "for",
            line,
            vec![init, cond, step, body],
        )
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> AstNode {
        let first = self.parse_assignment();
        if !self.peek_is(",") {
            return first;
        }
        let line = first.line;
        let mut node = AstNode::new(NodeKind::Expression, ",", line);
        node.push(first);
        while self.eat(",") {
            node.push(self.parse_assignment());
        }
        node.data_type = node.children.last().and_then(|c| c.data_type.clone());
        node
    }

    fn parse_assignment(&mut self) -> AstNode {
        let lhs = self.parse_conditional();
        let op = self.peek_text().to_string();
        let is_assign_op = matches!(
            op.as_str(),
            "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>="
        );
        if !is_assign_op {
            return lhs;
        }
        let line = self.line();
        self.advance();
        let rhs = self.parse_assignment();

        let mut node = AstNode::new(NodeKind::AssignmentExpression, &op, line);
        if op == "=" {
            match semantics::check_assignment(&lhs, &rhs, &self.symtab) {
                Ok(check) => {
                    if let Some(warning) = check.warning {
                        self.diags.warning(line, warning);
                    }
                    node.data_type = Some(check.ty);
                }
                Err(msg) => {
                    self.diags.semantic_error(line, msg);
                    node.data_type = Some("int".to_string());
                }
            }
        } else {
            // Compound assignment: the underlying binary operator plus
            // assignability of the left side.
            if !semantics::is_lvalue_node(&lhs) {
                self.diags
                    .semantic_error(line, "lvalue required as left operand of assignment");
            }
            let binary_op = op.trim_end_matches('=');
            match semantics::check_binary(binary_op, &lhs, &rhs) {
                Ok(_) => node.data_type = lhs.data_type.clone(),
                Err(msg) => {
                    self.diags.semantic_error(line, msg);
                    node.data_type = Some("int".to_string());
                }
            }
        }
        node.push(lhs);
        node.push(rhs);
        node
    }

    fn parse_conditional(&mut self) -> AstNode {
        let cond = self.parse_binary(0);
        if !self.peek_is("?") {
            return cond;
        }
        let line = self.line();
        self.advance();
        if let Err(msg) = semantics::check_condition(cond.type_or_int()) {
            self.diags.semantic_error(cond.line, msg);
        }
        let then_val = self.parse_expression();
        self.expect(":");
        let else_val = self.parse_conditional();

        let tt = types::decay(then_val.type_or_int());
        let et = types::decay(else_val.type_or_int());
        let result = if tt == et {
            tt
        } else if types::is_arithmetic_type(&tt) && types::is_arithmetic_type(&et) {
            types::usual_arith_conv(&tt, &et).to_string()
        } else {
            "int".to_string()
        };
        let mut node = AstNode::with_children(
            NodeKind::ConditionalExpression,
            "?:",
            line,
            vec![cond, then_val, else_val],
        );
        node.data_type = Some(result);
        node
    }

    /// Binary operator precedence table, loosest first. Each row is
    /// (operators, node kind).
    const BINARY_LEVELS: &'static [(&'static [&'static str], NodeKind)] = &[
        (&["||"], NodeKind::LogicalOrExpression),
        (&["&&"], NodeKind::LogicalAndExpression),
        (&["|"], NodeKind::InclusiveOrExpression),
        (&["^"], NodeKind::ExclusiveOrExpression),
        (&["&"], NodeKind::AndExpression),
        (&["==", "!="], NodeKind::EqualityExpression),
        (&["<", ">", "<=", ">="], NodeKind::RelationalExpression),
        (&["<<", ">>"], NodeKind::ShiftExpression),
        (&["+", "-"], NodeKind::AdditiveExpression),
        (&["*", "/", "%"], NodeKind::MultiplicativeExpression),
    ];

    fn parse_binary(&mut self, level: usize) -> AstNode {
        if level >= Self::BINARY_LEVELS.len() {
            return self.parse_cast();
        }
        let (ops, kind) = Self::BINARY_LEVELS[level];
        let mut lhs = self.parse_binary(level + 1);
        loop {
            let op = self.peek_text().to_string();
            if !ops.contains(&op.as_str()) {
                return lhs;
            }
            let line = self.line();
            self.advance();
            let rhs = self.parse_binary(level + 1);

            let ty = match semantics::check_binary(&op, &lhs, &rhs) {
                Ok(t) => t,
                Err(msg) => {
                    self.diags.semantic_error(line, msg);
                    "int".to_string()
                }
            };
            let mut node = AstNode::with_children(kind, &op, line, vec![lhs, rhs]);
            node.data_type = Some(ty);
            lhs = node;
        }
    }

    /// A parenthesized type name, as used by casts and `sizeof`.
    fn looks_like_type_in_parens(&self) -> bool {
        if !self.peek_is("(") {
            return false;
        }
        let Some(tok) = self.peek_at(1) else {
            return false;
        };
        match tok.kind {
            TokenKind::Keyword => matches!(
                tok.text.as_str(),
                "void"
                    | "char"
                    | "short"
                    | "int"
                    | "long"
                    | "float"
                    | "double"
                    | "signed"
                    | "unsigned"
                    | "struct"
                    | "union"
                    | "enum"
                    | "const"
            ),
            TokenKind::Identifier => self.symtab.is_type_name(&tok.text),
            _ => false,
        }
    }

    /// `( type-name )`: base type plus pointer stars.
    fn parse_type_name(&mut self) -> String {
        let specs = self.parse_declaration_specifiers();
        let mut ty = specs.base_type;
        while self.eat("*") {
            ty.push('*');
        }
        ty
    }

    fn parse_cast(&mut self) -> AstNode {
        if self.looks_like_type_in_parens() {
            let line = self.line();
            self.advance(); // (
            let target = self.parse_type_name();
            self.expect(")");
            let operand = self.parse_cast();

            let mut type_node = AstNode::new(NodeKind::TypeName, &target, line);
            type_node.data_type = Some(target.clone());
            let mut node = AstNode::with_children(
                NodeKind::CastExpression,
                "cast",
                line,
                vec![type_node, operand],
            );
            node.data_type = Some(target);
            return node;
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> AstNode {
        let line = self.line();
        match self.peek_text() {
            "++" | "--" => {
                let op = self.advance().text;
                let operand = self.parse_unary();
                let ty = match semantics::check_unary(&op, &operand) {
                    Ok(t) => t,
                    Err(msg) => {
                        self.diags.semantic_error(line, msg);
                        "int".to_string()
                    }
                };
                let tag = format!("{}_pre", op);
                let mut node =
                    AstNode::with_children(NodeKind::UnaryExpression, tag, line, vec![operand]);
                node.data_type = Some(ty);
                node
            }
            "sizeof" => {
                self.advance();
                let mut node = AstNode::new(NodeKind::UnaryExpression, "sizeof", line);
                if self.looks_like_type_in_parens() {
                    self.advance(); // (
                    let ty = self.parse_type_name();
                    self.expect(")");
                    let mut type_node = AstNode::new(NodeKind::TypeName, &ty, line);
                    type_node.data_type = Some(ty);
                    node.push(type_node);
                } else {
                    node.push(self.parse_unary());
                }
                node.data_type = Some("int".to_string());
                node
            }
            "&" | "*" | "+" | "-" | "~" | "!" => {
                let op = self.advance().text;
                let operand = self.parse_cast();

                // Fold a sign applied directly to a numeric literal into the
                // literal itself, so `-5` travels as one constant.
                if (op == "-" || op == "+")
                    && matches!(
                        operand.kind,
                        NodeKind::IntegerConstant | NodeKind::FloatConstant | NodeKind::Constant
                    )
                {
                    let mut folded = operand;
                    if op == "-" {
                        folded.value = match folded.value.strip_prefix('-') {
                            Some(positive) => positive.to_string(),
                            None => format!("-{}", folded.value),
                        };
                    }
                    return folded;
                }

                let ty = match semantics::check_unary(&op, &operand) {
                    Ok(t) => t,
                    Err(msg) => {
                        self.diags.semantic_error(line, msg);
                        "int".to_string()
                    }
                };
                let mut node =
                    AstNode::with_children(NodeKind::UnaryExpression, &op, line, vec![operand]);
                node.data_type = Some(ty);
                node.is_lvalue = op == "*";
                node
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> AstNode {
        let mut expr = self.parse_primary();
        loop {
            let line = self.line();
            match self.peek_text() {
                "[" => {
                    self.advance();
                    let index = self.parse_expression();
                    self.expect("]");
                    let ty = match semantics::check_array_index(&expr, &index) {
                        Ok(t) => t,
                        Err(msg) => {
                            self.diags.semantic_error(line, msg);
                            "int".to_string()
                        }
                    };
                    let mut node = AstNode::with_children(
                        NodeKind::PostfixExpression,
                        "[]",
                        line,
                        vec![expr, index],
                    );
                    node.data_type = Some(ty);
                    node.is_lvalue = true;
                    expr = node;
                }
                "(" => {
                    self.advance();
                    let mut args = AstNode::new(NodeKind::ArgumentList, "args", line);
                    if !self.peek_is(")") {
                        loop {
                            args.push(self.parse_assignment());
                            if !self.eat(",") {
                                break;
                            }
                        }
                    }
                    self.expect(")");

                    let mut return_type = "int".to_string();
                    if expr.kind == NodeKind::Identifier {
                        let arg_refs: Vec<&AstNode> = args.children.iter().collect();
                        let check = semantics::check_call(&self.symtab, &expr.value, &arg_refs);
                        for msg in check.errors {
                            self.diags.semantic_error(line, msg);
                        }
                        return_type = check.return_type;
                    }
                    let mut node = AstNode::with_children(
                        NodeKind::PostfixExpression,
                        "()",
                        line,
                        vec![expr, args],
                    );
                    node.data_type = Some(return_type);
                    expr = node;
                }
                "." | "->" => {
                    let op = self.advance().text;
                    let member = if self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
                        self.advance()
                    } else {
                        self.diags.syntax_error(
                            line,
                            format!("expected member name after '{}'", op),
                        );
                        Token {
                            kind: TokenKind::Identifier,
                            text: String::new(),
                            line,
                        }
                    };
                    let base_ty = expr.type_or_int().to_string();
                    let ty = match semantics::check_member_access(
                        &self.symtab,
                        &base_ty,
                        &member.text,
                        op == "->",
                    ) {
                        Ok((ty, _offset)) => ty,
                        Err(msg) => {
                            self.diags.semantic_error(line, msg);
                            "int".to_string()
                        }
                    };
                    let member_node = AstNode::new(NodeKind::Identifier, &member.text, member.line);
                    let mut node = AstNode::with_children(
                        NodeKind::PostfixExpression,
                        &op,
                        line,
                        vec![expr, member_node],
                    );
                    node.data_type = Some(ty);
                    node.is_lvalue = true;
                    expr = node;
                }
                "++" | "--" => {
                    let op = self.advance().text;
                    let ty = match semantics::check_unary(&op, &expr) {
                        Ok(t) => t,
                        Err(msg) => {
                            self.diags.semantic_error(line, msg);
                            "int".to_string()
                        }
                    };
                    let tag = format!("{}_post", op);
                    let mut node =
                        AstNode::with_children(NodeKind::PostfixExpression, tag, line, vec![expr]);
                    node.data_type = Some(ty);
                    expr = node;
                }
                _ => return expr,
            }
        }
    }

    fn parse_primary(&mut self) -> AstNode {
        let line = self.line();
        let Some(tok) = self.peek().cloned() else {
            self.diags
                .syntax_error(line, "unexpected end of input in expression");
            return AstNode::new(NodeKind::IntegerConstant, "0", line);
        };

        match tok.kind {
            TokenKind::IntLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::IntegerConstant, &tok.text, tok.line);
                n.data_type = Some("int".to_string());
                n
            }
            TokenKind::HexLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::HexConstant, &tok.text, tok.line);
                n.data_type = Some("int".to_string());
                n
            }
            TokenKind::OctalLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::OctalConstant, &tok.text, tok.line);
                n.data_type = Some("int".to_string());
                n
            }
            TokenKind::BinaryLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::BinaryConstant, &tok.text, tok.line);
                n.data_type = Some("int".to_string());
                n
            }
            TokenKind::FloatLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::FloatConstant, &tok.text, tok.line);
                n.data_type = Some("float".to_string());
                n
            }
            TokenKind::CharLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::CharConstant, &tok.text, tok.line);
                n.data_type = Some("char".to_string());
                n
            }
            TokenKind::StringLit => {
                self.advance();
                let mut n = AstNode::new(NodeKind::StringLiteral, &tok.text, tok.line);
                n.data_type = Some("char*".to_string());
                n
            }
            TokenKind::Identifier => {
                self.advance();
                if self.symtab.is_type_name(&tok.text) {
                    // A typedef name in expression position is never an
                    // lvalue; let the surrounding check report misuse.
                    let mut n = AstNode::new(NodeKind::TypeName, &tok.text, tok.line);
                    n.data_type = Some(tok.text.clone());
                    return n;
                }
                let mut n = AstNode::new(NodeKind::Identifier, &tok.text, tok.line);
                match self.symtab.lookup(&tok.text) {
                    Some(sym) => {
                        if sym.kind == SymbolKind::EnumConstant {
                            n.data_type = Some("int".to_string());
                        } else if sym.is_function() {
                            // A function name in expression position decays
                            // to a pointer to the function.
                            let params = sym
                                .signature
                                .as_ref()
                                .map(|sig| {
                                    sig.params
                                        .iter()
                                        .map(|p| p.ty.clone())
                                        .collect::<Vec<_>>()
                                        .join(", ")
                                })
                                .unwrap_or_default();
                            n.data_type = Some(format!(
                                "{} (*)({})",
                                sym.return_type().unwrap_or("int"),
                                params
                            ));
                        } else if sym.is_reference {
                            // References read as their value type.
                            n.data_type = Some(types::strip_reference(&sym.ty));
                            n.is_lvalue = true;
                        } else {
                            n.data_type = Some(sym.ty.clone());
                            n.is_lvalue = true;
                        }
                    }
                    None => {
                        // A bare name followed by '(' is a call; the call
                        // check reports the implicit declaration instead.
                        if !self.peek_is("(") {
                            self.diags.semantic_error(
                                tok.line,
                                format!("'{}' undeclared (first use in this function)", tok.text),
                            );
                        }
                        n.data_type = Some("int".to_string());
                    }
                }
                n
            }
            _ if tok.text == "(" => {
                self.advance();
                let inner = self.parse_expression();
                self.expect(")");
                inner
            }
            _ => {
                self.diags.syntax_error(
                    tok.line,
                    format!("unexpected token '{}' in expression", tok.text),
                );
                self.advance();
                AstNode::new(NodeKind::IntegerConstant, "0", tok.line)
            }
        }
    }
}

/// How many elements an initializer provides: string literals count their
/// characters plus the NUL, brace lists count their children.
fn initializer_element_count(init: &AstNode) -> i64 {
    if init.kind == NodeKind::StringLiteral {
        let len = init.value.len() as i64;
        if len >= 2 && init.value.starts_with('"') && init.value.ends_with('"') {
            return len - 2 + 1;
        }
        return len + 1;
    }
    if init.kind == NodeKind::Initializer && init.value == "init_list" {
        return init.children.len() as i64;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> (AstNode, Parser) {
        let mut parser = Parser::new(source).unwrap();
        let ast = parser.parse();
        (ast, parser)
    }

    fn assert_clean(parser: &Parser, source: &str) {
        assert!(
            !parser.diags.has_errors(),
            "unexpected diagnostics for {:?}:\n{}",
            source,
            parser.diags.render()
        );
    }

    #[test]
    fn test_simple_function_parses_clean() {
        let src = "int main() { int x = 1; return x; }";
        let (ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        assert_eq!(ast.kind, NodeKind::Program);
        assert_eq!(ast.children.len(), 1);
        assert_eq!(ast.children[0].kind, NodeKind::FunctionDefinition);
        assert_eq!(ast.children[0].value, "main");
    }

    #[test]
    fn test_scoped_shadowing_symbols() {
        let src = "int main() {\n  int x = 1;\n  { int x = 2; { int x = 3; } }\n  return x;\n}";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);

        let xs: Vec<_> = parser
            .symtab
            .symbols()
            .iter()
            .filter(|s| s.name == "x")
            .collect();
        assert_eq!(xs.len(), 3);
        let levels: Vec<i32> = xs.iter().map(|s| s.scope_level).collect();
        assert_eq!(levels, vec![2, 3, 4]);
        let blocks: Vec<u32> = xs.iter().map(|s| s.block_id).collect();
        assert!(blocks[0] != blocks[1] && blocks[1] != blocks[2]);
    }

    #[test]
    fn test_undeclared_identifier_reported() {
        let src = "int main() { return y; }";
        let (_ast, parser) = parse_ok(src);
        assert_eq!(parser.diags.semantic_error_count, 1);
        assert!(parser.diags.render().contains("'y' undeclared"));
    }

    #[test]
    fn test_array_decay_in_call_is_clean() {
        let src = "void f(int *p) {}\nint main() { int a[3]; f(a); return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
    }

    #[test]
    fn test_call_arity_errors() {
        let src = "int f(int a, int b) { return a; }\nint main() { return f(1); }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("too few arguments"));
    }

    #[test]
    fn test_break_outside_loop() {
        let src = "int main() { break; return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("'break' statement not in loop"));
    }

    #[test]
    fn test_continue_valid_only_in_loop() {
        let src = "int main() { switch (1) { default: continue; } return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("'continue' statement not in loop"));

        let src2 = "int main() { while (1) { continue; } return 0; }";
        let (_ast, parser2) = parse_ok(src2);
        assert_clean(&parser2, src2);
    }

    #[test]
    fn test_goto_undefined_label() {
        let src = "int f() { goto L; return 1; }";
        let (_ast, parser) = parse_ok(src);
        assert_eq!(parser.diags.semantic_error_count, 1);
        assert!(parser.diags.render().contains("Undefined label 'L'"));
    }

    #[test]
    fn test_goto_defined_label_is_clean() {
        let src = "int f() { goto L; L: return 1; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
    }

    #[test]
    fn test_duplicate_label() {
        let src = "int f() { L: ; L: return 1; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("Duplicate label 'L'"));
    }

    #[test]
    fn test_duplicate_case_values() {
        let src = "int main() { switch (1) { case 1: break; case 1: break; } return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("duplicate case value '1'"));
    }

    #[test]
    fn test_case_folding_detects_hex_duplicates() {
        let src = "int main() { switch (1) { case 16: break; case 0x10: break; } return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("duplicate case value '16'"));
    }

    #[test]
    fn test_float_case_label_rejected() {
        let src = "int main() { switch (1) { case 1.5: break; } return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("floating-point constant"));
    }

    #[test]
    fn test_typedef_declares_and_resolves() {
        let src = "typedef int MyInt;\nint main() { MyInt v = 3; return v; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        assert_eq!(parser.symtab.resolve_typedef("MyInt"), "int");
        let v = parser.symtab.find_in_function("v", "main").unwrap();
        assert_eq!(v.ty, "MyInt");
    }

    #[test]
    fn test_typedef_without_declarator_errors() {
        let src = "typedef int;";
        let (_ast, parser) = parse_ok(src);
        assert!(parser
            .diags
            .render()
            .contains("typedef declaration does not declare anything"));
    }

    #[test]
    fn test_redeclaring_typedef_name_as_variable() {
        let src = "typedef int T;\nint main() { int T = 1; return T; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("was typedef"));
    }

    #[test]
    fn test_struct_definition_and_member_access() {
        let src = "struct Point { int x; int y; };\nint main() { struct Point p; p.x = 1; return p.x; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        let def = parser.symtab.lookup_struct("Point").unwrap();
        assert_eq!(def.total_size, 8);
    }

    #[test]
    fn test_unknown_member_reported() {
        let src = "struct P { int x; };\nint main() { struct P p; return p.z; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("no member named 'z'"));
    }

    #[test]
    fn test_enum_constants_registered() {
        let src = "enum Color { RED, GREEN = 5, BLUE };\nint main() { return GREEN; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        assert_eq!(parser.symtab.enum_constant("RED"), Some(0));
        assert_eq!(parser.symtab.enum_constant("GREEN"), Some(5));
        assert_eq!(parser.symtab.enum_constant("BLUE"), Some(6));
    }

    #[test]
    fn test_static_initializer_must_be_constant() {
        let src = "int main() { int x = 1; static int s = x; return s; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser
            .diags
            .render()
            .contains("Initializer for static storage must be constant"));
    }

    #[test]
    fn test_static_parameter_rejected() {
        let src = "int f(static int a) { return a; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser
            .diags
            .render()
            .contains("Illegal storage class 'static' on function parameter"));
    }

    #[test]
    fn test_array_size_rules() {
        let (_ast, parser) = parse_ok("int main() { int a[]; return 0; }");
        assert!(parser
            .diags
            .render()
            .contains("array size missing and no initializer"));

        let (_ast, parser) = parse_ok("int main() { int a[2] = {1, 2, 3}; return 0; }");
        assert!(parser.diags.render().contains("too many initializers"));

        let src = "int main() { int a[] = {1, 2, 3}; return a[0]; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        let a = parser.symtab.find_in_function("a", "main").unwrap();
        assert_eq!(a.ty, "int[3]");
        assert_eq!(a.array_dims, vec![3]);
    }

    #[test]
    fn test_negative_array_size() {
        let (_ast, parser) = parse_ok("int main() { int a[-2]; return 0; }");
        assert!(parser.diags.render().contains("negative array size"));
    }

    #[test]
    fn test_pointer_init_from_integer() {
        let (_ast, parser) = parse_ok("int main() { int *p = 5; return 0; }");
        assert!(parser
            .diags
            .render()
            .contains("initialization makes pointer from integer"));

        let src = "int main() { int *p = 0; return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
    }

    #[test]
    fn test_const_assignment_rejected() {
        let src = "int main() { const int c = 1; c = 2; return c; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("read-only"));
    }

    #[test]
    fn test_void_condition_rejected() {
        let src = "void f() {}\nint main() { if (f()) return 1; return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser
            .diags
            .render()
            .contains("void value not ignored as it ought to be"));
    }

    #[test]
    fn test_function_pointer_registration() {
        let src = "int add(int a, int b) { return a + b; }\nint main() { int (*op)(int, int); op = add; return op(1, 2); }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        assert!(parser.symtab.is_function_pointer("op"));
        let sym = parser.symtab.find_in_function("op", "main").unwrap();
        assert_eq!(sym.ty, "int (*)(int, int)");
    }

    #[test]
    fn test_include_registers_externals() {
        let src = "#include <stdio.h>\nint main() { printf(\"hi\\n\"); return 0; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        assert!(parser.symtab.lookup("printf").is_some());
    }

    #[test]
    fn test_strict_atoi_check() {
        let src = "#include <stdlib.h>\nint main() { return atoi(5); }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser.diags.render().contains("expects a single char* argument"));
    }

    #[test]
    fn test_syntax_error_recovery_reports_once() {
        let src = "int main() { int x = ; int y = 2; return y; }";
        let mut parser = Parser::new(src).unwrap();
        let _ast = parser.parse();
        assert!(parser.diags.error_count >= 1);
        // Recovery must not spin forever or flood diagnostics.
        assert!(parser.diags.diagnostics().len() < 5);
    }

    #[test]
    fn test_do_until_parses() {
        let src = "int main() { int i = 0; do { i = i + 1; } until (i > 3); return i; }";
        let (ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        let body = &ast.children[0].children[2];
        let found = body
            .children
            .iter()
            .any(|s| s.kind == NodeKind::IterationStatement && s.value == "do_until");
        assert!(found);
    }

    #[test]
    fn test_unary_minus_folds_into_literal() {
        let src = "int main() { int x = -5; return x; }";
        let (ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        // Find the initializer literal.
        let body = &ast.children[0].children[2];
        let decl = &body.children[0];
        let init = decl
            .children
            .iter()
            .find(|c| c.kind == NodeKind::Initializer)
            .unwrap();
        assert_eq!(init.children[1].value, "-5");
    }

    #[test]
    fn test_reference_variable_parses() {
        let src = "int main() { int x = 1; int &r = x; r = 2; return x; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
        let r = parser.symtab.find_in_function("r", "main").unwrap();
        assert!(r.is_reference);
        assert_eq!(r.ty, "int &");
    }

    #[test]
    fn test_conflicting_storage_class_on_shadow() {
        let src = "int g;\nint main() { static int g = 1; return g; }";
        let (_ast, parser) = parse_ok(src);
        assert!(parser
            .diags
            .render()
            .contains("Conflicting storage class for re-declaration of 'g'"));
    }

    #[test]
    fn test_sizeof_expression_types_as_int() {
        let src = "int main() { int a[4]; return sizeof(a); }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
    }

    #[test]
    fn test_ternary_types() {
        let src = "int main() { int a = 1; float b = 2.0; return a ? a : a; }";
        let (_ast, parser) = parse_ok(src);
        assert_clean(&parser, src);
    }
}
