//! Scoped symbol table
//!
//! Scope model: level 0 is the global scope, level 1 is a function's top
//! level, levels 2 and up are nested blocks. Every nested block additionally
//! gets a unique `block_id` so sibling blocks at the same depth never alias.
//! Symbols are inserted on declaration and never removed; scope exit only
//! restores the (level, block) cursor, leaving the table queryable for the
//! post-parse IR pass and the text dump.
//!
//! Lookup scans from the most recent insertion backwards and accepts a
//! candidate only when its scope level appears on the current scope chain
//! with a matching block id (block 0 marks function/global storage). This
//! gives innermost-first resolution with sibling-block isolation.

use crate::types::{self, POINTER_SIZE};
use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;

/// What a symbol names. Static-ness, external-ness and const-ness are flags
/// on the symbol itself; the kind is the grammatical category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    ExternalFunction,
    Typedef,
    EnumConstant,
    Label,
    FunctionPointer,
}

/// One declared parameter of a function or function pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Canonical type, `int`, `char*`, `int &`.
    pub ty: String,
    pub is_reference: bool,
}

/// Signature payload for functions, external functions and function
/// pointers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionSignature {
    pub return_type: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Canonical textual type. Arrays as `base[d1][d2]`, pointers as
    /// `base*`, references as `base &`, function pointers as
    /// `ret (*)(p1, p2)`.
    pub ty: String,
    pub kind: SymbolKind,
    pub scope_level: i32,
    /// Scope level of the enclosing scope, -1 at global.
    pub parent_scope: i32,
    /// 0 for scope levels 0 and 1; unique per nested block otherwise.
    pub block_id: u32,
    /// Owning function name, empty for globals.
    pub function_scope: String,
    /// Storage offset; for enum constants this holds the constant value.
    pub offset: i64,
    pub size: i64,
    pub array_dims: Vec<i64>,
    pub ptr_level: u32,
    pub is_static: bool,
    pub is_const: bool,
    pub points_to_const: bool,
    pub is_const_ptr: bool,
    pub is_reference: bool,
    pub signature: Option<FunctionSignature>,
}

impl Symbol {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function | SymbolKind::ExternalFunction)
    }

    pub fn is_external(&self) -> bool {
        self.kind == SymbolKind::ExternalFunction
    }

    pub fn is_array(&self) -> bool {
        !self.array_dims.is_empty()
    }

    pub fn return_type(&self) -> Option<&str> {
        self.signature.as_ref().map(|s| s.return_type.as_str())
    }

    /// The kind column of the symbol table dump.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            SymbolKind::Variable if self.is_static => "variable (static)",
            SymbolKind::Variable => "variable",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Function if self.is_static => "function (static)",
            SymbolKind::Function => "function",
            SymbolKind::ExternalFunction => "function (external)",
            SymbolKind::Typedef => "typedef",
            SymbolKind::EnumConstant => "enum_constant",
            SymbolKind::Label => "label",
            SymbolKind::FunctionPointer => "function_pointer",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {} ({})", self.name, self.ty, self.kind_label())
    }
}

/// A member of a struct or union definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMember {
    pub name: String,
    pub ty: String,
    pub offset: i64,
    pub size: i64,
}

/// A struct or union layout. Struct members get the natural running offset
/// with no padding; union members all sit at offset 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDef {
    pub name: String,
    pub members: Vec<RecordMember>,
    pub total_size: i64,
}

impl RecordDef {
    pub fn member(&self, name: &str) -> Option<&RecordMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Everything needed to declare a variable, gathered by the parser from the
/// declaration specifiers and the declarator.
#[derive(Debug, Clone, Default)]
pub struct VariableDecl {
    pub name: String,
    /// Base or full type; pointer spellings are canonicalized on insert.
    pub ty: String,
    pub dims: Vec<i64>,
    pub ptr_level: u32,
    pub is_static: bool,
    pub points_to_const: bool,
    pub is_const_ptr: bool,
    pub is_reference: bool,
}

/// A (scope level, block id) position together with its parent chain.
///
/// The symbol table drives one cursor while the parser runs. Because block
/// ids are handed out in traversal order, a later pass that walks the
/// finished tree in the same order (the IR generator does) can replay the
/// identical sequence of transitions on a fresh cursor and resolve names
/// with full visibility rules through [`SymbolTable::lookup_at`].
#[derive(Debug, Clone)]
pub struct ScopeCursor {
    /// (scope level, block id) saved on each entry.
    stack: Vec<(i32, u32)>,
    scope: i32,
    block: u32,
    next_block_id: u32,
}

impl Default for ScopeCursor {
    fn default() -> Self {
        ScopeCursor::new()
    }
}

impl ScopeCursor {
    pub fn new() -> Self {
        ScopeCursor {
            stack: Vec::new(),
            scope: 0,
            block: 0,
            next_block_id: 1,
        }
    }

    pub fn scope_level(&self) -> i32 {
        self.scope
    }

    pub fn block_id(&self) -> u32 {
        self.block
    }

    /// Enter a function body: level 1, block 0.
    pub fn enter_function(&mut self) {
        self.stack.push((0, 0));
        self.scope = 1;
        self.block = 0;
    }

    pub fn exit_function(&mut self) {
        self.stack.pop();
        self.scope = 0;
        self.block = 0;
    }

    /// Enter a nested block: one level deeper, fresh block id.
    pub fn enter_block(&mut self) {
        self.stack.push((self.scope, self.block));
        self.scope += 1;
        self.block = self.next_block_id;
        self.next_block_id += 1;
    }

    pub fn exit_block(&mut self) {
        match self.stack.pop() {
            Some((scope, block)) => {
                self.scope = scope;
                self.block = block;
            }
            None => {
                self.scope = 0;
                self.block = 0;
            }
        }
    }

    fn parent_scope(&self) -> i32 {
        self.stack.last().map(|&(s, _)| s).unwrap_or(-1)
    }

    /// Block id stamped on inserted symbols: only nested blocks (level 2
    /// and up) carry one; 0 marks function/global storage.
    fn insert_block(&self) -> u32 {
        if self.scope >= 2 { self.block } else { 0 }
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    structs: Vec<RecordDef>,
    unions: Vec<RecordDef>,
    /// Flat registry of function-pointer names; consulted during IR
    /// emission, after parsing-time scope state is gone.
    function_pointers: HashSet<String>,
    cursor: ScopeCursor,
    current_offset: i64,
    /// Name of the function currently being parsed, empty at global scope.
    pub current_function: String,
    /// The base type most recently seen in declaration specifiers.
    pub current_type: String,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: Vec::new(),
            structs: Vec::new(),
            unions: Vec::new(),
            function_pointers: HashSet::new(),
            cursor: ScopeCursor::new(),
            current_offset: 0,
            current_function: String::new(),
            current_type: "int".to_string(),
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn current_scope(&self) -> i32 {
        self.cursor.scope_level()
    }

    pub fn current_block_id(&self) -> u32 {
        self.cursor.block_id()
    }

    pub fn set_current_type(&mut self, ty: &str) {
        self.current_type = ty.to_string();
    }

    // ------------------------------------------------------------------
    // Scope transitions
    // ------------------------------------------------------------------

    /// Enter a function: level becomes 1, the function name scopes every
    /// symbol inserted until the matching exit.
    pub fn enter_function_scope(&mut self, name: &str) {
        self.cursor.enter_function();
        self.current_function = name.to_string();
    }

    pub fn exit_function_scope(&mut self) {
        self.cursor.exit_function();
        self.current_function.clear();
    }

    /// Enter a nested block: one level deeper, fresh block id.
    pub fn enter_scope(&mut self) {
        self.cursor.enter_block();
    }

    /// Leave a nested block. Symbols stay in the table; only the cursor
    /// moves back.
    pub fn exit_scope(&mut self) {
        self.cursor.exit_block();
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Declare a variable in the current scope. A duplicate in the same
    /// (scope, block, function) triple is ignored; the grammar already
    /// rejects most of those and the checker reports the rest.
    pub fn insert_variable(&mut self, decl: &VariableDecl) {
        let exists = self.symbols.iter().rev().any(|s| {
            s.name == decl.name
                && s.scope_level == self.cursor.scope_level()
                && s.block_id == self.cursor.insert_block()
                && s.function_scope == self.current_function
        });
        if exists {
            return;
        }

        let mut ty = if decl.ptr_level > 0 {
            types::canonical_pointer(&decl.ty)
        } else {
            decl.ty.clone()
        };
        if !decl.dims.is_empty() {
            for d in &decl.dims {
                let _ = write!(ty, "[{}]", d);
            }
        }

        let base_size = if decl.is_reference {
            POINTER_SIZE
        } else {
            self.type_size(&decl.ty)
        };
        let size = if decl.dims.is_empty() {
            base_size
        } else {
            self.type_size(&decl.ty) * decl.dims.iter().product::<i64>()
        };

        let sym = Symbol {
            name: decl.name.clone(),
            ty,
            kind: SymbolKind::Variable,
            scope_level: self.cursor.scope_level(),
            parent_scope: self.cursor.parent_scope(),
            block_id: self.cursor.insert_block(),
            function_scope: self.current_function.clone(),
            offset: self.current_offset,
            size,
            array_dims: decl.dims.clone(),
            ptr_level: decl.ptr_level,
            is_static: decl.is_static,
            is_const: decl.points_to_const || decl.is_const_ptr,
            points_to_const: decl.points_to_const,
            is_const_ptr: decl.is_const_ptr,
            is_reference: decl.is_reference,
            signature: None,
        };
        self.current_offset += sym.size;
        self.symbols.push(sym);
    }

    /// Declare a function parameter at the current (function) scope.
    pub fn insert_parameter(&mut self, name: &str, ty: &str, ptr_level: u32, is_reference: bool) {
        let exists = self.symbols.iter().rev().any(|s| {
            s.name == name
                && s.scope_level == self.cursor.scope_level()
                && s.function_scope == self.current_function
        });
        if exists {
            return;
        }

        let canonical = if ptr_level > 0 {
            types::canonical_pointer(ty)
        } else {
            ty.to_string()
        };
        let size = if is_reference {
            POINTER_SIZE
        } else {
            self.type_size(&canonical)
        };
        let sym = Symbol {
            name: name.to_string(),
            ty: canonical,
            kind: SymbolKind::Parameter,
            scope_level: self.cursor.scope_level(),
            parent_scope: self.cursor.parent_scope(),
            block_id: 0,
            function_scope: self.current_function.clone(),
            offset: self.current_offset,
            size,
            array_dims: Vec::new(),
            ptr_level,
            is_static: false,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference,
            signature: None,
        };
        self.current_offset += sym.size;
        self.symbols.push(sym);
    }

    /// Declare a function. Functions always live at global scope.
    pub fn insert_function(
        &mut self,
        name: &str,
        return_type: &str,
        params: Vec<Parameter>,
        is_static: bool,
    ) {
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty: return_type.to_string(),
            kind: SymbolKind::Function,
            scope_level: 0,
            parent_scope: -1,
            block_id: 0,
            function_scope: String::new(),
            offset: 0,
            size: 0,
            array_dims: Vec::new(),
            ptr_level: 0,
            is_static,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference: false,
            signature: Some(FunctionSignature {
                return_type: return_type.to_string(),
                params,
            }),
        });
    }

    /// Pre-register a library function from a header manifest. External
    /// functions carry no parameter list; calls to them bypass arity checks.
    pub fn insert_external_function(&mut self, name: &str, return_type: &str) {
        if self
            .symbols
            .iter()
            .any(|s| s.name == name && s.kind == SymbolKind::ExternalFunction)
        {
            return;
        }
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty: return_type.to_string(),
            kind: SymbolKind::ExternalFunction,
            scope_level: 0,
            parent_scope: -1,
            block_id: 0,
            function_scope: String::new(),
            offset: 0,
            size: 0,
            array_dims: Vec::new(),
            ptr_level: 0,
            is_static: false,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference: false,
            signature: Some(FunctionSignature {
                return_type: return_type.to_string(),
                params: Vec::new(),
            }),
        });
    }

    pub fn insert_typedef(&mut self, name: &str, underlying: &str) {
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty: underlying.to_string(),
            kind: SymbolKind::Typedef,
            scope_level: self.cursor.scope_level(),
            parent_scope: self.cursor.parent_scope(),
            block_id: self.cursor.insert_block(),
            function_scope: self.current_function.clone(),
            offset: 0,
            size: 0,
            array_dims: Vec::new(),
            ptr_level: 0,
            is_static: false,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference: false,
            signature: None,
        });
    }

    /// Enum constants type as int; the value rides in `offset`.
    pub fn insert_enum_constant(&mut self, name: &str, value: i64) {
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty: "int".to_string(),
            kind: SymbolKind::EnumConstant,
            scope_level: self.cursor.scope_level(),
            parent_scope: self.cursor.parent_scope(),
            block_id: self.cursor.insert_block(),
            function_scope: self.current_function.clone(),
            offset: value,
            size: 4,
            array_dims: Vec::new(),
            ptr_level: 0,
            is_static: false,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference: false,
            signature: None,
        });
    }

    /// Insert a goto label. Labels have function scope: a duplicate within
    /// the current function is an error.
    pub fn insert_label(&mut self, name: &str) -> Result<(), String> {
        if self.lookup_label(name).is_some() {
            return Err(format!("Duplicate label '{}'", name));
        }
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty: "-".to_string(),
            kind: SymbolKind::Label,
            scope_level: self.cursor.scope_level(),
            parent_scope: self.cursor.parent_scope(),
            block_id: self.cursor.insert_block(),
            function_scope: self.current_function.clone(),
            offset: 0,
            size: 0,
            array_dims: Vec::new(),
            ptr_level: 0,
            is_static: false,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference: false,
            signature: None,
        });
        Ok(())
    }

    /// Declare a function-pointer variable and record its name in the flat
    /// registry for the IR pass.
    pub fn insert_function_pointer(&mut self, name: &str, signature: FunctionSignature) {
        let ty = {
            let mut s = format!("{} (*)(", signature.return_type);
            for (i, p) in signature.params.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                s.push_str(&p.ty);
            }
            s.push(')');
            s
        };
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::FunctionPointer,
            scope_level: self.cursor.scope_level(),
            parent_scope: self.cursor.parent_scope(),
            block_id: self.cursor.insert_block(),
            function_scope: self.current_function.clone(),
            offset: self.current_offset,
            size: POINTER_SIZE,
            array_dims: Vec::new(),
            ptr_level: 1,
            is_static: false,
            is_const: false,
            points_to_const: false,
            is_const_ptr: false,
            is_reference: false,
            signature: Some(signature),
        });
        self.current_offset += POINTER_SIZE;
        self.register_function_pointer(name);
    }

    pub fn register_function_pointer(&mut self, name: &str) {
        self.function_pointers.insert(name.to_string());
    }

    pub fn is_function_pointer(&self, name: &str) -> bool {
        self.function_pointers.contains(name)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Innermost-visible resolution of `name` from the current scope chain.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.lookup_at(name, &self.cursor, &self.current_function)
    }

    /// Chain-walk resolution of `name` from an arbitrary scope position.
    /// The table's own cursor drives [`lookup`](Self::lookup) during
    /// parsing; the IR pass replays the same walk over the finished tree
    /// with its own cursor and resolves through this, so a declaration
    /// shadowed in a block that has since exited is never returned.
    pub fn lookup_at(&self, name: &str, cursor: &ScopeCursor, function: &str) -> Option<&Symbol> {
        for sym in self.symbols.iter().rev() {
            if sym.name != name {
                continue;
            }
            let mut check_scope = cursor.scope;
            let mut check_block = cursor.block;
            let mut depth = cursor.stack.len();
            loop {
                if sym.scope_level == check_scope {
                    if sym.block_id == check_block || sym.block_id == 0 {
                        // Function-scoped entries must belong to the current
                        // function (or be global).
                        if sym.scope_level == 0 || sym.function_scope == function {
                            return Some(sym);
                        }
                    }
                    // Same level but a sibling block or another function:
                    // this candidate is not visible, try an older one.
                    break;
                }
                if check_scope == 0 {
                    break;
                }
                if depth > 0 {
                    depth -= 1;
                    let (s, b) = cursor.stack[depth];
                    check_scope = s;
                    check_block = b;
                } else {
                    check_scope = 0;
                    check_block = 0;
                }
            }
        }
        None
    }

    /// Most recently inserted entry named `name` in `function`, falling
    /// back to globals. This ignores block visibility entirely, so it is
    /// only suitable for post-parse inspection (tests, reporting); any pass
    /// that needs the innermost *visible* declaration goes through
    /// [`lookup`](Self::lookup) or [`lookup_at`](Self::lookup_at).
    pub fn find_in_function(&self, name: &str, function: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .rev()
            .find(|s| s.name == name && (!function.is_empty() && s.function_scope == function))
            .or_else(|| {
                self.symbols
                    .iter()
                    .rev()
                    .find(|s| s.name == name && s.scope_level == 0)
            })
    }

    /// Labels resolve within the current function only.
    pub fn lookup_label(&self, name: &str) -> Option<&Symbol> {
        self.lookup_label_in(name, &self.current_function)
    }

    pub fn lookup_label_in(&self, name: &str, function: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| {
            s.name == name && s.kind == SymbolKind::Label && s.function_scope == function
        })
    }

    /// True when `name` is a typedef visible anywhere in the table. Drives
    /// the lexer-feedback decision of identifier vs type name.
    pub fn is_type_name(&self, name: &str) -> bool {
        self.symbols
            .iter()
            .any(|s| s.name == name && s.kind == SymbolKind::Typedef)
    }

    /// The value of an enum constant, if `name` is one. Enum constants are
    /// not block-scoped in this language, so a flat scan suffices.
    pub fn enum_constant(&self, name: &str) -> Option<i64> {
        self.symbols
            .iter()
            .find(|s| s.name == name && s.kind == SymbolKind::EnumConstant)
            .map(|s| s.offset)
    }

    // ------------------------------------------------------------------
    // Struct / union layout
    // ------------------------------------------------------------------

    /// Register a struct: members get running offsets with no padding.
    pub fn insert_struct(&mut self, name: &str, members: Vec<(String, String)>) {
        let mut laid_out = Vec::with_capacity(members.len());
        let mut offset = 0;
        for (mname, mty) in members {
            let size = self.type_size(&mty);
            laid_out.push(RecordMember {
                name: mname,
                ty: mty,
                offset,
                size,
            });
            offset += size;
        }
        self.structs.push(RecordDef {
            name: name.to_string(),
            members: laid_out,
            total_size: offset,
        });
    }

    /// Register a union: every member at offset 0, total is the max size.
    pub fn insert_union(&mut self, name: &str, members: Vec<(String, String)>) {
        let mut laid_out = Vec::with_capacity(members.len());
        let mut max_size = 0;
        for (mname, mty) in members {
            let size = self.type_size(&mty);
            max_size = max_size.max(size);
            laid_out.push(RecordMember {
                name: mname,
                ty: mty,
                offset: 0,
                size,
            });
        }
        self.unions.push(RecordDef {
            name: name.to_string(),
            members: laid_out,
            total_size: max_size,
        });
    }

    /// Lookup by bare name; callers strip the `struct ` tag themselves.
    pub fn lookup_struct(&self, name: &str) -> Option<&RecordDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn lookup_union(&self, name: &str) -> Option<&RecordDef> {
        self.unions.iter().find(|u| u.name == name)
    }

    /// Size of a `struct N` / bare-name struct type, 0 when unknown.
    pub fn struct_size(&self, tagged: &str) -> i64 {
        let name = tagged.strip_prefix("struct ").unwrap_or(tagged);
        self.lookup_struct(name).map(|d| d.total_size).unwrap_or(0)
    }

    pub fn union_size(&self, tagged: &str) -> i64 {
        let name = tagged.strip_prefix("union ").unwrap_or(tagged);
        self.lookup_union(name).map(|d| d.total_size).unwrap_or(0)
    }

    /// Find the record definition behind a (possibly typedef'd) type. The
    /// returned flag is true for unions.
    pub fn record_for_type(&self, ty: &str) -> Option<(&RecordDef, bool)> {
        let resolved = self.resolve_typedef(ty);
        if let Some(name) = resolved.strip_prefix("struct ") {
            return self.lookup_struct(name.trim()).map(|d| (d, false));
        }
        if let Some(name) = resolved.strip_prefix("union ") {
            return self.lookup_union(name.trim()).map(|d| (d, true));
        }
        None
    }

    // ------------------------------------------------------------------
    // Typedefs and sizes
    // ------------------------------------------------------------------

    /// Replace a typedef name by its underlying type until a fixpoint.
    /// Array/pointer suffixes are preserved: `MyInt*` resolves the base and
    /// reattaches the `*`. Idempotent.
    pub fn resolve_typedef(&self, ty: &str) -> String {
        let (base, suffix) = match ty.find(['[', '*']) {
            Some(idx) => (ty[..idx].trim_end(), &ty[idx..]),
            None => (ty.trim_end(), ""),
        };

        let mut current = base.to_string();
        // The fixpoint loop is bounded to break typedef cycles.
        for _ in 0..32 {
            let next = self
                .symbols
                .iter()
                .find(|s| s.kind == SymbolKind::Typedef && s.name == current)
                .map(|s| s.ty.clone());
            match next {
                Some(underlying) if underlying != current => current = underlying,
                _ => break,
            }
        }
        format!("{}{}", current, suffix)
    }

    /// Size in bytes of a canonical type. Pointers are 8 bytes, arrays
    /// multiply the base size by every dimension, records consult their
    /// layout tables, typedefs resolve first. Unknown types default to 4.
    pub fn type_size(&self, ty: &str) -> i64 {
        match ty {
            "char" => return 1,
            "short" => return 2,
            "int" => return 4,
            "long" => return 8,
            "float" => return 4,
            "double" => return 8,
            _ => {}
        }
        if ty.contains('*') {
            return POINTER_SIZE;
        }
        if let Some(bracket) = ty.find('[') {
            let base = self.type_size(ty[..bracket].trim_end());
            let mut total = base;
            for dim in ty[bracket..].split('[').skip(1) {
                if let Some(end) = dim.find(']') {
                    if let Ok(n) = dim[..end].parse::<i64>() {
                        total *= n;
                    }
                }
            }
            return total;
        }
        if ty.starts_with("struct ") {
            return self.struct_size(ty);
        }
        if ty.starts_with("union ") {
            return self.union_size(ty);
        }
        if let Some(td) = self
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Typedef && s.name == ty)
        {
            return self.type_size(&td.ty.clone());
        }
        4
    }

    // ------------------------------------------------------------------
    // Text dump
    // ------------------------------------------------------------------

    /// Collapse anonymous struct/union tags in typedef display types.
    fn display_type(sym: &Symbol) -> &str {
        if sym.kind == SymbolKind::Typedef {
            if sym.ty.starts_with("union __anon_union_") {
                return "union";
            }
            if sym.ty.starts_with("struct __anon_struct_") {
                return "struct";
            }
        }
        if sym.is_function() {
            return sym.return_type().unwrap_or(&sym.ty);
        }
        &sym.ty
    }

    fn dump_row(out: &mut String, sym: &Symbol, parent: &str) {
        let size = if sym.kind == SymbolKind::Label {
            "-".to_string()
        } else {
            sym.size.to_string()
        };
        let _ = writeln!(
            out,
            "{:<20}{:<20}{:<20}{:<5}{:<20}{:<4}",
            sym.name,
            Self::display_type(sym),
            sym.kind_label(),
            sym.scope_level,
            parent,
            size
        );
    }

    /// Grouped, human-readable dump: global scope first, then one section
    /// per function, then one per (function, block) at each nested level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== SYMBOL TABLE (User-Defined Symbols Only) ===\n");
        let _ = writeln!(
            out,
            "{:<20}{:<20}{:<20}{:<5}{:<20}{:<4}",
            "Name", "Type", "Kind", "Scope", "Parent", "Size"
        );
        out.push_str(&"-".repeat(89));
        out.push('\n');

        let globals: Vec<&Symbol> = self
            .symbols
            .iter()
            .filter(|s| s.scope_level == 0 && !s.is_external())
            .collect();
        if !globals.is_empty() {
            out.push_str(">>> GLOBAL SCOPE (0) <<<\n");
            for sym in &globals {
                Self::dump_row(&mut out, sym, "none");
            }
        }

        // Scope level 1, grouped by function.
        let mut seen_functions: Vec<&str> = Vec::new();
        for sym in &self.symbols {
            if sym.scope_level != 1 || sym.function_scope.is_empty() {
                continue;
            }
            if seen_functions.contains(&sym.function_scope.as_str()) {
                continue;
            }
            seen_functions.push(&sym.function_scope);
            let _ = writeln!(out, ">>> SCOPE LEVEL 1 ({}) <<<", sym.function_scope);
            for s in self
                .symbols
                .iter()
                .filter(|s| s.scope_level == 1 && s.function_scope == sym.function_scope)
            {
                Self::dump_row(&mut out, s, &s.function_scope.clone());
            }
        }

        // Nested blocks, grouped by (function, block id) per level.
        let max_scope = self.symbols.iter().map(|s| s.scope_level).max().unwrap_or(0);
        for level in 2..=max_scope {
            let mut seen_blocks: Vec<(&str, u32)> = Vec::new();
            for sym in &self.symbols {
                if sym.scope_level != level || sym.function_scope.is_empty() {
                    continue;
                }
                let key = (sym.function_scope.as_str(), sym.block_id);
                if seen_blocks.contains(&key) {
                    continue;
                }
                seen_blocks.push(key);
                let _ = writeln!(
                    out,
                    ">>> SCOPE LEVEL {} ({} - block_{}) <<<",
                    level, sym.function_scope, sym.block_id
                );
                for s in self.symbols.iter().filter(|s| {
                    s.scope_level == level
                        && s.function_scope == sym.function_scope
                        && s.block_id == sym.block_id
                }) {
                    Self::dump_row(&mut out, s, &s.function_scope.clone());
                }
            }
        }

        let user_count = self.symbols.iter().filter(|s| !s.is_external()).count();
        out.push_str(&"-".repeat(89));
        out.push('\n');
        let _ = writeln!(
            out,
            "User-defined symbols: {} | Max scope level: {}",
            user_count, max_scope
        );
        let _ = writeln!(
            out,
            "External functions available: {} (standard library)",
            self.symbols.len() - user_count
        );
        out
    }
}
