//! Abstract Syntax Tree for MiniC
//!
//! One tagged node type covers the whole tree: declarations, statements and
//! every expression precedence level get their own [`NodeKind`], and the
//! `value` field carries the discriminating text (operator spelling, literal
//! lexeme, declarator shape such as `"array"` or `"params"`).
//!
//! The tree is strictly parent-owns-children. Anything that looks like a
//! back-reference elsewhere in the compiler (function-pointer names, pending
//! gotos, static-variable mangling) lives in its own collection keyed by
//! string, never as a pointer into this tree.

use std::fmt;

/// Node kinds, one per grammar production family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,

    // Declarations
    DeclarationSpecifiers,
    TypeSpecifier,
    StorageClassSpecifier,
    TypeQualifier,
    TypeName,
    StructSpecifier,
    UnionSpecifier,
    EnumSpecifier,
    Enumerator,
    FunctionDefinition,
    Declaration,
    Initializer,
    Declarator,
    DirectDeclarator,
    Pointer,
    ParameterList,
    ParameterDeclaration,
    ArgumentList,

    // Statements
    CompoundStatement,
    ExpressionStatement,
    SelectionStatement,
    IterationStatement,
    JumpStatement,
    LabeledStatement,

    // Expressions, outermost to innermost precedence
    Expression,
    AssignmentExpression,
    ConditionalExpression,
    LogicalOrExpression,
    LogicalAndExpression,
    InclusiveOrExpression,
    ExclusiveOrExpression,
    AndExpression,
    EqualityExpression,
    RelationalExpression,
    ShiftExpression,
    AdditiveExpression,
    MultiplicativeExpression,
    CastExpression,
    UnaryExpression,
    PostfixExpression,
    PrimaryExpression,

    // Terminals
    Identifier,
    Constant,
    IntegerConstant,
    HexConstant,
    OctalConstant,
    BinaryConstant,
    FloatConstant,
    CharConstant,
    StringLiteral,
}

impl NodeKind {
    /// True for the literal/constant leaf kinds.
    pub fn is_constant(self) -> bool {
        matches!(
            self,
            NodeKind::Constant
                | NodeKind::IntegerConstant
                | NodeKind::HexConstant
                | NodeKind::OctalConstant
                | NodeKind::BinaryConstant
                | NodeKind::FloatConstant
                | NodeKind::CharConstant
                | NodeKind::StringLiteral
        )
    }
}

/// A node in the syntax tree.
///
/// `data_type` and `is_lvalue` start empty/false and are filled in by the
/// semantic checker as reductions complete, so the IR generator can assume a
/// typed tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: NodeKind,
    /// Discriminating text: literal lexeme, operator string, or a declarator
    /// tag such as `"array"`, `"array[]"`, `"params"`, `"init_list"`.
    pub value: String,
    /// Canonical textual type, set by the semantic checker.
    pub data_type: Option<String>,
    pub is_lvalue: bool,
    /// Order is semantically significant (operands, declarator nesting,
    /// parameter position).
    pub children: Vec<AstNode>,
    /// Source line for diagnostics, 1-indexed.
    pub line: usize,
}

impl AstNode {
    pub fn new(kind: NodeKind, value: impl Into<String>, line: usize) -> Self {
        AstNode {
            kind,
            value: value.into(),
            data_type: None,
            is_lvalue: false,
            children: Vec::new(),
            line,
        }
    }

    pub fn with_children(
        kind: NodeKind,
        value: impl Into<String>,
        line: usize,
        children: Vec<AstNode>,
    ) -> Self {
        AstNode {
            children,
            ..AstNode::new(kind, value, line)
        }
    }

    pub fn push(&mut self, child: AstNode) {
        self.children.push(child);
    }

    pub fn child(&self, index: usize) -> Option<&AstNode> {
        self.children.get(index)
    }

    /// The node's type, defaulting to `int` when the checker could not
    /// determine one (best-effort typing keeps later passes running).
    pub fn type_or_int(&self) -> &str {
        self.data_type.as_deref().unwrap_or("int")
    }

    /// Depth-first search for the first identifier in a declarator subtree.
    /// Used to recover the declared name from arbitrarily nested
    /// pointer/array/paren declarators.
    pub fn first_identifier(&self) -> Option<&str> {
        if matches!(self.kind, NodeKind::Identifier | NodeKind::TypeName) {
            return Some(&self.value);
        }
        self.children.iter().find_map(|c| c.first_identifier())
    }

    /// True when this node is a postfix expression with the given operator
    /// tag (`"[]"`, `"()"`, `"."`, `"->"`, `"++_post"`, `"--_post"`).
    pub fn is_postfix(&self, tag: &str) -> bool {
        self.kind == NodeKind::PostfixExpression && self.value == tag
    }

    /// True when this node is a unary expression with the given operator.
    pub fn is_unary(&self, tag: &str) -> bool {
        self.kind == NodeKind::UnaryExpression && self.value == tag
    }
}

impl fmt::Display for AstNode {
    /// Compact single-line rendering, mainly for test failure output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.value)?;
        if let Some(ty) = &self.data_type {
            write!(f, ": {}", ty)?;
        }
        if !self.children.is_empty() {
            write!(f, "[")?;
            for (i, c) in self.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_identifier_through_declarator() {
        // int *(*fp): identifier nested under two pointer nodes
        let mut ptr_inner = AstNode::new(NodeKind::Pointer, "*", 1);
        ptr_inner.push(AstNode::new(NodeKind::Identifier, "fp", 1));
        let mut ptr_outer = AstNode::new(NodeKind::Pointer, "*", 1);
        ptr_outer.push(ptr_inner);

        assert_eq!(ptr_outer.first_identifier(), Some("fp"));
    }

    #[test]
    fn test_first_identifier_missing() {
        let node = AstNode::new(NodeKind::Pointer, "*", 1);
        assert_eq!(node.first_identifier(), None);
    }

    #[test]
    fn test_type_or_int_default() {
        let mut node = AstNode::new(NodeKind::Identifier, "x", 3);
        assert_eq!(node.type_or_int(), "int");
        node.data_type = Some("double".to_string());
        assert_eq!(node.type_or_int(), "double");
    }

    #[test]
    fn test_constant_kinds() {
        assert!(NodeKind::HexConstant.is_constant());
        assert!(NodeKind::StringLiteral.is_constant());
        assert!(!NodeKind::Identifier.is_constant());
    }
}
