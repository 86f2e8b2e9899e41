//! Three-address intermediate representation
//!
//! The IR is an ordered sequence of quadruples `(op, arg1, arg2, result)`
//! whose operand slots are plain text: identifiers, literals, temporaries
//! `tN`, labels `LN`. Jump targets are label names, never instruction
//! indices, so the sequence can be extended without invalidating targets.
//! Temps and labels are minted monotonically per translation unit.
//!
//! # Opcode notes
//!
//! `ASSIGN_ARRAY` stores its operands load-store-style as
//! `(index, array, value)`; the serializer prints `array[index] = value`.
//! Cast opcodes are type-tagged (`CAST_int_to_float`); pointer casts are not
//! cast opcodes at all but plain `ASSIGN`s of a `(type)value` text.

use std::fmt;

/// IR operations. `Cast` carries its sanitized operand types so the opcode
/// text (`CAST_from_to_to`) stays self-describing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Lshift,
    Rshift,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    Goto,
    IfTrueGoto,
    IfFalseGoto,
    IfTrueGotoFloat,
    IfFalseGotoFloat,
    Label,
    FuncBegin,
    FuncEnd,
    Param,
    Call,
    IndirectCall,
    Return,
    Addr,
    Deref,
    AssignDeref,
    ArrayAccess,
    AssignArray,
    ArrayAddr,
    LoadOffset,
    StoreOffset,
    Load,
    Store,
    PtrAdd,
    PtrSub,
    FloatToDouble,
    Cast { from: String, to: String },
}

impl IrOp {
    /// Canonical opcode spelling.
    pub fn mnemonic(&self) -> String {
        match self {
            IrOp::Assign => "ASSIGN".to_string(),
            IrOp::Add => "ADD".to_string(),
            IrOp::Sub => "SUB".to_string(),
            IrOp::Mul => "MUL".to_string(),
            IrOp::Div => "DIV".to_string(),
            IrOp::Mod => "MOD".to_string(),
            IrOp::Neg => "NEG".to_string(),
            IrOp::Not => "NOT".to_string(),
            IrOp::BitAnd => "BITAND".to_string(),
            IrOp::BitOr => "BITOR".to_string(),
            IrOp::BitXor => "BITXOR".to_string(),
            IrOp::BitNot => "BITNOT".to_string(),
            IrOp::Lshift => "LSHIFT".to_string(),
            IrOp::Rshift => "RSHIFT".to_string(),
            IrOp::Lt => "LT".to_string(),
            IrOp::Gt => "GT".to_string(),
            IrOp::Le => "LE".to_string(),
            IrOp::Ge => "GE".to_string(),
            IrOp::Eq => "EQ".to_string(),
            IrOp::Ne => "NE".to_string(),
            IrOp::Goto => "GOTO".to_string(),
            IrOp::IfTrueGoto => "IF_TRUE_GOTO".to_string(),
            IrOp::IfFalseGoto => "IF_FALSE_GOTO".to_string(),
            IrOp::IfTrueGotoFloat => "IF_TRUE_GOTO_FLOAT".to_string(),
            IrOp::IfFalseGotoFloat => "IF_FALSE_GOTO_FLOAT".to_string(),
            IrOp::Label => "LABEL".to_string(),
            IrOp::FuncBegin => "FUNC_BEGIN".to_string(),
            IrOp::FuncEnd => "FUNC_END".to_string(),
            IrOp::Param => "PARAM".to_string(),
            IrOp::Call => "CALL".to_string(),
            IrOp::IndirectCall => "INDIRECT_CALL".to_string(),
            IrOp::Return => "RETURN".to_string(),
            IrOp::Addr => "ADDR".to_string(),
            IrOp::Deref => "DEREF".to_string(),
            IrOp::AssignDeref => "ASSIGN_DEREF".to_string(),
            IrOp::ArrayAccess => "ARRAY_ACCESS".to_string(),
            IrOp::AssignArray => "ASSIGN_ARRAY".to_string(),
            IrOp::ArrayAddr => "ARRAY_ADDR".to_string(),
            IrOp::LoadOffset => "LOAD_OFFSET".to_string(),
            IrOp::StoreOffset => "STORE_OFFSET".to_string(),
            IrOp::Load => "LOAD".to_string(),
            IrOp::Store => "STORE".to_string(),
            IrOp::PtrAdd => "PTR_ADD".to_string(),
            IrOp::PtrSub => "PTR_SUB".to_string(),
            IrOp::FloatToDouble => "FLOAT_TO_DOUBLE".to_string(),
            IrOp::Cast { from, to } => format!("CAST_{}_to_{}", from, to),
        }
    }

    /// Any transfer of control: jumps, conditional jumps, returns and the
    /// function-end marker. Block leaders follow these.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            IrOp::Goto
                | IrOp::IfTrueGoto
                | IrOp::IfFalseGoto
                | IrOp::IfTrueGotoFloat
                | IrOp::IfFalseGotoFloat
                | IrOp::Return
                | IrOp::FuncEnd
        )
    }

    /// Control never falls through these.
    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(self, IrOp::Goto | IrOp::Return | IrOp::FuncEnd)
    }

    pub fn is_conditional_jump(&self) -> bool {
        matches!(
            self,
            IrOp::IfTrueGoto | IrOp::IfFalseGoto | IrOp::IfTrueGotoFloat | IrOp::IfFalseGotoFloat
        )
    }
}

impl fmt::Display for IrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadruple {
    pub op: IrOp,
    pub arg1: String,
    pub arg2: String,
    pub result: String,
}

impl Quadruple {
    /// The label a jump transfers to: `GOTO` keeps it in arg1, conditional
    /// jumps in arg2. Non-jumps (and returns) have no target.
    pub fn jump_target(&self) -> Option<&str> {
        match self.op {
            IrOp::Goto => Some(&self.arg1),
            IrOp::IfTrueGoto | IrOp::IfFalseGoto | IrOp::IfTrueGotoFloat | IrOp::IfFalseGotoFloat => {
                Some(&self.arg2)
            }
            _ => None,
        }
    }
}

/// A `name = value` entry for the DATA section: initialized globals and
/// function-local statics (mangled `func.var`).
#[derive(Debug, Clone, PartialEq)]
pub struct StaticVar {
    pub name: String,
    pub init_value: String,
    pub is_initialized: bool,
}

/// Operand classification shared between the IR generator and the block
/// analyzer: constants start with a digit, a sign, a quote or a double
/// quote; empty slots count as absent.
pub fn is_constant(text: &str) -> bool {
    match text.chars().next() {
        None => true,
        Some(c) => c.is_ascii_digit() || c == '-' || c == '\'' || c == '"',
    }
}

/// The ordered IR sequence plus the mints and the static-initializer table.
#[derive(Debug, Default)]
pub struct IrProgram {
    pub quads: Vec<Quadruple>,
    pub statics: Vec<StaticVar>,
    temp_count: usize,
    label_count: usize,
}

impl IrProgram {
    pub fn new() -> Self {
        IrProgram::default()
    }

    /// Append an instruction, returning its index (used for backpatching).
    pub fn emit(
        &mut self,
        op: IrOp,
        arg1: impl Into<String>,
        arg2: impl Into<String>,
        result: impl Into<String>,
    ) -> usize {
        self.quads.push(Quadruple {
            op,
            arg1: arg1.into(),
            arg2: arg2.into(),
            result: result.into(),
        });
        self.quads.len() - 1
    }

    pub fn new_temp(&mut self) -> String {
        let t = format!("t{}", self.temp_count);
        self.temp_count += 1;
        t
    }

    pub fn new_label(&mut self) -> String {
        let l = format!("L{}", self.label_count);
        self.label_count += 1;
        l
    }

    /// Fill in the target of forward `GOTO`s emitted with a placeholder.
    pub fn backpatch(&mut self, jumps: &[usize], label: &str) {
        for &idx in jumps {
            if let Some(quad) = self.quads.get_mut(idx) {
                if quad.op == IrOp::Goto {
                    quad.arg1 = label.to_string();
                }
            }
        }
    }

    pub fn register_static(&mut self, name: &str, init_value: Option<&str>) {
        let (value, initialized) = match init_value {
            Some(v) if !v.is_empty() => (v.to_string(), true),
            _ => ("0".to_string(), false),
        };
        self.statics.push(StaticVar {
            name: name.to_string(),
            init_value: value,
            is_initialized: initialized,
        });
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    fn first_function_index(&self) -> usize {
        self.quads
            .iter()
            .position(|q| q.op == IrOp::FuncBegin)
            .unwrap_or(self.quads.len())
    }

    /// Natural three-address rendering of one instruction. Opcodes with no
    /// established surface form print as the raw quadruple.
    pub fn three_address(quad: &Quadruple) -> String {
        let a1 = &quad.arg1;
        let a2 = &quad.arg2;
        let r = &quad.result;
        match &quad.op {
            IrOp::Assign => format!("{} = {}", r, a1),
            IrOp::Add => format!("{} = {} + {}", r, a1, a2),
            IrOp::Sub => format!("{} = {} - {}", r, a1, a2),
            IrOp::Mul => format!("{} = {} * {}", r, a1, a2),
            IrOp::Div => format!("{} = {} / {}", r, a1, a2),
            IrOp::Mod => format!("{} = {} % {}", r, a1, a2),
            IrOp::Neg => format!("{} = -{}", r, a1),
            IrOp::Not => format!("{} = !{}", r, a1),
            IrOp::BitNot => format!("{} = ~{}", r, a1),
            IrOp::BitAnd => format!("{} = {} & {}", r, a1, a2),
            IrOp::BitOr => format!("{} = {} | {}", r, a1, a2),
            IrOp::BitXor => format!("{} = {} ^ {}", r, a1, a2),
            IrOp::Lshift => format!("{} = {} << {}", r, a1, a2),
            IrOp::Rshift => format!("{} = {} >> {}", r, a1, a2),
            IrOp::Lt => format!("{} = {} < {}", r, a1, a2),
            IrOp::Gt => format!("{} = {} > {}", r, a1, a2),
            IrOp::Le => format!("{} = {} <= {}", r, a1, a2),
            IrOp::Ge => format!("{} = {} >= {}", r, a1, a2),
            IrOp::Eq => format!("{} = {} == {}", r, a1, a2),
            IrOp::Ne => format!("{} = {} != {}", r, a1, a2),
            IrOp::Goto => format!("goto {}", a1),
            IrOp::IfTrueGoto => format!("if {} != 0 goto {}", a1, a2),
            IrOp::IfFalseGoto => format!("if {} == 0 goto {}", a1, a2),
            IrOp::IfTrueGotoFloat => format!("if {} != 0.0 goto {}", a1, a2),
            IrOp::IfFalseGotoFloat => format!("if {} == 0.0 goto {}", a1, a2),
            IrOp::ArrayAccess => format!("{} = {}[{}]", r, a1, a2),
            // Operand order is (index, array, value); prints in source order.
            IrOp::AssignArray => format!("{}[{}] = {}", a2, a1, r),
            IrOp::ArrayAddr => format!("{} = {} + {}", r, a1, a2),
            IrOp::Param => format!("param {}", a1),
            IrOp::Call | IrOp::IndirectCall => {
                let count = if a2.is_empty() { "0" } else { a2 };
                let callee = match quad.op {
                    IrOp::IndirectCall => format!("*{}", a1),
                    _ => a1.to_string(),
                };
                if r.is_empty() {
                    format!("call {}, {}", callee, count)
                } else {
                    format!("{} = call {}, {}", r, callee, count)
                }
            }
            IrOp::Return => {
                if a1.is_empty() {
                    "return".to_string()
                } else {
                    format!("return {}", a1)
                }
            }
            IrOp::Addr => format!("{} = &{}", r, a1),
            IrOp::Deref => format!("{} = *{}", r, a1),
            IrOp::AssignDeref => format!("*{} = {}", a2, a1),
            IrOp::PtrAdd => format!("{} = {} + {}", r, a1, a2),
            IrOp::PtrSub => format!("{} = {} - {}", r, a1, a2),
            IrOp::FloatToDouble => format!("{} = (double){}", r, a1),
            IrOp::Cast { .. } => format!("{} = {}({})", r, quad.op.mnemonic(), a1),
            // LOAD/STORE (reference traffic), offset loads/stores and the
            // markers have no surface syntax; print the raw quadruple.
            _ => {
                let mut raw = quad.op.mnemonic();
                for field in [a1, a2, r] {
                    if !field.is_empty() {
                        raw.push(' ');
                        raw.push_str(field);
                    }
                }
                raw
            }
        }
    }

    /// Serialize the full program in the line-oriented textual format:
    /// header, optional DATA section, then one block per function.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Three-Address Code (Intermediate Representation)\n");
        out.push_str("# ================================================\n\n");

        let first_func = self.first_function_index();
        let global_assigns: Vec<&Quadruple> = self.quads[..first_func]
            .iter()
            .filter(|q| q.op == IrOp::Assign)
            .collect();

        if !self.statics.is_empty() || !global_assigns.is_empty() {
            out.push_str("DATA:\n");
            for sv in &self.statics {
                out.push_str(&format!("    {} = {}\n", sv.name, sv.init_value));
            }
            for quad in &global_assigns {
                out.push_str(&format!("    {}\n", Self::three_address(quad)));
            }
            out.push('\n');
        }

        for (i, quad) in self.quads.iter().enumerate() {
            match quad.op {
                IrOp::FuncBegin => out.push_str(&format!("func_begin {}\n", quad.arg1)),
                IrOp::FuncEnd => out.push_str(&format!("func_end {}\n\n", quad.arg1)),
                IrOp::Label => out.push_str(&format!("{}:\n", quad.arg1)),
                IrOp::Assign if i < first_func => {
                    // Already listed in the DATA section.
                }
                _ => out.push_str(&format!("    {}\n", Self::three_address(quad))),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_and_label_mints_are_monotonic() {
        let mut ir = IrProgram::new();
        assert_eq!(ir.new_temp(), "t0");
        assert_eq!(ir.new_temp(), "t1");
        assert_eq!(ir.new_label(), "L0");
        assert_eq!(ir.new_label(), "L1");
        assert_eq!(ir.new_temp(), "t2");
    }

    #[test]
    fn test_is_constant() {
        assert!(is_constant("42"));
        assert!(is_constant("-3"));
        assert!(is_constant("'a'"));
        assert!(is_constant("\"str\""));
        assert!(is_constant(""));
        assert!(!is_constant("t0"));
        assert!(!is_constant("x"));
        assert!(!is_constant("L2"));
    }

    #[test]
    fn test_backpatch_fills_goto_targets() {
        let mut ir = IrProgram::new();
        let j1 = ir.emit(IrOp::Goto, "0", "", "");
        ir.emit(IrOp::Assign, "1", "", "x");
        let j2 = ir.emit(IrOp::Goto, "0", "", "");
        ir.backpatch(&[j1, j2], "L7");
        assert_eq!(ir.quads[j1].arg1, "L7");
        assert_eq!(ir.quads[j2].arg1, "L7");
    }

    #[test]
    fn test_jump_targets() {
        let goto = Quadruple {
            op: IrOp::Goto,
            arg1: "L1".to_string(),
            arg2: String::new(),
            result: String::new(),
        };
        assert_eq!(goto.jump_target(), Some("L1"));

        let cond = Quadruple {
            op: IrOp::IfFalseGoto,
            arg1: "t0".to_string(),
            arg2: "L2".to_string(),
            result: String::new(),
        };
        assert_eq!(cond.jump_target(), Some("L2"));

        let ret = Quadruple {
            op: IrOp::Return,
            arg1: String::new(),
            arg2: String::new(),
            result: String::new(),
        };
        assert_eq!(ret.jump_target(), None);
    }

    #[test]
    fn test_three_address_forms() {
        let quad = |op, a1: &str, a2: &str, r: &str| Quadruple {
            op,
            arg1: a1.to_string(),
            arg2: a2.to_string(),
            result: r.to_string(),
        };

        assert_eq!(
            IrProgram::three_address(&quad(IrOp::Add, "a", "b", "t0")),
            "t0 = a + b"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::Assign, "5", "", "x")),
            "x = 5"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::IfFalseGoto, "t0", "L3", "")),
            "if t0 == 0 goto L3"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::IfTrueGotoFloat, "f", "L1", "")),
            "if f != 0.0 goto L1"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::ArrayAccess, "a", "i", "t1")),
            "t1 = a[i]"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::Call, "f", "2", "t2")),
            "t2 = call f, 2"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::Call, "free", "1", "")),
            "call free, 1"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::Return, "", "", "")),
            "return"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::Addr, "x", "", "t3")),
            "t3 = &x"
        );
        assert_eq!(
            IrProgram::three_address(&quad(IrOp::AssignDeref, "v", "p", "")),
            "*p = v"
        );
        assert_eq!(
            IrProgram::three_address(&quad(
                IrOp::Cast {
                    from: "int".to_string(),
                    to: "float".to_string()
                },
                "x",
                "",
                "t4"
            )),
            "t4 = CAST_int_to_float(x)"
        );
    }

    #[test]
    fn test_assign_array_operand_order() {
        // (index, array, value) prints as array[index] = value
        let quad = Quadruple {
            op: IrOp::AssignArray,
            arg1: "i".to_string(),
            arg2: "arr".to_string(),
            result: "v".to_string(),
        };
        assert_eq!(IrProgram::three_address(&quad), "arr[i] = v");
    }

    #[test]
    fn test_raw_fallback_for_offset_ops() {
        let quad = Quadruple {
            op: IrOp::LoadOffset,
            arg1: "t0".to_string(),
            arg2: "4".to_string(),
            result: "t1".to_string(),
        };
        assert_eq!(IrProgram::three_address(&quad), "LOAD_OFFSET t0 4 t1");
    }

    #[test]
    fn test_render_sections() {
        let mut ir = IrProgram::new();
        ir.register_static("counter.calls", Some("0"));
        ir.emit(IrOp::FuncBegin, "main", "", "");
        ir.emit(IrOp::Assign, "1", "", "x");
        ir.emit(IrOp::Label, "L0", "", "");
        ir.emit(IrOp::Return, "x", "", "");
        ir.emit(IrOp::FuncEnd, "main", "", "");

        let text = ir.render();
        assert!(text.starts_with("# Three-Address Code (Intermediate Representation)"));
        assert!(text.contains("DATA:\n    counter.calls = 0"));
        assert!(text.contains("func_begin main"));
        assert!(text.contains("    x = 1"));
        assert!(text.contains("L0:\n"));
        assert!(text.contains("    return x"));
        assert!(text.contains("func_end main"));
    }

    #[test]
    fn test_render_global_assign_goes_to_data() {
        let mut ir = IrProgram::new();
        ir.emit(IrOp::Assign, "10", "", "g");
        ir.emit(IrOp::FuncBegin, "main", "", "");
        ir.emit(IrOp::FuncEnd, "main", "", "");

        let text = ir.render();
        assert!(text.contains("DATA:\n    g = 10"));
        // The global assignment must not be repeated inside the body.
        let body = text.split("func_begin").nth(1).unwrap();
        assert!(!body.contains("g = 10"));
    }
}
