//! JVM opcode tables
//!
//! Operand widths for the linear bytecode walk and the semantic category
//! table used by fuzzy tokenization. The category mapping is fixed and part
//! of the fingerprint contract:
//!
//! - constant pushes and local loads are `LOAD`; local stores are `STORE`
//! - array element access, array creation (`newarray`, `anewarray`,
//!   `multianewarray`) and `arraylength` are `ARRAY`
//! - `iinc` and all arithmetic/logic ops are `ARITH`
//! - numeric conversions, `checkcast` and `instanceof` are `CAST`
//! - value comparisons and conditional branches are `COMPARE`
//! - unconditional transfers (`goto`, `jsr`, `ret`, switches, `athrow`) are
//!   `CONTROL`
//! - stack juggling and monitor ops are `OTHER`

/// Named opcodes referenced throughout the analyzer
pub mod op {
    pub const LDC: u8 = 0x12;
    pub const ALOAD_0: u8 = 0x2a;
    pub const IINC: u8 = 0x84;
    pub const RET: u8 = 0xa9;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const IRETURN: u8 = 0xac;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
}

/// Operand layout of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandWidth {
    /// Fixed number of operand bytes following the opcode
    Fixed(usize),
    /// `tableswitch`: 4-byte aligned jump table
    TableSwitch,
    /// `lookupswitch`: 4-byte aligned match-offset pairs
    LookupSwitch,
    /// `wide` prefix modifying the following opcode
    Wide,
    /// Not a valid instruction opcode
    Invalid,
}

/// Operand width of `opcode`
pub fn operand_width(opcode: u8) -> OperandWidth {
    use OperandWidth::*;
    match opcode {
        0x10 => Fixed(1),                   // bipush
        0x11 => Fixed(2),                   // sipush
        0x12 => Fixed(1),                   // ldc
        0x13 | 0x14 => Fixed(2),            // ldc_w, ldc2_w
        0x15..=0x19 => Fixed(1),            // iload..aload
        0x36..=0x3a => Fixed(1),            // istore..astore
        0x84 => Fixed(2),                   // iinc
        0x99..=0xa8 => Fixed(2),            // ifeq..jsr
        0xa9 => Fixed(1),                   // ret
        0xaa => TableSwitch,
        0xab => LookupSwitch,
        0xb2..=0xb8 => Fixed(2),            // getstatic..invokestatic
        0xb9 | 0xba => Fixed(4),            // invokeinterface, invokedynamic
        0xbb => Fixed(2),                   // new
        0xbc => Fixed(1),                   // newarray
        0xbd => Fixed(2),                   // anewarray
        0xc0 | 0xc1 => Fixed(2),            // checkcast, instanceof
        0xc4 => Wide,
        0xc5 => Fixed(3),                   // multianewarray
        0xc6 | 0xc7 => Fixed(2),            // ifnull, ifnonnull
        0xc8 | 0xc9 => Fixed(4),            // goto_w, jsr_w
        0x00..=0xc3 => Fixed(0),            // everything else below wide
        _ => Invalid,
    }
}

/// Semantic instruction category for fuzzy tokenization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    Load,
    Store,
    Invoke,
    Arith,
    Compare,
    Return,
    Field,
    Array,
    Control,
    New,
    Cast,
    Other,
}

impl OpCategory {
    /// Stable token label for this category
    pub fn label(self) -> &'static str {
        match self {
            OpCategory::Load => "LOAD",
            OpCategory::Store => "STORE",
            OpCategory::Invoke => "INVOKE",
            OpCategory::Arith => "ARITH",
            OpCategory::Compare => "COMPARE",
            OpCategory::Return => "RETURN",
            OpCategory::Field => "FIELD",
            OpCategory::Array => "ARRAY",
            OpCategory::Control => "CONTROL",
            OpCategory::New => "NEW",
            OpCategory::Cast => "CAST",
            OpCategory::Other => "OTHER",
        }
    }
}

/// Semantic category of `opcode`
pub fn category(opcode: u8) -> OpCategory {
    use OpCategory::*;
    match opcode {
        0x01..=0x14 => Load,     // aconst_null..ldc2_w
        0x15..=0x2d => Load,     // iload..aload_3
        0x2e..=0x35 => Array,    // iaload..saload
        0x36..=0x4e => Store,    // istore..astore_3
        0x4f..=0x56 => Array,    // iastore..sastore
        0x60..=0x84 => Arith,    // iadd..iinc
        0x85..=0x93 => Cast,     // i2l..i2s
        0x94..=0xa6 => Compare,  // lcmp..if_acmpne
        0xa7..=0xab => Control,  // goto, jsr, ret, switches
        0xac..=0xb1 => Return,
        0xb2..=0xb5 => Field,
        0xb6..=0xba => Invoke,
        0xbb => New,
        0xbc | 0xbd => Array,    // newarray, anewarray
        0xbe => Array,           // arraylength
        0xbf => Control,         // athrow
        0xc0 | 0xc1 => Cast,     // checkcast, instanceof
        0xc5 => Array,           // multianewarray
        0xc6 | 0xc7 => Compare,  // ifnull, ifnonnull
        0xc8 | 0xc9 => Control,  // goto_w, jsr_w
        _ => Other,              // nop, stack ops, monitors
    }
}
