//! JVM class-file parser
//!
//! Parses the binary class-file format (magic `0xCAFEBABE`) far enough to
//! recover the structural surface the analyzer needs: class header,
//! interfaces, fields, methods with decoded bytecode, and class-scope
//! annotation descriptors. Debug attributes, stack-map frames and constant
//! values are skipped by length.
//!
//! The parser is strictly bounds-checked; any structural violation yields a
//! [`ParseError`] for that class alone.

use crate::error::ParseError;
use crate::opcodes::{self, op, OperandWidth};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

/// Class-file magic bytes
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// File extension of compiled classes inside an artifact
pub const CLASS_EXTENSION: &str = ".class";

/// Oldest class-file major version we accept (JDK 1.0)
const MIN_MAJOR_VERSION: u16 = 45;

/// Nesting limit for annotation element values
const MAX_ANNOTATION_DEPTH: u32 = 64;

/// Structural view of one parsed class file
#[derive(Debug, Clone)]
pub struct RawClass {
    /// Internal slash-separated name (e.g. `com/example/Foo`)
    pub class_name: String,
    /// Direct superclass, absent only for `java/lang/Object`
    pub super_name: Option<String>,
    /// Implemented interfaces, in declaration order
    pub interfaces: Vec<String>,
    pub fields: Vec<RawField>,
    pub methods: Vec<RawMethod>,
    /// Class-scope annotation descriptors, in encounter order
    pub annotations: Vec<String>,
    pub major_version: u16,
}

/// A field declaration
#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

/// A method declaration with its decoded body
#[derive(Debug, Clone)]
pub struct RawMethod {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    /// Decoded instructions; `None` for abstract and native methods
    pub body: Option<Vec<Instruction>>,
}

/// One decoded bytecode instruction, reduced to the shapes the analyzer
/// distinguishes
#[derive(Debug, Clone)]
pub enum Instruction {
    /// `invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`
    MethodCall {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
    },
    /// `getstatic`, `putstatic`, `getfield`, `putfield`
    FieldAccess {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
    },
    /// `new`, `anewarray`, `checkcast`, `instanceof`
    TypeRef { opcode: u8, type_name: String },
    /// Every other instruction; operand values are irrelevant
    Plain { opcode: u8 },
}

impl Instruction {
    /// The instruction's opcode
    pub fn opcode(&self) -> u8 {
        match *self {
            Instruction::MethodCall { opcode, .. }
            | Instruction::FieldAccess { opcode, .. }
            | Instruction::TypeRef { opcode, .. }
            | Instruction::Plain { opcode } => opcode,
        }
    }
}

/// Constant pool entry, reduced to the variants the parser resolves
#[derive(Debug, Clone)]
enum CpEntry {
    Utf8(String),
    Class { name_index: u16 },
    /// Fieldref, Methodref and InterfaceMethodref share one layout
    MemberRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    /// Entries we never dereference (numbers, strings, handles, modules)
    Other,
    /// Index 0 and the shadow slot after Long/Double
    Unusable,
}

/// Class-file parser
pub struct ClassFileParser;

impl Default for ClassFileParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassFileParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse one class file from bytes
    pub fn parse(&self, data: &[u8]) -> Result<RawClass, ParseError> {
        let mut cursor = Cursor::new(data);

        let magic = cursor.read_u32::<BigEndian>()?;
        if magic != CLASS_MAGIC {
            return Err(ParseError::InvalidMagic);
        }

        let _minor = cursor.read_u16::<BigEndian>()?;
        let major = cursor.read_u16::<BigEndian>()?;
        if major < MIN_MAJOR_VERSION {
            return Err(ParseError::UnsupportedVersion(major));
        }

        let pool = self.read_constant_pool(&mut cursor)?;

        let _access_flags = cursor.read_u16::<BigEndian>()?;
        let this_class = cursor.read_u16::<BigEndian>()?;
        let super_class = cursor.read_u16::<BigEndian>()?;

        let class_name = class_name_at(&pool, this_class)?;
        let super_name = if super_class == 0 {
            None
        } else {
            Some(class_name_at(&pool, super_class)?)
        };

        let interface_count = cursor.read_u16::<BigEndian>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = cursor.read_u16::<BigEndian>()?;
            interfaces.push(class_name_at(&pool, index)?);
        }

        let fields = self.read_fields(&mut cursor, &pool)?;
        let methods = self.read_methods(&mut cursor, &pool)?;
        let annotations = self.read_class_annotations(&mut cursor, &pool)?;

        Ok(RawClass {
            class_name,
            super_name,
            interfaces,
            fields,
            methods,
            annotations,
            major_version: major,
        })
    }

    fn read_constant_pool(&self, cursor: &mut Cursor<&[u8]>) -> Result<Vec<CpEntry>, ParseError> {
        let count = cursor.read_u16::<BigEndian>()?;
        let mut pool = Vec::with_capacity(count as usize);
        pool.push(CpEntry::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = cursor.read_u8()?;
            let entry = match tag {
                // Utf8
                1 => {
                    let len = cursor.read_u16::<BigEndian>()? as usize;
                    let mut bytes = vec![0u8; len];
                    std::io::Read::read_exact(cursor, &mut bytes)?;
                    let text = String::from_utf8(bytes)
                        .map_err(|e| ParseError::Malformed(e.to_string()))?;
                    CpEntry::Utf8(text)
                }
                // Integer, Float
                3 | 4 => {
                    skip(cursor, 4)?;
                    CpEntry::Other
                }
                // Long, Double: occupy two pool slots
                5 | 6 => {
                    skip(cursor, 8)?;
                    pool.push(CpEntry::Other);
                    pool.push(CpEntry::Unusable);
                    index += 2;
                    continue;
                }
                // Class
                7 => CpEntry::Class {
                    name_index: cursor.read_u16::<BigEndian>()?,
                },
                // String
                8 => {
                    skip(cursor, 2)?;
                    CpEntry::Other
                }
                // Fieldref, Methodref, InterfaceMethodref
                9 | 10 | 11 => CpEntry::MemberRef {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                // NameAndType
                12 => CpEntry::NameAndType {
                    name_index: cursor.read_u16::<BigEndian>()?,
                    descriptor_index: cursor.read_u16::<BigEndian>()?,
                },
                // MethodHandle
                15 => {
                    skip(cursor, 3)?;
                    CpEntry::Other
                }
                // MethodType
                16 => {
                    skip(cursor, 2)?;
                    CpEntry::Other
                }
                // Dynamic, InvokeDynamic
                17 | 18 => {
                    skip(cursor, 4)?;
                    CpEntry::Other
                }
                // Module, Package
                19 | 20 => {
                    skip(cursor, 2)?;
                    CpEntry::Other
                }
                other => return Err(ParseError::UnknownConstantTag(other)),
            };
            pool.push(entry);
            index += 1;
        }

        Ok(pool)
    }

    fn read_fields(
        &self,
        cursor: &mut Cursor<&[u8]>,
        pool: &[CpEntry],
    ) -> Result<Vec<RawField>, ParseError> {
        let count = cursor.read_u16::<BigEndian>()?;
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access_flags = cursor.read_u16::<BigEndian>()?;
            let name = utf8_at(pool, cursor.read_u16::<BigEndian>()?)?.to_string();
            let descriptor = utf8_at(pool, cursor.read_u16::<BigEndian>()?)?.to_string();
            self.skip_attributes(cursor)?;
            fields.push(RawField {
                name,
                descriptor,
                access_flags,
            });
        }
        Ok(fields)
    }

    fn read_methods(
        &self,
        cursor: &mut Cursor<&[u8]>,
        pool: &[CpEntry],
    ) -> Result<Vec<RawMethod>, ParseError> {
        let count = cursor.read_u16::<BigEndian>()?;
        let mut methods = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access_flags = cursor.read_u16::<BigEndian>()?;
            let name = utf8_at(pool, cursor.read_u16::<BigEndian>()?)?.to_string();
            let descriptor = utf8_at(pool, cursor.read_u16::<BigEndian>()?)?.to_string();

            let mut body = None;
            let attr_count = cursor.read_u16::<BigEndian>()?;
            for _ in 0..attr_count {
                let attr_name_index = cursor.read_u16::<BigEndian>()?;
                let attr_len = cursor.read_u32::<BigEndian>()? as u64;
                let end = attribute_end(cursor, attr_len)?;
                let attr_name = utf8_at(pool, attr_name_index)?;
                if attr_name == "Code" && body.is_none() {
                    body = Some(self.read_code(cursor, pool)?);
                }
                cursor.set_position(end);
            }

            methods.push(RawMethod {
                name,
                descriptor,
                access_flags,
                body,
            });
        }
        Ok(methods)
    }

    /// Read a `Code` attribute and decode its bytecode
    fn read_code(
        &self,
        cursor: &mut Cursor<&[u8]>,
        pool: &[CpEntry],
    ) -> Result<Vec<Instruction>, ParseError> {
        let _max_stack = cursor.read_u16::<BigEndian>()?;
        let _max_locals = cursor.read_u16::<BigEndian>()?;
        let code_len = cursor.read_u32::<BigEndian>()? as u64;

        let start = cursor.position();
        if start.saturating_add(code_len) > cursor.get_ref().len() as u64 {
            return Err(ParseError::Malformed("code attribute truncated".into()));
        }
        let code = &cursor.get_ref()[start as usize..(start + code_len) as usize];
        let instructions = self.decode_bytecode(code, pool)?;
        cursor.set_position(start + code_len);

        let exception_count = cursor.read_u16::<BigEndian>()?;
        skip(cursor, exception_count as u64 * 8)?;
        self.skip_attributes(cursor)?;

        Ok(instructions)
    }

    /// Linear walk over a method's bytecode array
    fn decode_bytecode(
        &self,
        code: &[u8],
        pool: &[CpEntry],
    ) -> Result<Vec<Instruction>, ParseError> {
        let mut instructions = Vec::new();
        let mut pc = 0usize;

        while pc < code.len() {
            let opcode = code[pc];
            match opcode {
                op::INVOKEVIRTUAL | op::INVOKESPECIAL | op::INVOKESTATIC
                | op::INVOKEINTERFACE => {
                    let index = read_u16_at(code, pc + 1)?;
                    let (owner, name, descriptor) = member_at(pool, index)?;
                    instructions.push(Instruction::MethodCall {
                        opcode,
                        owner,
                        name,
                        descriptor,
                    });
                    // invokeinterface carries a count byte and a zero byte
                    pc += if opcode == op::INVOKEINTERFACE { 5 } else { 3 };
                }
                op::GETSTATIC | op::PUTSTATIC | op::GETFIELD | op::PUTFIELD => {
                    let index = read_u16_at(code, pc + 1)?;
                    let (owner, name, descriptor) = member_at(pool, index)?;
                    instructions.push(Instruction::FieldAccess {
                        opcode,
                        owner,
                        name,
                        descriptor,
                    });
                    pc += 3;
                }
                op::NEW | op::ANEWARRAY | op::CHECKCAST | op::INSTANCEOF => {
                    let index = read_u16_at(code, pc + 1)?;
                    let type_name = class_name_at(pool, index)?;
                    instructions.push(Instruction::TypeRef { opcode, type_name });
                    pc += 3;
                }
                op::TABLESWITCH => {
                    let base = align4(pc + 1);
                    let _default = read_i32_at(code, base)?;
                    let low = read_i32_at(code, base + 4)? as i64;
                    let high = read_i32_at(code, base + 8)? as i64;
                    if low > high {
                        return Err(ParseError::Malformed("tableswitch bounds inverted".into()));
                    }
                    let next = base as u64 + 12 + (high - low + 1) as u64 * 4;
                    if next > code.len() as u64 {
                        return Err(ParseError::Malformed("tableswitch truncated".into()));
                    }
                    instructions.push(Instruction::Plain { opcode });
                    pc = next as usize;
                }
                op::LOOKUPSWITCH => {
                    let base = align4(pc + 1);
                    let _default = read_i32_at(code, base)?;
                    let npairs = read_i32_at(code, base + 4)? as i64;
                    if npairs < 0 {
                        return Err(ParseError::Malformed("negative lookupswitch pairs".into()));
                    }
                    let next = base as u64 + 8 + npairs as u64 * 8;
                    if next > code.len() as u64 {
                        return Err(ParseError::Malformed("lookupswitch truncated".into()));
                    }
                    instructions.push(Instruction::Plain { opcode });
                    pc = next as usize;
                }
                op::WIDE => {
                    let widened = *code
                        .get(pc + 1)
                        .ok_or_else(|| ParseError::Malformed("wide prefix truncated".into()))?;
                    let step = match widened {
                        op::IINC => 6,
                        0x15..=0x19 | 0x36..=0x3a | op::RET => 4,
                        other => return Err(ParseError::UnknownOpcode(other)),
                    };
                    if pc + step > code.len() {
                        return Err(ParseError::Malformed("wide instruction truncated".into()));
                    }
                    instructions.push(Instruction::Plain { opcode: widened });
                    pc += step;
                }
                _ => {
                    let operand_len = match opcodes::operand_width(opcode) {
                        OperandWidth::Fixed(n) => n,
                        _ => return Err(ParseError::UnknownOpcode(opcode)),
                    };
                    if pc + 1 + operand_len > code.len() {
                        return Err(ParseError::Malformed("bytecode truncated".into()));
                    }
                    instructions.push(Instruction::Plain { opcode });
                    pc += 1 + operand_len;
                }
            }
        }

        Ok(instructions)
    }

    /// Read class-scope attributes, collecting annotation descriptors
    fn read_class_annotations(
        &self,
        cursor: &mut Cursor<&[u8]>,
        pool: &[CpEntry],
    ) -> Result<Vec<String>, ParseError> {
        let mut annotations = Vec::new();
        let attr_count = cursor.read_u16::<BigEndian>()?;
        for _ in 0..attr_count {
            let attr_name_index = cursor.read_u16::<BigEndian>()?;
            let attr_len = cursor.read_u32::<BigEndian>()? as u64;
            let end = attribute_end(cursor, attr_len)?;
            let attr_name = utf8_at(pool, attr_name_index)?;
            if attr_name == "RuntimeVisibleAnnotations"
                || attr_name == "RuntimeInvisibleAnnotations"
            {
                let num = cursor.read_u16::<BigEndian>()?;
                for _ in 0..num {
                    self.read_annotation(cursor, pool, &mut annotations, 0)?;
                }
                if cursor.position() > end {
                    return Err(ParseError::Malformed("annotation attribute overrun".into()));
                }
            }
            cursor.set_position(end);
        }
        Ok(annotations)
    }

    fn read_annotation(
        &self,
        cursor: &mut Cursor<&[u8]>,
        pool: &[CpEntry],
        out: &mut Vec<String>,
        depth: u32,
    ) -> Result<(), ParseError> {
        if depth > MAX_ANNOTATION_DEPTH {
            return Err(ParseError::Malformed("annotation nesting too deep".into()));
        }
        let type_index = cursor.read_u16::<BigEndian>()?;
        let descriptor = utf8_at(pool, type_index)?.to_string();
        // Only top-level annotations are part of the class surface
        if depth == 0 {
            out.push(descriptor);
        }
        let num_pairs = cursor.read_u16::<BigEndian>()?;
        for _ in 0..num_pairs {
            let _element_name = cursor.read_u16::<BigEndian>()?;
            self.skip_element_value(cursor, pool, out, depth + 1)?;
        }
        Ok(())
    }

    fn skip_element_value(
        &self,
        cursor: &mut Cursor<&[u8]>,
        pool: &[CpEntry],
        out: &mut Vec<String>,
        depth: u32,
    ) -> Result<(), ParseError> {
        if depth > MAX_ANNOTATION_DEPTH {
            return Err(ParseError::Malformed("annotation nesting too deep".into()));
        }
        let tag = cursor.read_u8()?;
        match tag {
            // primitive constants and String / Class references
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
                skip(cursor, 2)
            }
            // enum constant: type descriptor + constant name
            b'e' => skip(cursor, 4),
            // nested annotation
            b'@' => self.read_annotation(cursor, pool, out, depth),
            // array of element values
            b'[' => {
                let len = cursor.read_u16::<BigEndian>()?;
                for _ in 0..len {
                    self.skip_element_value(cursor, pool, out, depth + 1)?;
                }
                Ok(())
            }
            other => Err(ParseError::Malformed(format!(
                "bad annotation element tag: {other:#04x}"
            ))),
        }
    }

    /// Skip an attribute table we have no interest in
    fn skip_attributes(&self, cursor: &mut Cursor<&[u8]>) -> Result<(), ParseError> {
        let count = cursor.read_u16::<BigEndian>()?;
        for _ in 0..count {
            let _name_index = cursor.read_u16::<BigEndian>()?;
            let len = cursor.read_u32::<BigEndian>()? as u64;
            skip(cursor, len)?;
        }
        Ok(())
    }
}

/// Advance past `n` bytes, bounds-checked
fn skip(cursor: &mut Cursor<&[u8]>, n: u64) -> Result<(), ParseError> {
    let end = attribute_end(cursor, n)?;
    cursor.set_position(end);
    Ok(())
}

/// End position of a length-prefixed region starting at the cursor
fn attribute_end(cursor: &Cursor<&[u8]>, len: u64) -> Result<u64, ParseError> {
    let end = cursor
        .position()
        .checked_add(len)
        .ok_or_else(|| ParseError::Malformed("length overflow".into()))?;
    if end > cursor.get_ref().len() as u64 {
        return Err(ParseError::Malformed("data truncated".into()));
    }
    Ok(end)
}

fn align4(offset: usize) -> usize {
    offset + (4 - (offset % 4)) % 4
}

fn read_u16_at(code: &[u8], at: usize) -> Result<u16, ParseError> {
    code.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| ParseError::Malformed("bytecode truncated".into()))
}

fn read_i32_at(code: &[u8], at: usize) -> Result<i32, ParseError> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| ParseError::Malformed("bytecode truncated".into()))
}

fn utf8_at(pool: &[CpEntry], index: u16) -> Result<&str, ParseError> {
    match pool.get(index as usize) {
        Some(CpEntry::Utf8(text)) => Ok(text),
        _ => Err(ParseError::BadConstantIndex(index)),
    }
}

fn class_name_at(pool: &[CpEntry], index: u16) -> Result<String, ParseError> {
    match pool.get(index as usize) {
        Some(CpEntry::Class { name_index }) => utf8_at(pool, *name_index).map(str::to_string),
        _ => Err(ParseError::BadConstantIndex(index)),
    }
}

/// Resolve a Fieldref/Methodref/InterfaceMethodref to (owner, name, descriptor)
fn member_at(pool: &[CpEntry], index: u16) -> Result<(String, String, String), ParseError> {
    let (class_index, nat_index) = match pool.get(index as usize) {
        Some(CpEntry::MemberRef {
            class_index,
            name_and_type_index,
        }) => (*class_index, *name_and_type_index),
        _ => return Err(ParseError::BadConstantIndex(index)),
    };
    let owner = class_name_at(pool, class_index)?;
    let (name_index, descriptor_index) = match pool.get(nat_index as usize) {
        Some(CpEntry::NameAndType {
            name_index,
            descriptor_index,
        }) => (*name_index, *descriptor_index),
        _ => return Err(ParseError::BadConstantIndex(nat_index)),
    };
    let name = utf8_at(pool, name_index)?.to_string();
    let descriptor = utf8_at(pool, descriptor_index)?.to_string();
    Ok((owner, name, descriptor))
}
