//! Class analysis
//!
//! Walks one parsed class file and reduces it to the [`ClassInfo`] surface:
//! declared members, class-scope annotations, references to non-platform
//! types, and per-method opcode token streams summarized as histograms and
//! 3-gram pattern hashes.

use crate::classfile::{ClassFileParser, Instruction, RawClass, RawMethod};
use crate::error::ParseError;
use crate::hash::feature_hash;
use crate::opcodes::{self, op};
use crate::types::{ClassInfo, FieldInfo, InstructionHistogram, MethodInfo, TokenMode};
use std::collections::BTreeSet;

/// Namespace prefixes considered part of the runtime platform
///
/// References into these namespaces are never reported as external.
pub const DEFAULT_PLATFORM_PREFIXES: &[&str] = &["java/", "javax/", "kotlin/"];

/// Longest token sequence the getter/setter filter applies to
const BOILERPLATE_MAX_LEN: usize = 5;

/// Analyzes class files into [`ClassInfo`] records
pub struct ClassAnalyzer {
    mode: TokenMode,
    platform_prefixes: Vec<String>,
}

impl ClassAnalyzer {
    /// Create an analyzer with the default platform allowlist
    pub fn new(mode: TokenMode) -> Self {
        Self::with_platform_prefixes(
            mode,
            DEFAULT_PLATFORM_PREFIXES.iter().map(|p| p.to_string()).collect(),
        )
    }

    /// Create an analyzer with a custom platform allowlist
    pub fn with_platform_prefixes(mode: TokenMode, platform_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            platform_prefixes,
        }
    }

    /// The tokenization mode this analyzer was constructed with
    pub fn mode(&self) -> TokenMode {
        self.mode
    }

    /// Analyze one class file
    pub fn analyze(&self, data: &[u8]) -> Result<ClassInfo, ParseError> {
        let raw = ClassFileParser::new().parse(data)?;
        Ok(self.analyze_raw(raw))
    }

    fn analyze_raw(&self, raw: RawClass) -> ClassInfo {
        let mut external_references = BTreeSet::new();

        for descriptor in &raw.annotations {
            self.collect_descriptor_types(descriptor, &mut external_references);
        }

        let fields: Vec<FieldInfo> = raw
            .fields
            .into_iter()
            .map(|f| {
                self.collect_descriptor_types(&f.descriptor, &mut external_references);
                FieldInfo {
                    name: f.name,
                    descriptor: f.descriptor,
                    access_flags: f.access_flags,
                }
            })
            .collect();

        let methods: Vec<MethodInfo> = raw
            .methods
            .iter()
            .map(|m| {
                self.collect_descriptor_types(&m.descriptor, &mut external_references);
                self.scan_method(m, &mut external_references)
            })
            .collect();

        ClassInfo {
            class_name: raw.class_name,
            super_name: raw.super_name,
            interfaces: raw.interfaces,
            methods,
            fields,
            annotations: raw.annotations,
            external_references,
        }
    }

    /// Walk one method body, emitting tokens and external references
    fn scan_method(&self, method: &RawMethod, refs: &mut BTreeSet<String>) -> MethodInfo {
        let body = match &method.body {
            Some(body) => body,
            None => {
                return MethodInfo {
                    name: method.name.clone(),
                    descriptor: method.descriptor.clone(),
                    access_flags: method.access_flags,
                    instruction_pattern: None,
                    instruction_histogram: None,
                }
            }
        };

        let mut scan = MethodScan {
            analyzer: self,
            tokens: Vec::with_capacity(body.len()),
            refs,
        };
        for instruction in body {
            scan.visit(instruction);
        }
        let tokens = scan.tokens;

        MethodInfo {
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            access_flags: method.access_flags,
            instruction_pattern: Some(self.pattern(&tokens)),
            instruction_histogram: Some(histogram(&tokens)),
        }
    }

    /// Token for one opcode under the configured mode
    fn token(&self, opcode: u8) -> String {
        match self.mode {
            TokenMode::Exact => opcode.to_string(),
            TokenMode::Fuzzy => opcodes::category(opcode).label().to_string(),
        }
    }

    /// Pattern hash over a method's token sequence
    ///
    /// Degenerate sequences collapse to distinct markers so that empty,
    /// trivial and accessor-only methods never share a pattern with real
    /// logic.
    fn pattern(&self, tokens: &[String]) -> String {
        if tokens.is_empty() {
            return feature_hash("EMPTY_METHOD");
        }
        if tokens.len() < 3 {
            return feature_hash(&format!("TRIVIAL_METHOD:{}", tokens.join("-")));
        }
        let filtered = self.filter_boilerplate(tokens);
        if filtered.len() < 3 {
            return feature_hash(&format!("BOILERPLATE_ONLY:{}", tokens.len()));
        }
        let grams: Vec<String> = filtered.windows(3).map(|w| w.join(",")).collect();
        feature_hash(&grams.join(";"))
    }

    /// Drop short getter/setter shapes so accessors cannot dominate the
    /// behavioral dimension
    fn filter_boilerplate<'t>(&self, tokens: &'t [String]) -> &'t [String] {
        if tokens.len() <= BOILERPLATE_MAX_LEN && self.is_accessor(tokens) {
            &[]
        } else {
            tokens
        }
    }

    fn is_accessor(&self, tokens: &[String]) -> bool {
        match self.mode {
            TokenMode::Fuzzy => {
                let has = |label: &str| tokens.iter().any(|t| t == label);
                has("LOAD") && has("FIELD") && has("RETURN")
            }
            TokenMode::Exact => {
                let has_op = |o: u8| {
                    let token = o.to_string();
                    tokens.iter().any(|t| *t == token)
                };
                let getter = has_op(op::ALOAD_0)
                    && has_op(op::GETFIELD)
                    && (op::IRETURN..=op::ARETURN).any(has_op);
                let setter =
                    has_op(op::ALOAD_0) && has_op(op::PUTFIELD) && has_op(op::RETURN);
                getter || setter
            }
        }
    }

    /// Record every external object type embedded in a descriptor
    fn collect_descriptor_types(&self, descriptor: &str, refs: &mut BTreeSet<String>) {
        for type_name in object_types(descriptor) {
            if self.is_external(type_name) {
                refs.insert(type_name.to_string());
            }
        }
    }

    /// A type is external iff it sits outside every platform namespace
    fn is_external(&self, internal_name: &str) -> bool {
        !self
            .platform_prefixes
            .iter()
            .any(|prefix| internal_name.starts_with(prefix.as_str()))
    }
}

/// Per-method scratch state; finalized into a [`MethodInfo`] by the caller
struct MethodScan<'a> {
    analyzer: &'a ClassAnalyzer,
    tokens: Vec<String>,
    refs: &'a mut BTreeSet<String>,
}

impl MethodScan<'_> {
    fn visit(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::MethodCall {
                opcode,
                owner,
                name,
                descriptor,
            } => {
                self.token(*opcode);
                if self.owner_is_external(owner) {
                    self.refs.insert(format!("{owner}.{name}{descriptor}"));
                }
                for type_name in object_types(descriptor) {
                    if self.analyzer.is_external(type_name) {
                        self.refs.insert(type_name.to_string());
                    }
                }
            }
            Instruction::FieldAccess {
                opcode, owner, name, ..
            } => {
                self.token(*opcode);
                if self.owner_is_external(owner) {
                    self.refs.insert(format!("{owner}.{name}"));
                }
            }
            Instruction::TypeRef { opcode, type_name } => {
                self.token(*opcode);
                if let Some(element) = element_type(type_name) {
                    if self.analyzer.is_external(element) {
                        self.refs.insert(element.to_string());
                    }
                }
            }
            Instruction::Plain { opcode } => self.token(*opcode),
        }
    }

    fn token(&mut self, opcode: u8) {
        self.tokens.push(self.analyzer.token(opcode));
    }

    fn owner_is_external(&self, owner: &str) -> bool {
        element_type(owner).is_some_and(|e| self.analyzer.is_external(e))
    }
}

/// Token histogram keyed by hashed token
///
/// A bodied method with zero instructions maps to an explicit marker entry
/// rather than an empty map.
fn histogram(tokens: &[String]) -> InstructionHistogram {
    let mut hist = InstructionHistogram::new();
    if tokens.is_empty() {
        hist.insert(feature_hash("<empty>"), 1);
        return hist;
    }
    for token in tokens {
        *hist.entry(feature_hash(token)).or_insert(0) += 1;
    }
    hist
}

/// Internal names of object types embedded in a field, method or annotation
/// descriptor
fn object_types(descriptor: &str) -> Vec<&str> {
    let mut types = Vec::new();
    let bytes = descriptor.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'L' {
            if let Some(end) = descriptor[i + 1..].find(';') {
                types.push(&descriptor[i + 1..i + 1 + end]);
                i += end + 2;
                continue;
            }
        }
        i += 1;
    }
    types
}

/// Underlying object type of a possibly array-wrapped type reference
///
/// `None` for primitive arrays, which can never be external.
fn element_type(type_name: &str) -> Option<&str> {
    let stripped = type_name.trim_start_matches('[');
    if stripped.starts_with('L') && stripped.ends_with(';') {
        Some(&stripped[1..stripped.len() - 1])
    } else if stripped.len() == type_name.len() {
        Some(stripped)
    } else {
        None
    }
}
