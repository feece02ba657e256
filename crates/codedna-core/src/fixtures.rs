//! Synthetic class-file construction for tests
//!
//! Emits minimal but structurally valid class files so analyzer and
//! fingerprint tests do not depend on a Java toolchain.

use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolEntry {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
}

#[derive(Default)]
struct ConstPool {
    entries: Vec<PoolEntry>,
    lookup: HashMap<PoolEntry, u16>,
}

impl ConstPool {
    fn intern(&mut self, entry: PoolEntry) -> u16 {
        if let Some(&index) = self.lookup.get(&entry) {
            return index;
        }
        self.entries.push(entry.clone());
        let index = self.entries.len() as u16;
        self.lookup.insert(entry, index);
        index
    }

    fn utf8(&mut self, text: &str) -> u16 {
        self.intern(PoolEntry::Utf8(text.to_string()))
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.intern(PoolEntry::Class(name_index))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.intern(PoolEntry::NameAndType(name_index, descriptor_index))
    }
}

/// Builder for synthetic class-file bytes
pub struct ClassBytes {
    name: String,
    super_name: String,
    interfaces: Vec<String>,
    fields: Vec<(String, String, u16)>,
    methods: Vec<(String, String, u16, Option<Vec<u8>>)>,
    annotations: Vec<String>,
    pool: ConstPool,
}

impl ClassBytes {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            pool: ConstPool::default(),
        }
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str, access_flags: u16) -> Self {
        self.fields
            .push((name.to_string(), descriptor.to_string(), access_flags));
        self
    }

    pub fn method(
        mut self,
        name: &str,
        descriptor: &str,
        access_flags: u16,
        code: Option<Vec<u8>>,
    ) -> Self {
        self.methods
            .push((name.to_string(), descriptor.to_string(), access_flags, code));
        self
    }

    pub fn annotation(mut self, descriptor: &str) -> Self {
        self.annotations.push(descriptor.to_string());
        self
    }

    /// Intern a Fieldref usable as a `getfield`/`putfield` operand
    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.pool.class(owner);
        let nat_index = self.pool.name_and_type(name, descriptor);
        self.pool.intern(PoolEntry::FieldRef(class_index, nat_index))
    }

    /// Intern a Methodref usable as an `invoke*` operand
    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.pool.class(owner);
        let nat_index = self.pool.name_and_type(name, descriptor);
        self.pool
            .intern(PoolEntry::MethodRef(class_index, nat_index))
    }

    /// Intern a bare Class constant usable as a type-instruction operand
    pub fn class_constant(&mut self, name: &str) -> u16 {
        self.pool.class(name)
    }

    /// Serialize to class-file bytes
    pub fn build(self) -> Vec<u8> {
        let ClassBytes {
            name,
            super_name,
            interfaces,
            fields,
            methods,
            annotations,
            mut pool,
        } = self;

        let this_index = pool.class(&name);
        let super_index = pool.class(&super_name);
        let interface_indexes: Vec<u16> = interfaces.iter().map(|i| pool.class(i)).collect();

        let field_entries: Vec<(u16, u16, u16)> = fields
            .iter()
            .map(|(n, d, a)| (*a, pool.utf8(n), pool.utf8(d)))
            .collect();

        let code_attr_index = if methods.iter().any(|(_, _, _, c)| c.is_some()) {
            pool.utf8("Code")
        } else {
            0
        };
        let method_entries: Vec<(u16, u16, u16, Option<Vec<u8>>)> = methods
            .into_iter()
            .map(|(n, d, a, c)| (a, pool.utf8(&n), pool.utf8(&d), c))
            .collect();

        let annotation_indexes: Vec<u16> = annotations.iter().map(|a| pool.utf8(a)).collect();
        let annotations_attr_index = if annotation_indexes.is_empty() {
            0
        } else {
            pool.utf8("RuntimeVisibleAnnotations")
        };

        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0xCAFE_BABE).unwrap();
        out.write_u16::<BigEndian>(0).unwrap(); // minor
        out.write_u16::<BigEndian>(52).unwrap(); // major (Java 8)

        out.write_u16::<BigEndian>(pool.entries.len() as u16 + 1).unwrap();
        for entry in &pool.entries {
            match entry {
                PoolEntry::Utf8(text) => {
                    out.write_u8(1).unwrap();
                    out.write_u16::<BigEndian>(text.len() as u16).unwrap();
                    out.extend_from_slice(text.as_bytes());
                }
                PoolEntry::Class(name_index) => {
                    out.write_u8(7).unwrap();
                    out.write_u16::<BigEndian>(*name_index).unwrap();
                }
                PoolEntry::NameAndType(name_index, descriptor_index) => {
                    out.write_u8(12).unwrap();
                    out.write_u16::<BigEndian>(*name_index).unwrap();
                    out.write_u16::<BigEndian>(*descriptor_index).unwrap();
                }
                PoolEntry::FieldRef(class_index, nat_index) => {
                    out.write_u8(9).unwrap();
                    out.write_u16::<BigEndian>(*class_index).unwrap();
                    out.write_u16::<BigEndian>(*nat_index).unwrap();
                }
                PoolEntry::MethodRef(class_index, nat_index) => {
                    out.write_u8(10).unwrap();
                    out.write_u16::<BigEndian>(*class_index).unwrap();
                    out.write_u16::<BigEndian>(*nat_index).unwrap();
                }
            }
        }

        out.write_u16::<BigEndian>(0x0021).unwrap(); // ACC_PUBLIC | ACC_SUPER
        out.write_u16::<BigEndian>(this_index).unwrap();
        out.write_u16::<BigEndian>(super_index).unwrap();

        out.write_u16::<BigEndian>(interface_indexes.len() as u16).unwrap();
        for index in interface_indexes {
            out.write_u16::<BigEndian>(index).unwrap();
        }

        out.write_u16::<BigEndian>(field_entries.len() as u16).unwrap();
        for (access, name_index, descriptor_index) in field_entries {
            out.write_u16::<BigEndian>(access).unwrap();
            out.write_u16::<BigEndian>(name_index).unwrap();
            out.write_u16::<BigEndian>(descriptor_index).unwrap();
            out.write_u16::<BigEndian>(0).unwrap(); // no attributes
        }

        out.write_u16::<BigEndian>(method_entries.len() as u16).unwrap();
        for (access, name_index, descriptor_index, code) in method_entries {
            out.write_u16::<BigEndian>(access).unwrap();
            out.write_u16::<BigEndian>(name_index).unwrap();
            out.write_u16::<BigEndian>(descriptor_index).unwrap();
            match code {
                Some(code) => {
                    out.write_u16::<BigEndian>(1).unwrap();
                    out.write_u16::<BigEndian>(code_attr_index).unwrap();
                    out.write_u32::<BigEndian>(12 + code.len() as u32).unwrap();
                    out.write_u16::<BigEndian>(8).unwrap(); // max_stack
                    out.write_u16::<BigEndian>(8).unwrap(); // max_locals
                    out.write_u32::<BigEndian>(code.len() as u32).unwrap();
                    out.extend_from_slice(&code);
                    out.write_u16::<BigEndian>(0).unwrap(); // exception table
                    out.write_u16::<BigEndian>(0).unwrap(); // code attributes
                }
                None => out.write_u16::<BigEndian>(0).unwrap(),
            }
        }

        if annotation_indexes.is_empty() {
            out.write_u16::<BigEndian>(0).unwrap();
        } else {
            out.write_u16::<BigEndian>(1).unwrap();
            out.write_u16::<BigEndian>(annotations_attr_index).unwrap();
            out.write_u32::<BigEndian>(2 + 4 * annotation_indexes.len() as u32)
                .unwrap();
            out.write_u16::<BigEndian>(annotation_indexes.len() as u16).unwrap();
            for type_index in annotation_indexes {
                out.write_u16::<BigEndian>(type_index).unwrap();
                out.write_u16::<BigEndian>(0).unwrap(); // no element pairs
            }
        }

        out
    }
}

/// Bytecode for a getter body reading `owner.field` of type `I`
pub fn getter_code(field_ref: u16) -> Vec<u8> {
    let mut code = vec![0x2a, 0xb4]; // aload_0, getfield
    code.extend_from_slice(&field_ref.to_be_bytes());
    code.push(0xac); // ireturn
    code
}

/// Bytecode for a setter body writing `owner.field` of type `I`
pub fn setter_code(field_ref: u16) -> Vec<u8> {
    let mut code = vec![0x2a, 0x1b, 0xb5]; // aload_0, iload_1, putfield
    code.extend_from_slice(&field_ref.to_be_bytes());
    code.push(0xb1); // return
    code
}
