#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::Level;
use tracing_subscriber::fmt;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_INTERFACE: u16 = 0x0200;

/// Assembles classfile bytes by hand so tests can describe exactly the
/// layout they need, including broken ones.
pub struct ClassBuilder {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,

    pool: Vec<u8>,
    next_index: u16,
    utf8s: HashMap<String, u16>,

    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
    trailing: Vec<u8>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            magic: 0xCAFEBABE,
            minor_version: 0,
            major_version: 52,
            access_flags: ACC_PUBLIC,
            pool: vec![],
            next_index: 1,
            utf8s: HashMap::new(),
            this_class: 0,
            super_class: 0,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
            trailing: vec![],
        };

        builder.this_class = builder.class(name);
        builder
    }

    /// The index the next constant will be given.
    pub fn next_index(&self) -> u16 {
        self.next_index
    }

    /// Append an already encoded constant, tag byte included.
    pub fn raw_constant(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.pool.extend_from_slice(bytes);
        self.next_index += slots;
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8s.get(value) {
            return *index;
        }

        let index = self.raw_utf8(value.as_bytes());
        self.utf8s.insert(value.to_string(), index);
        index
    }

    pub fn raw_utf8(&mut self, bytes: &[u8]) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        entry.extend_from_slice(bytes);
        self.raw_constant(&entry, 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.raw_constant(&entry, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.raw_constant(&entry, 2)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.raw_constant(&[7, (name >> 8) as u8, name as u8], 1)
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let value = self.utf8(value);
        self.raw_constant(&[8, (value >> 8) as u8, value as u8], 1)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);

        let mut entry = vec![12];
        entry.extend_from_slice(&name.to_be_bytes());
        entry.extend_from_slice(&descriptor.to_be_bytes());
        self.raw_constant(&entry, 1)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(class);
        let name_and_type = self.name_and_type(name, descriptor);

        let mut entry = vec![10];
        entry.extend_from_slice(&class.to_be_bytes());
        entry.extend_from_slice(&name_and_type.to_be_bytes());
        self.raw_constant(&entry, 1)
    }

    pub fn extends(&mut self, name: &str) -> &mut Self {
        self.super_class = self.class(name);
        self
    }

    pub fn implements(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    /// Encode an attribute with the given body. The declared length is the body length.
    pub fn attribute(&mut self, name: &str, body: &[u8]) -> Vec<u8> {
        self.attribute_with_length(name, body, body.len() as u32)
    }

    pub fn attribute_with_length(&mut self, name: &str, body: &[u8], length: u32) -> Vec<u8> {
        let name = self.utf8(name);

        let mut out = vec![];
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    pub fn line_number_table(&mut self, lines: &[(u16, u16)]) -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(&(lines.len() as u16).to_be_bytes());
        for (start_pc, line_number) in lines {
            body.extend_from_slice(&start_pc.to_be_bytes());
            body.extend_from_slice(&line_number.to_be_bytes());
        }

        self.attribute("LineNumberTable", &body)
    }

    /// The body of a `Code` attribute. `exceptions` are
    /// `[start_pc, end_pc, handler_pc, catch_type]`.
    pub fn code_body(
        &mut self,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        exceptions: &[[u16; 4]],
        attributes: &[Vec<u8>],
    ) -> Vec<u8> {
        let mut body = vec![];
        body.extend_from_slice(&max_stack.to_be_bytes());
        body.extend_from_slice(&max_locals.to_be_bytes());
        body.extend_from_slice(&(code.len() as u32).to_be_bytes());
        body.extend_from_slice(code);

        body.extend_from_slice(&(exceptions.len() as u16).to_be_bytes());
        for entry in exceptions {
            for value in entry {
                body.extend_from_slice(&value.to_be_bytes());
            }
        }

        body.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            body.extend_from_slice(attribute);
        }

        body
    }

    pub fn code(
        &mut self,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        exceptions: &[[u16; 4]],
        attributes: &[Vec<u8>],
    ) -> Vec<u8> {
        let body = self.code_body(max_stack, max_locals, code, exceptions, attributes);
        self.attribute("Code", &body)
    }

    pub fn field(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) -> &mut Self {
        let member = self.member(flags, name, descriptor, attributes);
        self.fields.push(member);
        self
    }

    pub fn method(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) -> &mut Self {
        let member = self.member(flags, name, descriptor, attributes);
        self.methods.push(member);
        self
    }

    fn member(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) -> Vec<u8> {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);

        let mut out = vec![];
        out.extend_from_slice(&flags.to_be_bytes());
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&descriptor.to_be_bytes());
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            out.extend_from_slice(attribute);
        }

        out
    }

    pub fn class_attribute(&mut self, attribute: Vec<u8>) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn trailing(&mut self, bytes: &[u8]) -> &mut Self {
        self.trailing.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![];
        out.extend_from_slice(&self.magic.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());

        out.extend_from_slice(&self.next_index.to_be_bytes());
        out.extend_from_slice(&self.pool);

        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());

        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        for members in [&self.fields, &self.methods, &self.attributes] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                out.extend_from_slice(member);
            }
        }

        out.extend_from_slice(&self.trailing);
        out
    }
}

/// Write `bytes` to `<root>/<name>.class`, creating package directories.
pub fn write_class(root: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(format!("{}.class", name));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("package directories to be created");
    }

    fs::write(&path, bytes).expect("classfile to be written");
    path
}

pub fn init_tracing() {
    let format = fmt::format()
        .with_ansi(true)
        .without_time()
        .with_level(true)
        .with_target(false)
        .with_thread_names(false)
        .with_source_location(true)
        .compact();

    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .event_format(format)
        .with_test_writer()
        .try_init();
}
