use std::sync::Arc;

use crate::{
    attributes::{Attributes, CodeAttribute, ExceptionEntry, LineNumber},
    error::ParseResult,
    flags::{ClassFileAccessFlags, FieldAccessFlags, MethodAccessFlags},
    pool::{ConstantClass, ConstantPool},
};

/// One decoded class, before any of its symbolic references are linked.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub constant_pool: ConstantPool,
    pub meta_data: MetaData,

    pub access_flags: ClassFileAccessFlags,
    pub this_class: u16,
    pub name: Arc<str>,
    pub super_class: Option<u16>,
    pub super_name: Option<Arc<str>>,

    pub interfaces: Interfaces,
    pub fields: Fields,
    pub methods: Methods,
    pub attributes: Attributes,
}

impl ClassFile {
    pub fn source_file(&self) -> Option<&str> {
        self.attributes
            .source_file()
            .map(|attribute| attribute.name.as_ref())
    }

    pub fn is_deprecated(&self) -> bool {
        self.attributes.is_deprecated()
    }

    pub fn signature(&self) -> Option<&str> {
        self.attributes
            .signature()
            .map(|attribute| attribute.signature.as_ref())
    }

    /// Interface names are kept as raw indices until something asks for them.
    pub fn interface_names(&self) -> ParseResult<Vec<Arc<str>>> {
        self.interfaces
            .iter()
            .enumerate()
            .map(|(position, index)| {
                let class: &ConstantClass = self
                    .constant_pool
                    .require(index, || format!("interface #{}", position))?;

                Ok(Arc::clone(&class.name))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaData {
    pub minor_version: u16,
    pub major_version: u16,
}

#[derive(Debug, Clone)]
pub struct Field {
    /// Name of the class that declares this field.
    pub class: Arc<str>,
    pub flags: FieldAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub attributes: Attributes,
}

impl Field {
    pub fn is_deprecated(&self) -> bool {
        self.attributes.is_deprecated()
    }

    pub fn signature(&self) -> Option<&str> {
        self.attributes
            .signature()
            .map(|attribute| attribute.signature.as_ref())
    }

    /// Pool index of the field's `ConstantValue`, if it has one.
    pub fn constant_value(&self) -> Option<u16> {
        self.attributes
            .constant_value()
            .map(|attribute| attribute.index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Fields {
    pub(crate) values: Vec<Field>,
}

impl Fields {
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.values.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Field> {
        self.values.iter().find(|field| field.name.as_ref() == name)
    }
}

/// A method with its name and descriptor copied out of the pool, and its
/// `Code` attribute lifted out of the attribute list.
#[derive(Debug, Clone)]
pub struct Method {
    pub flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub code: Option<CodeAttribute>,
    pub attributes: Attributes,
}

impl Method {
    pub fn is_deprecated(&self) -> bool {
        self.attributes.is_deprecated()
    }

    pub fn signature(&self) -> Option<&str> {
        self.attributes
            .signature()
            .map(|attribute| attribute.signature.as_ref())
    }

    /// Empty for abstract and native methods.
    pub fn code(&self) -> &[u8] {
        self.code.as_ref().map(|code| &code.code[..]).unwrap_or(&[])
    }

    pub fn max_stack(&self) -> u16 {
        self.code.as_ref().map(|code| code.max_stack).unwrap_or(0)
    }

    pub fn max_locals(&self) -> u16 {
        self.code.as_ref().map(|code| code.max_locals).unwrap_or(0)
    }

    pub fn exception_table(&self) -> &[ExceptionEntry] {
        self.code
            .as_ref()
            .map(|code| &code.exception_table[..])
            .unwrap_or(&[])
    }

    pub fn line_numbers(&self) -> &[LineNumber] {
        self.code
            .as_ref()
            .map(|code| &code.line_numbers[..])
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Methods {
    pub(crate) values: Vec<Method>,
}

impl Methods {
    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Method> {
        self.values.get(index)
    }

    /// First method with this name, in declaration order.
    pub fn find(&self, name: &str) -> Option<&Method> {
        self.values.iter().find(|method| method.name == name)
    }

    pub fn locate(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.values
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn position(&self, name: &str, descriptor: Option<&str>) -> Option<usize> {
        self.values.iter().position(|method| {
            method.name == name && descriptor.map_or(true, |d| method.descriptor == d)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interfaces {
    pub(crate) values: Vec<u16>,
}

impl Interfaces {
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
