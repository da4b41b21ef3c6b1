use std::sync::Arc;

use bytes::Bytes;
use support::bytes_ext::SafeBuf;
use tracing::debug;

use crate::attributes::{AttributeContext, Attributes};
use crate::classfile::{ClassFile, Field, Fields, Interfaces, MetaData, Method, Methods};
use crate::constants::MAGIC;
use crate::error::{ParseError, ParseResult};
use crate::flags::{ClassFileAccessFlags, FieldAccessFlags, MethodAccessFlags};
use crate::pool::{ConstantClass, ConstantPool, ConstantUtf8};

pub struct Parser {
    bytes: Bytes,
}

impl Parser {
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(data),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    fn parse_constant_pool(&mut self) -> ParseResult<ConstantPool> {
        let count = self.bytes.try_get_u16()?;
        debug!("const pool has {count} entries listed");

        let pool = ConstantPool::parse(&mut self.bytes, count)?;
        debug!("successfully parsed constant pool");

        Ok(pool)
    }

    fn parse_interfaces(&mut self) -> ParseResult<Interfaces> {
        let length = self.bytes.try_get_u16()?;
        let mut interfaces = Interfaces {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            interfaces.values.push(self.bytes.try_get_u16()?);
        }

        Ok(interfaces)
    }

    fn parse_fields(&mut self, class: &Arc<str>, pool: &ConstantPool) -> ParseResult<Fields> {
        let length = self.bytes.try_get_u16()?;
        let mut fields = Fields {
            values: Vec::with_capacity(length.into()),
        };

        for position in 0..length {
            let flags = FieldAccessFlags::from_bits(self.bytes.try_get_u16()?);
            let name_index = self.bytes.try_get_u16()?;
            let descriptor_index = self.bytes.try_get_u16()?;

            let name: &ConstantUtf8 =
                pool.require(name_index, || format!("name of field #{}", position))?;
            let descriptor: &ConstantUtf8 = pool
                .require(descriptor_index, || format!("descriptor of field #{}", position))?;

            fields.values.push(Field {
                class: Arc::clone(class),
                flags,
                name_index,
                descriptor_index,
                name: Arc::clone(&name.value),
                descriptor: Arc::clone(&descriptor.value),
                attributes: Attributes::parse(&mut self.bytes, pool, AttributeContext::Field)?,
            });
        }

        Ok(fields)
    }

    fn parse_methods(&mut self, pool: &ConstantPool) -> ParseResult<Methods> {
        let length = self.bytes.try_get_u16()?;
        let mut methods = Methods {
            values: Vec::with_capacity(length.into()),
        };

        for position in 0..length {
            let flags = MethodAccessFlags::from_bits(self.bytes.try_get_u16()?);
            let name = pool
                .require::<ConstantUtf8>(self.bytes.try_get_u16()?, || {
                    format!("name of method #{}", position)
                })?
                .as_str()
                .to_string();
            let descriptor = pool
                .require::<ConstantUtf8>(self.bytes.try_get_u16()?, || {
                    format!("descriptor of method #{}", position)
                })?
                .as_str()
                .to_string();

            let mut attributes =
                Attributes::parse(&mut self.bytes, pool, AttributeContext::Method)?;
            let code = attributes.take_code();

            methods.values.push(Method {
                flags,
                name,
                descriptor,
                code,
                attributes,
            });
        }

        Ok(methods)
    }

    pub fn parse(&mut self) -> ParseResult<ClassFile> {
        let magic = self.bytes.try_get_u32()?;

        // Format checking: The first four bytes must contain the right magic number
        if magic != MAGIC {
            return Err(ParseError::BadMagic(magic));
        }

        let minor = self.bytes.try_get_u16()?;
        let major = self.bytes.try_get_u16()?;
        debug!("classfile version {major}.{minor}");

        let meta_data = MetaData {
            minor_version: minor,
            major_version: major,
        };

        let constant_pool = self.parse_constant_pool()?;

        let access_flags = ClassFileAccessFlags::from_bits(self.bytes.try_get_u16()?);
        debug!("got access flags {:b}", access_flags.bits());

        let this_class = self.bytes.try_get_u16()?;
        let name = Arc::clone(
            &constant_pool
                .require::<ConstantClass>(this_class, || "this_class".to_string())?
                .name,
        );
        debug!("got this_class {this_class} ({name})");

        // Only the root of the hierarchy has no superclass
        let super_index = self.bytes.try_get_u16()?;
        let (super_class, super_name) = if super_index == 0 {
            (None, None)
        } else {
            let class: &ConstantClass =
                constant_pool.require(super_index, || "super_class".to_string())?;
            (Some(super_index), Some(Arc::clone(&class.name)))
        };

        let interfaces = self.parse_interfaces()?;
        debug!("class has {} interfaces", interfaces.len());

        let fields = self.parse_fields(&name, &constant_pool)?;
        debug!("class has {} fields", fields.len());

        let methods = self.parse_methods(&constant_pool)?;
        debug!("class has {} methods", methods.len());

        let attributes =
            Attributes::parse(&mut self.bytes, &constant_pool, AttributeContext::Class)?;
        debug!("class has {} attributes", attributes.len());

        // Format checking: The class file must not be truncated or have extra bytes at the end
        if !self.bytes.is_empty() {
            return Err(ParseError::TrailingBytes(self.bytes.len()));
        }

        Ok(ClassFile {
            constant_pool,
            meta_data,
            access_flags,
            this_class,
            name,
            super_class,
            super_name,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}
