use std::sync::Arc;

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use support::bytes_ext::{OutOfBytes, SafeBuf, SafeBytes};
use tracing::{debug, trace};

use crate::constants::attributes::{
    CODE, CONSTANT_VALUE, DEPRECATED, LINE_NUMBER_TABLE, LOCAL_VARIABLE_TABLE,
    LOCAL_VARIABLE_TYPE_TABLE, SIGNATURE, SOURCE_FILE, STACK_MAP_TABLE,
};
use crate::error::{ParseError, ParseResult};
use crate::pool::{ConstantPool, ConstantUtf8};

/// Where an attribute block appears. The same name means different things
/// (or nothing at all) depending on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeContext {
    Class,
    Field,
    Method,
    Code,
}

pub trait KnownAttribute
where
    Self: Sized,
{
    fn decode(bytes: &mut Bytes, constant_pool: &ConstantPool) -> ParseResult<Self>;
    fn id() -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileAttribute {
    pub index: u16,
    pub name: Arc<str>,
}

impl KnownAttribute for SourceFileAttribute {
    fn decode(bytes: &mut Bytes, constant_pool: &ConstantPool) -> ParseResult<Self> {
        let index = bytes.try_get_u16()?;
        let name: &ConstantUtf8 = constant_pool.require(index, || SOURCE_FILE.to_string())?;

        Ok(Self {
            index,
            name: Arc::clone(&name.value),
        })
    }

    fn id() -> &'static str {
        SOURCE_FILE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeprecatedAttribute;

impl KnownAttribute for DeprecatedAttribute {
    fn decode(_: &mut Bytes, _: &ConstantPool) -> ParseResult<Self> {
        Ok(Self)
    }

    fn id() -> &'static str {
        DEPRECATED
    }
}

/// A generic signature. Recorded verbatim, never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAttribute {
    pub index: u16,
    pub signature: Arc<str>,
}

impl KnownAttribute for SignatureAttribute {
    fn decode(bytes: &mut Bytes, constant_pool: &ConstantPool) -> ParseResult<Self> {
        let index = bytes.try_get_u16()?;
        let signature: &ConstantUtf8 = constant_pool.require(index, || SIGNATURE.to_string())?;

        Ok(Self {
            index,
            signature: Arc::clone(&signature.value),
        })
    }

    fn id() -> &'static str {
        SIGNATURE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantValueAttribute {
    pub index: u16,
}

impl KnownAttribute for ConstantValueAttribute {
    fn decode(bytes: &mut Bytes, constant_pool: &ConstantPool) -> ParseResult<Self> {
        let index = bytes.try_get_u16()?;
        if constant_pool.entry(index).is_none() {
            return Err(ParseError::DanglingConstantReference {
                index,
                expected: "constant value",
                referrer: CONSTANT_VALUE.to_string(),
            });
        }

        Ok(Self { index })
    }

    fn id() -> &'static str {
        CONSTANT_VALUE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Index of a `Class` constant, or 0 to catch everything.
    pub catch_type: u16,
}

impl ExceptionEntry {
    pub fn is_catch_all(&self) -> bool {
        self.catch_type == 0
    }

    /// `start_pc` is inclusive, `end_pc` exclusive.
    pub fn covers(&self, pc: u16) -> bool {
        (self.start_pc..self.end_pc).contains(&pc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberTableAttribute {
    pub entries: Vec<LineNumber>,
}

impl KnownAttribute for LineNumberTableAttribute {
    fn decode(bytes: &mut Bytes, _: &ConstantPool) -> ParseResult<Self> {
        let length = bytes.try_get_u16()?;
        let mut entries = Vec::with_capacity(length.into());

        for _ in 0..length {
            entries.push(LineNumber {
                start_pc: bytes.try_get_u16()?,
                line_number: bytes.try_get_u16()?,
            });
        }

        Ok(Self { entries })
    }

    fn id() -> &'static str {
        LINE_NUMBER_TABLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub line_numbers: Vec<LineNumber>,
    pub attributes: Attributes,
}

impl CodeAttribute {
    /// The source line of the instruction at `pc`, if the code carries line numbers.
    pub fn line_for(&self, pc: u16) -> Option<u16> {
        self.line_numbers
            .iter()
            .filter(|entry| entry.start_pc <= pc)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line_number)
    }
}

impl KnownAttribute for CodeAttribute {
    fn decode(bytes: &mut Bytes, constant_pool: &ConstantPool) -> ParseResult<Self> {
        let max_stack = bytes.try_get_u16()?;
        let max_locals = bytes.try_get_u16()?;

        let code_length = bytes.try_get_u32()?;
        let code = bytes.try_copy_bytes(code_length as usize)?;

        let exception_length = bytes.try_get_u16()?;
        let mut exception_table = Vec::with_capacity(exception_length.into());
        for _ in 0..exception_length {
            exception_table.push(ExceptionEntry {
                start_pc: bytes.try_get_u16()?,
                end_pc: bytes.try_get_u16()?,
                handler_pc: bytes.try_get_u16()?,
                catch_type: bytes.try_get_u16()?,
            })
        }

        let attributes = Attributes::parse(bytes, constant_pool, AttributeContext::Code)?;
        let line_numbers = attributes
            .iter()
            .filter_map(Attribute::as_line_number_table)
            .flat_map(|table| table.entries.iter().copied())
            .collect();

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            line_numbers,
            attributes,
        })
    }

    fn id() -> &'static str {
        CODE
    }
}

/// Recognised, but consumed by length without being interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAttribute {
    pub name: Arc<str>,
    pub length: u32,
}

/// Any attribute we do not recognise in its context. The payload is kept as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttribute {
    pub name: Arc<str>,
    pub data: Bytes,
}

#[derive(EnumAsInner, Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    SourceFile(SourceFileAttribute),
    Deprecated(DeprecatedAttribute),
    Signature(SignatureAttribute),
    ConstantValue(ConstantValueAttribute),
    Code(CodeAttribute),
    LineNumberTable(LineNumberTableAttribute),
    Skipped(SkippedAttribute),
    Unknown(UnknownAttribute),
}

impl Attribute {
    pub fn parse(
        bytes: &mut Bytes,
        constant_pool: &ConstantPool,
        context: AttributeContext,
    ) -> ParseResult<Self> {
        let name_index = bytes.try_get_u16()?;
        let length = bytes.try_get_u32()?;

        let name: &ConstantUtf8 =
            constant_pool.require(name_index, || "attribute name".to_string())?;
        let name = Arc::clone(&name.value);

        let body = bytes.try_split_to(length as usize)?;

        use AttributeContext as Ctx;
        let attribute = match (name.as_ref(), context) {
            (SOURCE_FILE, Ctx::Class) => {
                Attribute::SourceFile(decode_known(&name, body, constant_pool)?)
            }
            (DEPRECATED, Ctx::Class | Ctx::Field | Ctx::Method) => {
                Attribute::Deprecated(decode_known(&name, body, constant_pool)?)
            }
            (SIGNATURE, Ctx::Class | Ctx::Field | Ctx::Method) => {
                Attribute::Signature(decode_known(&name, body, constant_pool)?)
            }
            (CONSTANT_VALUE, Ctx::Field) => {
                Attribute::ConstantValue(decode_known(&name, body, constant_pool)?)
            }
            (CODE, Ctx::Method) => Attribute::Code(decode_known(&name, body, constant_pool)?),
            (LINE_NUMBER_TABLE, Ctx::Code) => {
                Attribute::LineNumberTable(decode_known(&name, body, constant_pool)?)
            }
            (LOCAL_VARIABLE_TABLE | LOCAL_VARIABLE_TYPE_TABLE | STACK_MAP_TABLE, Ctx::Code) => {
                trace!("skipping {} bytes of {}", length, name);
                Attribute::Skipped(SkippedAttribute {
                    name: Arc::clone(&name),
                    length,
                })
            }
            _ => {
                debug!("unhandled {:?} attribute '{}' ({} bytes)", context, name, length);
                Attribute::Unknown(UnknownAttribute {
                    name: Arc::clone(&name),
                    data: body,
                })
            }
        };

        Ok(attribute)
    }
}

/// Decode a recognised attribute from its own sub-buffer, holding it to
/// exactly the declared length.
fn decode_known<T: KnownAttribute>(
    name: &str,
    mut body: Bytes,
    constant_pool: &ConstantPool,
) -> ParseResult<T> {
    let declared = body.len();

    let value = T::decode(&mut body, constant_pool).map_err(|err| match err {
        ParseError::TruncatedInput(OutOfBytes { wanted, remaining }) => {
            ParseError::MalformedAttribute {
                name: name.to_string(),
                declared,
                consumed: declared - remaining + wanted,
            }
        }
        other => other,
    })?;

    if !body.is_empty() {
        return Err(ParseError::MalformedAttribute {
            name: name.to_string(),
            declared,
            consumed: declared - body.len(),
        });
    }

    Ok(value)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub values: Vec<Attribute>,
}

impl Attributes {
    pub fn parse(
        bytes: &mut Bytes,
        constant_pool: &ConstantPool,
        context: AttributeContext,
    ) -> ParseResult<Self> {
        let length = bytes.try_get_u16()?;
        let mut attributes = Attributes {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            attributes
                .values
                .push(Attribute::parse(bytes, constant_pool, context)?);
        }

        Ok(attributes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_deprecated(&self) -> bool {
        self.iter()
            .any(|attribute| matches!(attribute, Attribute::Deprecated(_)))
    }

    pub fn signature(&self) -> Option<&SignatureAttribute> {
        self.iter().find_map(Attribute::as_signature)
    }

    pub fn source_file(&self) -> Option<&SourceFileAttribute> {
        self.iter().find_map(Attribute::as_source_file)
    }

    pub fn constant_value(&self) -> Option<&ConstantValueAttribute> {
        self.iter().find_map(Attribute::as_constant_value)
    }

    pub fn unknown(&self) -> impl Iterator<Item = &UnknownAttribute> {
        self.iter().filter_map(Attribute::as_unknown)
    }

    /// Remove and return the first `Code` attribute.
    pub fn take_code(&mut self) -> Option<CodeAttribute> {
        let position = self
            .values
            .iter()
            .position(|attribute| matches!(attribute, Attribute::Code(_)))?;

        match self.values.remove(position) {
            Attribute::Code(code) => Some(code),
            _ => None,
        }
    }
}
