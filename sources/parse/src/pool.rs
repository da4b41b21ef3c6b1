//! The constant pool and its two-phase builder.
//!
//! Entries may refer to slots that appear later in the byte stream, so the
//! pool is decoded in two passes. The scan pass materializes the self-contained
//! entries (`Utf8`, `Integer`, `Long`) and records every entry whose payload is
//! made of other indices. The resolve pass then fills those in, in dependency
//! order: `String` and `NameAndType`, then `Class`, then the member refs.

use std::sync::Arc;

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use support::bytes_ext::SafeBuf;
use support::encoding::mutf8;
use tracing::{debug, trace};

use crate::error::{ParseError, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantTag {
    Utf8,
    Integer,
    Float,
    Long,
    Double,
    Class,
    String,
    Field,
    Method,
    InterfaceMethod,
    NameAndType,
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
    Module,
    Package,
}

impl ConstantTag {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => ConstantTag::Utf8,
            3 => ConstantTag::Integer,
            4 => ConstantTag::Float,
            5 => ConstantTag::Long,
            6 => ConstantTag::Double,
            7 => ConstantTag::Class,
            8 => ConstantTag::String,
            9 => ConstantTag::Field,
            10 => ConstantTag::Method,
            11 => ConstantTag::InterfaceMethod,
            12 => ConstantTag::NameAndType,
            15 => ConstantTag::MethodHandle,
            16 => ConstantTag::MethodType,
            17 => ConstantTag::Dynamic,
            18 => ConstantTag::InvokeDynamic,
            19 => ConstantTag::Module,
            20 => ConstantTag::Package,
            _ => return None,
        })
    }

    pub fn byte(&self) -> u8 {
        match self {
            ConstantTag::Utf8 => 1,
            ConstantTag::Integer => 3,
            ConstantTag::Float => 4,
            ConstantTag::Long => 5,
            ConstantTag::Double => 6,
            ConstantTag::Class => 7,
            ConstantTag::String => 8,
            ConstantTag::Field => 9,
            ConstantTag::Method => 10,
            ConstantTag::InterfaceMethod => 11,
            ConstantTag::NameAndType => 12,
            ConstantTag::MethodHandle => 15,
            ConstantTag::MethodType => 16,
            ConstantTag::Dynamic => 17,
            ConstantTag::InvokeDynamic => 18,
            ConstantTag::Module => 19,
            ConstantTag::Package => 20,
        }
    }

    /// How many pool indices an entry with this tag occupies.
    pub fn slots(&self) -> u32 {
        match self {
            ConstantTag::Long | ConstantTag::Double => 2,
            _ => 1,
        }
    }

    /// Payload size of the kinds we consume without materializing.
    fn unsupported_payload(&self) -> Option<usize> {
        match self {
            ConstantTag::Float => Some(4),
            ConstantTag::Double => Some(8),
            ConstantTag::MethodHandle => Some(3),
            ConstantTag::MethodType => Some(2),
            ConstantTag::Dynamic => Some(4),
            ConstantTag::InvokeDynamic => Some(4),
            ConstantTag::Module => Some(2),
            ConstantTag::Package => Some(2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantUtf8 {
    pub bytes: Vec<u8>,
    pub value: Arc<str>,
}

impl ConstantUtf8 {
    pub fn new(bytes: Vec<u8>) -> Self {
        let value = Arc::from(mutf8::decode_lossy(&bytes));
        Self { bytes, value }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantInteger {
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantLong {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantString {
    pub string_index: u16,
    pub value: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantClass {
    pub name_index: u16,
    pub name: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantNameAndType {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

impl MemberKind {
    pub fn tag(&self) -> ConstantTag {
        match self {
            MemberKind::Field => ConstantTag::Field,
            MemberKind::Method => ConstantTag::Method,
            MemberKind::InterfaceMethod => ConstantTag::InterfaceMethod,
        }
    }
}

/// A `Fieldref`, `Methodref` or `InterfaceMethodref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantMember {
    pub kind: MemberKind,
    pub class_index: u16,
    pub name_and_type_index: u16,
    pub class_name: Arc<str>,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

/// A kind whose payload we consume but do not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantUnsupported {
    pub tag: ConstantTag,
    pub payload: Vec<u8>,
}

#[derive(EnumAsInner, Debug, Clone, PartialEq, Eq)]
pub enum ConstantEntry {
    Utf8(ConstantUtf8),
    Integer(ConstantInteger),
    Long(ConstantLong),
    String(ConstantString),
    Class(ConstantClass),
    NameAndType(ConstantNameAndType),
    Member(ConstantMember),
    Unsupported(ConstantUnsupported),
}

impl ConstantEntry {
    pub fn tag(&self) -> ConstantTag {
        match self {
            ConstantEntry::Utf8(_) => ConstantTag::Utf8,
            ConstantEntry::Integer(_) => ConstantTag::Integer,
            ConstantEntry::Long(_) => ConstantTag::Long,
            ConstantEntry::String(_) => ConstantTag::String,
            ConstantEntry::Class(_) => ConstantTag::Class,
            ConstantEntry::NameAndType(_) => ConstantTag::NameAndType,
            ConstantEntry::Member(data) => data.kind.tag(),
            ConstantEntry::Unsupported(data) => data.tag,
        }
    }
}

/// Typed access into the pool. Lookups never panic; a mismatch is `None`.
pub trait PoolEntry {
    const KIND: &'static str;

    fn from_entry(entry: &ConstantEntry) -> Option<&Self>;
}

macro_rules! pool_entry {
    ($type: ty, $accessor: ident, $kind: literal) => {
        impl PoolEntry for $type {
            const KIND: &'static str = $kind;

            fn from_entry(entry: &ConstantEntry) -> Option<&Self> {
                entry.$accessor()
            }
        }
    };
}

pool_entry!(ConstantUtf8, as_utf8, "Utf8");
pool_entry!(ConstantInteger, as_integer, "Integer");
pool_entry!(ConstantLong, as_long, "Long");
pool_entry!(ConstantString, as_string, "String");
pool_entry!(ConstantClass, as_class, "Class");
pool_entry!(ConstantNameAndType, as_name_and_type, "NameAndType");
pool_entry!(ConstantMember, as_member, "member ref");
pool_entry!(ConstantUnsupported, as_unsupported, "unsupported constant");

/// A fixed size table of constants, indexed from 1.
///
/// Index 0 and the slot following a `Long` or `Double` are never populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Option<ConstantEntry>>,
}

impl ConstantPool {
    /// The declared pool count, which is one more than the highest usable index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    pub fn entry(&self, index: u16) -> Option<&ConstantEntry> {
        self.entries.get(index as usize)?.as_ref()
    }

    pub fn get<T: PoolEntry>(&self, index: u16) -> Option<&T> {
        self.entry(index).and_then(T::from_entry)
    }

    /// Like [`ConstantPool::get`], but reports a miss as a dangling reference
    /// made by `referrer`.
    pub fn require<T: PoolEntry>(
        &self,
        index: u16,
        referrer: impl FnOnce() -> String,
    ) -> ParseResult<&T> {
        lookup(&self.entries, index, referrer)
    }

    pub fn is_unsupported(&self, index: u16) -> bool {
        self.get::<ConstantUnsupported>(index).is_some()
    }

    pub fn utf8_str(&self, index: u16) -> Option<&str> {
        self.get::<ConstantUtf8>(index).map(ConstantUtf8::as_str)
    }

    pub fn class_name(&self, index: u16) -> Option<&str> {
        self.get::<ConstantClass>(index).map(|class| class.name.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| Some((index as u16, entry.as_ref()?)))
    }

    /// Decode `count - 1` slots from `bytes`, which must be positioned just
    /// after the pool count.
    pub fn parse(bytes: &mut Bytes, count: u16) -> ParseResult<Self> {
        let mut builder = PoolBuilder::new(count);
        builder.scan(bytes)?;
        builder.resolve()
    }
}

fn lookup<T: PoolEntry>(
    entries: &[Option<ConstantEntry>],
    index: u16,
    referrer: impl FnOnce() -> String,
) -> ParseResult<&T> {
    entries
        .get(index as usize)
        .and_then(Option::as_ref)
        .and_then(T::from_entry)
        .ok_or_else(|| ParseError::DanglingConstantReference {
            index,
            expected: T::KIND,
            referrer: referrer(),
        })
}

struct DeferredString {
    index: u16,
    string_index: u16,
}

struct DeferredNameAndType {
    index: u16,
    name_index: u16,
    descriptor_index: u16,
}

struct DeferredClass {
    index: u16,
    name_index: u16,
}

struct DeferredMember {
    index: u16,
    kind: MemberKind,
    class_index: u16,
    name_and_type_index: u16,
}

struct PoolBuilder {
    entries: Vec<Option<ConstantEntry>>,
    strings: Vec<DeferredString>,
    names_and_types: Vec<DeferredNameAndType>,
    classes: Vec<DeferredClass>,
    members: Vec<DeferredMember>,
}

impl PoolBuilder {
    fn new(count: u16) -> Self {
        Self {
            entries: vec![None; count.max(1) as usize],
            strings: vec![],
            names_and_types: vec![],
            classes: vec![],
            members: vec![],
        }
    }

    fn scan(&mut self, bytes: &mut Bytes) -> ParseResult<()> {
        let count = self.entries.len() as u32;

        // u32 so that a 64 bit entry in the last slot cannot overflow the index
        let mut i: u32 = 1;
        while i < count {
            let index = i as u16;
            let tag_byte = bytes.try_get_u8()?;
            let tag = ConstantTag::from_tag(tag_byte).ok_or(ParseError::UnsupportedConstantTag {
                tag: tag_byte,
                index,
            })?;

            trace!("const pool entry {} has tag {:?}", index, tag);

            let entry = match tag {
                ConstantTag::Utf8 => {
                    let length = bytes.try_get_u16()?;
                    let data = bytes.try_copy_bytes(length.into())?;
                    Some(ConstantEntry::Utf8(ConstantUtf8::new(data)))
                }
                ConstantTag::Integer => Some(ConstantEntry::Integer(ConstantInteger {
                    value: bytes.try_get_i32()?,
                })),
                ConstantTag::Long => Some(ConstantEntry::Long(ConstantLong {
                    value: bytes.try_get_i64()?,
                })),
                ConstantTag::String => {
                    self.strings.push(DeferredString {
                        index,
                        string_index: bytes.try_get_u16()?,
                    });
                    None
                }
                ConstantTag::NameAndType => {
                    self.names_and_types.push(DeferredNameAndType {
                        index,
                        name_index: bytes.try_get_u16()?,
                        descriptor_index: bytes.try_get_u16()?,
                    });
                    None
                }
                ConstantTag::Class => {
                    self.classes.push(DeferredClass {
                        index,
                        name_index: bytes.try_get_u16()?,
                    });
                    None
                }
                ConstantTag::Field | ConstantTag::Method | ConstantTag::InterfaceMethod => {
                    let kind = match tag {
                        ConstantTag::Field => MemberKind::Field,
                        ConstantTag::Method => MemberKind::Method,
                        _ => MemberKind::InterfaceMethod,
                    };

                    self.members.push(DeferredMember {
                        index,
                        kind,
                        class_index: bytes.try_get_u16()?,
                        name_and_type_index: bytes.try_get_u16()?,
                    });
                    None
                }
                other => {
                    // Every remaining tag has a fixed payload size
                    let size = other.unsupported_payload().unwrap_or_default();
                    Some(ConstantEntry::Unsupported(ConstantUnsupported {
                        tag: other,
                        payload: bytes.try_copy_bytes(size)?,
                    }))
                }
            };

            self.entries[i as usize] = entry;

            // Special case: 64 bit types take up 2 slots, the second of which stays empty
            i += tag.slots();
        }

        debug!(
            "scanned {} pool slots, {} entries deferred",
            count,
            self.strings.len() + self.names_and_types.len() + self.classes.len() + self.members.len()
        );

        Ok(())
    }

    fn resolve(mut self) -> ParseResult<ConstantPool> {
        let referrer = |index: u16| move || format!("constant #{}", index);

        for deferred in self.strings.drain(..) {
            let utf8: &ConstantUtf8 =
                lookup(&self.entries, deferred.string_index, referrer(deferred.index))?;

            let entry = ConstantEntry::String(ConstantString {
                string_index: deferred.string_index,
                value: Arc::clone(&utf8.value),
            });
            self.entries[deferred.index as usize] = Some(entry);
        }

        for deferred in self.names_and_types.drain(..) {
            let name: &ConstantUtf8 =
                lookup(&self.entries, deferred.name_index, referrer(deferred.index))?;
            let descriptor: &ConstantUtf8 =
                lookup(&self.entries, deferred.descriptor_index, referrer(deferred.index))?;

            let entry = ConstantEntry::NameAndType(ConstantNameAndType {
                name_index: deferred.name_index,
                descriptor_index: deferred.descriptor_index,
                name: Arc::clone(&name.value),
                descriptor: Arc::clone(&descriptor.value),
            });
            self.entries[deferred.index as usize] = Some(entry);
        }

        for deferred in self.classes.drain(..) {
            let name: &ConstantUtf8 =
                lookup(&self.entries, deferred.name_index, referrer(deferred.index))?;

            let entry = ConstantEntry::Class(ConstantClass {
                name_index: deferred.name_index,
                name: Arc::clone(&name.value),
            });
            self.entries[deferred.index as usize] = Some(entry);
        }

        for deferred in self.members.drain(..) {
            let class: &ConstantClass =
                lookup(&self.entries, deferred.class_index, referrer(deferred.index))?;
            let name_and_type: &ConstantNameAndType = lookup(
                &self.entries,
                deferred.name_and_type_index,
                referrer(deferred.index),
            )?;

            let entry = ConstantEntry::Member(ConstantMember {
                kind: deferred.kind,
                class_index: deferred.class_index,
                name_and_type_index: deferred.name_and_type_index,
                class_name: Arc::clone(&class.name),
                name: Arc::clone(&name_and_type.name),
                descriptor: Arc::clone(&name_and_type.descriptor),
            });
            self.entries[deferred.index as usize] = Some(entry);
        }

        Ok(ConstantPool {
            entries: self.entries,
        })
    }
}
