use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use parking_lot::RwLock;
use parse::{
    classfile::{ClassFile, Field, Fields, MetaData, Method, Methods},
    flags::{ClassFileAccessFlag, ClassFileAccessFlags},
    pool::ConstantPool,
};

/// Pointers filled in by the loader once the class is linked.
/// None of them own their target; the loader's cache does.
#[derive(Debug, Default)]
struct Links {
    super_class: Option<Weak<Class>>,
    interfaces: Vec<Weak<Class>>,
    constants: HashMap<u16, Weak<Class>>,
}

/// A defined class. Everything except the resolved pointers is immutable
/// once the loader hands it out.
#[derive(Debug)]
pub struct Class {
    class_file: ClassFile,
    links: RwLock<Links>,
}

impl Class {
    pub(crate) fn new(class_file: ClassFile) -> Self {
        Self {
            class_file,
            links: RwLock::new(Links::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.class_file.name
    }

    pub fn super_name(&self) -> Option<&str> {
        self.class_file.super_name.as_deref()
    }

    pub fn version(&self) -> MetaData {
        self.class_file.meta_data
    }

    pub fn access_flags(&self) -> ClassFileAccessFlags {
        self.class_file.access_flags
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags().has(ClassFileAccessFlag::INTERFACE)
    }

    pub fn class_file(&self) -> &ClassFile {
        &self.class_file
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.class_file.constant_pool
    }

    pub fn methods(&self) -> &Methods {
        &self.class_file.methods
    }

    pub fn fields(&self) -> &Fields {
        &self.class_file.fields
    }

    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.class_file.methods.find(name)
    }

    pub fn find_method_by_descriptor(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.class_file.methods.locate(name, descriptor)
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.class_file.fields.find(name)
    }

    pub fn source_file(&self) -> Option<&str> {
        self.class_file.source_file()
    }

    pub fn is_deprecated(&self) -> bool {
        self.class_file.is_deprecated()
    }

    pub fn signature(&self) -> Option<&str> {
        self.class_file.signature()
    }

    /// The linked superclass. `None` before linking, for the hierarchy root,
    /// and once the superclass has been evicted from its loader.
    pub fn super_class(&self) -> Option<Arc<Class>> {
        self.links
            .read()
            .super_class
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// The linked interfaces, in declaration order. Empty before linking.
    pub fn interfaces(&self) -> Vec<Arc<Class>> {
        self.links
            .read()
            .interfaces
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn resolved_constant(&self, index: u16) -> Option<Arc<Class>> {
        self.links
            .read()
            .constants
            .get(&index)
            .and_then(Weak::upgrade)
    }

    pub(crate) fn set_supertypes(
        &self,
        super_class: Option<&Arc<Class>>,
        interfaces: &[Arc<Class>],
    ) {
        let mut links = self.links.write();
        links.super_class = super_class.map(Arc::downgrade);
        links.interfaces = interfaces.iter().map(Arc::downgrade).collect();
    }

    pub(crate) fn set_resolved_constant(&self, index: u16, class: &Arc<Class>) {
        self.links.write().constants.insert(index, Arc::downgrade(class));
    }
}
