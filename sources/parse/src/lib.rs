pub mod attributes;
pub mod classfile;
pub mod constants;
pub mod error;
pub mod flags;
pub mod parser;
pub mod pool;

extern crate bytes;
extern crate enum_as_inner;
extern crate support;
