pub mod class;
pub mod error;
pub mod frame;
pub mod loader;

extern crate parse;

pub use class::Class;
pub use loader::{ClassLoader, ClassState, LoaderOptions};
