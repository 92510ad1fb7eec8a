//! Macro catalog: discovery, descriptors and the name-keyed cache

mod descriptor;
mod service;

pub use descriptor::{is_valid_identifier, MacroDescriptor, MacroKind};
pub use service::MacroCatalog;
