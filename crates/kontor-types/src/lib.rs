pub mod api;
pub mod module;

pub use module::Module;
