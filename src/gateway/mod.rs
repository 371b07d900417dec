//! Composition root: one shared cache, one transport, four domain clients.

mod builder;
mod hermod;

pub use builder::HermodBuilder;
pub use hermod::Hermod;
