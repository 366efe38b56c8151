pub mod act;
pub mod association;
pub mod concept;
pub mod entity;
pub mod meta;
pub mod security;

pub use act::*;
pub use association::*;
pub use concept::*;
pub use entity::*;
pub use meta::*;
pub use security::*;
