//! Miscellaneous common structs used throughout the library.

mod address;
mod id;
mod keys;
pub mod messages;
mod node;
pub mod tl;
mod value;

pub use address::*;
pub use id::*;
pub use keys::*;
pub use messages::*;
pub use node::*;
pub use value::*;
