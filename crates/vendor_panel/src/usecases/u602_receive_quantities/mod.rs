pub mod editor;

pub use editor::{QuantityEditor, QuantityError};
