pub mod element;
pub mod entry;
pub mod stream;

pub use element::Element;
