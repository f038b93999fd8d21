pub mod core;
pub mod decode;
pub mod discover;
pub mod sink;
