pub mod blob;
pub mod fs;
