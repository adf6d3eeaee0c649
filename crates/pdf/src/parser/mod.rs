pub mod backend;
pub mod words;
