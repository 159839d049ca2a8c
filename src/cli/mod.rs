pub mod discover;
pub mod generate;
pub mod list;
pub mod parse;
pub mod targets;
