pub mod bundle;
pub mod generator;
pub mod installer;
pub mod keywords;
pub mod parser;
pub mod snapshot;
