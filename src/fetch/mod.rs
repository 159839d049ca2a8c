pub mod client;
pub mod client_impl;
pub mod discover;
