//! skillgen - Turn an `llms.txt` link index into an installable agent skill
//!
//! The pipeline parses the index into sections, optionally snapshots every
//! linked page, derives a name, description and trigger keywords, renders a
//! bundle (`SKILL.md`, reference indexes, catalog, provenance, manifest) and
//! installs it atomically into an agent's skills directory.

pub mod cli;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod util;
