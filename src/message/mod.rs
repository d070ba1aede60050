//! Parsing of raw agent CLI output

mod parser;

pub use parser::parse_message;
