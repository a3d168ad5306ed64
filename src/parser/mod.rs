// Parcel pipeline DSL parser

pub mod ast;
pub mod lexer;
pub mod pipeline;
pub mod steps;

pub use ast::{Pipeline, Step};
pub use pipeline::parse_pipeline;
