pub mod extractor;
pub mod recommendations;
