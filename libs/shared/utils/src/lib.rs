pub mod extractor;
pub mod jwt;
pub mod scratch;
pub mod test_utils;
