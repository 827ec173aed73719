pub mod audit;
pub mod ip;
