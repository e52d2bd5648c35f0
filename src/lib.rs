pub mod data;
pub mod errors;
pub mod output;
pub mod worker;
pub mod xml;
