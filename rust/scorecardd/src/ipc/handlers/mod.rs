pub mod core;
pub mod stats;
pub mod subjects;
pub mod trends;
