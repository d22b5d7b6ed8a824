pub mod command;
pub mod counts;
pub mod file;
pub mod plotting;
pub mod report;
pub mod sambam;
pub mod streams;
