pub mod adapter;
pub mod locator;
pub mod parse;
pub mod runner;
