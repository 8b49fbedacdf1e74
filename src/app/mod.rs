pub mod adb;
pub mod classify;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod profiles;
pub mod scheduler;
pub mod selection;
pub mod settings;
