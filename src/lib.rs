pub mod batch;
pub mod identity;
pub mod legacy;
pub mod migration;
pub mod normalization;
pub mod schema;
pub mod sectors;

pub mod util {
    pub mod db;
    pub mod env;
    pub mod progress;
    pub mod tracing_setup;
}
