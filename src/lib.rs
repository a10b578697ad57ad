pub mod config;
pub mod directory;
pub mod engine;
pub mod eval;
pub mod events;
pub mod issuer;
pub mod model;
pub mod net;
pub mod revocation;
pub mod rules;
pub mod storage;
pub mod sync;
pub mod telemetry;
