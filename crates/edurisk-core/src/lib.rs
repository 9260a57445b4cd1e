pub mod bundle;
pub mod config;
pub mod csv_io;
pub mod error;
pub mod features;
pub mod formatter;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod table;
pub mod util;
pub mod xgb_runtime;
