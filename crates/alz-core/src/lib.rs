pub mod config;
pub mod dataset;
pub mod eval;
pub mod features;
pub mod forest;
pub mod pipeline;
pub mod runtime;
pub mod scaler;
pub mod schema;
pub mod train;
pub mod util;
pub mod validate;
