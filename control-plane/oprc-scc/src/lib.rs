pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod fanout;
pub mod featuresets;
pub mod identity;
pub mod merger;
pub mod runtime;
pub mod store;

use tracing_subscriber::{
    EnvFilter,
    filter::{Directive, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub fn init_tracing(default_env: &str) {
    let directive: Directive = default_env
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .from_env_lossy()
        .add_directive(directive);

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}
