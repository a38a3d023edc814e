//! Process wiring for the helpdesk service: configuration loading, the
//! shared application context, HTTP serving and FAQ import.

mod bootstrap;
mod context;
mod faq_import;

pub use bootstrap::{
    BootstrapError, CONFIG_FILE_NAME, CliOverrides, ConfigSearchPaths, EmbeddingOverrides,
    ServerOverrides, StoreOverrides, load_config, load_config_with_paths,
};
pub use context::AppContext;
pub use faq_import::{
    FaqImportError, FaqImportRecord, import_faq_entries, import_faq_file, parse_faq_document,
};

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {error}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
