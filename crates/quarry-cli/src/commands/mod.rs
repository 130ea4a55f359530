//! Command implementations.

pub mod configure;
pub mod extract;
pub mod plan;
pub mod reconcile;

pub use self::configure::execute_config;
pub use self::extract::execute_extract;
pub use self::plan::execute_plan;
pub use self::reconcile::execute_reconcile;

use crate::cli::ProviderArg;
use crate::config::OracleSettings;

/// Apply provider and model flags on top of the configured oracle settings.
pub(crate) fn oracle_settings(
    base: &OracleSettings,
    provider: Option<ProviderArg>,
    model: Option<String>,
) -> OracleSettings {
    let mut settings = base.clone();
    if let Some(provider) = provider {
        settings.provider = provider.into();
    }
    if let Some(model) = model {
        settings.model = model;
    }
    settings
}
