//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal and nothing is registered
//! - The registry is complete before any thread can see it

use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::schema::ExitWhenConfig;
use crate::config::validation::validate_config;
use crate::events::EventRegistry;
use crate::lifecycle::gate::{LifecycleGate, NextHandler};
use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::lifecycle::state::ShutdownState;

/// Validate `config`, configure its events and wire up the lifecycle gate.
pub fn build_gate(
    config: &ExitWhenConfig,
    next: Arc<dyn NextHandler>,
    trigger: Arc<dyn ShutdownTrigger>,
) -> Result<LifecycleGate, ConfigError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let registry = EventRegistry::from_specs(&config.events)?;
    tracing::info!(
        events = registry.len(),
        poll_secs = config.poll_secs,
        "Exit conditions configured"
    );

    let state = Arc::new(ShutdownState::new(registry, config.poll_interval()));
    Ok(LifecycleGate::new(state, next, trigger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EventSpec;
    use crate::lifecycle::gate::PassThrough;
    use crate::lifecycle::shutdown::Shutdown;

    #[test]
    fn invalid_config_registers_nothing() {
        let config = ExitWhenConfig {
            poll_secs: 1,
            events: vec![EventSpec::Script { command: "  ".into() }],
        };
        let result = build_gate(&config, Arc::new(PassThrough), Arc::new(Shutdown::new()));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn accepts_zero_poll_interval() {
        let config = ExitWhenConfig {
            poll_secs: 0,
            events: vec![EventSpec::Script { command: "exit 0".into() }],
        };
        let gate = build_gate(&config, Arc::new(PassThrough), Arc::new(Shutdown::new())).unwrap();
        assert!(gate.state().poll_interval().is_zero());
    }

    #[test]
    fn builds_registry_in_order() {
        let config = ExitWhenConfig {
            poll_secs: 1,
            events: vec![
                EventSpec::Script { command: "exit 0".into() },
                EventSpec::FileCreated { path: "/nonexistent/exit-when".into() },
            ],
        };
        let gate = build_gate(&config, Arc::new(PassThrough), Arc::new(Shutdown::new())).unwrap();
        assert_eq!(gate.state().registry().len(), 2);
        assert_eq!(gate.state().poll_interval().as_secs(), 1);
    }
}
