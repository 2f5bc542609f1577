//! Origin-based filtering for the exact-name matcher and entity loading.
//! Restricts a run to entities whose `origin` tag is in an allow-list.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::env;

use crate::models::Entity;

#[derive(Debug, Clone, Default)]
pub struct OriginFilterConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
}

impl OriginFilterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let enabled = env::var("ORIGIN_FILTER_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let allowed_origins = if enabled {
            parse_origin_list(&env::var("ALLOWED_ORIGINS").unwrap_or_default())
        } else {
            Vec::new()
        };

        debug!("Origin filter config: enabled={}, origins={:?}", enabled, allowed_origins);

        Self { enabled, allowed_origins }
    }

    pub fn from_origins(origins: Vec<String>) -> Self {
        Self {
            enabled: !origins.is_empty(),
            allowed_origins: origins,
        }
    }

    /// Check if filtering is effectively enabled (both flag and origins present)
    pub fn is_active(&self) -> bool {
        self.enabled && !self.allowed_origins.is_empty()
    }

    /// The origin list to pass to the store; empty means "all origins".
    pub fn origins(&self) -> &[String] {
        if self.is_active() {
            &self.allowed_origins
        } else {
            &[]
        }
    }

    pub fn accepts(&self, entity: &Entity) -> bool {
        !self.is_active() || self.allowed_origins.iter().any(|o| *o == entity.origin)
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        if self.is_active() {
            info!("🔍 Origin filtering ENABLED");
            info!("   Allowed origins: {:?}", self.allowed_origins);
        } else {
            info!("🔍 Origin filtering DISABLED - matching all entities");
        }
    }

    /// Warns about configured origins that no loaded entity carries.
    pub fn validate_origins(&self, entities: &[Entity]) {
        if !self.is_active() {
            return;
        }
        let present: HashSet<&str> = entities.iter().map(|e| e.origin.as_str()).collect();
        let missing: Vec<&String> = self
            .allowed_origins
            .iter()
            .filter(|o| !present.contains(o.as_str()))
            .collect();
        if !missing.is_empty() {
            warn!("⚠️ Specified origins not found among entities: {:?}", missing);
        }
    }
}

pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_disabled() {
        env::remove_var("ORIGIN_FILTER_ENABLED");
        env::remove_var("ALLOWED_ORIGINS");

        let config = OriginFilterConfig::from_env();
        assert!(!config.enabled);
        assert!(config.allowed_origins.is_empty());
        assert!(config.origins().is_empty());
    }

    #[test]
    fn test_parse_origin_list() {
        assert_eq!(
            parse_origin_list(" registry, leaks ,,opencorporates"),
            vec!["registry", "leaks", "opencorporates"]
        );
    }

    #[test]
    fn test_disabled_filter_accepts_everything() {
        let config = OriginFilterConfig {
            enabled: false,
            allowed_origins: vec!["registry".to_string()],
        };
        assert!(config.accepts(&Entity::new("e1", Some("Acme"), "leaks")));
        assert!(config.origins().is_empty());
    }

    #[test]
    fn test_active_filter_restricts_origins() {
        let config = OriginFilterConfig::from_origins(vec!["registry".to_string()]);
        assert!(config.accepts(&Entity::new("e1", Some("Acme"), "registry")));
        assert!(!config.accepts(&Entity::new("e2", Some("Acme"), "leaks")));
    }
}
