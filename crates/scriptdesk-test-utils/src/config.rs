//! Configuration builders for tests.

use scriptdesk_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .candidates(&["python", "text"])
///     .warmup_timeout_secs(1)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn candidates(mut self, kinds: &[&str]) -> Self {
        self.config.registry.candidates = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn warmup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.registry.warmup_timeout_secs = secs;
        self
    }

    pub fn position_delta(mut self, delta: i32) -> Self {
        self.config.pointer.position_delta = delta;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
