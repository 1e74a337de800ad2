//! Builder pattern for Sender construction

use std::sync::Arc;

use crate::channel::ChannelConfig;
use crate::config::SenderConfig;
use crate::error::{BenchError, BenchResult};
use crate::pace::PacePlan;
use crate::traits::{LoadGenerator, RecordPublisher};

use super::executor::Sender;

/// Builder for creating a Sender
///
/// Channel sizes default to the plan's capacity estimate.
pub struct SenderBuilder {
    config: SenderConfig,
    plan: Option<PacePlan>,
    load_generator: Option<Arc<dyn LoadGenerator>>,
    publisher: Option<Arc<dyn RecordPublisher>>,
    channel_config: Option<ChannelConfig>,
}

impl SenderBuilder {
    /// Create a builder with identity taken from the environment
    pub fn new() -> Self {
        Self {
            config: SenderConfig::from_env(),
            plan: None,
            load_generator: None,
            publisher: None,
            channel_config: None,
        }
    }

    /// Set the full configuration
    pub fn config(mut self, config: SenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the pace plan
    pub fn plan(mut self, plan: PacePlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Set the load generator
    pub fn load_generator(mut self, generator: Arc<dyn LoadGenerator>) -> Self {
        self.load_generator = Some(generator);
        self
    }

    /// Set where records are published
    pub fn publisher(mut self, publisher: Arc<dyn RecordPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Override the channel configuration
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = Some(config);
        self
    }

    /// Build the sender
    ///
    /// # Errors
    ///
    /// Returns an error if the plan, load generator or publisher is not set,
    /// or if configuration validation fails.
    pub fn build(self) -> BenchResult<Sender> {
        let plan = self.plan.ok_or_else(|| BenchError::missing_config("plan"))?;
        let load_generator = self
            .load_generator
            .ok_or_else(|| BenchError::missing_config("load_generator"))?;
        let publisher = self
            .publisher
            .ok_or_else(|| BenchError::missing_config("publisher"))?;

        self.config.validate()?;

        let channel_config = self
            .channel_config
            .unwrap_or_else(|| ChannelConfig::from_estimate(plan.capacity()));

        Ok(Sender {
            config: self.config,
            plan,
            load_generator,
            publisher,
            channel_config,
        })
    }
}

impl Default for SenderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
