use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

/// Lower bound for the derived unit count.
pub const MIN_DEFAULT_UNITS: usize = 2;
/// Upper bound for the derived unit count.
pub const MAX_DEFAULT_UNITS: usize = 16;

const MAX_UNITS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_units: Option<usize>,
    pub pin_units: bool,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_units: None,
            pin_units: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "kiln-unit".to_string(),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_units {
            if n == 0 {
                return Err(Error::config("num_units must be > 0"));
            }
            if n > MAX_UNITS {
                return Err(Error::config(format!(
                    "num_units too large (max {})",
                    MAX_UNITS
                )));
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if let Some(0) = self.stack_size {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }

    /// Number of execution units the pool will try to start.
    ///
    /// An explicit `num_units` is taken as-is; otherwise the hardware
    /// parallelism is clamped into `[MIN_DEFAULT_UNITS, MAX_DEFAULT_UNITS]`.
    pub fn units(&self) -> usize {
        self.num_units
            .unwrap_or_else(|| num_cpus::get().clamp(MIN_DEFAULT_UNITS, MAX_DEFAULT_UNITS))
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_units(mut self, n: usize) -> Self {
        self.config.num_units = Some(n);
        self
    }

    pub fn pin_units(mut self, pin: bool) -> Self {
        self.config.pin_units = pin;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
