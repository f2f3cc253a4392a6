use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` directive syntax
/// (e.g. "info", "canto_engine=debug,wgpu_core=warn").
///
/// `quiet_gpu` appends `warn` directives for the wgpu crates, which are very
/// chatty at `info` during adapter and surface setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    pub quiet_gpu: bool,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            quiet_gpu: true,
            timestamps: true,
        }
    }
}

const GPU_DIRECTIVES: &str = "wgpu_core=warn,wgpu_hal=warn,naga=warn";

static INIT: Once = Once::new();

/// Installs the global logger once.
///
/// Subsequent calls are ignored, as is a logger already installed by
/// someone else (tests, a host application).
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }

        if config.quiet_gpu {
            builder.parse_filters(GPU_DIRECTIVES);
        }

        builder.write_style(config.write_style);
        if config.timestamps {
            builder.format_timestamp_millis();
        } else {
            builder.format_timestamp(None);
        }

        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        // The capture logger owns the global slot in tests.
        crate::logging::capture::install();
        init_logging(LoggingConfig { env_filter: Some("debug".into()), ..Default::default() });
        init_logging(LoggingConfig::default());
        log::debug!("still alive");
    }
}
