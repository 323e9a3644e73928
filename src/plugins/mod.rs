//! Built-in plugins.

pub mod greeter;
pub mod wordfilter;

pub use greeter::Greeter;
pub use wordfilter::WordFilter;

use crate::config::PluginsConfig;
use crate::plugin::Plugin;

/// Parse a boolean option value.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Instantiate every plugin that has a config section, in a fixed order.
pub fn from_config(config: &PluginsConfig) -> Vec<(&'static str, Box<dyn Plugin>)> {
    let mut plugins: Vec<(&'static str, Box<dyn Plugin>)> = Vec::new();
    if let Some(cfg) = &config.greeter {
        plugins.push((greeter::NAME, Box::new(Greeter::from_config(cfg))));
    }
    if let Some(cfg) = &config.wordfilter {
        plugins.push((wordfilter::NAME, Box::new(WordFilter::from_config(cfg))));
    }
    plugins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GreeterConfig, WordFilterConfig};

    #[test]
    fn test_flags() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_from_config_order() {
        let config = PluginsConfig {
            greeter: Some(GreeterConfig {
                enabled: true,
                message: "hi {nick}".into(),
            }),
            wordfilter: Some(WordFilterConfig {
                enabled: true,
                words: vec!["darn".into()],
                ban: false,
                reason: "language".into(),
            }),
        };
        let names: Vec<_> = from_config(&config).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["greeter", "wordfilter"]);
        assert!(from_config(&PluginsConfig::default()).is_empty());
    }
}
