//! Execution mode resolution.
//!
//! Resolved exactly once at process start. Everything that behaves
//! differently between a daemon and a hosted invocation (binding, signals,
//! fatal exits, background tasks) branches on the resulting value and
//! nothing else.

use std::fmt;

use crate::config::ModeSetting;

/// Environment variables set by managed function runtimes.
pub const HOST_MARKERS: &[&str] = &[
    "AWS_LAMBDA_FUNCTION_NAME",
    "VERCEL",
    "FUNCTIONS_WORKER_RUNTIME",
    "NETLIFY",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Long-lived process: binds a listener, handles signals.
    Daemon,
    /// Per-invocation handler inside a host that owns the process.
    Hosted,
}

impl ExecutionMode {
    /// Resolve against the process environment.
    pub fn detect(setting: ModeSetting) -> Self {
        Self::resolve(setting, |key| std::env::var(key).ok())
    }

    /// Resolve using the supplied environment lookup.
    pub fn resolve<F>(setting: ModeSetting, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match setting {
            ModeSetting::Daemon => ExecutionMode::Daemon,
            ModeSetting::Hosted => ExecutionMode::Hosted,
            ModeSetting::Auto => {
                let hosted = HOST_MARKERS
                    .iter()
                    .any(|key| lookup(key).is_some_and(|v| !v.trim().is_empty()));
                if hosted {
                    ExecutionMode::Hosted
                } else {
                    ExecutionMode::Daemon
                }
            }
        }
    }

    pub fn is_hosted(self) -> bool {
        matches!(self, ExecutionMode::Hosted)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Daemon => f.write_str("daemon"),
            ExecutionMode::Hosted => f.write_str("hosted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_setting_wins() {
        let everything = |_: &str| Some("1".to_string());
        assert_eq!(
            ExecutionMode::resolve(ModeSetting::Daemon, everything),
            ExecutionMode::Daemon
        );
        assert_eq!(
            ExecutionMode::resolve(ModeSetting::Hosted, |_| None),
            ExecutionMode::Hosted
        );
    }

    #[test]
    fn auto_detects_host_markers() {
        assert_eq!(
            ExecutionMode::resolve(ModeSetting::Auto, |k| (k == "VERCEL").then(|| "1".into())),
            ExecutionMode::Hosted
        );
        assert_eq!(
            ExecutionMode::resolve(ModeSetting::Auto, |_| None),
            ExecutionMode::Daemon
        );
        // An empty marker does not count.
        assert_eq!(
            ExecutionMode::resolve(ModeSetting::Auto, |k| {
                (k == "AWS_LAMBDA_FUNCTION_NAME").then(String::new)
            }),
            ExecutionMode::Daemon
        );
    }
}
