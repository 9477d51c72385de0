//! Content-script injector
//!
//! Runs on every committed top-level navigation. Re-injection on repeated
//! navigations is the injected script's own concern.

use std::path::{Path, PathBuf};

use crate::browser::BrowsingContext;
use crate::core::config::InjectorConfig;
use crate::core::PilotError;
use crate::inject::manifest::Manifest;

const MANIFEST_FILE: &str = "manifest.json";

/// Outcome of one injection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Files injected, in order
    pub injected: Vec<String>,
    /// Files that failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Injects the polyfill and matching content scripts into a context
#[derive(Debug, Clone)]
pub struct ScriptInjector {
    extension_dir: PathBuf,
    polyfill_path: PathBuf,
    polyfill_fallback: PathBuf,
}

impl ScriptInjector {
    pub fn new(
        extension_dir: impl Into<PathBuf>,
        polyfill_path: impl Into<PathBuf>,
        polyfill_fallback: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extension_dir: extension_dir.into(),
            polyfill_path: polyfill_path.into(),
            polyfill_fallback: polyfill_fallback.into(),
        }
    }

    pub fn from_config(config: &InjectorConfig) -> Self {
        Self::new(
            &config.extension_dir,
            &config.polyfill_path,
            &config.polyfill_fallback,
        )
    }

    /// Inject into `context`, which has just committed `url`
    pub async fn inject(&self, context: &dyn BrowsingContext, url: &str) -> InjectionReport {
        let mut report = InjectionReport::default();

        match self.inject_polyfill(context).await {
            Ok(name) => report.injected.push(name),
            Err(e) => {
                tracing::warn!(url, "polyfill injection failed: {}", e);
                report.failed.push(("polyfill".to_string(), e.to_string()));
            }
        }

        let manifest = match Manifest::load(&self.extension_dir.join(MANIFEST_FILE)).await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(url, "content scripts skipped: {}", e);
                return report;
            }
        };

        for rule in manifest.rules_for(url) {
            for file in &rule.css {
                let result = match self.read(file).await {
                    Ok(css) => context.insert_css(&css).await,
                    Err(e) => Err(e),
                };
                record(&mut report, file, result.map(|_| ()));
            }
            for file in &rule.js {
                let result = match self.read(file).await {
                    Ok(js) => context.execute_script(&js).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                record(&mut report, file, result);
            }
        }

        tracing::debug!(
            url,
            injected = report.injected.len(),
            failed = report.failed.len(),
            "content scripts injected"
        );
        report
    }

    async fn inject_polyfill(&self, context: &dyn BrowsingContext) -> crate::core::Result<String> {
        let path = if self.polyfill_path.exists() {
            &self.polyfill_path
        } else {
            &self.polyfill_fallback
        };
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            PilotError::InjectionFailed {
                file: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        context.execute_script(&source).await?;
        Ok(path.display().to_string())
    }

    async fn read(&self, file: &str) -> crate::core::Result<String> {
        let path = resolve(&self.extension_dir, file);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PilotError::InjectionFailed {
                file: file.to_string(),
                reason: e.to_string(),
            })
    }
}

fn resolve(base: &Path, file: &str) -> PathBuf {
    base.join(file.trim_start_matches('/'))
}

fn record(report: &mut InjectionReport, file: &str, result: crate::core::Result<()>) {
    match result {
        Ok(()) => report.injected.push(file.to_string()),
        Err(e) => {
            tracing::warn!(file, "injection failed: {}", e);
            report.failed.push((file.to_string(), e.to_string()));
        }
    }
}
