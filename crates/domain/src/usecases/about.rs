//! Run-information use case - records what is needed to reproduce a run

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::{ProcessContext, RunInfo};
use crate::ports::{Clock, SourceControl, SourceControlError};

/// Top-level keys owned by [`RunInfo`]; extra fields may not reuse them
pub const RESERVED_KEYS: [&str; 5] = ["args", "date", "environment", "argv", "git"];

/// Configuration for the run-info collector
#[derive(Debug, Clone)]
pub struct AboutConfig {
    /// Directory whose repository is described
    pub root: PathBuf,
    /// Pathspecs excluded from the recorded patch
    pub git_excludes: Vec<String>,
}

impl Default for AboutConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            git_excludes: vec![":!*.tex".to_string(), ":!*.bib".to_string()],
        }
    }
}

/// Collects arguments, time, environment and repository state
pub struct RunInfoCollector<S, C> {
    source_control: S,
    clock: C,
    config: AboutConfig,
}

impl<S: SourceControl, C: Clock> RunInfoCollector<S, C> {
    pub fn new(source_control: S, clock: C, config: AboutConfig) -> Self {
        Self {
            source_control,
            clock,
            config,
        }
    }

    /// Assemble a [`RunInfo`] for the given process
    pub async fn collect(
        &self,
        args: Vec<String>,
        extra: BTreeMap<String, serde_json::Value>,
        process: ProcessContext,
    ) -> Result<RunInfo, SourceControlError> {
        let extra = extra
            .into_iter()
            .filter(|(key, _)| {
                let reserved = RESERVED_KEYS.contains(&key.as_str());
                if reserved {
                    tracing::warn!(key = %key, "Ignoring extra field with reserved name");
                }
                !reserved
            })
            .collect();

        let git = self
            .source_control
            .reproduce(&self.config.root, &self.config.git_excludes)
            .await?;

        if git.is_none() {
            tracing::debug!(root = %self.config.root.display(), "Not inside a git repository");
        }

        Ok(RunInfo {
            args,
            date: self.clock.now(),
            extra,
            environment: process.environment,
            argv: process.argv,
            git,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GitState;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use time::macros::datetime;

    struct FixedClock(OffsetDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingScm {
        state: Option<GitState>,
        calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    #[async_trait]
    impl SourceControl for RecordingScm {
        async fn reproduce(
            &self,
            root: &Path,
            excludes: &[String],
        ) -> Result<Option<GitState>, SourceControlError> {
            self.calls
                .lock()
                .unwrap()
                .push((root.to_path_buf(), excludes.to_vec()));
            Ok(self.state.clone())
        }
    }

    struct FailingScm;

    #[async_trait]
    impl SourceControl for FailingScm {
        async fn reproduce(
            &self,
            _root: &Path,
            _excludes: &[String],
        ) -> Result<Option<GitState>, SourceControlError> {
            Err(SourceControlError::Timeout {
                command: "git rev-parse HEAD".to_string(),
            })
        }
    }

    fn process() -> ProcessContext {
        ProcessContext {
            environment: BTreeMap::from([("HOME".to_string(), "/home/lab".to_string())]),
            argv: vec!["train".to_string(), "--fast".to_string()],
        }
    }

    #[tokio::test]
    async fn test_collect_serializes_flat_record() {
        let scm = RecordingScm {
            state: Some(GitState {
                head: "abc123".to_string(),
                branch: "main".to_string(),
                dirty: false,
                patch: String::new(),
            }),
            ..Default::default()
        };
        let collector = RunInfoCollector::new(
            scm,
            FixedClock(datetime!(2024-01-02 03:04:05 UTC)),
            AboutConfig::default(),
        );

        let extra = BTreeMap::from([("seed".to_string(), serde_json::json!(42))]);
        let info = collector
            .collect(vec!["lr=0.1".to_string()], extra, process())
            .await
            .unwrap();

        insta::assert_json_snapshot!(info, @r#"
        {
          "args": [
            "lr=0.1"
          ],
          "date": "2024-01-02T03:04:05Z",
          "seed": 42,
          "environment": {
            "HOME": "/home/lab"
          },
          "argv": [
            "train",
            "--fast"
          ],
          "git": {
            "HEAD": "abc123",
            "branch": "main",
            "dirty": false,
            "patch": ""
          }
        }
        "#);
    }

    #[tokio::test]
    async fn test_collect_passes_root_and_excludes() {
        let collector = RunInfoCollector::new(
            RecordingScm::default(),
            FixedClock(datetime!(2024-01-02 03:04:05 UTC)),
            AboutConfig {
                root: PathBuf::from("/work/project"),
                git_excludes: vec![":!*.csv".to_string()],
            },
        );

        let info = collector
            .collect(vec![], BTreeMap::new(), process())
            .await
            .unwrap();
        assert!(info.git.is_none());

        let calls = collector.source_control.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(PathBuf::from("/work/project"), vec![":!*.csv".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_reserved_extra_keys_are_dropped() {
        let collector = RunInfoCollector::new(
            RecordingScm::default(),
            FixedClock(datetime!(2024-01-02 03:04:05 UTC)),
            AboutConfig::default(),
        );
        let extra = BTreeMap::from([
            ("git".to_string(), serde_json::json!("spoofed")),
            ("note".to_string(), serde_json::json!("kept")),
        ]);

        let info = collector
            .collect(vec![], extra, process())
            .await
            .unwrap();
        assert_eq!(info.extra.len(), 1);
        assert!(info.extra.contains_key("note"));
    }

    #[tokio::test]
    async fn test_source_control_errors_propagate() {
        let collector = RunInfoCollector::new(
            FailingScm,
            FixedClock(datetime!(2024-01-02 03:04:05 UTC)),
            AboutConfig::default(),
        );
        let result = collector
            .collect(vec![], BTreeMap::new(), process())
            .await;
        assert!(matches!(result, Err(SourceControlError::Timeout { .. })));
    }
}
