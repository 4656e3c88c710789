// Tool Invocation Adapter
//
// One adapter per wrapped tool. Owns the seen-set and the error latch; the
// tool-specific parts come from its `ToolProfile`.

use crate::application::tools::{resolve_executable, ToolProfile};
use crate::domain::{AdapterError, Event, EventType, Outcome, SkipReason};
use crate::port::{ExecutionError, ProcessRunner, ProcessSpec};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Dedup-guarded wrapper around one external tool
pub struct ToolAdapter {
    profile: Box<dyn ToolProfile>,
    runner: Arc<dyn ProcessRunner>,
    seen: Mutex<HashSet<String>>,
    error_state: AtomicBool,
}

impl ToolAdapter {
    pub fn new(profile: Box<dyn ToolProfile>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            profile,
            runner,
            seen: Mutex::new(HashSet::new()),
            error_state: AtomicBool::new(false),
        }
    }

    pub fn module_name(&self) -> &'static str {
        self.profile.module_name()
    }

    pub fn profile(&self) -> &dyn ToolProfile {
        self.profile.as_ref()
    }

    pub fn watches(&self, event_type: EventType) -> bool {
        self.profile.watched_events().contains(&event_type)
    }

    /// True once a fatal setup error was hit; never resets
    pub fn is_disabled(&self) -> bool {
        self.error_state.load(Ordering::SeqCst)
    }

    pub fn seen_count(&self) -> usize {
        self.lock_seen().len()
    }

    /// Executable path after resolution, `None` when no path is configured
    pub fn executable(&self) -> Option<PathBuf> {
        let configured = self.profile.configured_path();
        if configured.trim().is_empty() {
            return None;
        }
        Some(resolve_executable(configured, self.profile.binary_name()))
    }

    /// Handle one event and report the outcome on the error/debug channels
    pub async fn process(&self, event: &Event) -> Outcome {
        debug!(
            module = %self.module_name(),
            event_type = %event.event_type,
            source = %event.module,
            "Received event"
        );

        let outcome = self.process_inner(event).await;

        match &outcome {
            Outcome::Emitted(events) => info!(
                module = %self.module_name(),
                target = %event.data,
                emitted = events.len(),
                "Tool produced results"
            ),
            Outcome::Skipped(reason) => debug!(
                module = %self.module_name(),
                target = %event.data,
                reason = %reason,
                "Skipping target"
            ),
            Outcome::Failed(err) => error!(
                module = %self.module_name(),
                target = %event.data,
                fatal = err.is_fatal(),
                error = %err,
                "Tool invocation failed"
            ),
        }

        outcome
    }

    async fn process_inner(&self, event: &Event) -> Outcome {
        if event.module == self.module_name() {
            return Outcome::Skipped(SkipReason::OwnEvent);
        }
        if !self.watches(event.event_type) {
            return Outcome::Skipped(SkipReason::Unwatched);
        }
        if self.is_disabled() {
            return Outcome::Skipped(SkipReason::Disabled);
        }
        if let Some(outcome) = self.profile.precheck(event) {
            return outcome;
        }

        let target = event.data.as_str();

        // Marked before anything can fail, so a target never runs twice
        if !self.mark_seen(target) {
            return Outcome::Skipped(SkipReason::AlreadySeen);
        }

        let exe = match self.resolve_binary().await {
            Ok(exe) => exe,
            // Only the call that trips the latch reports it
            Err(err) if self.disable() => return Outcome::Failed(err),
            Err(_) => return Outcome::Skipped(SkipReason::Disabled),
        };

        if !self.profile.validate(target) {
            return Outcome::Failed(AdapterError::InvalidInput(target.to_string()));
        }

        let spec = self.build_spec(&exe, target);
        debug!(module = %self.module_name(), command = %spec.command_line(), "Running tool");

        match self.runner.run(&spec).await {
            Ok(output) if !output.success() => {
                debug!(
                    module = %self.module_name(),
                    stdout = %output.stdout,
                    "Tool exited with failure"
                );
                Outcome::Failed(AdapterError::ToolFailed {
                    tool: self.profile.meta().name.to_string(),
                    exit_code: output.exit_code,
                    stderr: output.stderr.trim().to_string(),
                })
            }
            Ok(output) => {
                let content = output.stdout.trim();
                if content.is_empty() {
                    return Outcome::Skipped(SkipReason::EmptyOutput);
                }
                debug!(
                    module = %self.module_name(),
                    target = %target,
                    duration_ms = output.duration_ms,
                    "Tool finished"
                );

                let events = self.profile.interpret(content, event);
                if events.is_empty() {
                    Outcome::Skipped(SkipReason::NothingFound)
                } else {
                    Outcome::Emitted(events)
                }
            }
            Err(ExecutionError::Timeout(timeout_ms)) => Outcome::Failed(AdapterError::Timeout {
                tool: self.profile.meta().name.to_string(),
                target: target.to_string(),
                timeout_ms,
            }),
            Err(source) => Outcome::Failed(AdapterError::Execution {
                tool: self.profile.meta().name.to_string(),
                source,
            }),
        }
    }

    /// Atomic check-and-insert; false if the target was already covered
    fn mark_seen(&self, target: &str) -> bool {
        let mut seen = self.lock_seen();
        if self.profile.already_covered(&seen, target) {
            return false;
        }
        seen.insert(target.to_string());
        true
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked mid-insert
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn resolve_binary(&self) -> Result<PathBuf, AdapterError> {
        let tool = self.profile.meta().name.to_string();
        let exe = self
            .executable()
            .ok_or_else(|| AdapterError::NotConfigured { tool: tool.clone() })?;

        let is_file = tokio::fs::metadata(&exe)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);

        if !is_file {
            return Err(AdapterError::BinaryNotFound {
                tool,
                path: exe.display().to_string(),
            });
        }
        Ok(exe)
    }

    fn build_spec(&self, exe: &std::path::Path, target: &str) -> ProcessSpec {
        let exe = exe.display().to_string();
        let tool_args = self.profile.build_args(target);

        let (program, args) = match self.profile.interpreter() {
            Some(interpreter) => (
                interpreter.to_string(),
                std::iter::once(exe).chain(tool_args).collect(),
            ),
            None => (exe, tool_args),
        };

        ProcessSpec {
            program,
            args,
            timeout: self.profile.timeout(),
        }
    }

    /// Latch the error state; true for the call that flipped it
    fn disable(&self) -> bool {
        let first = !self.error_state.swap(true, Ordering::SeqCst);
        if first {
            warn!(module = %self.module_name(), "Adapter disabled until restart");
        }
        first
    }
}
