//! Hook execution through the engine's exec facility.
//!
//! A hook command runs as exec-create, exec-attach, exec-exit-code. The
//! hook's `force` bit decides how failures propagate: forced hooks fail
//! the surrounding operation, unforced hooks are logged and skipped.

use crate::engine::{Engine, ExecConfig};
use crate::error::{GantryError, Result};
use crate::orchestrator::Orchestrator;
use crate::types::{Container, Hook};
use crate::utils;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Outcome of a single hook command.
#[derive(Debug)]
pub enum HookOutcome {
    /// Exit code zero.
    Ok(Vec<String>),
    /// Failed, but the hook is not forced: keep going.
    Soft { output: Vec<String>, error: GantryError },
    /// Failed and the hook is forced: the surrounding operation fails.
    Hard(GantryError),
}

impl Orchestrator {
    /// Hooks run unless the caller opts out of an unforced hook.
    fn hooks_enabled(ignore_hook: bool, hook: &Hook) -> bool {
        !ignore_hook || hook.force
    }

    async fn execute_hook_command(
        engine: &Arc<dyn Engine>,
        container: &Container,
        command: &str,
        force: bool,
    ) -> HookOutcome {
        let config = ExecConfig {
            cmd: utils::make_command_line_args(command),
            env: container.env.clone(),
            privileged: container.privileged,
            working_dir: String::new(),
        };

        let exec_id = match engine.exec_create(&container.id, &config).await {
            Ok(id) => id,
            Err(e) if force => return HookOutcome::Hard(e),
            Err(e) => return HookOutcome::Soft { output: Vec::new(), error: e },
        };
        let output = match engine.exec_attach(&exec_id).await {
            Ok(lines) => lines,
            Err(e) if force => return HookOutcome::Hard(e),
            Err(e) => return HookOutcome::Soft { output: Vec::new(), error: e },
        };
        match engine.exec_exit_code(&exec_id).await {
            Ok(0) => HookOutcome::Ok(output),
            Ok(code) => {
                let e = GantryError::HookFailed {
                    command: command.to_string(),
                    reason: format!("exit code {}", code),
                };
                if force {
                    HookOutcome::Hard(e)
                } else {
                    HookOutcome::Soft { output, error: e }
                }
            }
            Err(e) if force => HookOutcome::Hard(e),
            Err(e) => HookOutcome::Soft { output, error: e },
        }
    }

    /// Run a hook command sequence, collecting output lines per command.
    async fn run_hook_commands(
        engine: &Arc<dyn Engine>,
        container: &Container,
        commands: &[String],
        force: bool,
        outputs: &mut HashMap<String, Vec<String>>,
    ) -> Result<()> {
        for command in commands {
            match Self::execute_hook_command(engine, container, command, force).await {
                HookOutcome::Ok(lines) => {
                    outputs.insert(command.clone(), lines);
                }
                HookOutcome::Soft { output, error } => {
                    warn!(
                        container_id = %container.id,
                        command = %command,
                        error = %error,
                        "hook failed, continuing"
                    );
                    outputs.insert(command.clone(), output);
                }
                HookOutcome::Hard(error) => {
                    error!(
                        container_id = %container.id,
                        command = %command,
                        error = %error,
                        "forced hook failed"
                    );
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Start a container: before-start hooks, engine start, after-start
    /// hooks. Returns captured hook output keyed by command.
    pub(crate) async fn start_container(
        &self,
        engine: &Arc<dyn Engine>,
        container: &Container,
        ignore_hook: bool,
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut outputs = HashMap::new();
        if let Some(hook) = &container.hook {
            if Self::hooks_enabled(ignore_hook, hook) && !hook.before_start.is_empty() {
                Self::run_hook_commands(
                    engine,
                    container,
                    &hook.before_start,
                    hook.force,
                    &mut outputs,
                )
                .await?;
            }
        }
        engine.virtualization_start(&container.id).await?;
        if let Some(hook) = &container.hook {
            if Self::hooks_enabled(ignore_hook, hook) && !hook.after_start.is_empty() {
                Self::run_hook_commands(
                    engine,
                    container,
                    &hook.after_start,
                    hook.force,
                    &mut outputs,
                )
                .await?;
            }
        }
        Ok(outputs)
    }

    /// Stop a container: before-stop hooks, engine stop.
    pub(crate) async fn stop_container(
        &self,
        engine: &Arc<dyn Engine>,
        container: &Container,
        ignore_hook: bool,
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut outputs = HashMap::new();
        if let Some(hook) = &container.hook {
            if Self::hooks_enabled(ignore_hook, hook) && !hook.before_stop.is_empty() {
                Self::run_hook_commands(
                    engine,
                    container,
                    &hook.before_stop,
                    hook.force,
                    &mut outputs,
                )
                .await?;
            }
        }
        engine.virtualization_stop(&container.id).await?;
        Ok(outputs)
    }
}
