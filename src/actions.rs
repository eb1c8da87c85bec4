//! The ordered execution plan: stage-in, user steps, stage-out.
//!
//! Nothing here copies or executes anything; the builders only assemble
//! self-contained action fragments for the request document. The actual
//! copies run inside the pipeline VM via `gsutil`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CLOUD_SDK_IMAGE, DATA_DISK_MOUNT, DATA_DISK_NAME, ONE_DAY};
use crate::error::{Error, Result};
use crate::params::JobParams;

/// Preamble for generated scripts: abort on first error, on unset-variable
/// use, and propagate failure through any pipe segment.
const BASH_STRICT_PREAMBLE: &str = "set -o errexit\nset -o nounset\nset -o pipefail\n\n";

/// A disk mount declaration attached to an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub disk: String,
    pub path: String,
    pub read_only: bool,
}

impl Mount {
    /// The shared working-disk mount, read-write at the fixed mount root.
    fn data_disk() -> Self {
        Self {
            disk: DATA_DISK_NAME.to_string(),
            path: DATA_DISK_MOUNT.to_string(),
            read_only: false,
        }
    }
}

/// One executable pipeline step, self-contained for the request document.
///
/// Serializes to the pipelines API action shape: `name`, `imageUri`,
/// `commands`, `environment`, `flags`, `mounts`, `timeout`, and an optional
/// `entrypoint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    pub name: String,
    pub image_uri: String,
    pub commands: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub flags: Vec<String>,
    pub mounts: Vec<Mount>,
    pub timeout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
}

/// A caller-supplied execution step: an opaque container image plus argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStep {
    pub name: String,
    pub image_uri: String,
    pub commands: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub entrypoint: Option<String>,
    /// Step timeout; defaults to one day.
    pub timeout: String,
}

impl UserStep {
    pub fn new(
        name: impl Into<String>,
        image_uri: impl Into<String>,
        commands: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_uri: image_uri.into(),
            commands,
            environment: BTreeMap::new(),
            entrypoint: None,
            timeout: ONE_DAY.to_string(),
        }
    }

    /// Tokenize a shell-style command line into argv.
    pub fn from_shell(
        name: impl Into<String>,
        image_uri: impl Into<String>,
        command_line: &str,
    ) -> Result<Self> {
        let commands = shell_words::split(command_line)
            .map_err(|err| Error::Configuration(format!("bad command line: {err}")))?;
        Ok(Self::new(name, image_uri, commands))
    }

    /// Run a bash script as the step command.
    #[must_use]
    pub fn bash(name: impl Into<String>, image_uri: impl Into<String>, script: &str) -> Self {
        Self::new(
            name,
            image_uri,
            vec!["/bin/bash".to_string(), "-c".to_string(), script.to_string()],
        )
    }

    /// Add an environment variable visible only to this step.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    #[must_use]
    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }
}

/// Build the ordered action list for a job: the generated stage-in copy,
/// the user steps in order, and the generated stage-out copy.
#[must_use]
pub fn build_actions(job: &JobParams, user_steps: &[UserStep]) -> Vec<ActionSpec> {
    let mut actions = Vec::with_capacity(user_steps.len() + 2);
    actions.push(localize_action(job));
    actions.extend(user_steps.iter().map(user_action));
    actions.push(delocalize_action(job));
    debug!(count = actions.len(), "built pipeline actions");
    actions
}

/// Generated stage-in action: copy every input onto the working disk.
///
/// Single files use a direct copy; recursive inputs use a tree sync.
/// Declared-but-unset parameters have nothing to copy and are skipped.
fn localize_action(job: &JobParams) -> ActionSpec {
    let mut copies = Vec::new();
    for input in &job.inputs {
        if let (Some(parts), Some(docker_path)) = (&input.uri, &input.docker_path) {
            copies.push(copy_command(&parts.uri(), &mount_path(docker_path)));
        }
    }
    for input in &job.recursive_inputs {
        if let (Some(parts), Some(docker_path)) = (&input.uri, &input.docker_path) {
            copies.push(sync_command(&parts.uri(), &mount_path(docker_path)));
        }
    }
    generated_action("localize", copies)
}

/// Generated stage-out action: mirror of stage-in, working disk to remote.
fn delocalize_action(job: &JobParams) -> ActionSpec {
    let mut copies = Vec::new();
    for output in &job.outputs {
        if let (Some(parts), Some(docker_path)) = (&output.uri, &output.docker_path) {
            copies.push(copy_command(&mount_path(docker_path), &parts.uri()));
        }
    }
    for output in &job.recursive_outputs {
        if let (Some(parts), Some(docker_path)) = (&output.uri, &output.docker_path) {
            copies.push(sync_command(&mount_path(docker_path), &parts.uri()));
        }
    }
    generated_action("delocalize", copies)
}

fn user_action(step: &UserStep) -> ActionSpec {
    ActionSpec {
        name: step.name.clone(),
        image_uri: step.image_uri.clone(),
        commands: step.commands.clone(),
        environment: step.environment.clone(),
        flags: Vec::new(),
        mounts: vec![Mount::data_disk()],
        timeout: step.timeout.clone(),
        entrypoint: step.entrypoint.clone(),
    }
}

/// Shared scaffolding for the generated copy steps: cloud-sdk image, bash
/// entrypoint, strict-mode script, one-day timeout.
fn generated_action(name: &str, copy_commands: Vec<String>) -> ActionSpec {
    ActionSpec {
        name: name.to_string(),
        image_uri: CLOUD_SDK_IMAGE.to_string(),
        commands: vec!["-c".to_string(), bash_script(&copy_commands)],
        environment: BTreeMap::new(),
        flags: Vec::new(),
        mounts: vec![Mount::data_disk()],
        timeout: ONE_DAY.to_string(),
        entrypoint: Some("/bin/bash".to_string()),
    }
}

fn bash_script(commands: &[String]) -> String {
    format!("{BASH_STRICT_PREAMBLE}{}\n", commands.join("\n"))
}

/// Join a docker path onto the fixed mount root.
fn mount_path(docker_path: &str) -> String {
    format!("{DATA_DISK_MOUNT}/{docker_path}")
}

fn copy_command(src: &str, dst: &str) -> String {
    format!("gsutil -mq cp \"{src}\" \"{dst}\"")
}

fn sync_command(src: &str, dst: &str) -> String {
    format!("gsutil -mq rsync -r \"{src}\" \"{dst}\"")
}
