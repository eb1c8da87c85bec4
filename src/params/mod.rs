//! Typed job parameters: environment variables and input/output files.
//!
//! Parameters are validated at construction: a [`FileParam`] or
//! [`JobParams`] value is either fully valid or never produced. Name
//! validation follows POSIX shell conventions so every parameter can be
//! exported as an environment variable inside the container.

mod builder;

pub use builder::FileParamBuilder;

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::uri::{self, UriParts};

/// POSIX 3.235 Name: a word consisting solely of underscores, digits, and
/// alphabetics from the portable character set, not starting with a digit.
static PARAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static pattern compiles"));

/// Parameter class named in validation error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    EnvironmentVariable,
    InputParameter,
    OutputParameter,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamKind::EnvironmentVariable => "environment variable",
            ParamKind::InputParameter => "input parameter",
            ParamKind::OutputParameter => "output parameter",
        })
    }
}

/// Validate that `name` follows POSIX conventions for shell variable names.
pub(crate) fn validate_param_name(name: &str, kind: ParamKind) -> Result<()> {
    if PARAM_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::Name {
            kind,
            name: name.to_string(),
        })
    }
}

/// Name/value environment variable parameter for a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvParam {
    /// Parameter and environment variable name.
    pub name: String,
    /// Literal value; `None` declares the variable without one.
    pub value: Option<String>,
}

impl EnvParam {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Result<Self> {
        let name = name.into();
        validate_param_name(&name, ParamKind::EnvironmentVariable)?;
        Ok(Self { name, value })
    }
}

/// Whether a file parameter is localized into the container before the user
/// steps run or delocalized back out afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    Input,
    Output,
}

impl ParamRole {
    /// Prefix for auto-generated parameter names.
    pub(crate) fn auto_prefix(self) -> &'static str {
        match self {
            ParamRole::Input => "INPUT_",
            ParamRole::Output => "OUTPUT_",
        }
    }

    pub(crate) fn kind(self) -> ParamKind {
        match self {
            ParamRole::Input => ParamKind::InputParameter,
            ParamRole::Output => ParamKind::OutputParameter,
        }
    }
}

/// File parameter to be automatically localized or delocalized.
///
/// Input files are copied onto the pipeline VM's working disk before the
/// user steps run; output files are copied back out to their remote URI
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileParam {
    /// Parameter and environment variable name.
    pub name: String,
    /// Localization direction.
    pub role: ParamRole,
    /// Original value given by the user, if any.
    pub value: Option<String>,
    /// On-VM location relative to the mount root; also exported as the
    /// environment variable value. `None` for a declared-but-unset
    /// parameter.
    pub docker_path: Option<String>,
    /// Validated split of the external URI.
    pub uri: Option<UriParts>,
    /// Whether tree synchronization is wanted instead of a single-file copy.
    pub recursive: bool,
}

impl FileParam {
    /// Validate the name, normalize `raw_uri`, and build the parameter.
    ///
    /// An absent or empty `raw_uri` produces a declared-but-unset parameter
    /// carrying only the name, for declaring optional parameters in a
    /// template without a value.
    pub fn new(
        name: impl Into<String>,
        role: ParamRole,
        raw_uri: Option<&str>,
        recursive: bool,
    ) -> Result<Self> {
        let name = name.into();
        validate_param_name(&name, role.kind())?;
        match raw_uri.filter(|value| !value.is_empty()) {
            None => Ok(Self {
                name,
                role,
                value: None,
                docker_path: None,
                uri: None,
                recursive,
            }),
            Some(raw) => {
                let (docker_path, parts) = uri::normalize(raw, recursive)?;
                Ok(Self {
                    name,
                    role,
                    value: Some(raw.to_string()),
                    docker_path: Some(docker_path),
                    uri: Some(parts),
                    recursive,
                })
            }
        }
    }
}

/// The validated, collision-free aggregate of all parameters for one job.
///
/// The five collections are disjoint by construction: the union of all
/// member names is duplicate-free, and encounter order is preserved within
/// each class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    pub envs: Vec<EnvParam>,
    pub inputs: Vec<FileParam>,
    pub recursive_inputs: Vec<FileParam>,
    pub outputs: Vec<FileParam>,
    pub recursive_outputs: Vec<FileParam>,
}

impl JobParams {
    /// Assemble a job parameter set, enforcing global name uniqueness.
    ///
    /// On failure the [`Error::Collision`] lists every offending name, so
    /// all conflicts can be fixed in one pass.
    pub fn new(
        envs: Vec<EnvParam>,
        inputs: Vec<FileParam>,
        recursive_inputs: Vec<FileParam>,
        outputs: Vec<FileParam>,
        recursive_outputs: Vec<FileParam>,
    ) -> Result<Self> {
        let params = Self {
            envs,
            inputs,
            recursive_inputs,
            outputs,
            recursive_outputs,
        };
        params.check_for_collisions()?;
        Ok(params)
    }

    /// Every file parameter across the four file classes, in class order.
    pub fn file_params(&self) -> impl Iterator<Item = &FileParam> {
        self.inputs
            .iter()
            .chain(&self.recursive_inputs)
            .chain(&self.outputs)
            .chain(&self.recursive_outputs)
    }

    /// Every parameter name across all five classes, in class order.
    fn names(&self) -> impl Iterator<Item = &str> {
        self.envs
            .iter()
            .map(|env| env.name.as_str())
            .chain(self.file_params().map(|file| file.name.as_str()))
    }

    fn check_for_collisions(&self) -> Result<()> {
        let mut known: HashSet<&str> = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for name in self.names() {
            if !known.insert(name) {
                duplicates.push(name.to_string());
            }
        }
        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(Error::Collision(duplicates))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names_round_trip() {
        for name in ["A", "_private", "VAR_2", "lower_case", "X9"] {
            let param = EnvParam::new(name, Some("v".to_string())).unwrap();
            assert_eq!(param.name, name);
        }
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for name in ["1BAD", "has-dash", "", "with space", "dotted.name", "a$b"] {
            let err = EnvParam::new(name, None).unwrap_err();
            assert!(
                matches!(&err, Error::Name { kind: ParamKind::EnvironmentVariable, name: n } if n == name),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_file_param_name_validation_reports_the_role() {
        let err = FileParam::new("bad-name", ParamRole::Input, None, false).unwrap_err();
        assert!(matches!(
            err,
            Error::Name {
                kind: ParamKind::InputParameter,
                ..
            }
        ));
        let err = FileParam::new("bad-name", ParamRole::Output, None, false).unwrap_err();
        assert!(matches!(
            err,
            Error::Name {
                kind: ParamKind::OutputParameter,
                ..
            }
        ));
    }

    #[test]
    fn test_file_param_carries_both_renderings() {
        let param = FileParam::new(
            "BAM",
            ParamRole::Input,
            Some("gs://bucket/sample.bam"),
            false,
        )
        .unwrap();
        assert_eq!(param.value.as_deref(), Some("gs://bucket/sample.bam"));
        assert_eq!(param.docker_path.as_deref(), Some("gs/bucket/sample.bam"));
        assert_eq!(param.uri.unwrap().uri(), "gs://bucket/sample.bam");
    }

    #[test]
    fn test_unset_file_param_has_no_paths() {
        for raw in [None, Some("")] {
            let param = FileParam::new("MAYBE", ParamRole::Output, raw, false).unwrap();
            assert_eq!(param.value, None);
            assert_eq!(param.docker_path, None);
            assert_eq!(param.uri, None);
        }
    }

    #[test]
    fn test_collision_lists_every_duplicate() {
        let envs = vec![EnvParam::new("A", Some("1".to_string())).unwrap()];
        let inputs = vec![FileParam::new(
            "A",
            ParamRole::Input,
            Some("gs://bucket/a.txt"),
            false,
        )
        .unwrap()];
        let outputs = vec![FileParam::new(
            "B",
            ParamRole::Output,
            Some("gs://bucket/b.txt"),
            false,
        )
        .unwrap()];
        let recursive_outputs =
            vec![FileParam::new("B", ParamRole::Output, Some("gs://bucket/dir/"), true).unwrap()];

        let err =
            JobParams::new(envs, inputs, Vec::new(), outputs, recursive_outputs).unwrap_err();
        match err {
            Error::Collision(names) => assert_eq!(names, vec!["A", "B"]),
            other => panic!("expected a collision error, got: {other}"),
        }
    }

    #[test]
    fn test_disjoint_names_are_accepted() {
        let envs = vec![EnvParam::new("A", Some("1".to_string())).unwrap()];
        let inputs = vec![
            FileParam::new("F1", ParamRole::Input, Some("gs://bucket/f1.txt"), false).unwrap(),
        ];
        let params = JobParams::new(envs, inputs, Vec::new(), Vec::new(), Vec::new()).unwrap();
        assert_eq!(params.file_params().count(), 1);
    }
}
