//! Turning raw flag strings into a validated job parameter set.
//!
//! Env flags are `key` or `key=value`; file flags are `uri` or `name=uri`.
//! The builder owns the auto-naming counter for unnamed file parameters, so
//! two independent job builds never interfere.

use tracing::debug;

use super::{EnvParam, FileParam, JobParams, ParamRole};
use crate::error::Result;

/// Split a flag string on the first `=`.
///
/// `name_required` selects which side survives when there is no separator:
/// env flags keep the left side (a bare `KEY` declares an unset variable),
/// file flags keep the right side (a bare value is an unnamed URI).
fn split_pair(arg: &str, name_required: bool) -> (Option<&str>, Option<&str>) {
    match arg.split_once('=') {
        Some((name, value)) => (Some(name), Some(value)),
        None if name_required => (Some(arg), None),
        None => (None, Some(arg)),
    }
}

/// Produces [`FileParam`]s for one role, minting `INPUT_<n>` /
/// `OUTPUT_<n>` names when a flag omits one.
///
/// The auto-index increases monotonically per builder instance and is
/// shared between the plain and recursive classes of the role. Generated
/// names pass the same validation and collision checks as explicit ones.
#[derive(Debug)]
pub struct FileParamBuilder {
    role: ParamRole,
    auto_index: u32,
}

impl FileParamBuilder {
    #[must_use]
    pub fn new(role: ParamRole) -> Self {
        Self {
            role,
            auto_index: 0,
        }
    }

    /// Use the given name, or mint the next auto-generated one.
    fn variable_name(&mut self, name: Option<&str>) -> String {
        match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let name = format!("{}{}", self.role.auto_prefix(), self.auto_index);
                self.auto_index += 1;
                name
            }
        }
    }

    /// Parse one `uri` or `name=uri` flag string into a file parameter.
    pub fn parse(&mut self, arg: &str, recursive: bool) -> Result<FileParam> {
        let (name, value) = split_pair(arg, false);
        let name = self.variable_name(name);
        FileParam::new(name, self.role, value, recursive)
    }
}

/// Parse `key` or `key=value` env flags, collapsing exact repeats.
fn parse_env_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<EnvParam>> {
    let mut params: Vec<EnvParam> = Vec::new();
    for arg in args {
        let (name, value) = split_pair(arg.as_ref(), true);
        let param = EnvParam::new(name.unwrap_or_default(), value.map(str::to_string))?;
        if !params.contains(&param) {
            params.push(param);
        }
    }
    Ok(params)
}

/// Parse one class of file flags, collapsing exact repeats.
fn parse_file_args<S: AsRef<str>>(
    builder: &mut FileParamBuilder,
    args: &[S],
    recursive: bool,
) -> Result<Vec<FileParam>> {
    let mut params: Vec<FileParam> = Vec::new();
    for arg in args {
        let param = builder.parse(arg.as_ref(), recursive)?;
        if !params.contains(&param) {
            params.push(param);
        }
    }
    Ok(params)
}

impl JobParams {
    /// Parse raw flag values for all five parameter classes into one job
    /// parameter set.
    ///
    /// Either of the following is a valid file flag:
    ///
    /// ```text
    /// gs://bucket/file.txt
    /// MYFILE=gs://bucket/file.txt
    /// ```
    ///
    /// Exact duplicate entries within one class are collapsed; names
    /// colliding across classes fail construction with the full duplicate
    /// list.
    pub fn from_args<S: AsRef<str>>(
        envs: &[S],
        inputs: &[S],
        recursive_inputs: &[S],
        outputs: &[S],
        recursive_outputs: &[S],
    ) -> Result<Self> {
        let env_params = parse_env_args(envs)?;

        let mut input_builder = FileParamBuilder::new(ParamRole::Input);
        let input_params = parse_file_args(&mut input_builder, inputs, false)?;
        let recursive_input_params =
            parse_file_args(&mut input_builder, recursive_inputs, true)?;

        let mut output_builder = FileParamBuilder::new(ParamRole::Output);
        let output_params = parse_file_args(&mut output_builder, outputs, false)?;
        let recursive_output_params =
            parse_file_args(&mut output_builder, recursive_outputs, true)?;

        debug!(
            envs = env_params.len(),
            inputs = input_params.len() + recursive_input_params.len(),
            outputs = output_params.len() + recursive_output_params.len(),
            "parsed job parameters"
        );

        Self::new(
            env_params,
            input_params,
            recursive_input_params,
            output_params,
            recursive_output_params,
        )
    }
}
