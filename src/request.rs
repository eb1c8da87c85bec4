//! Resource specification and final request assembly.
//!
//! [`create_request`] is the sole consumer of every other component: it
//! merges the job's environment bindings, embeds the resource shape, and
//! produces the immutable [`RequestDocument`], the terminal artifact of the
//! whole pipeline. Serializing it with `serde_json` yields the v2alpha1
//! pipelines API request body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionSpec;
use crate::constants::{
    DATA_DISK_MOUNT, DATA_DISK_NAME, DEFAULT_DISK_SIZE_GB, DEFAULT_MACHINE_TYPE, DEFAULT_SCOPE,
    SEVEN_DAYS,
};
use crate::error::{Error, Result};
use crate::params::JobParams;

/// Machine and project resources for one pipeline run.
///
/// Built once with [`ResourcesConfig::new`] plus `with_*` customization;
/// never mutated after the request is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcesConfig {
    /// Google Cloud Platform project id.
    pub project: String,
    /// Compute region where the work will be done.
    pub region: String,
    pub machine_type: String,
    pub disk_size_gb: u32,
    /// Service account email; the pipelines API falls back to the compute
    /// service account when absent.
    pub service_account: Option<String>,
    pub scopes: Vec<String>,
}

impl ResourcesConfig {
    /// Create a resource spec with defaults for everything but project and
    /// region.
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Result<Self> {
        let project = project.into();
        let region = region.into();
        if project.is_empty() {
            return Err(Error::Configuration("a project id is required".to_string()));
        }
        if region.is_empty() {
            return Err(Error::Configuration(
                "a compute region is required".to_string(),
            ));
        }
        Ok(Self {
            project,
            region,
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            disk_size_gb: DEFAULT_DISK_SIZE_GB,
            service_account: None,
            scopes: vec![DEFAULT_SCOPE.to_string()],
        })
    }

    #[must_use]
    pub fn with_machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.machine_type = machine_type.into();
        self
    }

    #[must_use]
    pub fn with_disk_size_gb(mut self, size_gb: u32) -> Self {
        self.disk_size_gb = size_gb;
        self
    }

    #[must_use]
    pub fn with_service_account(mut self, email: impl Into<String>) -> Self {
        self.service_account = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

/// `serviceAccount` block of the virtual machine resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One attached disk of the virtual machine resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    pub size_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub machine_type: String,
    pub preemptible: bool,
    pub disks: Vec<Disk>,
    pub service_account: ServiceAccount,
}

/// `resources` block of the pipeline request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub project_id: String,
    pub regions: Vec<String>,
    pub virtual_machine: VirtualMachine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub actions: Vec<ActionSpec>,
    pub resources: Resources,
    pub environment: BTreeMap<String, String>,
    pub timeout: String,
}

/// The terminal artifact: one immutable request document per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDocument {
    pub pipeline: Pipeline,
    pub labels: BTreeMap<String, String>,
}

/// Assemble the final request document.
///
/// The merged environment exports every parameter to every action: file
/// parameters contribute their mount-root-joined docker path, env
/// parameters their literal value. `timeout` bounds the whole pipeline and
/// defaults to seven days.
pub fn create_request(
    resources: &ResourcesConfig,
    job: &JobParams,
    actions: Vec<ActionSpec>,
    timeout: Option<&str>,
) -> Result<RequestDocument> {
    let environment = merge_environment(job)?;
    let document = RequestDocument {
        pipeline: Pipeline {
            actions,
            resources: create_resources(resources)?,
            environment,
            timeout: timeout.unwrap_or(SEVEN_DAYS).to_string(),
        },
        labels: BTreeMap::from([("pipesub".to_string(), "v1".to_string())]),
    };
    debug!(project = %resources.project, "assembled pipeline request");
    Ok(document)
}

/// Flatten every parameter class into one name-to-value map.
///
/// Re-checks name uniqueness during the merge; a hit here means a
/// [`JobParams`] invariant was bypassed, and the same full-duplicate-list
/// error is raised rather than silently overwriting a binding.
fn merge_environment(job: &JobParams) -> Result<BTreeMap<String, String>> {
    let mut environment: BTreeMap<String, String> = BTreeMap::new();
    let mut duplicates: Vec<String> = Vec::new();
    for env in &job.envs {
        let value = env.value.clone().unwrap_or_default();
        if environment.insert(env.name.clone(), value).is_some() {
            duplicates.push(env.name.clone());
        }
    }
    for file in job.file_params() {
        let value = file
            .docker_path
            .as_ref()
            .map(|docker_path| format!("{DATA_DISK_MOUNT}/{docker_path}"))
            .unwrap_or_default();
        if environment.insert(file.name.clone(), value).is_some() {
            duplicates.push(file.name.clone());
        }
    }
    if duplicates.is_empty() {
        Ok(environment)
    } else {
        Err(Error::Collision(duplicates))
    }
}

/// Build the `resources` payload of the pipeline request.
fn create_resources(config: &ResourcesConfig) -> Result<Resources> {
    if config.disk_size_gb == 0 {
        return Err(Error::Configuration(
            "the working disk size must be at least 1 GB".to_string(),
        ));
    }
    Ok(Resources {
        project_id: config.project.clone(),
        regions: vec![config.region.clone()],
        virtual_machine: VirtualMachine {
            machine_type: config.machine_type.clone(),
            preemptible: false,
            disks: vec![Disk {
                name: DATA_DISK_NAME.to_string(),
                size_gb: config.disk_size_gb,
            }],
            service_account: ServiceAccount {
                scopes: config.scopes.clone(),
                email: config.service_account.clone(),
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::build_actions;
    use serde_json::json;

    fn sample_job() -> JobParams {
        JobParams::from_args(
            &["A=hello"],
            &["F1=gs://bucket/myfile.txt"],
            &["F2=gs://bucket/dir/"],
            &["FO1=gs://bucket/out.txt"],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_resources_config_defaults() {
        let config = ResourcesConfig::new("my-project", "us-central1").unwrap();
        assert_eq!(config.machine_type, DEFAULT_MACHINE_TYPE);
        assert_eq!(config.disk_size_gb, DEFAULT_DISK_SIZE_GB);
        assert_eq!(config.service_account, None);
        assert_eq!(config.scopes, vec![DEFAULT_SCOPE.to_string()]);
    }

    #[test]
    fn test_resources_config_requires_project_and_region() {
        assert!(matches!(
            ResourcesConfig::new("", "us-central1").unwrap_err(),
            Error::Configuration(_)
        ));
        assert!(matches!(
            ResourcesConfig::new("my-project", "").unwrap_err(),
            Error::Configuration(_)
        ));
    }

    #[test]
    fn test_zero_disk_size_is_rejected() {
        let config = ResourcesConfig::new("my-project", "us-central1")
            .unwrap()
            .with_disk_size_gb(0);
        let err = create_request(&config, &sample_job(), Vec::new(), None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_merged_environment_values() {
        let environment = merge_environment(&sample_job()).unwrap();
        assert_eq!(environment["A"], "hello");
        assert_eq!(environment["F1"], "/mnt/data/gs/bucket/myfile.txt");
        assert_eq!(environment["F2"], "/mnt/data/gs/bucket/dir/");
        assert_eq!(environment["FO1"], "/mnt/data/gs/bucket/out.txt");
        assert_eq!(environment.len(), 4);
    }

    #[test]
    fn test_unset_parameters_export_empty_values() {
        let job = JobParams::from_args(&["FLAG"], &["MAYBE="], &[], &[], &[]).unwrap();
        let environment = merge_environment(&job).unwrap();
        assert_eq!(environment["FLAG"], "");
        assert_eq!(environment["MAYBE"], "");
    }

    #[test]
    fn test_request_defaults_to_a_seven_day_timeout() {
        let config = ResourcesConfig::new("my-project", "us-central1").unwrap();
        let request = create_request(&config, &sample_job(), Vec::new(), None).unwrap();
        assert_eq!(request.pipeline.timeout, SEVEN_DAYS);

        let request = create_request(&config, &sample_job(), Vec::new(), Some("3600s")).unwrap();
        assert_eq!(request.pipeline.timeout, "3600s");
    }

    #[test]
    fn test_request_carries_the_fixed_labels() {
        let config = ResourcesConfig::new("my-project", "us-central1").unwrap();
        let request = create_request(&config, &sample_job(), Vec::new(), None).unwrap();
        assert_eq!(request.labels.get("pipesub").map(String::as_str), Some("v1"));
    }

    #[test]
    fn test_resources_serialize_to_the_wire_shape() {
        let config = ResourcesConfig::new("my-project", "us-west1")
            .unwrap()
            .with_machine_type("n1-highmem-4")
            .with_disk_size_gb(500)
            .with_service_account("worker@my-project.iam.gserviceaccount.com");
        let resources = create_resources(&config).unwrap();
        assert_eq!(
            serde_json::to_value(&resources).unwrap(),
            json!({
                "projectId": "my-project",
                "regions": ["us-west1"],
                "virtualMachine": {
                    "machineType": "n1-highmem-4",
                    "preemptible": false,
                    "disks": [
                        {"name": DATA_DISK_NAME, "sizeGb": 500}
                    ],
                    "serviceAccount": {
                        "scopes": [DEFAULT_SCOPE],
                        "email": "worker@my-project.iam.gserviceaccount.com"
                    }
                }
            })
        );
    }

    #[test]
    fn test_service_account_email_is_omitted_when_unset() {
        let config = ResourcesConfig::new("my-project", "us-west1").unwrap();
        let value = serde_json::to_value(create_resources(&config).unwrap()).unwrap();
        assert!(value["virtualMachine"]["serviceAccount"].get("email").is_none());
    }

    #[test]
    fn test_request_actions_pass_through_in_order() {
        let config = ResourcesConfig::new("my-project", "us-central1").unwrap();
        let job = sample_job();
        let actions = build_actions(&job, &[]);
        let request = create_request(&config, &job, actions, None).unwrap();
        let names: Vec<&str> = request
            .pipeline
            .actions
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["localize", "delocalize"]);
    }
}
