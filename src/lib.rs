//! # pipesub
//!
//! Build Google Cloud Genomics v2alpha1 pipeline requests from a simple
//! description of a batch job: named environment variables plus input and
//! output files on Google Cloud Storage.
//!
//! The crate is a pure, synchronous transformation chain. Raw flag strings
//! become validated parameters, parameters become a collision-free job
//! parameter set, the set becomes an ordered action list, and everything is
//! assembled into one immutable request document. The same inputs always
//! produce the same document; submission, retries, and execution belong to
//! the caller.
//!
//! ## Modules
//!
//! - `actions` - the ordered stage-in / execute / stage-out execution plan
//! - `constants` - fixed values forming part of the wire contract
//! - `error` - typed validation failures
//! - `params` - parameter parsing, URI-backed file parameters, collision checks
//! - `request` - resource specification and final request assembly
//! - `uri` - storage URI validation and docker-path rewriting
//!
//! ## Example
//!
//! ```
//! use pipesub::actions::{build_actions, UserStep};
//! use pipesub::params::JobParams;
//! use pipesub::request::{create_request, ResourcesConfig};
//!
//! # fn main() -> pipesub::Result<()> {
//! let job = JobParams::from_args(
//!     &["SAMPLE=NA12878"],
//!     &["BAM=gs://my-bucket/sample.bam"],
//!     &[],
//!     &["METRICS=gs://my-bucket/metrics.txt"],
//!     &[],
//! )?;
//! let steps = [UserStep::bash(
//!     "count-reads",
//!     "debian:stable-slim",
//!     "wc -l \"${BAM}\" > \"${METRICS}\"",
//! )];
//! let actions = build_actions(&job, &steps);
//! let resources = ResourcesConfig::new("my-project", "us-central1")?;
//! let request = create_request(&resources, &job, actions, None)?;
//! let body = serde_json::to_string_pretty(&request).expect("document serializes");
//! assert!(body.contains("\"machineType\": \"n1-standard-2\""));
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod constants;
pub mod error;
pub mod params;
pub mod request;
pub mod uri;

pub use error::{Error, Result};
