/*!
# Introduction

kubeadm-ignition generates the first-boot Ignition config for a node joining, or creating, a
Kubernetes cluster with kubeadm.

Given a [`NodeInput`](node::NodeInput), the generated config:
* enables a oneshot `kubeadm.service` that runs `/etc/kubeadm.sh` at boot;
* writes `/etc/kubeadm.sh`, which runs the pre-kubeadm commands, `kubeadm join` or `kubeadm init`,
  removes the kubeadm configuration, and then runs the post-kubeadm commands;
* writes the kubeadm configuration to `/etc/kubeadm.yml`;
* writes the node's files: the base write files for workers, or the cluster certificates for
  control plane nodes, followed by any additional files.

The config is first built as a Container Linux Config and transpiled to Ignition.  If the node
input carries additional Container Linux Config, it's transpiled separately and merged on top.
The merge only ever adds; nothing generated is removed or replaced.

Any diagnostic from transpiling, even a warning, is treated as an error.
*/

#[macro_use]
extern crate log;

pub mod clc;
pub mod ignition;
pub mod node;
pub mod template;
pub mod userdata;

use node::{NodeInput, RoleKind};
use snafu::{ensure, OptionExt, ResultExt};

mod error {
    use crate::node::RoleKind;
    use crate::{clc, template};
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("No node input given"))]
        MissingInput,

        #[snafu(display("Node input for {} node has no user data", role))]
        MissingUserData { role: RoleKind },

        #[snafu(display("Expected input for {} node, got {}", expected, actual))]
        RoleMismatch {
            expected: RoleKind,
            actual: RoleKind,
        },

        #[snafu(display("Failed to render config for {} node: {}", role, source))]
        RenderConfig {
            role: RoleKind,
            source: template::Error,
        },

        #[snafu(display("Failed to convert {} config for {} node: {}", origin, role, source))]
        ConvertConfig {
            role: RoleKind,
            origin: &'static str,
            source: clc::Error,
        },

        #[snafu(display("Failed to serialize Ignition config for {} node: {}", role, source))]
        SerializeIgnition {
            role: RoleKind,
            source: serde_json::Error,
        },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;

impl Error {
    /// Returns true if the error was caused by the node input itself rather than by generating the
    /// config from it.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::MissingInput | Error::MissingUserData { .. } | Error::RoleMismatch { .. }
        )
    }
}

/// Generate the Ignition config for a node of any role.
pub fn generate(input: Option<&NodeInput>) -> Result<Vec<u8>> {
    let input = input.context(error::MissingInputSnafu)?;
    generate_ignition(input)
}

/// Generate the Ignition config for a worker node joining the cluster.
pub fn new_node(input: Option<&NodeInput>) -> Result<Vec<u8>> {
    generate_as(RoleKind::Worker, input)
}

/// Generate the Ignition config for a control plane node joining the cluster.
pub fn new_join_control_plane(input: Option<&NodeInput>) -> Result<Vec<u8>> {
    generate_as(RoleKind::JoinControlPlane, input)
}

/// Generate the Ignition config for the control plane node that initializes the cluster.
pub fn new_init_control_plane(input: Option<&NodeInput>) -> Result<Vec<u8>> {
    generate_as(RoleKind::InitControlPlane, input)
}

/// Render the generated Container Linux Config for a node, before transpiling and before any
/// additional config is merged.
pub fn render_clc(input: &NodeInput) -> Result<String> {
    let role = input.role.kind();
    let bootstrap = bootstrap(input)?;
    template::render(&bootstrap).context(error::RenderConfigSnafu { role })
}

fn generate_as(expected: RoleKind, input: Option<&NodeInput>) -> Result<Vec<u8>> {
    let input = input.context(error::MissingInputSnafu)?;
    let actual = input.role.kind();
    ensure!(
        actual == expected,
        error::RoleMismatchSnafu { expected, actual }
    );
    generate_ignition(input)
}

fn bootstrap(input: &NodeInput) -> Result<template::Bootstrap> {
    let role = input.role.kind();
    let user_data = input
        .user_data
        .as_ref()
        .context(error::MissingUserDataSnafu { role })?;
    Ok(input.role.bootstrap(user_data))
}

fn generate_ignition(input: &NodeInput) -> Result<Vec<u8>> {
    let role = input.role.kind();
    let bootstrap = bootstrap(input)?;
    debug!(
        "Building config for {} node with {} write files",
        role,
        bootstrap.write_files.len()
    );

    let generated = template::build(&bootstrap).context(error::RenderConfigSnafu { role })?;
    let mut config = clc::transpile(&generated).context(error::ConvertConfigSnafu {
        role,
        origin: "generated",
    })?;

    if let Some(additional) = input.additional_config() {
        debug!("Merging additional Container Linux Config for {} node", role);
        trace!("Additional config:\n{}", additional);
        let overlay = clc::to_ignition(additional).context(error::ConvertConfigSnafu {
            role,
            origin: "additional",
        })?;
        config = ignition::merge(config, overlay);
    }

    let output = ignition::to_vec(&config).context(error::SerializeIgnitionSnafu { role })?;
    debug!("Generated {} bytes of Ignition for {} node", output.len(), role);
    Ok(output)
}
