//! The node module contains the per-node input: the base user data, the node's role in the
//! cluster along with that role's kubeadm configuration, and any extra Container Linux Config to
//! merge on top of the generated one.
//!
//! A node input is usually loaded from TOML:
//!
//! ```toml
//! [user-data]
//! pre-kubeadm-commands = ["hostnamectl set-hostname worker-0"]
//!
//! [role]
//! type = "worker"
//! join-configuration = "kind: JoinConfiguration"
//!
//! [ignition.container-linux-config]
//! additional-config = "..."
//! ```

use crate::template::{Bootstrap, CONFIG_PATH};
use crate::userdata::{AsFiles, BaseUserData, Certificates};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything needed to generate the first-boot configuration of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeInput {
    pub user_data: Option<BaseUserData>,
    pub role: Role,
    pub ignition: Option<IgnitionConfig>,
}

impl NodeInput {
    /// Returns the caller's additional Container Linux Config, if there is any besides whitespace.
    pub fn additional_config(&self) -> Option<&str> {
        self.ignition
            .as_ref()
            .and_then(|i| i.container_linux_config.as_ref())
            .map(|c| c.additional_config.as_str())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Caller-supplied additions to the generated config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IgnitionConfig {
    pub container_linux_config: Option<ContainerLinuxConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContainerLinuxConfig {
    /// Container Linux Config YAML merged additively into the generated config.
    #[serde(default)]
    pub additional_config: String,
}

/// The part a node plays when it comes up, with the kubeadm configuration for that part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Role {
    Worker(Worker),
    JoinControlPlane(JoinControlPlane),
    InitControlPlane(InitControlPlane),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Worker {
    #[serde(default)]
    pub join_configuration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JoinControlPlane {
    #[serde(default)]
    pub certificates: Certificates,
    #[serde(default)]
    pub join_configuration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InitControlPlane {
    #[serde(default)]
    pub certificates: Certificates,
    #[serde(default)]
    pub cluster_configuration: String,
    #[serde(default)]
    pub init_configuration: String,
}

/// The role of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Worker,
    JoinControlPlane,
    InitControlPlane,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::Worker => write!(f, "worker"),
            RoleKind::JoinControlPlane => write!(f, "join-control-plane"),
            RoleKind::InitControlPlane => write!(f, "init-control-plane"),
        }
    }
}

fn kubeadm_command(subcommand: &str, user_data: &BaseUserData) -> String {
    format!(
        "kubeadm {} --config {} {}",
        subcommand,
        CONFIG_PATH,
        user_data.verbosity_flag()
    )
    .trim_end()
    .to_string()
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Worker(_) => RoleKind::Worker,
            Role::JoinControlPlane(_) => RoleKind::JoinControlPlane,
            Role::InitControlPlane(_) => RoleKind::InitControlPlane,
        }
    }

    /// Computes the bootstrap descriptor for this role.  Control plane roles write their
    /// certificates in place of the base write files; the additional files always come last.
    pub(crate) fn bootstrap(&self, user_data: &BaseUserData) -> Bootstrap {
        let (mut write_files, kubeadm_command, kubeadm_config) = match self {
            Role::Worker(w) => (
                user_data.write_files.clone(),
                kubeadm_command("join", user_data),
                w.join_configuration.clone(),
            ),
            Role::JoinControlPlane(j) => (
                j.certificates.as_files(),
                kubeadm_command("join", user_data),
                j.join_configuration.clone(),
            ),
            Role::InitControlPlane(i) => (
                i.certificates.as_files(),
                kubeadm_command("init", user_data),
                format!("{}\n---\n{}", i.cluster_configuration, i.init_configuration),
            ),
        };
        write_files.extend(user_data.additional_files.iter().cloned());

        Bootstrap {
            write_files,
            pre_kubeadm_commands: user_data.pre_kubeadm_commands.clone(),
            post_kubeadm_commands: user_data.post_kubeadm_commands.clone(),
            kubeadm_command,
            kubeadm_config,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::userdata::{Certificate, Purpose, WriteFile};

    fn write_file(path: &str) -> WriteFile {
        WriteFile {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn user_data() -> BaseUserData {
        BaseUserData {
            write_files: vec![write_file("/etc/base")],
            additional_files: vec![write_file("/etc/extra")],
            pre_kubeadm_commands: vec!["echo pre".to_string()],
            post_kubeadm_commands: vec!["echo post".to_string()],
            kubeadm_verbosity: Some(2),
        }
    }

    fn certificates() -> Certificates {
        Certificates(vec![Certificate {
            purpose: Purpose::ClusterCa,
            cert_file: None,
            key_file: None,
            cert: "cert".to_string(),
            key: "key".to_string(),
        }])
    }

    fn paths(bootstrap: &Bootstrap) -> Vec<&str> {
        bootstrap.write_files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn worker() {
        let role = Role::Worker(Worker {
            join_configuration: "kind: JoinConfiguration".to_string(),
        });
        let bootstrap = role.bootstrap(&user_data());
        assert_eq!(paths(&bootstrap), vec!["/etc/base", "/etc/extra"]);
        assert_eq!(
            bootstrap.kubeadm_command,
            "kubeadm join --config /etc/kubeadm.yml --v=2"
        );
        assert_eq!(bootstrap.kubeadm_config, "kind: JoinConfiguration");
        assert_eq!(bootstrap.pre_kubeadm_commands, vec!["echo pre"]);
        assert_eq!(bootstrap.post_kubeadm_commands, vec!["echo post"]);
    }

    #[test]
    fn join_control_plane() {
        let role = Role::JoinControlPlane(JoinControlPlane {
            certificates: certificates(),
            join_configuration: "kind: JoinConfiguration".to_string(),
        });
        let bootstrap = role.bootstrap(&user_data());
        assert_eq!(
            paths(&bootstrap),
            vec![
                "/etc/kubernetes/pki/ca.crt",
                "/etc/kubernetes/pki/ca.key",
                "/etc/extra"
            ]
        );
        assert!(bootstrap.kubeadm_command.starts_with("kubeadm join "));
    }

    #[test]
    fn init_control_plane() {
        let role = Role::InitControlPlane(InitControlPlane {
            certificates: certificates(),
            cluster_configuration: "kind: ClusterConfiguration".to_string(),
            init_configuration: "kind: InitConfiguration".to_string(),
        });
        let mut user_data = user_data();
        user_data.kubeadm_verbosity = None;
        let bootstrap = role.bootstrap(&user_data);
        assert_eq!(bootstrap.write_files.len(), 3);
        assert_eq!(
            bootstrap.kubeadm_command,
            "kubeadm init --config /etc/kubeadm.yml"
        );
        assert_eq!(
            bootstrap.kubeadm_config,
            "kind: ClusterConfiguration\n---\nkind: InitConfiguration"
        );
    }

    #[test]
    fn additional_config() {
        let mut input = NodeInput {
            user_data: None,
            role: Role::Worker(Worker::default()),
            ignition: None,
        };
        assert_eq!(input.additional_config(), None);

        input.ignition = Some(IgnitionConfig {
            container_linux_config: Some(ContainerLinuxConfig {
                additional_config: " \n".to_string(),
            }),
        });
        assert_eq!(input.additional_config(), None);

        input.ignition = Some(IgnitionConfig {
            container_linux_config: Some(ContainerLinuxConfig {
                additional_config: "passwd: {}\n".to_string(),
            }),
        });
        assert_eq!(input.additional_config(), Some("passwd: {}\n"));
    }

    #[test]
    fn deserialize_toml() {
        let input: NodeInput = toml::from_str(
            r#"
[user-data]
kubeadm-verbosity = 1

[role]
type = "join-control-plane"
join-configuration = "kind: JoinConfiguration"

[[role.certificates]]
purpose = "etcd-ca"
cert = "etcd cert"
"#,
        )
        .unwrap();

        assert_eq!(input.role.kind(), RoleKind::JoinControlPlane);
        assert_eq!(input.role.kind().to_string(), "join-control-plane");
        assert!(input.ignition.is_none());
        match input.role {
            Role::JoinControlPlane(j) => {
                assert_eq!(j.certificates.0[0].purpose, Purpose::EtcdCa);
                assert_eq!(j.join_configuration, "kind: JoinConfiguration");
            }
            r => panic!("unexpected role {:?}", r),
        }
    }

    #[test]
    fn unknown_role() {
        let result = toml::from_str::<NodeInput>("[role]\ntype = \"observer\"\n");
        assert!(result.is_err());
    }
}
