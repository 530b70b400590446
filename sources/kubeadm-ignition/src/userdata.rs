//! The userdata module contains the base user-data descriptor shared by every node role: the files
//! to write, the commands to run around kubeadm, and the kubeadm verbosity.  It also contains the
//! certificates that control plane nodes need on disk before kubeadm runs.

use serde::{Deserialize, Serialize};

/// Directory kubeadm expects the cluster PKI to live in.
const PKI_DIR: &str = "/etc/kubernetes/pki";

// Certificates are group-readable; keys are owner-only.
const CERT_PERMISSIONS: &str = "0640";
const KEY_PERMISSIONS: &str = "0600";

/// A file to be written to the node on first boot.
///
/// An empty `permissions` string means the file is written with the default mode of the target
/// configuration format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WriteFile {
    pub path: String,
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub content: String,
}

/// The user-data common to all node roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BaseUserData {
    /// Files written on worker nodes.  Control plane nodes write their certificates instead.
    #[serde(default)]
    pub write_files: Vec<WriteFile>,
    /// Caller-supplied files appended after the write files and any certificates.
    #[serde(default)]
    pub additional_files: Vec<WriteFile>,
    #[serde(default)]
    pub pre_kubeadm_commands: Vec<String>,
    #[serde(default)]
    pub post_kubeadm_commands: Vec<String>,
    /// Value passed to kubeadm's `--v` flag, if any.
    pub kubeadm_verbosity: Option<u32>,
}

impl BaseUserData {
    /// Returns the kubeadm verbosity flag, or an empty string if no verbosity was requested.
    pub(crate) fn verbosity_flag(&self) -> String {
        self.kubeadm_verbosity
            .map(|v| format!("--v={}", v))
            .unwrap_or_default()
    }
}

/// Types implement this trait if they can be written to the node as a list of files.
pub trait AsFiles {
    fn as_files(&self) -> Vec<WriteFile>;
}

/// The purpose of a certificate in the cluster PKI, which determines where kubeadm looks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    ClusterCa,
    EtcdCa,
    FrontProxyCa,
    ServiceAccount,
}

impl Purpose {
    fn default_cert_file(&self) -> String {
        let name = match self {
            Purpose::ClusterCa => "ca.crt",
            Purpose::EtcdCa => "etcd/ca.crt",
            Purpose::FrontProxyCa => "front-proxy-ca.crt",
            // The service account "certificate" is really just the public key.
            Purpose::ServiceAccount => "sa.pub",
        };
        format!("{}/{}", PKI_DIR, name)
    }

    fn default_key_file(&self) -> String {
        let name = match self {
            Purpose::ClusterCa => "ca.key",
            Purpose::EtcdCa => "etcd/ca.key",
            Purpose::FrontProxyCa => "front-proxy-ca.key",
            Purpose::ServiceAccount => "sa.key",
        };
        format!("{}/{}", PKI_DIR, name)
    }
}

/// A single certificate/key pair from the cluster PKI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Certificate {
    pub purpose: Purpose,
    /// Overrides the default location of the certificate for this purpose.
    pub cert_file: Option<String>,
    /// Overrides the default location of the key for this purpose.
    pub key_file: Option<String>,
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
}

impl Certificate {
    pub fn cert_file(&self) -> String {
        self.cert_file
            .clone()
            .unwrap_or_else(|| self.purpose.default_cert_file())
    }

    pub fn key_file(&self) -> String {
        self.key_file
            .clone()
            .unwrap_or_else(|| self.purpose.default_key_file())
    }
}

impl AsFiles for Certificate {
    fn as_files(&self) -> Vec<WriteFile> {
        let mut files = Vec::with_capacity(2);
        if !self.cert.is_empty() {
            files.push(WriteFile {
                path: self.cert_file(),
                permissions: CERT_PERMISSIONS.to_string(),
                content: self.cert.clone(),
            });
        }
        if !self.key.is_empty() {
            files.push(WriteFile {
                path: self.key_file(),
                permissions: KEY_PERMISSIONS.to_string(),
                content: self.key.clone(),
            });
        }
        files
    }
}

/// The ordered set of certificates a control plane node needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Certificates(pub Vec<Certificate>);

impl AsFiles for Certificates {
    fn as_files(&self) -> Vec<WriteFile> {
        self.0.iter().flat_map(|c| c.as_files()).collect()
    }
}
