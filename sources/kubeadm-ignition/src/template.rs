//! The template module builds the Container Linux Config skeleton for a node: the kubeadm service
//! unit, the node's write files, the first-boot script and the kubeadm configuration file.
//!
//! The structure is built as typed data so that file contents never need to be re-indented to fit
//! into YAML.  Only the body of the first-boot script is a text template, compiled once per
//! process.

use crate::clc;
use crate::userdata::WriteFile;
use handlebars::Handlebars;
use lazy_static::lazy_static;
use serde::Serialize;
use snafu::ResultExt;

const UNIT_NAME: &str = "kubeadm.service";
const UNIT_CONTENTS: &str = "\
[Unit]
Description=kubeadm
[Service]
# Exits once kubeadm has run; it must not be restarted.
Type=oneshot
ExecStart=/etc/kubeadm.sh
[Install]
WantedBy=multi-user.target
";

pub const SCRIPT_PATH: &str = "/etc/kubeadm.sh";
const SCRIPT_MODE: &str = "0700";
pub const CONFIG_PATH: &str = "/etc/kubeadm.yml";
const CONFIG_MODE: &str = "0600";

const SCRIPT_TEMPLATE_NAME: &str = "kubeadm.sh";
const SCRIPT_TEMPLATE: &str = "\
#!/bin/bash
set -e
{{#each pre_kubeadm_commands}}
{{this}}
{{/each}}

{{kubeadm_command}}
rm /etc/kubeadm.yml
{{#each post_kubeadm_commands}}
{{this}}
{{/each}}
";

lazy_static! {
    // Compiled on first use and only read afterwards.  A template that fails to compile is kept
    // as its error message so that every render reports it instead of panicking.
    static ref REGISTRY: std::result::Result<Handlebars<'static>, String> = build_registry();
}

fn build_registry() -> std::result::Result<Handlebars<'static>, String> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // The script is a shell script, not HTML.
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(SCRIPT_TEMPLATE_NAME, SCRIPT_TEMPLATE)
        .map_err(|e| e.to_string())?;
    Ok(registry)
}

/// Everything needed to build the first-boot configuration of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bootstrap {
    /// Files written in order before the kubeadm script and configuration.
    pub write_files: Vec<WriteFile>,
    pub pre_kubeadm_commands: Vec<String>,
    pub post_kubeadm_commands: Vec<String>,
    /// The full kubeadm command line, e.g. `kubeadm join --config /etc/kubeadm.yml --v=2`.
    pub kubeadm_command: String,
    /// The kubeadm configuration documents written to `/etc/kubeadm.yml`.
    pub kubeadm_config: String,
}

#[derive(Serialize)]
struct ScriptContext<'a> {
    pre_kubeadm_commands: &'a [String],
    kubeadm_command: &'a str,
    post_kubeadm_commands: &'a [String],
}

/// Renders the body of the first-boot script.
fn script(bootstrap: &Bootstrap) -> Result<String> {
    let registry = match &*REGISTRY {
        Ok(registry) => registry,
        Err(message) => {
            return error::RegistrySnafu {
                message: message.clone(),
            }
            .fail()
        }
    };

    let context = ScriptContext {
        pre_kubeadm_commands: &bootstrap.pre_kubeadm_commands,
        kubeadm_command: &bootstrap.kubeadm_command,
        post_kubeadm_commands: &bootstrap.post_kubeadm_commands,
    };
    registry
        .render(SCRIPT_TEMPLATE_NAME, &context)
        .context(error::RenderScriptSnafu)
}

fn inline_file(path: &str, mode: Option<&str>, content: String) -> clc::File {
    clc::File {
        path: path.to_string(),
        mode: mode.map(|m| clc::Mode::Octal(m.to_string())),
        contents: Some(clc::FileContents {
            inline: Some(content),
            remote: None,
        }),
        ..Default::default()
    }
}

/// Build the Container Linux Config for a node.
///
/// Storage files are, in order: the bootstrap's write files, the kubeadm script, and the kubeadm
/// configuration.  Write files with empty permissions get no mode.
pub fn build(bootstrap: &Bootstrap) -> Result<clc::Config> {
    let mut files: Vec<clc::File> = bootstrap
        .write_files
        .iter()
        .map(|f| {
            let mode = Some(f.permissions.as_str()).filter(|p| !p.is_empty());
            inline_file(&f.path, mode, f.content.clone())
        })
        .collect();

    files.push(inline_file(SCRIPT_PATH, Some(SCRIPT_MODE), script(bootstrap)?));
    files.push(inline_file(
        CONFIG_PATH,
        Some(CONFIG_MODE),
        format!("---\n{}", bootstrap.kubeadm_config),
    ));

    Ok(clc::Config {
        systemd: Some(clc::Systemd {
            units: vec![clc::Unit {
                name: UNIT_NAME.to_string(),
                enabled: Some(true),
                contents: Some(UNIT_CONTENTS.to_string()),
                ..Default::default()
            }],
        }),
        storage: Some(clc::Storage {
            files,
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Render the Container Linux Config for a node as YAML source.
pub fn render(bootstrap: &Bootstrap) -> Result<String> {
    let config = build(bootstrap)?;
    serde_yaml::to_string(&config).context(error::SerializeSourceSnafu)
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Unable to build template registry: {}", message))]
        Registry { message: String },

        #[snafu(display("Unable to render kubeadm script: {}", source))]
        RenderScript { source: handlebars::RenderError },

        #[snafu(display("Unable to serialize Container Linux Config: {}", source))]
        SerializeSource { source: serde_yaml::Error },
    }
}
pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
