//! Conversion from a Container Linux Config to Ignition.  Validation happens as we go; anything
//! that Ignition would refuse to apply is recorded in the report, and the offending value is still
//! converted as well as it can be so that one run reports every problem.

use super::{Config, FileContents, Hash, Mode, Owner, Report, Verification};
use crate::ignition;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters left alone when building a `data:` URL, following the RFC 2396 unreserved and
/// reserved sets.
const DATA_URL_CHARS: &AsciiSet = &NON_ALPHANUMERIC
    // unreserved marks
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    // reserved
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',');

const DEFAULT_FILESYSTEM: &str = "root";
const MAX_MODE: i64 = 0o7777;
const HASH_FUNCTION: &str = "sha512";
const SHA512_HEX_LEN: usize = 128;
const URL_SCHEMES: &[&str] = &["http", "https", "tftp", "s3", "data"];
const UNIT_SUFFIXES: &[&str] = &[
    ".service",
    ".socket",
    ".device",
    ".mount",
    ".automount",
    ".swap",
    ".target",
    ".path",
    ".timer",
    ".snapshot",
    ".slice",
    ".scope",
];
const NETWORKD_SUFFIXES: &[&str] = &[".network", ".netdev", ".link"];

/// Encode file contents as a `data:` URL.
pub(crate) fn data_url(contents: &str) -> String {
    format!("data:,{}", utf8_percent_encode(contents, DATA_URL_CHARS))
}

/// Convert a Container Linux Config to Ignition, returning every problem found along the way.
pub fn convert(config: &Config) -> (ignition::Config, Report) {
    let mut converter = Converter::default();
    let ignition = converter.config(config);
    (ignition, converter.report)
}

#[derive(Default)]
struct Converter {
    report: Report,
}

impl Converter {
    fn config(&mut self, config: &Config) -> ignition::Config {
        let mut out = ignition::Config::default();

        if let Some(ignition) = &config.ignition {
            if let Some(c) = &ignition.config {
                out.ignition.config.append = c
                    .append
                    .iter()
                    .enumerate()
                    .map(|(i, r)| self.reference(&format!("ignition.config.append[{}]", i), r))
                    .collect();
                out.ignition.config.replace = c
                    .replace
                    .as_ref()
                    .map(|r| self.reference("ignition.config.replace", r));
            }
            if let Some(tls) = ignition.security.as_ref().and_then(|s| s.tls.as_ref()) {
                out.ignition.security.tls.certificate_authorities = tls
                    .certificate_authorities
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        let at = format!("ignition.security.tls.certificate_authorities[{}]", i);
                        self.reference(&at, r)
                    })
                    .collect();
            }
            if let Some(timeouts) = &ignition.timeouts {
                self.timeout("http_response_headers", timeouts.http_response_headers);
                self.timeout("http_total", timeouts.http_total);
                out.ignition.timeouts = ignition::Timeouts {
                    http_response_headers: timeouts.http_response_headers,
                    http_total: timeouts.http_total,
                };
            }
        }

        if let Some(storage) = &config.storage {
            for (i, f) in storage.files.iter().enumerate() {
                let file = self.file(&format!("storage.files[{}]", i), f);
                out.storage.files.push(file);
            }
            for (i, d) in storage.directories.iter().enumerate() {
                let at = format!("storage.directories[{}]", i);
                self.path(&at, &d.path);
                out.storage.directories.push(ignition::Directory {
                    filesystem: filesystem(d.filesystem.as_deref()),
                    group: d.group.as_ref().map(owner),
                    overwrite: d.overwrite,
                    path: d.path.clone(),
                    user: d.user.as_ref().map(owner),
                    mode: self.mode(&at, d.mode.as_ref()),
                });
            }
            for (i, l) in storage.links.iter().enumerate() {
                let at = format!("storage.links[{}]", i);
                self.path(&at, &l.path);
                if l.target.is_empty() {
                    self.report.add_error(format!("{}: link has no target", at));
                }
                out.storage.links.push(ignition::Link {
                    filesystem: filesystem(l.filesystem.as_deref()),
                    group: l.group.as_ref().map(owner),
                    overwrite: l.overwrite,
                    path: l.path.clone(),
                    user: l.user.as_ref().map(owner),
                    hard: l.hard,
                    target: l.target.clone(),
                });
            }
        }

        if let Some(systemd) = &config.systemd {
            for (i, u) in systemd.units.iter().enumerate() {
                let at = format!("systemd.units[{}]", i);
                self.unit_name(&at, &u.name, UNIT_SUFFIXES);
                if u.enabled == Some(true) && u.mask {
                    self.report
                        .add_warning(format!("{}: unit '{}' is both enabled and masked", at, u.name));
                }
                self.unit_contents(&at, u.contents.as_deref());

                let mut dropins = Vec::with_capacity(u.dropins.len());
                for (j, d) in u.dropins.iter().enumerate() {
                    let at = format!("{}.dropins[{}]", at, j);
                    if !d.name.ends_with(".conf") {
                        self.report.add_error(format!(
                            "{}: dropin name '{}' must end in '.conf'",
                            at, d.name
                        ));
                    }
                    self.unit_contents(&at, d.contents.as_deref());
                    dropins.push(ignition::Dropin {
                        contents: d.contents.clone(),
                        name: d.name.clone(),
                    });
                }

                out.systemd.units.push(ignition::Unit {
                    contents: u.contents.clone(),
                    dropins,
                    enabled: u.enabled,
                    mask: u.mask,
                    name: u.name.clone(),
                });
            }
        }

        if let Some(networkd) = &config.networkd {
            for (i, u) in networkd.units.iter().enumerate() {
                let at = format!("networkd.units[{}]", i);
                self.unit_name(&at, &u.name, NETWORKD_SUFFIXES);
                self.unit_contents(&at, u.contents.as_deref());
                out.networkd.units.push(ignition::NetworkdUnit {
                    contents: u.contents.clone(),
                    name: u.name.clone(),
                });
            }
        }

        if let Some(passwd) = &config.passwd {
            for (i, u) in passwd.users.iter().enumerate() {
                if u.name.is_empty() {
                    self.report
                        .add_error(format!("passwd.users[{}]: user has no name", i));
                }
                out.passwd.users.push(ignition::PasswdUser {
                    gecos: u.gecos.clone(),
                    groups: u.groups.clone(),
                    home_dir: u.home_dir.clone(),
                    name: u.name.clone(),
                    no_create_home: u.no_create_home,
                    no_log_init: u.no_log_init,
                    no_user_group: u.no_user_group,
                    password_hash: u.password_hash.clone(),
                    primary_group: u.primary_group.clone(),
                    shell: u.shell.clone(),
                    ssh_authorized_keys: u.ssh_authorized_keys.clone(),
                    system: u.system,
                    uid: u.uid,
                });
            }
            for (i, g) in passwd.groups.iter().enumerate() {
                if g.name.is_empty() {
                    self.report
                        .add_error(format!("passwd.groups[{}]: group has no name", i));
                }
                out.passwd.groups.push(ignition::PasswdGroup {
                    gid: g.gid,
                    name: g.name.clone(),
                    password_hash: g.password_hash.clone(),
                    system: g.system,
                });
            }
        }

        out
    }

    fn file(&mut self, at: &str, f: &super::File) -> ignition::File {
        self.path(at, &f.path);
        let contents = match &f.contents {
            Some(contents) => self.contents(at, contents),
            None => ignition::FileContents::default(),
        };

        ignition::File {
            filesystem: filesystem(f.filesystem.as_deref()),
            group: f.group.as_ref().map(owner),
            overwrite: f.overwrite,
            path: f.path.clone(),
            user: f.user.as_ref().map(owner),
            append: f.append,
            contents,
            mode: self.mode(at, f.mode.as_ref()),
        }
    }

    fn contents(&mut self, at: &str, contents: &FileContents) -> ignition::FileContents {
        match (&contents.inline, &contents.remote) {
            (Some(_), Some(_)) => {
                self.report.add_error(format!(
                    "{}: file cannot have both inline and remote contents",
                    at
                ));
                ignition::FileContents::default()
            }
            (Some(inline), None) => ignition::FileContents {
                source: Some(data_url(inline)),
                ..Default::default()
            },
            (None, Some(remote)) => {
                self.url(at, &remote.url);
                let compression = remote.compression.clone().filter(|c| !c.is_empty());
                if let Some(compression) = &compression {
                    if compression != "gzip" {
                        self.report.add_error(format!(
                            "{}: unsupported compression '{}'",
                            at, compression
                        ));
                    }
                }
                ignition::FileContents {
                    compression,
                    source: Some(remote.url.clone()),
                    verification: self.verification(at, remote.verification.as_ref()),
                }
            }
            (None, None) => ignition::FileContents::default(),
        }
    }

    fn reference(&mut self, at: &str, r: &super::ConfigReference) -> ignition::ConfigReference {
        self.url(at, &r.source);
        ignition::ConfigReference {
            source: r.source.clone(),
            verification: self.verification(at, r.verification.as_ref()),
        }
    }

    fn verification(
        &mut self,
        at: &str,
        verification: Option<&Verification>,
    ) -> ignition::Verification {
        let hash = verification
            .and_then(|v| v.hash.as_ref())
            .map(|h| self.hash(at, h));
        ignition::Verification { hash }
    }

    fn hash(&mut self, at: &str, hash: &Hash) -> String {
        if hash.function != HASH_FUNCTION {
            self.report.add_error(format!(
                "{}: unsupported hash function '{}'",
                at, hash.function
            ));
        }
        if hash.sum.len() != SHA512_HEX_LEN || !hash.sum.chars().all(|c| c.is_ascii_hexdigit()) {
            self.report
                .add_error(format!("{}: invalid {} sum '{}'", at, HASH_FUNCTION, hash.sum));
        }
        format!("{}-{}", hash.function, hash.sum)
    }

    fn path(&mut self, at: &str, path: &str) {
        if !path.starts_with('/') {
            self.report
                .add_error(format!("{}: path '{}' is not absolute", at, path));
        }
    }

    fn mode(&mut self, at: &str, mode: Option<&Mode>) -> Option<i64> {
        let mode = mode?;
        match mode.bits() {
            Some(bits) if (0..=MAX_MODE).contains(&bits) => Some(bits),
            _ => {
                self.report
                    .add_error(format!("{}: invalid mode {:?}", at, mode));
                None
            }
        }
    }

    fn timeout(&mut self, name: &str, value: Option<i64>) {
        if let Some(value) = value {
            if value < 0 {
                self.report.add_error(format!(
                    "ignition.timeouts.{}: timeout cannot be negative",
                    name
                ));
            }
        }
    }

    fn url(&mut self, at: &str, source: &str) {
        match Url::parse(source) {
            Ok(url) if URL_SCHEMES.contains(&url.scheme()) => {}
            Ok(url) => self.report.add_error(format!(
                "{}: unsupported URL scheme '{}'",
                at,
                url.scheme()
            )),
            Err(e) => self
                .report
                .add_error(format!("{}: invalid URL '{}': {}", at, source, e)),
        }
    }

    fn unit_name(&mut self, at: &str, name: &str, suffixes: &[&str]) {
        if !suffixes.iter().any(|s| name.ends_with(s)) {
            self.report.add_error(format!(
                "{}: invalid unit name '{}', expected one of: {}",
                at,
                name,
                suffixes.join(", ")
            ));
        }
    }

    fn unit_contents(&mut self, at: &str, contents: Option<&str>) {
        if let Some(problem) = contents.and_then(check_unit_contents) {
            self.report
                .add_error(format!("{}: invalid unit contents: {}", at, problem));
        }
    }
}

fn filesystem(fs: Option<&str>) -> String {
    fs.unwrap_or(DEFAULT_FILESYSTEM).to_string()
}

fn owner(o: &Owner) -> ignition::NodeOwner {
    ignition::NodeOwner {
        id: o.id,
        name: o.name.clone(),
    }
}

/// Checks that unit contents look like a systemd unit file, returning a description of the first
/// problem found.
fn check_unit_contents(contents: &str) -> Option<String> {
    let mut in_section = false;
    let mut continued = false;
    for (n, line) in contents.lines().enumerate() {
        let line = line.trim();
        let was_continued = continued;
        continued = line.ends_with('\\');
        if was_continued || line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Some(format!("line {}: unterminated section header", n + 1));
            }
            in_section = true;
        } else if !line.contains('=') {
            return Some(format!("line {}: expected 'Key=Value', got '{}'", n + 1, line));
        } else if !in_section {
            return Some(format!("line {}: assignment outside of a section", n + 1));
        }
    }
    None
}
