use super::{
    Config, Ignition, IgnitionConfig, Networkd, Passwd, Security, Storage, Systemd, Timeouts, Tls,
};

/// Combine two Ignition configs into one.
///
/// This is purely additive: every list in `overlay` is appended after the matching list in
/// `base`, so nothing in `base` is ever removed or replaced.  Entries are not deduplicated, even if
/// both sides write the same path or define the same unit; Ignition applies them in order.
/// Optional scalars take the overlay's value only if the overlay sets one.  The config version is
/// always the base's.
pub fn merge(base: Config, overlay: Config) -> Config {
    base.append(overlay)
}

/// Implemented by each section of the config so merging can recurse through the structure.
trait Append {
    fn append(self, overlay: Self) -> Self;
}

fn concat<T>(mut base: Vec<T>, overlay: Vec<T>) -> Vec<T> {
    base.extend(overlay);
    base
}

impl Append for Config {
    fn append(self, overlay: Self) -> Self {
        Self {
            ignition: self.ignition.append(overlay.ignition),
            networkd: self.networkd.append(overlay.networkd),
            passwd: self.passwd.append(overlay.passwd),
            storage: self.storage.append(overlay.storage),
            systemd: self.systemd.append(overlay.systemd),
        }
    }
}

impl Append for Ignition {
    fn append(self, overlay: Self) -> Self {
        Self {
            config: self.config.append(overlay.config),
            security: self.security.append(overlay.security),
            timeouts: self.timeouts.append(overlay.timeouts),
            version: self.version,
        }
    }
}

impl Append for IgnitionConfig {
    fn append(self, overlay: Self) -> Self {
        Self {
            append: concat(self.append, overlay.append),
            replace: overlay.replace.or(self.replace),
        }
    }
}

impl Append for Security {
    fn append(self, overlay: Self) -> Self {
        Self {
            tls: self.tls.append(overlay.tls),
        }
    }
}

impl Append for Tls {
    fn append(self, overlay: Self) -> Self {
        Self {
            certificate_authorities: concat(
                self.certificate_authorities,
                overlay.certificate_authorities,
            ),
        }
    }
}

impl Append for Timeouts {
    fn append(self, overlay: Self) -> Self {
        Self {
            http_response_headers: overlay.http_response_headers.or(self.http_response_headers),
            http_total: overlay.http_total.or(self.http_total),
        }
    }
}

impl Append for Networkd {
    fn append(self, overlay: Self) -> Self {
        Self {
            units: concat(self.units, overlay.units),
        }
    }
}

impl Append for Passwd {
    fn append(self, overlay: Self) -> Self {
        Self {
            groups: concat(self.groups, overlay.groups),
            users: concat(self.users, overlay.users),
        }
    }
}

impl Append for Storage {
    fn append(self, overlay: Self) -> Self {
        Self {
            directories: concat(self.directories, overlay.directories),
            files: concat(self.files, overlay.files),
            links: concat(self.links, overlay.links),
        }
    }
}

impl Append for Systemd {
    fn append(self, overlay: Self) -> Self {
        Self {
            units: concat(self.units, overlay.units),
        }
    }
}
