use kubeadm_ignition::node::NodeInput;
use kubeadm_ignition::{generate, new_init_control_plane, new_join_control_plane, new_node, Error};
use percent_encoding::percent_decode_str;
use serde_json::Value;

const WORKER: &str = include_str!("../test_data/worker.toml");
const JOIN_CONTROL_PLANE: &str = include_str!("../test_data/join-control-plane.toml");
const INIT_CONTROL_PLANE: &str = include_str!("../test_data/init-control-plane.toml");
const ADDITIONAL_CONFIG: &str = include_str!("../test_data/additional-config.toml");

type Generator = fn(Option<&NodeInput>) -> kubeadm_ignition::Result<Vec<u8>>;

fn input(toml_str: &str) -> NodeInput {
    toml::from_str(toml_str).unwrap()
}

fn json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

fn files(config: &Value) -> &Vec<Value> {
    config["storage"]["files"].as_array().unwrap()
}

fn paths(config: &Value) -> Vec<&str> {
    files(config)
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect()
}

fn file<'a>(config: &'a Value, path: &str) -> &'a Value {
    files(config)
        .iter()
        .find(|f| f["path"] == path)
        .unwrap_or_else(|| panic!("no file at {}", path))
}

/// Decodes the inline contents of the file at `path`.
fn contents(config: &Value, path: &str) -> String {
    let source = file(config, path)["contents"]["source"].as_str().unwrap();
    let encoded = source.strip_prefix("data:,").unwrap();
    percent_decode_str(encoded).decode_utf8().unwrap().to_string()
}

#[test]
fn every_role_generates_json() {
    let cases: [(Generator, &str); 3] = [
        (new_node, WORKER),
        (new_join_control_plane, JOIN_CONTROL_PLANE),
        (new_init_control_plane, INIT_CONTROL_PLANE),
    ];
    for (generator, toml_str) in cases.iter() {
        let output = generator(Some(&input(toml_str))).unwrap();
        let config = json(&output);
        assert_eq!(config["ignition"]["version"], "2.3.0");

        let units = config["systemd"]["units"].as_array().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0]["name"], "kubeadm.service");
        assert_eq!(units[0]["enabled"], true);

        assert_eq!(file(&config, "/etc/kubeadm.sh")["mode"], 448);
        assert_eq!(file(&config, "/etc/kubeadm.yml")["mode"], 384);
    }
}

#[test]
fn missing_input_is_rejected() {
    let generators: [Generator; 4] = [
        generate,
        new_node,
        new_join_control_plane,
        new_init_control_plane,
    ];
    for generator in generators.iter() {
        let err = generator(None).unwrap_err();
        assert!(matches!(err, Error::MissingInput));
    }
}

#[test]
fn missing_user_data_is_rejected() {
    let cases: [(Generator, &str); 3] = [
        (new_node, WORKER),
        (new_join_control_plane, JOIN_CONTROL_PLANE),
        (new_init_control_plane, INIT_CONTROL_PLANE),
    ];
    for (generator, toml_str) in cases.iter() {
        let mut node = input(toml_str);
        node.user_data = None;
        let err = generator(Some(&node)).unwrap_err();
        assert!(matches!(err, Error::MissingUserData { .. }), "{}", err);
    }
}

#[test]
fn role_must_match_entry_point() {
    let err = new_join_control_plane(Some(&input(WORKER))).unwrap_err();
    assert!(matches!(err, Error::RoleMismatch { .. }));
    let err = new_node(Some(&input(INIT_CONTROL_PLANE))).unwrap_err();
    assert!(matches!(err, Error::RoleMismatch { .. }));
}

#[test]
fn worker_files() {
    let config = json(&new_node(Some(&input(WORKER))).unwrap());
    assert_eq!(
        paths(&config),
        vec![
            "/etc/motd",
            "/etc/sysctl.d/90-kubelet.conf",
            "/etc/kubeadm.sh",
            "/etc/kubeadm.yml"
        ]
    );
    assert_eq!(file(&config, "/etc/motd")["mode"], 420);
    // No permissions were given, so no mode is set.
    assert!(file(&config, "/etc/sysctl.d/90-kubelet.conf")
        .get("mode")
        .is_none());
    assert_eq!(
        contents(&config, "/etc/sysctl.d/90-kubelet.conf"),
        "vm.overcommit_memory=1\nkernel.panic=10\n"
    );
    assert_eq!(file(&config, "/etc/motd")["filesystem"], "root");
}

#[test]
fn control_plane_files() {
    let config = json(&new_join_control_plane(Some(&input(JOIN_CONTROL_PLANE))).unwrap());
    assert_eq!(
        paths(&config),
        vec![
            "/etc/kubernetes/pki/ca.crt",
            "/etc/kubernetes/pki/ca.key",
            "/etc/kubernetes/pki/etcd/ca.crt",
            "/etc/kubernetes/pki/etcd/ca.key",
            "/etc/extra",
            "/etc/kubeadm.sh",
            "/etc/kubeadm.yml"
        ]
    );
    assert_eq!(file(&config, "/etc/kubernetes/pki/ca.crt")["mode"], 416);
    assert_eq!(file(&config, "/etc/kubernetes/pki/ca.key")["mode"], 384);
    assert!(contents(&config, "/etc/kubernetes/pki/etcd/ca.key").contains("etcd ca key"));

    let config = json(&new_init_control_plane(Some(&input(INIT_CONTROL_PLANE))).unwrap());
    assert_eq!(
        paths(&config),
        vec![
            "/etc/kubernetes/pki/ca.crt",
            "/etc/kubernetes/pki/ca.key",
            "/etc/kubernetes/pki/sa.pub",
            "/etc/kubernetes/pki/sa.key",
            "/etc/kubeadm.sh",
            "/etc/kubeadm.yml"
        ]
    );
}

#[test]
fn kubeadm_commands() {
    let config = json(&new_node(Some(&input(WORKER))).unwrap());
    let script = contents(&config, "/etc/kubeadm.sh");
    assert!(script.starts_with("#!/bin/bash\nset -e\n"));
    assert!(script.contains("kubeadm join --config /etc/kubeadm.yml --v=2\n"));
    assert!(!script.contains("kubeadm init"));
    let pre = script.find("hostnamectl set-hostname worker-0").unwrap();
    let join = script.find("kubeadm join").unwrap();
    let rm = script.find("rm /etc/kubeadm.yml").unwrap();
    let post = script.find("echo joined").unwrap();
    assert!(pre < join && join < rm && rm < post);

    let config = json(&new_join_control_plane(Some(&input(JOIN_CONTROL_PLANE))).unwrap());
    let script = contents(&config, "/etc/kubeadm.sh");
    // No verbosity was given.
    assert!(script.contains("kubeadm join --config /etc/kubeadm.yml\n"));

    let config = json(&new_init_control_plane(Some(&input(INIT_CONTROL_PLANE))).unwrap());
    let script = contents(&config, "/etc/kubeadm.sh");
    assert!(script.contains("kubeadm init --config /etc/kubeadm.yml --v=5\n"));
    assert!(!script.contains("kubeadm join"));
}

#[test]
fn kubeadm_configuration() {
    let config = json(&new_init_control_plane(Some(&input(INIT_CONTROL_PLANE))).unwrap());
    let kubeadm_config = contents(&config, "/etc/kubeadm.yml");
    assert!(kubeadm_config.starts_with("---\napiVersion: kubeadm.k8s.io/v1beta2\n"));
    let cluster = kubeadm_config.find("kind: ClusterConfiguration").unwrap();
    let separator = kubeadm_config.find("\n---\n").unwrap();
    let init = kubeadm_config.find("kind: InitConfiguration").unwrap();
    assert!(cluster < separator && separator < init);

    let config = json(&new_node(Some(&input(WORKER))).unwrap());
    assert!(contents(&config, "/etc/kubeadm.yml").contains("kind: JoinConfiguration"));
}

#[test]
fn additional_config_is_merged() {
    let output = new_node(Some(&input(ADDITIONAL_CONFIG))).unwrap();
    let raw = String::from_utf8(output.clone()).unwrap();
    assert!(raw.contains("foo%20bar%20baz"));

    let config = json(&output);
    assert_eq!(
        paths(&config),
        vec!["/etc/kubeadm.sh", "/etc/kubeadm.yml", "/etc/foo"]
    );
    let foo = file(&config, "/etc/foo");
    assert_eq!(foo["contents"]["source"], "data:,foo%20bar%20baz");
    assert_eq!(foo["mode"], 420);

    let units: Vec<&str> = config["systemd"]["units"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(units, vec!["kubeadm.service", "foo.service"]);
    assert_eq!(config["passwd"]["users"][0]["name"], "core");
}

fn set_additional_config(node: &mut NodeInput, snippet: &str) {
    node.ignition
        .as_mut()
        .unwrap()
        .container_linux_config
        .as_mut()
        .unwrap()
        .additional_config = snippet.to_string();
}

#[test]
fn additional_config_diagnostics() {
    let mut node = input(ADDITIONAL_CONFIG);

    // Unknown key.
    set_additional_config(&mut node, "storage:\n  filez: []\n");
    let err = new_node(Some(&node)).unwrap_err();
    assert!(matches!(
        err,
        Error::ConvertConfig {
            origin: "additional",
            ..
        }
    ));
    assert!(err.to_string().contains("filez"), "{}", err);

    // Only a warning, but still rejected.
    set_additional_config(
        &mut node,
        "systemd:\n  units:\n  - name: a.service\n    enabled: true\n    mask: true\n",
    );
    let err = new_node(Some(&node)).unwrap_err();
    assert!(err.to_string().contains("both enabled and masked"), "{}", err);
}

#[test]
fn blank_additional_config_is_ignored() {
    let mut node = input(ADDITIONAL_CONFIG);
    set_additional_config(&mut node, "\n  \n");
    node.user_data = input(WORKER).user_data;

    let mut worker = input(WORKER);
    worker.role = node.role.clone();
    assert_eq!(
        new_node(Some(&node)).unwrap(),
        new_node(Some(&worker)).unwrap()
    );
}

#[test]
fn output_is_deterministic() {
    for toml_str in [WORKER, JOIN_CONTROL_PLANE, INIT_CONTROL_PLANE, ADDITIONAL_CONFIG].iter() {
        let node = input(toml_str);
        assert_eq!(
            generate(Some(&node)).unwrap(),
            generate(Some(&node.clone())).unwrap()
        );
    }
}
