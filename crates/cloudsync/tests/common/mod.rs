use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A tenant directory with a config, a cloud snapshot and a state dir
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let project = Self { root };
        let config = format!(
            "state_dir: {}\nlog:\n  filter: warn\n",
            project.state_dir().display()
        );
        fs::write(project.config_path(), config).unwrap();
        project
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("cloudsync.yaml")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.path().join("snapshot.json")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.path().join("state")
    }

    pub fn write_snapshot(&self, snapshot: &serde_json::Value) {
        fs::write(
            self.snapshot_path(),
            serde_json::to_string_pretty(snapshot).unwrap(),
        )
        .unwrap();
    }

    /// `cloudsync --config <project config>` with a clean environment
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cloudsync").unwrap();
        cmd.current_dir(self.root.path())
            .env_remove("RUST_LOG")
            .env_remove("CLOUDSYNC_CONFIG_PATH")
            .env_remove("CLOUDSYNC_SNAPSHOT")
            .env_remove("CLOUDSYNC_ACCOUNT")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }

    #[allow(dead_code)]
    pub fn state(&self) -> Option<serde_json::Value> {
        let content = fs::read_to_string(self.state_dir().join("state.json")).ok()?;
        Some(serde_json::from_str(&content).unwrap())
    }

    /// Number of stored rows of `kind`
    #[allow(dead_code)]
    pub fn count(&self, kind: &str) -> usize {
        self.state()
            .map(|state| {
                state["resources"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter(|r| r["spec"]["kind"] == kind)
                    .count()
            })
            .unwrap_or(0)
    }

    #[allow(dead_code)]
    pub fn relation_count(&self) -> usize {
        self.state()
            .map(|state| state["relations"].as_array().unwrap().len())
            .unwrap_or(0)
    }
}

/// One instance in vpc-1/subnet-1 with a boot disk, a security group and
/// an eip; plus one external host
pub fn tcloud_snapshot() -> serde_json::Value {
    serde_json::json!({
        "vendor": "tcloud",
        "resources": [
            { "cloud_id": "vpc-1", "name": "vpc-1", "spec": { "kind": "vpc", "cidr": ["10.0.0.0/16"] } },
            { "cloud_id": "subnet-1", "name": "subnet-1", "spec": { "kind": "subnet", "vpc_cloud_id": "vpc-1" } },
            { "cloud_id": "disk-1", "name": "disk-1", "spec": { "kind": "disk", "size_gb": 50 } },
            { "cloud_id": "sg-1", "name": "sg-1", "spec": { "kind": "security_group" } },
            { "cloud_id": "eip-1", "name": "eip-1", "spec": { "kind": "eip", "public_ip": "203.0.113.10" } },
            {
                "cloud_id": "vm-1",
                "name": "vm-1",
                "spec": {
                    "kind": "cvm",
                    "status": "running",
                    "vpc_cloud_ids": ["vpc-1"],
                    "subnet_cloud_ids": ["subnet-1"],
                    "disks": [{ "cloud_id": "disk-1", "boot": true }],
                    "security_group_cloud_ids": ["sg-1"],
                    "eip_cloud_ids": ["eip-1"]
                }
            }
        ],
        "hosts": [
            { "host_id": 1, "biz_id": 3, "name": "web-1", "inner_ipv4": "10.0.0.1" }
        ]
    })
}
