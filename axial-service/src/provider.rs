// Host Provisioning Interface
// Describes the hosts a resolved task needs and the client that provisions them

use crate::expansion::models::{BuildVariant, ExpansionReport, ResolvedTask, TaskRef};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Timestamp layout used in the `start-time` label
pub const START_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Longest instance name most providers accept
const MAX_INSTANCE_NAME: usize = 63;
const INSTANCE_DIGEST_LEN: usize = 12;

/// Errors reported by a host provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider settings: {0}")]
    InvalidSettings(String),

    #[error("instance '{0}' not found")]
    NotFound(String),

    #[error("provider request failed: {0}")]
    Request(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Lifecycle state of a provisioned instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Initializing,
    Running,
    Stopped,
    Terminated,
    Unknown,
}

impl InstanceStatus {
    /// Map a provider-reported status string
    pub fn from_provider(status: &str) -> Self {
        match status {
            "PROVISIONING" | "STAGING" => InstanceStatus::Initializing,
            "RUNNING" => InstanceStatus::Running,
            "STOPPING" => InstanceStatus::Stopped,
            "TERMINATED" => InstanceStatus::Terminated,
            _ => InstanceStatus::Unknown,
        }
    }
}

/// An SSH key installed on new instances
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SshKey {
    pub username: String,
    pub public_key: String,
}

impl fmt::Display for SshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.public_key)
    }
}

/// Per-distro instance settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderSettings {
    pub machine_type: String,
    pub image_family: Option<String>,
    pub image_name: Option<String>,
    pub disk_type: String,
    pub disk_size_gb: u64,
    #[serde(default)]
    pub setup_script: String,
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
}

impl ProviderSettings {
    pub fn validate(&self) -> ProviderResult<()> {
        if self.machine_type.is_empty() {
            return Err(ProviderError::InvalidSettings(
                "machine type must not be empty".to_string(),
            ));
        }
        if self.image_family.is_none() == self.image_name.is_none() {
            return Err(ProviderError::InvalidSettings(
                "exactly one of image family or image name must be set".to_string(),
            ));
        }
        if self.disk_type.is_empty() {
            return Err(ProviderError::InvalidSettings(
                "disk type must not be empty".to_string(),
            ));
        }
        if self.disk_size_gb == 0 {
            return Err(ProviderError::InvalidSettings(
                "disk size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Image source path; a family resolves to its newest image
    pub fn image_source(&self) -> Option<String> {
        match (&self.image_family, &self.image_name) {
            (Some(family), _) => Some(format!("global/images/family/{}", family)),
            (None, Some(name)) => Some(format!("global/images/{}", name)),
            (None, None) => None,
        }
    }

    pub fn machine_type_url(&self, zone: &str) -> String {
        format!("zones/{}/machineTypes/{}", zone, self.machine_type)
    }

    pub fn disk_type_url(&self, zone: &str) -> String {
        format!("zones/{}/diskTypes/{}", zone, self.disk_type)
    }

    /// Keys in `username:key` form, one per line
    pub fn ssh_keys_metadata(&self) -> String {
        self.ssh_keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A request for one host to run one task of one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIntent {
    /// Instance name, unique per (distro, variant, task)
    pub id: String,
    pub distro: String,
    pub owner: String,
    /// Spawned by a user rather than the scheduler
    pub user_host: bool,
    pub creation_time: DateTime<Utc>,
    pub task: TaskRef,
}

impl HostIntent {
    pub fn for_task(
        variant: &BuildVariant,
        task: &ResolvedTask,
        distro: &str,
        owner: &str,
    ) -> Self {
        Self {
            id: instance_name(&[distro, variant.name.as_str(), task.name.as_str()]),
            distro: distro.to_string(),
            owner: owner.to_string(),
            user_host: false,
            creation_time: Utc::now(),
            task: TaskRef::new(&task.name, &variant.name),
        }
    }

    pub fn with_user_host(mut self, user_host: bool) -> Self {
        self.user_host = user_host;
        self
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        let mode = if self.user_host { "testing" } else { "production" };
        BTreeMap::from([
            ("distro".to_string(), self.distro.clone()),
            ("owner".to_string(), self.owner.clone()),
            ("mode".to_string(), mode.to_string()),
            (
                "start-time".to_string(),
                self.creation_time.format(START_TIME_FORMAT).to_string(),
            ),
        ])
    }
}

/// Lowercase alphanumerics and dashes, at most 63 characters. The readable
/// prefix is followed by a digest of the raw parts, so parts that sanitize or
/// truncate to the same prefix still get distinct names.
fn instance_name(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    let digest = hasher.finalize().to_hex();
    let digest = &digest[..INSTANCE_DIGEST_LEN];

    let mut prefix: String = parts
        .join("-")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(MAX_INSTANCE_NAME - INSTANCE_DIGEST_LEN - 1)
        .collect();
    while prefix.ends_with('-') {
        prefix.pop();
    }

    if prefix.is_empty() {
        return digest.to_string();
    }
    format!("{}-{}", prefix, digest)
}

/// One host intent per task, on the first distro the task runs on.
/// Tasks without distros are skipped.
pub fn host_intents(report: &ExpansionReport, owner: &str) -> Vec<HostIntent> {
    report
        .variants
        .iter()
        .flat_map(|variant| {
            variant.tasks.iter().filter_map(move |task| {
                task.distros
                    .first()
                    .map(|distro| HostIntent::for_task(variant, task, distro, owner))
            })
        })
        .collect()
}

/// State of an instance as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: String,
    pub status: InstanceStatus,
    pub labels: BTreeMap<String, String>,
}

/// Client for a cloud provider that hosts task instances
#[async_trait::async_trait]
pub trait HostProvider: Send + Sync {
    /// Request a new instance; returns its name
    async fn create_instance(
        &self,
        intent: &HostIntent,
        settings: &ProviderSettings,
    ) -> ProviderResult<String>;

    async fn get_instance(&self, name: &str) -> ProviderResult<InstanceRecord>;

    async fn delete_instance(&self, name: &str) -> ProviderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryProvider {
        instances: Mutex<HashMap<String, InstanceRecord>>,
    }

    #[async_trait::async_trait]
    impl HostProvider for InMemoryProvider {
        async fn create_instance(
            &self,
            intent: &HostIntent,
            settings: &ProviderSettings,
        ) -> ProviderResult<String> {
            settings.validate()?;
            let record = InstanceRecord {
                name: intent.id.clone(),
                status: InstanceStatus::from_provider("PROVISIONING"),
                labels: intent.labels(),
            };
            self.instances
                .lock()
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .insert(intent.id.clone(), record);
            Ok(intent.id.clone())
        }

        async fn get_instance(&self, name: &str) -> ProviderResult<InstanceRecord> {
            self.instances
                .lock()
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .get(name)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound(name.to_string()))
        }

        async fn delete_instance(&self, name: &str) -> ProviderResult<()> {
            self.instances
                .lock()
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| ProviderError::NotFound(name.to_string()))
        }
    }

    fn settings() -> ProviderSettings {
        ProviderSettings {
            machine_type: "n1-standard-8".to_string(),
            image_family: Some("ubuntu-1604".to_string()),
            image_name: None,
            disk_type: "pd-ssd".to_string(),
            disk_size_gb: 20,
            setup_script: String::new(),
            ssh_keys: vec![
                SshKey {
                    username: "ci".to_string(),
                    public_key: "ssh-rsa AAA".to_string(),
                },
                SshKey {
                    username: "admin".to_string(),
                    public_key: "ssh-rsa BBB".to_string(),
                },
            ],
        }
    }

    fn variant() -> BuildVariant {
        BuildVariant {
            name: "deps__os~linux_mode~standalone".to_string(),
            display_name: "linux standalone".to_string(),
            matrix: Some("deps".to_string()),
            cell: Vec::new(),
            expansions: BTreeMap::new(),
            tags: BTreeSet::new(),
            run_on: vec!["rhel70".to_string()],
            batch_time: None,
            stepback: None,
            tasks: vec![
                ResolvedTask {
                    name: "compile".to_string(),
                    distros: vec!["linux_big".to_string(), "rhel70".to_string()],
                    depends_on: Vec::new(),
                },
                ResolvedTask {
                    name: "lint".to_string(),
                    distros: Vec::new(),
                    depends_on: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(InstanceStatus::from_provider("PROVISIONING"), InstanceStatus::Initializing);
        assert_eq!(InstanceStatus::from_provider("STAGING"), InstanceStatus::Initializing);
        assert_eq!(InstanceStatus::from_provider("RUNNING"), InstanceStatus::Running);
        assert_eq!(InstanceStatus::from_provider("STOPPING"), InstanceStatus::Stopped);
        assert_eq!(InstanceStatus::from_provider("TERMINATED"), InstanceStatus::Terminated);
        assert_eq!(InstanceStatus::from_provider("SUSPENDED"), InstanceStatus::Unknown);
    }

    #[test]
    fn test_labels() {
        let variant = variant();
        let mut intent = HostIntent::for_task(&variant, &variant.tasks[0], "linux_big", "ci-bot");
        intent.creation_time = Utc.with_ymd_and_hms(2017, 6, 5, 14, 3, 9).unwrap();

        let labels = intent.labels();
        assert_eq!(labels["distro"], "linux_big");
        assert_eq!(labels["owner"], "ci-bot");
        assert_eq!(labels["mode"], "production");
        assert_eq!(labels["start-time"], "20170605140309");

        assert_eq!(intent.with_user_host(true).labels()["mode"], "testing");
    }

    #[test]
    fn test_instance_name_is_sanitized() {
        let variant = variant();
        let intent = HostIntent::for_task(&variant, &variant.tasks[0], "linux_big", "ci-bot");
        assert!(intent.id.starts_with("linux-big-deps--os-linux-mode-standalone-compile-"));
        assert_eq!(intent.id.len(), "linux-big-deps--os-linux-mode-standalone-compile".len() + 13);
        assert!(intent.id.len() <= MAX_INSTANCE_NAME);
        assert!(intent
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert_eq!(intent.task, TaskRef::new("compile", &variant.name));
    }

    #[test]
    fn test_host_intents_skip_tasks_without_distros() {
        let report = ExpansionReport {
            variants: vec![variant()],
            ..Default::default()
        };
        let intents = host_intents(&report, "ci-bot");
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].distro, "linux_big");
    }

    #[test]
    fn test_settings_paths() {
        let settings = settings();
        assert_eq!(
            settings.image_source().as_deref(),
            Some("global/images/family/ubuntu-1604")
        );
        assert_eq!(
            settings.machine_type_url("us-east1-c"),
            "zones/us-east1-c/machineTypes/n1-standard-8"
        );
        assert_eq!(settings.disk_type_url("us-east1-c"), "zones/us-east1-c/diskTypes/pd-ssd");
        assert_eq!(settings.ssh_keys_metadata(), "ci:ssh-rsa AAA\nadmin:ssh-rsa BBB");
    }

    #[test]
    fn test_settings_validation() {
        assert!(settings().validate().is_ok());

        let mut both_images = settings();
        both_images.image_name = Some("custom".to_string());
        assert!(matches!(
            both_images.validate(),
            Err(ProviderError::InvalidSettings(_))
        ));

        let mut no_disk = settings();
        no_disk.disk_size_gb = 0;
        assert!(no_disk.validate().is_err());
    }

    #[tokio::test]
    async fn test_provider_lifecycle() {
        let provider = InMemoryProvider::default();
        let variant = variant();
        let intent = HostIntent::for_task(&variant, &variant.tasks[0], "linux_big", "ci-bot");

        let name = provider.create_instance(&intent, &settings()).await.unwrap();
        let record = provider.get_instance(&name).await.unwrap();
        assert_eq!(record.status, InstanceStatus::Initializing);
        assert_eq!(record.labels["distro"], "linux_big");

        provider.delete_instance(&name).await.unwrap();
        assert!(matches!(
            provider.get_instance(&name).await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_rejects_invalid_settings() {
        let provider = InMemoryProvider::default();
        let variant = variant();
        let intent = HostIntent::for_task(&variant, &variant.tasks[0], "linux_big", "ci-bot");

        let err = provider
            .create_instance(&intent, &ProviderSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSettings(_)));
    }
}
