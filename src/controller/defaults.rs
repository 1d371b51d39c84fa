//! Defaulting for MysqlCluster specs
//!
//! Fills every unset field of a cluster spec from the operator options and
//! derives InnoDB sizing from the requested memory. Fields that are already
//! set are never touched, so running the defaults twice is a no-op.
//!
//! InnoDB sizing follows the MySQL 8.0 `innodb_dedicated_server` heuristics:
//!
//! | memory            | buffer pool | log file |
//! |-------------------|-------------|----------|
//! | < 1 GiB           | 128 MiB     | 48 MiB   |
//! | 1 GiB ..= 4 GiB   | 50%         | 128 MiB  |
//! | 4 GiB ..= 8 GiB   | 75%         | 512 MiB  |
//! | 8 GiB ..= 16 GiB  | 75%         | 1 GiB    |
//! | > 16 GiB          | 75%         | 2 GiB    |

use tracing::debug;

use crate::controller::error::{Error, Result};
use crate::crd::{AntiAffinitySpec, MysqlCluster, PodSpec, ResourceList, ResourceName, VolumeSpec};
use crate::options::OperatorOptions;

pub const KIB: i64 = 1 << 10;
pub const MIB: i64 = 1 << 20;
pub const GIB: i64 = 1 << 30;

/// `my.cnf` key for the InnoDB buffer pool size
pub const BUFFER_POOL_SIZE_KEY: &str = "innodb-buffer-pool-size";

/// `my.cnf` key for the InnoDB redo log file size
pub const LOG_FILE_SIZE_KEY: &str = "innodb-log-file-size";

const DEFAULT_CPU_REQUEST: &str = "200m";
const DEFAULT_MEMORY_REQUEST: &str = "1Gi";
pub const DEFAULT_STORAGE_SIZE: &str = "1Gi";
pub const DEFAULT_VOLUME_ACCESS_MODE: &str = "ReadWriteOnce";

const ANTI_AFFINITY_WEIGHT: i32 = 100;
const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// Upper bound of a memory tier
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Ceiling {
    /// memory < n
    Below(i64),
    /// memory <= n
    AtMost(i64),
    Unbounded,
}

impl Ceiling {
    fn admits(self, memory: i64) -> bool {
        match self {
            Ceiling::Below(n) => memory < n,
            Ceiling::AtMost(n) => memory <= n,
            Ceiling::Unbounded => true,
        }
    }
}

/// How a tier derives its value from the requested memory
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sizing {
    Fixed(i64),
    Ratio(f64),
}

impl Sizing {
    fn apply(self, memory: i64) -> i64 {
        match self {
            Sizing::Fixed(n) => n,
            Sizing::Ratio(r) => (memory as f64 * r) as i64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryTier {
    pub ceiling: Ceiling,
    pub sizing: Sizing,
}

const fn tier(ceiling: Ceiling, sizing: Sizing) -> MemoryTier {
    MemoryTier { ceiling, sizing }
}

/// Buffer pool tiers, ordered by increasing memory
pub const BUFFER_POOL_TIERS: [MemoryTier; 3] = [
    tier(Ceiling::Below(GIB), Sizing::Fixed(128 * MIB)),
    tier(Ceiling::AtMost(4 * GIB), Sizing::Ratio(0.5)),
    tier(Ceiling::Unbounded, Sizing::Ratio(0.75)),
];

/// Redo log file tiers, ordered by increasing memory
pub const LOG_FILE_TIERS: [MemoryTier; 5] = [
    tier(Ceiling::Below(GIB), Sizing::Fixed(48 * MIB)),
    tier(Ceiling::AtMost(4 * GIB), Sizing::Fixed(128 * MIB)),
    tier(Ceiling::AtMost(8 * GIB), Sizing::Fixed(512 * MIB)),
    tier(Ceiling::AtMost(16 * GIB), Sizing::Fixed(GIB)),
    tier(Ceiling::Unbounded, Sizing::Fixed(2 * GIB)),
];

fn size_for(tiers: &[MemoryTier], memory: i64) -> i64 {
    tiers
        .iter()
        .find(|t| t.ceiling.admits(memory))
        .map(|t| t.sizing.apply(memory))
        // the last tier is unbounded
        .unwrap_or_default()
}

/// InnoDB buffer pool size in bytes for the given memory request
pub fn buffer_pool_size(memory: i64) -> i64 {
    size_for(&BUFFER_POOL_TIERS, memory)
}

/// InnoDB log file size in bytes for the given memory request
pub fn log_file_size(memory: i64) -> i64 {
    size_for(&LOG_FILE_TIERS, memory)
}

/// Scale applied to the numeric part of a quantity
#[derive(Clone, Copy)]
enum Scale {
    Times(i64),
    Milli,
    Exponent(i32),
}

impl Scale {
    fn factor(self) -> f64 {
        match self {
            Scale::Times(n) => n as f64,
            Scale::Milli => 1e-3,
            Scale::Exponent(exp) => 10f64.powi(exp),
        }
    }
}

/// Integer division rounding up, for non-negative values
fn ceil_div(value: i64, divisor: i64) -> i64 {
    value / divisor + i64::from(value % divisor != 0)
}

/// Parse a Kubernetes quantity (e.g., "512Mi", "2G", "1.5Gi", "129e6", "500m")
/// into bytes, rounding fractional bytes up
pub fn parse_quantity(quantity: &str) -> Result<i64> {
    let invalid = || Error::InvalidConfig(format!("invalid quantity: {:?}", quantity));

    let trimmed = quantity.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(invalid());
    }

    let scale = match suffix {
        "" => Scale::Times(1),
        "Ki" => Scale::Times(KIB),
        "Mi" => Scale::Times(MIB),
        "Gi" => Scale::Times(GIB),
        "Ti" => Scale::Times(GIB << 10),
        "Pi" => Scale::Times(GIB << 20),
        "Ei" => Scale::Times(GIB << 30),
        "m" => Scale::Milli,
        "k" => Scale::Times(1_000),
        "M" => Scale::Times(1_000_000),
        "G" => Scale::Times(1_000_000_000),
        "T" => Scale::Times(1_000_000_000_000),
        "P" => Scale::Times(1_000_000_000_000_000),
        "E" => Scale::Times(1_000_000_000_000_000_000),
        // decimal exponent, e.g. "129e6"
        _ => suffix
            .strip_prefix(|c: char| c == 'e' || c == 'E')
            .and_then(|exp| exp.parse::<i32>().ok())
            .map(Scale::Exponent)
            .ok_or_else(invalid)?,
    };

    if number.contains('.') {
        let value: f64 = number.parse().map_err(|_| invalid())?;
        let bytes = (value * scale.factor()).ceil();
        if !bytes.is_finite() || bytes > i64::MAX as f64 {
            return Err(invalid());
        }
        return Ok(bytes as i64);
    }

    let value: i64 = number.parse().map_err(|_| invalid())?;
    match scale {
        Scale::Times(n) => value.checked_mul(n).ok_or_else(invalid),
        Scale::Milli => Ok(ceil_div(value, 1_000)),
        Scale::Exponent(exp) if exp >= 0 => 10i64
            .checked_pow(exp.unsigned_abs())
            .and_then(|p| value.checked_mul(p))
            .ok_or_else(invalid),
        Scale::Exponent(exp) => Ok(match 10i64.checked_pow(exp.unsigned_abs()) {
            Some(p) => ceil_div(value, p),
            // anything non-zero rounds up to a single byte
            None => i64::from(value != 0),
        }),
    }
}

/// Fill unset fields of the cluster spec
///
/// # Errors
/// Returns `Error::InvalidConfig` when the memory request cannot be parsed.
pub fn apply_defaults(cluster: &mut MysqlCluster, options: &OperatorOptions) -> Result<()> {
    let labels = cluster.labels();
    let derived_secret = cluster.name_for_resource(ResourceName::Secret);
    let spec = &mut cluster.spec;

    if spec.mysql_version.as_deref().is_none_or(str::is_empty) {
        spec.mysql_version = Some(options.mysql_image_tag.clone());
    }

    if spec.secret_name.as_deref().is_none_or(str::is_empty) {
        spec.secret_name = Some(derived_secret);
    }

    if spec.orchestrator_uri.as_deref().is_none_or(|u| u.trim().is_empty()) {
        if let Some(uri) = &options.orchestrator_uri {
            spec.orchestrator_uri = Some(uri.clone());
        }
    }

    apply_pod_defaults(&mut spec.pod_spec, options, labels);

    if let Some(memory) = spec.pod_spec.resources.memory_request() {
        let memory = parse_quantity(memory)?;

        spec.mysql_conf
            .entry(BUFFER_POOL_SIZE_KEY.to_string())
            .or_insert_with(|| buffer_pool_size(memory).to_string());

        spec.mysql_conf
            .entry(LOG_FILE_SIZE_KEY.to_string())
            .or_insert_with(|| log_file_size(memory).to_string());
    }

    apply_volume_defaults(&mut spec.volume_spec);

    debug!(
        version = spec.mysql_version.as_deref().unwrap_or_default(),
        "Applied cluster defaults"
    );
    Ok(())
}

fn apply_pod_defaults(
    pod: &mut PodSpec,
    options: &OperatorOptions,
    labels: std::collections::BTreeMap<String, String>,
) {
    if pod.image_pull_policy.as_deref().is_none_or(str::is_empty) {
        pod.image_pull_policy = Some(options.image_pull_policy.clone());
    }

    if pod.resources.requests_unset() {
        pod.resources.requests = Some(ResourceList {
            cpu: Some(DEFAULT_CPU_REQUEST.to_string()),
            memory: Some(DEFAULT_MEMORY_REQUEST.to_string()),
        });
    }

    // Prefer spreading members across hosts without blocking scheduling
    if pod.anti_affinity.is_none() {
        pod.anti_affinity = Some(AntiAffinitySpec {
            weight: ANTI_AFFINITY_WEIGHT,
            topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
            match_labels: labels,
        });
    }
}

fn apply_volume_defaults(volume: &mut VolumeSpec) {
    if volume.access_modes.is_empty() {
        volume.access_modes = vec![DEFAULT_VOLUME_ACCESS_MODE.to_string()];
    }

    if volume.size.as_deref().is_none_or(str::is_empty) {
        volume.size = Some(DEFAULT_STORAGE_SIZE.to_string());
    }
}
