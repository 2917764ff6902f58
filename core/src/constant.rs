//! Reserved keys of URL parameters and invocation attachments

pub const PATH_KEY: &str = "path";
pub const INTERFACE_KEY: &str = "interface";
pub const GROUP_KEY: &str = "group";
pub const TOKEN_KEY: &str = "token";
pub const TIMEOUT_KEY: &str = "timeout";
pub const VERSION_KEY: &str = "version";
pub const SERIALIZATION_KEY: &str = "serialization";
pub const ASYNC_KEY: &str = "async";
pub const GENERIC_KEY: &str = "generic";
/// Prefix of method-level parameters: `methods.<name>.<param>`
pub const METHOD_KEYS: &str = "methods";

pub const HESSIAN2_SERIALIZATION: &str = "hessian2";
pub const DEFAULT_SERIALIZATION: &str = HESSIAN2_SERIALIZATION;

/// URL parameters copied into the attachments of every invocation, when not empty
pub const ATTACHMENT_KEYS: [&str; 5] =
    [INTERFACE_KEY, GROUP_KEY, TOKEN_KEY, TIMEOUT_KEY, VERSION_KEY];

pub const REGISTRY_PROTOCOL: &str = "registry";
pub const REGISTRY_KEY: &str = "registry";
pub const REGISTRY_ROLE_KEY: &str = "registry.role";
pub const REGISTRY_GROUP_KEY: &str = "registry.group";
pub const REGISTRY_TIMEOUT_KEY: &str = "registry.timeout";
pub const REGISTRY_NAMESPACE_KEY: &str = "registry.namespace";

pub const CONFIG_NAMESPACE_KEY: &str = "config.namespace";
pub const CONFIG_APP_ID_KEY: &str = "config.app_id";
pub const CONFIG_CLUSTER_KEY: &str = "config.cluster";
pub const CONFIG_SECRET_KEY: &str = "config.secret";
pub const CONFIG_BACKUP_CONFIG_KEY: &str = "config.is_backup_config";
pub const CONFIG_BACKUP_CONFIG_PATH_KEY: &str = "config.backup_config_path";
pub const CONFIG_POLL_INTERVAL_KEY: &str = "config.poll_interval";
pub const CONFIG_BASE64_KEY: &str = "base64";

/// Group and namespace used when none is configured
pub const DEFAULT_GROUP: &str = "dubbo";
