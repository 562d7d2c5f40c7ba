//! Cloud configuration
//!
//! Keys follow the cloud provider's config file (camelCase). Credentials and
//! the backoff/rate limit tunables are carried for the transport layer; the
//! reconcilers only read the placement fields.

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudConfig {
    pub tenant_id: String,
    pub subscription_id: String,
    pub aad_client_id: String,
    pub aad_client_secret: String,
    pub aad_client_cert_path: String,
    pub aad_client_cert_password: String,

    /// Resource group holding balancers, public IPs and the security group
    pub resource_group: String,
    pub location: String,
    pub vnet_name: String,
    /// Defaults to `resource_group` when empty
    pub vnet_resource_group: String,
    /// Default subnet for internal frontends
    pub subnet_name: String,
    pub security_group_name: String,
    pub route_table_name: String,
    pub primary_availability_set_name: String,

    pub cloud_provider_backoff: bool,
    pub cloud_provider_backoff_retries: u32,
    pub cloud_provider_backoff_exponent: f64,
    pub cloud_provider_backoff_duration: u64,
    pub cloud_provider_backoff_jitter: f64,
    #[serde(rename = "cloudProviderRatelimit")]
    pub cloud_provider_rate_limit: bool,
    #[serde(rename = "cloudProviderRateLimitQPS")]
    pub cloud_provider_rate_limit_qps: f32,
    pub cloud_provider_rate_limit_bucket: u32,
}

impl CloudConfig {
    /// Parse a JSON config document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: CloudConfig = serde_json::from_str(text)?;
        Ok(config.with_defaults())
    }

    /// Parse a YAML config document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: CloudConfig = serde_yaml::from_str(text)?;
        Ok(config.with_defaults())
    }

    /// Parse either format; JSON documents start with `{`
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim_start().starts_with('{') {
            Self::from_json(text)
        } else {
            Self::from_yaml(text)
        }
    }

    fn with_defaults(mut self) -> Self {
        if self.vnet_resource_group.is_empty() {
            self.vnet_resource_group = self.resource_group.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_JSON: &str = r#"{
        "tenantId": "--tenant-id--",
        "subscriptionId": "--subscription-id--",
        "aadClientId": "--aad-client-id--",
        "aadClientSecret": "--aad-client-secret--",
        "aadClientCertPath": "--aad-client-cert-path--",
        "aadClientCertPassword": "--aad-client-cert-password--",
        "resourceGroup": "--resource-group--",
        "location": "--location--",
        "subnetName": "--subnet-name--",
        "securityGroupName": "--security-group-name--",
        "vnetName": "--vnet-name--",
        "routeTableName": "--route-table-name--",
        "primaryAvailabilitySetName": "--primary-availability-set-name--",
        "cloudProviderBackoff": true,
        "cloudProviderBackoffRetries": 6,
        "cloudProviderBackoffExponent": 1.5,
        "cloudProviderBackoffDuration": 5,
        "cloudProviderBackoffJitter": 1.0,
        "cloudProviderRatelimit": true,
        "cloudProviderRateLimitQPS": 0.5,
        "cloudProviderRateLimitBucket": 5
    }"#;

    const FULL_YAML: &str = "
tenantId: --tenant-id--
subscriptionId: --subscription-id--
aadClientId: --aad-client-id--
aadClientSecret: --aad-client-secret--
aadClientCertPath: --aad-client-cert-path--
aadClientCertPassword: --aad-client-cert-password--
resourceGroup: --resource-group--
location: --location--
subnetName: --subnet-name--
securityGroupName: --security-group-name--
vnetName: --vnet-name--
routeTableName: --route-table-name--
primaryAvailabilitySetName: --primary-availability-set-name--
cloudProviderBackoff: true
cloudProviderBackoffRetries: 6
cloudProviderBackoffExponent: 1.5
cloudProviderBackoffDuration: 5
cloudProviderBackoffJitter: 1.0
cloudProviderRatelimit: true
cloudProviderRateLimitQPS: 0.5
cloudProviderRateLimitBucket: 5
";

    fn assert_full(config: &CloudConfig) {
        assert_eq!(config.tenant_id, "--tenant-id--");
        assert_eq!(config.subscription_id, "--subscription-id--");
        assert_eq!(config.aad_client_id, "--aad-client-id--");
        assert_eq!(config.aad_client_secret, "--aad-client-secret--");
        assert_eq!(config.aad_client_cert_path, "--aad-client-cert-path--");
        assert_eq!(config.aad_client_cert_password, "--aad-client-cert-password--");
        assert_eq!(config.resource_group, "--resource-group--");
        assert_eq!(config.location, "--location--");
        assert_eq!(config.subnet_name, "--subnet-name--");
        assert_eq!(config.security_group_name, "--security-group-name--");
        assert_eq!(config.vnet_name, "--vnet-name--");
        assert_eq!(config.route_table_name, "--route-table-name--");
        assert_eq!(config.primary_availability_set_name, "--primary-availability-set-name--");
        assert!(config.cloud_provider_backoff);
        assert_eq!(config.cloud_provider_backoff_retries, 6);
        assert_eq!(config.cloud_provider_backoff_exponent, 1.5);
        assert_eq!(config.cloud_provider_backoff_duration, 5);
        assert_eq!(config.cloud_provider_backoff_jitter, 1.0);
        assert!(config.cloud_provider_rate_limit);
        assert_eq!(config.cloud_provider_rate_limit_qps, 0.5);
        assert_eq!(config.cloud_provider_rate_limit_bucket, 5);
    }

    #[test]
    fn test_config_from_json() {
        assert_full(&CloudConfig::from_json(FULL_JSON).unwrap());
    }

    #[test]
    fn test_config_from_yaml() {
        assert_full(&CloudConfig::from_yaml(FULL_YAML).unwrap());
    }

    #[test]
    fn test_parse_detects_format() {
        assert_full(&CloudConfig::parse(FULL_JSON).unwrap());
        assert_full(&CloudConfig::parse(FULL_YAML).unwrap());
    }

    #[test]
    fn test_backoff_and_rate_limit_disabled_by_default() {
        let json = CloudConfig::from_json(
            r#"{"aadClientId": "--aad-client-id--", "aadClientSecret": "--aad-client-secret--"}"#,
        )
        .unwrap();
        assert!(!json.cloud_provider_backoff);
        assert!(!json.cloud_provider_rate_limit);

        let yaml = CloudConfig::from_yaml(
            "aadClientId: --aad-client-id--\naadClientSecret: --aad-client-secret--\n",
        )
        .unwrap();
        assert!(!yaml.cloud_provider_backoff);
        assert!(!yaml.cloud_provider_rate_limit);
    }

    #[test]
    fn test_vnet_resource_group_defaults_to_resource_group() {
        let config = CloudConfig::from_yaml("resourceGroup: rg\n").unwrap();
        assert_eq!(config.vnet_resource_group, "rg");

        let config = CloudConfig::from_yaml("resourceGroup: rg\nvnetResourceGroup: net\n").unwrap();
        assert_eq!(config.vnet_resource_group, "net");
    }

    #[test]
    fn test_malformed_config() {
        assert!(CloudConfig::from_json("{ not json").is_err());
    }
}
