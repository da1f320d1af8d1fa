//! Contract address registry client.
use crate::http::{ApiClient, ApiError};
use alloy_primitives::Address;
use async_trait::async_trait;
use ballot_core::{ConfigError, ContractAddressSet};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

/// Endpoint publishing the contract address set.
pub const CONTRACT_ADDRESSES_PATH: &str = "contract-addresses";

/// Source of the contract addresses for the active chain.
#[async_trait]
pub trait ContractRegistry: Send + Sync {
    async fn fetch(&self) -> Result<ContractAddressSet, ConfigError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChainIdValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractAddressesResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    entry_point_address: Option<String>,
    #[serde(default)]
    factory_address: Option<String>,
    #[serde(default)]
    paymaster_address: Option<String>,
    #[serde(default)]
    hlu_token_address: Option<String>,
    #[serde(default)]
    quan_ly_cuoc_bau_cu_address: Option<String>,
    #[serde(default)]
    chain_id: Option<ChainIdValue>,
}

fn required_address(field: &'static str, value: Option<&str>) -> Result<Address, ConfigError> {
    let raw = value.unwrap_or_default().trim();
    Address::from_str(raw).map_err(|_| ConfigError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

impl ContractAddressesResponse {
    fn into_address_set(self) -> Result<ContractAddressSet, ConfigError> {
        if !self.success {
            return Err(ConfigError::Unsuccessful(
                self.message.unwrap_or_else(|| "success = false".to_string()),
            ));
        }

        let chain_id = match self.chain_id {
            Some(ChainIdValue::Number(id)) => id,
            Some(ChainIdValue::Text(text)) => {
                parse_chain_id(&text).ok_or(ConfigError::InvalidField {
                    field: "chainId",
                    value: text,
                })?
            }
            None => {
                return Err(ConfigError::InvalidField {
                    field: "chainId",
                    value: String::new(),
                });
            }
        };

        let domain_manager = match self.quan_ly_cuoc_bau_cu_address.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(required_address("quanLyCuocBauCuAddress", Some(raw))?),
        };

        Ok(ContractAddressSet {
            chain_id,
            entry_point: required_address(
                "entryPointAddress",
                self.entry_point_address.as_deref(),
            )?,
            factory: required_address("factoryAddress", self.factory_address.as_deref())?,
            paymaster: required_address("paymasterAddress", self.paymaster_address.as_deref())?,
            fee_token: required_address("hluTokenAddress", self.hlu_token_address.as_deref())?,
            domain_manager,
        })
    }
}

fn parse_chain_id(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[derive(Debug, Clone)]
pub struct HttpContractRegistry {
    api: ApiClient,
}

impl HttpContractRegistry {
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ContractRegistry for HttpContractRegistry {
    async fn fetch(&self) -> Result<ContractAddressSet, ConfigError> {
        let response: ContractAddressesResponse = self
            .api
            .get_json(CONTRACT_ADDRESSES_PATH, &[])
            .await
            .map_err(|e| match e {
                ApiError::Status { .. } => {
                    ConfigError::Unsuccessful(e.server_message().unwrap_or_default())
                }
                other => ConfigError::Unreachable(other.to_string()),
            })?;

        let addresses = response.into_address_set()?;
        debug!(
            message = "Fetched contract addresses",
            chain_id = addresses.chain_id,
            entry_point = %addresses.entry_point,
            factory = %addresses.factory,
            paymaster = %addresses.paymaster
        );
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<ContractAddressSet, ConfigError> {
        serde_json::from_value::<ContractAddressesResponse>(value)
            .unwrap()
            .into_address_set()
    }

    fn envelope() -> serde_json::Value {
        json!({
            "success": true,
            "entryPointAddress": "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
            "factoryAddress": "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0",
            "paymasterAddress": "0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9",
            "hluTokenAddress": "0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9",
            "quanLyCuocBauCuAddress": "0x0165878A594ca255338adfa4d48449f69242Eb8F",
            "chainId": 210
        })
    }

    #[test]
    fn parses_full_envelope() {
        let set = parse(envelope()).unwrap();
        assert_eq!(set.chain_id, 210);
        assert!(set.domain_manager.is_some());
    }

    #[test]
    fn chain_id_may_be_a_string() {
        let mut value = envelope();
        value["chainId"] = json!("0xd2");
        assert_eq!(parse(value.clone()).unwrap().chain_id, 210);

        value["chainId"] = json!("210");
        assert_eq!(parse(value).unwrap().chain_id, 210);
    }

    #[test]
    fn domain_manager_is_optional() {
        let mut value = envelope();
        value.as_object_mut().unwrap().remove("quanLyCuocBauCuAddress");
        assert_eq!(parse(value).unwrap().domain_manager, None);
    }

    #[test]
    fn unsuccessful_envelope_is_rejected() {
        let err = parse(json!({ "success": false, "message": "maintenance" })).unwrap_err();
        assert!(matches!(err, ConfigError::Unsuccessful(ref m) if m == "maintenance"));
    }

    #[test]
    fn bad_address_names_the_field() {
        let mut value = envelope();
        value["paymasterAddress"] = json!("not-an-address");
        let err = parse(value).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "paymasterAddress", .. }));
    }
}
