use crate::error::{ReconcileError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One ad-account / commerce-campaign pairing inside a client.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdAccountScope {
    #[schemars(description = "Ads-platform ad account identifier (e.g. 'act_1234567890')")]
    pub fb_ad_account_id: String,

    #[schemars(description = "Commerce back-office internal campaign ID the ad account funnels into")]
    pub coc_campaign_id: u64,

    #[schemars(description = "Display name for this pairing, used to label and sort dashboard results")]
    pub coc_campaign_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(
        description = "Optional cost-per-purchase target for this account. Reported alongside trend flags; does not change which nodes get flagged."
    )]
    pub cpp_target: Option<f64>,
}

/// A client with credentials for both providers and its ad-account scopes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[schemars(description = "Stable client identifier used in request paths")]
    pub id: String,

    #[schemars(description = "Human-readable client name")]
    pub name: String,

    #[schemars(description = "Ads-platform API access token")]
    pub fb_access_token: String,

    #[schemars(description = "Commerce back-office API login ID")]
    pub coc_login_id: String,

    #[schemars(description = "Commerce back-office API password")]
    pub coc_password: String,

    #[serde(default)]
    #[schemars(description = "Ad-account pairings processed for this client's dashboard")]
    pub ad_accounts: Vec<AdAccountScope>,
}

/// Secret-free projection of a scope for listing endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSummary {
    pub fb_ad_account_id: String,
    pub coc_campaign_id: u64,
    pub coc_campaign_name: String,
}

/// Secret-free projection of a client for listing endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: String,
    pub name: String,
    pub ad_accounts: Vec<ScopeSummary>,
}

/// The full set of configured clients. The routing layer stores this as an
/// opaque JSON blob and hands it to the core per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClientRoster {
    pub clients: Vec<ClientConfig>,
}

impl ClientRoster {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let clients: Vec<ClientConfig> = serde_json::from_str(raw)?;
        Ok(Self { clients })
    }

    pub fn client_by_id(&self, id: &str) -> Result<&ClientConfig> {
        self.clients
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ReconcileError::UnknownClient(id.to_string()))
    }

    /// Listing view with credentials stripped.
    pub fn public_view(&self) -> Vec<ClientSummary> {
        self.clients
            .iter()
            .map(|c| ClientSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                ad_accounts: c
                    .ad_accounts
                    .iter()
                    .map(|a| ScopeSummary {
                        fb_ad_account_id: a.fb_ad_account_id.clone(),
                        coc_campaign_id: a.coc_campaign_id,
                        coc_campaign_name: a.coc_campaign_name.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ClientRoster)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
