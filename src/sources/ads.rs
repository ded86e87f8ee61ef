use crate::error::{ReconcileError, Result};
use crate::utils::DateRange;
use log::debug;
use serde::Deserialize;
use serde_json::json;

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
const GRAPH_API_VERSION: &str = "v18.0";
const INSIGHTS_PAGE_LIMIT: u32 = 500;

/// One ad-level insight row as reported by the ads platform. Spend arrives
/// as a decimal string on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightRow {
    pub campaign_name: Option<String>,
    pub adset_name: Option<String>,
    pub ad_name: Option<String>,
    pub spend: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsightsPage {
    #[serde(default)]
    data: Vec<InsightRow>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: Option<GraphErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: Option<String>,
}

#[derive(Clone)]
pub struct AdsClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl AdsClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: format!("{}/{}", GRAPH_BASE_URL, GRAPH_API_VERSION),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetches every ad-level insight row for the account and range,
    /// following cursor pages until the provider reports no `next` link.
    /// Rows with zero spend are filtered server-side.
    pub async fn fetch_insight_rows(
        &self,
        ad_account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<InsightRow>> {
        let first_url = format!("{}/{}/insights", self.base_url, ad_account_id);
        let time_range = json!({
            "since": range.start.format("%Y-%m-%d").to_string(),
            "until": range.end.format("%Y-%m-%d").to_string(),
        })
        .to_string();
        let filtering =
            json!([{ "field": "spend", "operator": "GREATER_THAN", "value": "0" }]).to_string();
        let limit = INSIGHTS_PAGE_LIMIT.to_string();
        let params = [
            ("access_token", self.access_token.as_str()),
            ("fields", "campaign_name,adset_name,ad_name,spend"),
            ("level", "ad"),
            ("time_range", time_range.as_str()),
            ("limit", limit.as_str()),
            ("filtering", filtering.as_str()),
        ];

        let mut rows = Vec::new();
        let mut next_url: Option<String> = None;

        loop {
            // The `next` link already carries the full query string.
            let request = match &next_url {
                None => self.client.get(&first_url).query(&params),
                Some(url) => self.client.get(url),
            };

            let response = request
                .send()
                .await
                .map_err(|e| self.api_error(ad_account_id, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .json::<GraphErrorBody>()
                    .await
                    .ok()
                    .and_then(|body| body.error)
                    .and_then(|detail| detail.message)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                return Err(self.api_error(ad_account_id, message));
            }

            let page: InsightsPage = response
                .json()
                .await
                .map_err(|e| self.api_error(ad_account_id, format!("malformed response: {}", e)))?;

            rows.extend(page.data);

            match page.paging.and_then(|p| p.next) {
                Some(url) => next_url = Some(url),
                None => break,
            }
        }

        debug!("fetched {} insight rows for {}", rows.len(), ad_account_id);
        Ok(rows)
    }

    fn api_error(&self, ad_account_id: &str, message: String) -> ReconcileError {
        ReconcileError::AdsApi {
            ad_account_id: ad_account_id.to_string(),
            message,
        }
    }
}
