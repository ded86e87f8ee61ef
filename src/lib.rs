//! # Adspend Reconciler
//!
//! A library for reconciling ad-platform spend (Facebook/Meta insights) with
//! commerce back-office order data (CheckoutChamp-style query APIs) into a
//! unified campaign → adset → ad performance hierarchy.
//!
//! ## Core Concepts
//!
//! - **Spend tree**: ad-level insight rows reshaped into campaign → adset →
//!   ad nodes carrying spend, keyed by platform-reported names
//! - **Commerce tree**: order/decline/partial records grouped by UTM-style
//!   tag fields into the equivalent hierarchy of financial metrics
//! - **Two-phase fetch**: the campaign names discovered on the spend side
//!   drive the commerce-side tag queries; the providers share no IDs
//! - **Merge**: the two trees joined by name at every level, with derived
//!   KPIs (ROAS, CPP, AOV, conversion rate) computed per node
//! - **Trend flags**: yesterday's CPP compared against the trailing week and
//!   the account average, flagging notable cost increases
//!
//! Every request rebuilds the full tree from the upstream APIs: there is no
//! cache and no persisted state. Per-unit fetch failures degrade to null
//! data or labeled error entries instead of aborting sibling work.
//!
//! ## Example
//!
//! ```rust,ignore
//! use adspend_reconciler::*;
//!
//! # async fn run() -> Result<()> {
//! let roster = ClientRoster::from_json_str(&std::env::var("CLIENTS").unwrap())?;
//! let range = DateRange::parse_iso("2024-03-01", "2024-03-07")?;
//!
//! let dashboard = dashboard_for_client(&roster, "acme-1a2b3c", &range).await?;
//! for account in &dashboard.ad_accounts {
//!     println!("{}: {:.2} spend", account.coc_campaign_name, account.fb_spend);
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod insights;
pub mod merge;
pub mod metrics;
pub mod schema;
pub mod sources;
pub mod spend;
pub mod utils;

pub use engine::{
    build_comparison, build_dashboard, build_dashboard_with, campaign_names, dashboard_for_client,
    process_ad_account, process_ad_account_with, DashboardComparison, DashboardReport,
    ScopeFailure,
};
pub use error::{ReconcileError, Result};
pub use hierarchy::{
    build_commerce_tree, campaign_totals, group_records, CommerceAdset, CommerceCampaign,
    CommerceTree,
};
pub use insights::{
    analyze_account_trends, detect_cpp_anomalies, CppFlag, CppReport, FlagLevel, TrendReport,
    DEFAULT_THRESHOLD_PCT,
};
pub use merge::{merge_hierarchy, AccountReport, MergedAd, MergedAdset, MergedCampaign};
pub use metrics::{aggregate, CommerceMetrics};
pub use schema::{AdAccountScope, ClientConfig, ClientRoster, ClientSummary, ScopeSummary};
pub use sources::{AdsClient, CommerceClient, InsightRow, OrderRecord, UtmFilter};
pub use spend::{build_spend_tree, AdSpend, AdsetSpend, CampaignSpend, ScopeLevel, ScopeName};
pub use utils::{commerce_wire_date, trailing_week, yesterday, DateRange};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn insight_row(campaign: &str, adset: &str, ad: &str, spend: &str) -> InsightRow {
        InsightRow {
            campaign_name: Some(campaign.to_string()),
            adset_name: Some(adset.to_string()),
            ad_name: Some(ad.to_string()),
            spend: Some(spend.to_string()),
        }
    }

    #[test]
    fn test_spend_rows_through_merge() {
        let rows = vec![
            insight_row("Spring", "Lookalike", "video-1", "60.00"),
            insight_row("Spring", "Lookalike", "video-2", "40.00"),
            insight_row("Brand", "Broad", "static", "10.00"),
        ];
        let spend_tree = build_spend_tree(&rows);

        let names = campaign_names(&spend_tree);
        assert_eq!(names.len(), 2);

        let mut commerce = CommerceTree::new();
        commerce.insert(
            ScopeName::Named("Spring".to_string()),
            CommerceCampaign {
                coc_data: Some(CommerceMetrics {
                    sales: 4,
                    sales_total: 400.0,
                    ..CommerceMetrics::default()
                }),
                adsets: HashMap::new(),
                error: None,
            },
        );

        let scope = AdAccountScope {
            fb_ad_account_id: "act_1".to_string(),
            coc_campaign_id: 1,
            coc_campaign_name: "Acme".to_string(),
            cpp_target: None,
        };
        let report = merge_hierarchy(&spend_tree, &commerce, &scope);

        assert!((report.fb_spend - 110.0).abs() < 1e-9);
        // Spring outspends Brand and sorts first.
        assert_eq!(report.campaigns[0].name.as_str(), "Spring");
        assert!((report.campaigns[0].roas - 4.0).abs() < 1e-9);
        assert!((report.campaigns[0].cpp - 25.0).abs() < 1e-9);
        // Brand has no commerce match: null data, zero KPIs.
        assert!(report.campaigns[1].coc_data.is_none());
        assert_eq!(report.campaigns[1].roas, 0.0);
    }

    #[test]
    fn test_report_serializes_with_wire_field_names() {
        let scope = AdAccountScope {
            fb_ad_account_id: "act_1".to_string(),
            coc_campaign_id: 1,
            coc_campaign_name: "Acme".to_string(),
            cpp_target: None,
        };
        let spend_tree = build_spend_tree(&[insight_row("Spring", "LAL", "v1", "10")]);
        let report = merge_hierarchy(&spend_tree, &CommerceTree::new(), &scope);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fbAdAccountId"], "act_1");
        assert_eq!(json["cocCampaignName"], "Acme");
        assert!(json["campaigns"][0]["fbSpend"].is_number());
        assert!(json["campaigns"][0]["cocData"].is_null());
        assert!(json["campaigns"][0]["adsets"][0]["ads"][0]["name"].is_string());
    }
}
