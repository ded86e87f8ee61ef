use crate::hierarchy::{CommerceAdset, CommerceCampaign, CommerceTree};
use crate::metrics::CommerceMetrics;
use crate::schema::AdAccountScope;
use crate::spend::{AdSpend, AdsetSpend, CampaignSpend, ScopeName};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedAd {
    pub name: ScopeName,
    pub fb_spend: f64,
    pub coc_data: Option<CommerceMetrics>,
    pub roas: f64,
    pub cpp: f64,
    pub aov: f64,
    pub conv_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedAdset {
    pub name: ScopeName,
    pub fb_spend: f64,
    pub coc_data: Option<CommerceMetrics>,
    pub roas: f64,
    pub cpp: f64,
    pub aov: f64,
    pub conv_rate: f64,
    pub ads: Vec<MergedAd>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedCampaign {
    pub name: ScopeName,
    pub fb_spend: f64,
    pub coc_data: Option<CommerceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coc_error: Option<String>,
    pub roas: f64,
    pub cpp: f64,
    pub aov: f64,
    pub conv_rate: f64,
    pub adsets: Vec<MergedAdset>,
}

/// The fully merged tree for one ad-account / commerce-campaign pairing,
/// with account-level commerce totals attached as a sibling of the tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport {
    pub fb_ad_account_id: String,
    pub coc_campaign_id: u64,
    pub coc_campaign_name: String,
    pub fb_spend: f64,
    pub coc_totals: Option<CommerceMetrics>,
    pub campaigns: Vec<MergedCampaign>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Kpis {
    roas: f64,
    cpp: f64,
    aov: f64,
    conv_rate: f64,
}

/// Derived KPIs for one node. With no commerce data every KPI is 0.
///
/// The conversion denominator here is `partials + sales` (declines excluded);
/// only when that is 0 does the commerce-side `conversionRate` (which does
/// include declines) stand in. The two formulas are intentionally distinct.
fn compute_kpis(spend: f64, coc_data: Option<&CommerceMetrics>) -> Kpis {
    let sales_total = coc_data.map(|m| m.sales_total).unwrap_or(0.0);
    let sales = coc_data.map(|m| m.sales).unwrap_or(0);
    let partials = coc_data.map(|m| m.partials).unwrap_or(0);

    let roas = if spend > 0.0 { sales_total / spend } else { 0.0 };
    let cpp = if sales > 0 {
        spend / sales as f64
    } else {
        0.0
    };
    let aov = if sales > 0 {
        sales_total / sales as f64
    } else {
        0.0
    };
    let funnel = partials + sales;
    let conv_rate = if funnel > 0 {
        sales as f64 / funnel as f64 * 100.0
    } else {
        coc_data.map(|m| m.conversion_rate).unwrap_or(0.0)
    };

    Kpis {
        roas,
        cpp,
        aov,
        conv_rate,
    }
}

/// Joins the spend tree with the commerce tree by name at every level and
/// computes derived KPIs per node. Campaigns are ordered by descending
/// spend; adset and ad order is left as discovered. Pure and deterministic:
/// merging the same inputs twice yields identical output.
pub fn merge_hierarchy(
    spend_tree: &[CampaignSpend],
    commerce_tree: &CommerceTree,
    scope: &AdAccountScope,
) -> AccountReport {
    let fb_spend = spend_tree.iter().map(|c| c.spend).sum();

    let mut campaigns: Vec<MergedCampaign> = spend_tree
        .iter()
        .map(|campaign| merge_campaign(campaign, commerce_tree.get(&campaign.name)))
        .collect();
    campaigns.sort_by(|a, b| b.fb_spend.total_cmp(&a.fb_spend));

    AccountReport {
        fb_ad_account_id: scope.fb_ad_account_id.clone(),
        coc_campaign_id: scope.coc_campaign_id,
        coc_campaign_name: scope.coc_campaign_name.clone(),
        fb_spend,
        coc_totals: None,
        campaigns,
    }
}

fn merge_campaign(campaign: &CampaignSpend, entry: Option<&CommerceCampaign>) -> MergedCampaign {
    let coc_data = entry.and_then(|e| e.coc_data.clone());
    let kpis = compute_kpis(campaign.spend, coc_data.as_ref());

    let adsets = campaign
        .adsets
        .iter()
        .map(|adset| merge_adset(adset, entry))
        .collect();

    MergedCampaign {
        name: campaign.name.clone(),
        fb_spend: campaign.spend,
        coc_data,
        coc_error: entry.and_then(|e| e.error.clone()),
        roas: kpis.roas,
        cpp: kpis.cpp,
        aov: kpis.aov,
        conv_rate: kpis.conv_rate,
        adsets,
    }
}

fn merge_adset(adset: &AdsetSpend, entry: Option<&CommerceCampaign>) -> MergedAdset {
    let commerce_adset: Option<&CommerceAdset> = entry.and_then(|e| {
        e.adsets
            .iter()
            .find(|(tag, _)| adset.name.matches(tag))
            .map(|(_, v)| v)
    });
    let coc_data = commerce_adset.map(|a| a.coc_data.clone());
    let kpis = compute_kpis(adset.spend, coc_data.as_ref());

    let ads = adset
        .ads
        .iter()
        .map(|ad| merge_ad(ad, commerce_adset))
        .collect();

    MergedAdset {
        name: adset.name.clone(),
        fb_spend: adset.spend,
        coc_data,
        roas: kpis.roas,
        cpp: kpis.cpp,
        aov: kpis.aov,
        conv_rate: kpis.conv_rate,
        ads,
    }
}

fn merge_ad(ad: &AdSpend, commerce_adset: Option<&CommerceAdset>) -> MergedAd {
    let coc_data = commerce_adset.and_then(|a| {
        a.ads
            .iter()
            .find(|(tag, _)| ad.name.matches(tag))
            .map(|(_, m)| m.clone())
    });
    let kpis = compute_kpis(ad.spend, coc_data.as_ref());

    MergedAd {
        name: ad.name.clone(),
        fb_spend: ad.spend,
        coc_data,
        roas: kpis.roas,
        cpp: kpis.cpp,
        aov: kpis.aov,
        conv_rate: kpis.conv_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spend::ScopeLevel;
    use std::collections::HashMap;

    fn scope() -> AdAccountScope {
        AdAccountScope {
            fb_ad_account_id: "act_123".to_string(),
            coc_campaign_id: 7,
            coc_campaign_name: "Acme US".to_string(),
            cpp_target: None,
        }
    }

    fn metrics(sales: u64, sales_total: f64) -> CommerceMetrics {
        CommerceMetrics {
            sales,
            sales_total,
            ..CommerceMetrics::default()
        }
    }

    fn spend_tree() -> Vec<CampaignSpend> {
        vec![CampaignSpend {
            name: ScopeName::Named("A".to_string()),
            spend: 100.0,
            adsets: vec![AdsetSpend {
                name: ScopeName::Named("X".to_string()),
                spend: 100.0,
                ads: vec![AdSpend {
                    name: ScopeName::Named("ad1".to_string()),
                    spend: 100.0,
                }],
            }],
        }]
    }

    fn commerce_tree() -> CommerceTree {
        let mut ads = HashMap::new();
        ads.insert("ad1".to_string(), metrics(2, 200.0));
        let mut adsets = HashMap::new();
        adsets.insert(
            "X".to_string(),
            CommerceAdset {
                coc_data: metrics(2, 200.0),
                ads,
            },
        );
        let mut tree = CommerceTree::new();
        tree.insert(
            ScopeName::Named("A".to_string()),
            CommerceCampaign {
                coc_data: Some(metrics(2, 200.0)),
                adsets,
                error: None,
            },
        );
        tree
    }

    #[test]
    fn test_kpis_at_every_level() {
        let report = merge_hierarchy(&spend_tree(), &commerce_tree(), &scope());

        let campaign = &report.campaigns[0];
        assert!((campaign.roas - 2.0).abs() < 1e-9);
        assert!((campaign.cpp - 50.0).abs() < 1e-9);
        assert!((campaign.aov - 100.0).abs() < 1e-9);

        let adset = &campaign.adsets[0];
        assert!((adset.roas - 2.0).abs() < 1e-9);
        assert!((adset.cpp - 50.0).abs() < 1e-9);

        let ad = &adset.ads[0];
        assert!((ad.roas - 2.0).abs() < 1e-9);
        assert!((ad.aov - 100.0).abs() < 1e-9);

        assert!((report.fb_spend - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_unmatched_names_yield_null_data_and_zero_kpis() {
        let mut tree = spend_tree();
        tree.push(CampaignSpend {
            name: ScopeName::Named("Orphan".to_string()),
            spend: 10.0,
            adsets: vec![AdsetSpend {
                name: ScopeName::Unknown(ScopeLevel::Adset),
                spend: 10.0,
                ads: vec![],
            }],
        });

        let report = merge_hierarchy(&tree, &commerce_tree(), &scope());
        let orphan = report
            .campaigns
            .iter()
            .find(|c| c.name.as_str() == "Orphan")
            .unwrap();

        assert!(orphan.coc_data.is_none());
        assert_eq!(orphan.roas, 0.0);
        assert_eq!(orphan.cpp, 0.0);
        assert_eq!(orphan.aov, 0.0);
        assert_eq!(orphan.conv_rate, 0.0);
        assert!(orphan.adsets[0].coc_data.is_none());
    }

    #[test]
    fn test_campaigns_sorted_by_spend_descending() {
        let tree = vec![
            CampaignSpend {
                name: ScopeName::Named("small".to_string()),
                spend: 5.0,
                adsets: vec![],
            },
            CampaignSpend {
                name: ScopeName::Named("big".to_string()),
                spend: 50.0,
                adsets: vec![],
            },
            CampaignSpend {
                name: ScopeName::Named("mid".to_string()),
                spend: 20.0,
                adsets: vec![],
            },
        ];

        let report = merge_hierarchy(&tree, &CommerceTree::new(), &scope());
        let spends: Vec<f64> = report.campaigns.iter().map(|c| c.fb_spend).collect();
        assert_eq!(spends, vec![50.0, 20.0, 5.0]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let spend = spend_tree();
        let commerce = commerce_tree();

        let first = merge_hierarchy(&spend, &commerce, &scope());
        let second = merge_hierarchy(&spend, &commerce, &scope());

        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_conv_rate_fallback_used_only_when_funnel_empty() {
        let with_funnel = CommerceMetrics {
            sales: 2,
            partials: 6,
            conversion_rate: 99.0,
            ..CommerceMetrics::default()
        };
        let kpis = compute_kpis(10.0, Some(&with_funnel));
        // 2 / (6 + 2), declines excluded; the stored rate is ignored.
        assert!((kpis.conv_rate - 25.0).abs() < 1e-9);

        let funnel_empty = CommerceMetrics {
            conversion_rate: 12.5,
            ..CommerceMetrics::default()
        };
        let kpis = compute_kpis(10.0, Some(&funnel_empty));
        assert!((kpis.conv_rate - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_denominator_rules() {
        let no_sales = CommerceMetrics {
            sales_total: 50.0,
            ..CommerceMetrics::default()
        };
        let kpis = compute_kpis(0.0, Some(&no_sales));
        assert_eq!(kpis.roas, 0.0);
        assert_eq!(kpis.cpp, 0.0);
        assert_eq!(kpis.aov, 0.0);
    }

    #[test]
    fn test_failed_lookup_error_carried_onto_campaign() {
        let mut tree = CommerceTree::new();
        tree.insert(
            ScopeName::Named("A".to_string()),
            CommerceCampaign {
                coc_data: None,
                adsets: HashMap::new(),
                error: Some("HTTP 500: upstream".to_string()),
            },
        );

        let report = merge_hierarchy(&spend_tree(), &tree, &scope());
        let campaign = &report.campaigns[0];
        assert!(campaign.coc_data.is_none());
        assert_eq!(campaign.coc_error.as_deref(), Some("HTTP 500: upstream"));
    }
}
