use crate::sources::ads::InsightRow;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeLevel {
    Campaign,
    Adset,
    Ad,
}

/// A scope name as reported by a provider. Rows that arrive without a name
/// fall back to the `Unknown` sentinel for their level; the sentinel is a
/// distinct variant so it can never collide with a real campaign literally
/// named "Unknown Campaign".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeName {
    Named(String),
    Unknown(ScopeLevel),
}

impl ScopeName {
    pub fn from_field(value: Option<&str>, level: ScopeLevel) -> Self {
        match value {
            Some(name) if !name.trim().is_empty() => Self::Named(name.to_string()),
            _ => Self::Unknown(level),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Unknown(ScopeLevel::Campaign) => "Unknown Campaign",
            Self::Unknown(ScopeLevel::Adset) => "Unknown Adset",
            Self::Unknown(ScopeLevel::Ad) => "Unknown Ad",
        }
    }

    /// Exact string equality against a commerce-side tag value. Sentinels
    /// never match a tag.
    pub fn matches(&self, tag: &str) -> bool {
        matches!(self, Self::Named(name) if name == tag)
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScopeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdSpend {
    pub name: ScopeName,
    pub spend: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdsetSpend {
    pub name: ScopeName,
    pub spend: f64,
    pub ads: Vec<AdSpend>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignSpend {
    pub name: ScopeName,
    pub spend: f64,
    pub adsets: Vec<AdsetSpend>,
}

/// Reshapes flat ad-level insight rows into the campaign → adset → ad tree.
/// Children appear in order of first appearance and are never sorted here.
///
/// Spend is accumulated at every level directly from the row; a parent's
/// spend is not derived by summing its children. Each row therefore
/// contributes the same value once per level.
pub fn build_spend_tree(rows: &[InsightRow]) -> Vec<CampaignSpend> {
    let mut campaigns: Vec<CampaignSpend> = Vec::new();

    for row in rows {
        let campaign_name = ScopeName::from_field(row.campaign_name.as_deref(), ScopeLevel::Campaign);
        let adset_name = ScopeName::from_field(row.adset_name.as_deref(), ScopeLevel::Adset);
        let ad_name = ScopeName::from_field(row.ad_name.as_deref(), ScopeLevel::Ad);
        let spend = row
            .spend
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0);

        let campaign_idx = match campaigns.iter().position(|c| c.name == campaign_name) {
            Some(idx) => idx,
            None => {
                campaigns.push(CampaignSpend {
                    name: campaign_name,
                    spend: 0.0,
                    adsets: Vec::new(),
                });
                campaigns.len() - 1
            }
        };
        let campaign = &mut campaigns[campaign_idx];
        campaign.spend += spend;

        let adset_idx = match campaign.adsets.iter().position(|a| a.name == adset_name) {
            Some(idx) => idx,
            None => {
                campaign.adsets.push(AdsetSpend {
                    name: adset_name,
                    spend: 0.0,
                    ads: Vec::new(),
                });
                campaign.adsets.len() - 1
            }
        };
        let adset = &mut campaign.adsets[adset_idx];
        adset.spend += spend;

        match adset.ads.iter().position(|a| a.name == ad_name) {
            Some(idx) => adset.ads[idx].spend += spend,
            None => adset.ads.push(AdSpend {
                name: ad_name,
                spend,
            }),
        }
    }

    campaigns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(campaign: &str, adset: &str, ad: &str, spend: &str) -> InsightRow {
        InsightRow {
            campaign_name: Some(campaign.to_string()),
            adset_name: Some(adset.to_string()),
            ad_name: Some(ad.to_string()),
            spend: Some(spend.to_string()),
        }
    }

    #[test]
    fn test_grouping_and_accumulation() {
        let rows = vec![
            row("Spring", "Lookalike", "video-1", "10.50"),
            row("Spring", "Lookalike", "video-2", "4.50"),
            row("Spring", "Retarget", "carousel", "2.00"),
            row("Winter", "Broad", "static", "7.25"),
        ];

        let tree = build_spend_tree(&rows);
        assert_eq!(tree.len(), 2);

        let spring = &tree[0];
        assert_eq!(spring.name, ScopeName::Named("Spring".to_string()));
        assert!((spring.spend - 17.0).abs() < 1e-9);
        assert_eq!(spring.adsets.len(), 2);
        assert!((spring.adsets[0].spend - 15.0).abs() < 1e-9);
        assert_eq!(spring.adsets[0].ads.len(), 2);
        assert!((spring.adsets[1].spend - 2.0).abs() < 1e-9);

        // Adset spend equals the sum of its ads even though both are
        // accumulated independently.
        let ads_sum: f64 = spring.adsets[0].ads.iter().map(|a| a.spend).sum();
        assert!((spring.adsets[0].spend - ads_sum).abs() < 1e-9);
    }

    #[test]
    fn test_first_appearance_order_is_preserved() {
        let rows = vec![
            row("Zeta", "z1", "a", "1"),
            row("Alpha", "a1", "a", "1"),
            row("Zeta", "z2", "a", "1"),
        ];

        let tree = build_spend_tree(&rows);
        assert_eq!(tree[0].name.as_str(), "Zeta");
        assert_eq!(tree[1].name.as_str(), "Alpha");
        assert_eq!(tree[0].adsets[0].name.as_str(), "z1");
        assert_eq!(tree[0].adsets[1].name.as_str(), "z2");
    }

    #[test]
    fn test_missing_names_fall_back_to_sentinels() {
        let rows = vec![InsightRow {
            campaign_name: None,
            adset_name: Some("  ".to_string()),
            ad_name: None,
            spend: Some("3.00".to_string()),
        }];

        let tree = build_spend_tree(&rows);
        assert_eq!(tree[0].name, ScopeName::Unknown(ScopeLevel::Campaign));
        assert_eq!(tree[0].name.as_str(), "Unknown Campaign");
        assert_eq!(tree[0].adsets[0].name.as_str(), "Unknown Adset");
        assert_eq!(tree[0].adsets[0].ads[0].name.as_str(), "Unknown Ad");
    }

    #[test]
    fn test_sentinel_does_not_collide_with_literal_name() {
        let named = ScopeName::Named("Unknown Campaign".to_string());
        let sentinel = ScopeName::Unknown(ScopeLevel::Campaign);

        assert_ne!(named, sentinel);
        assert!(named.matches("Unknown Campaign"));
        assert!(!sentinel.matches("Unknown Campaign"));
    }

    #[test]
    fn test_unparsable_spend_is_zero() {
        let rows = vec![
            InsightRow {
                campaign_name: Some("A".to_string()),
                adset_name: Some("x".to_string()),
                ad_name: Some("ad".to_string()),
                spend: Some("not-a-number".to_string()),
            },
            InsightRow {
                campaign_name: Some("A".to_string()),
                adset_name: Some("x".to_string()),
                ad_name: Some("ad".to_string()),
                spend: None,
            },
        ];

        let tree = build_spend_tree(&rows);
        assert_eq!(tree[0].spend, 0.0);
    }
}
