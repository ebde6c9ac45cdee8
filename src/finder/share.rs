// src/finder/share.rs

use crate::models::{CountryCode, PartnerShare, TradeFlowRecord};
use std::collections::BTreeMap;

/// Per-partner import table for one reporter, plus the partners above threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareTable {
    pub partners: Vec<PartnerShare>,
    pub qualifying: Vec<PartnerShare>,
}

impl ShareTable {
    pub fn qualifying_codes(&self) -> impl Iterator<Item = CountryCode> + '_ {
        self.qualifying.iter().map(|p| p.partner)
    }
}

/// Groups one reporter's import rows by partner and flags the partners whose
/// imports exceed `t_market` of `reference_production`.
///
/// World-aggregate and self-trade rows are dropped first. Partners come out
/// ordered by (ISO, code). The comparison is strict, and a zero reference
/// production leaves every share undefined so nothing qualifies.
pub fn partner_shares(
    records: &[TradeFlowRecord],
    reference_production: f64,
    t_market: f64,
) -> ShareTable {
    let mut grouped: BTreeMap<(String, CountryCode), PartnerShare> = BTreeMap::new();

    for record in records {
        if record.is_world_aggregate() || record.is_self_trade() {
            continue;
        }
        grouped
            .entry((record.partner_iso.clone(), record.partner))
            .or_insert_with(|| PartnerShare {
                partner: record.partner,
                partner_iso: record.partner_iso.clone(),
                partner_name: record.partner_name.clone(),
                net_weight_kg: 0.0,
                share: None,
            })
            .net_weight_kg += record.net_weight_kg;
    }

    let partners: Vec<PartnerShare> = grouped
        .into_values()
        .map(|mut p| {
            p.share = import_share(p.net_weight_kg, reference_production);
            p
        })
        .collect();

    let qualifying = partners
        .iter()
        .filter(|p| matches!(p.share, Some(share) if share > t_market))
        .cloned()
        .collect();

    ShareTable {
        partners,
        qualifying,
    }
}

fn import_share(weight: f64, reference_production: f64) -> Option<f64> {
    if reference_production > 0.0 {
        let share = weight / reference_production;
        share.is_finite().then_some(share)
    } else {
        None
    }
}
