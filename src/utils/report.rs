// src/utils/report.rs

use crate::enumeration::driver::{DerivativeRecord, EnumerationSummary};
use crate::model::ParentCell;

/// Per-index statistics of one enumeration run
pub fn summary_table(summary: &EnumerationSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Species: {}   Parent sites: {}\n",
        summary.num_type, summary.num_site_parent
    ));
    out.push_str("--------------------------------------------------\n");
    out.push_str(&format!(
        "{:<8} {:<10} {:<10} {:<10} {:<10}\n",
        "Index", "HNFs", "Reduced", "SNFs", "Labelings"
    ));
    out.push_str("--------------------------------------------------\n");

    for s in &summary.indices {
        out.push_str(&format!(
            "{:<8} {:<10} {:<10} {:<10} {:<10}\n",
            s.index, s.num_hnf, s.num_reduced_hnf, s.num_snf_classes, s.num_labelings
        ));
    }

    out.push_str("--------------------------------------------------\n");
    out.push_str(&format!(
        "Total: {} structures in {:.2}s{}\n",
        summary.total,
        summary.elapsed_secs,
        if summary.truncated { " (truncated)" } else { "" }
    ));
    out
}

/// First `limit` records, one line each
pub fn records_table(records: &[DerivativeRecord], species: &[String], limit: usize) -> String {
    let mut out = String::new();
    for (i, r) in records.iter().take(limit).enumerate() {
        let decoration: String = r
            .labeling
            .iter()
            .map(|&s| species.get(s).map_or_else(|| s.to_string(), |name| name.clone()))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "{:<6} n={:<3} snf={:?} hnf={:?}  {}\n",
            i + 1,
            r.index,
            r.snf_diagonal,
            r.hnf,
            decoration
        ));
    }
    if records.len() > limit {
        out.push_str(&format!("... and {} more structures.\n", records.len() - limit));
    }
    out
}

pub fn parent_summary(parent: &ParentCell, space_group_number: i32) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Parent: {} sites, space group #{}\n",
        parent.num_sites(),
        space_group_number
    ));
    for (element, frac) in parent.site_elements.iter().zip(parent.frac_coords()) {
        out.push_str(&format!(
            "  {:<4} {:<10.4} {:<10.4} {:<10.4}\n",
            element, frac[0], frac[1], frac[2]
        ));
    }
    out
}
