// Technology stack fingerprinting

use crate::error::StageError;
use crate::model::{TechCategory, TechProfile, TechSignature};
use crate::signals::PageSignals;
use crate::signatures::{SignatureTable, merge_matches};
use siteprobe_scanner::DomSnapshot;
use std::collections::BTreeMap;

const MAX_SITE_EVIDENCE: usize = 10;

/// Frameworks, libraries, analytics and CMS detected on one page.
pub fn detect_stack(
    dom: &DomSnapshot,
    table: &SignatureTable,
) -> Result<Vec<TechSignature>, StageError> {
    let signals = PageSignals::collect(dom)?;
    let matches = table.matches(&signals, |category| !category.is_integration());
    Ok(merge_matches(&matches))
}

/// Combine per-page signatures into the site profile.
#[derive(Debug, Default)]
pub struct TechAccumulator {
    merged: BTreeMap<(TechCategory, String), TechSignature>,
}

impl TechAccumulator {
    pub fn add(&mut self, signatures: &[TechSignature]) {
        for signature in signatures {
            let entry = self
                .merged
                .entry((signature.category, signature.name.clone()))
                .or_insert_with(|| TechSignature {
                    evidence: Vec::new(),
                    confidence: 0.0,
                    ..signature.clone()
                });
            entry.confidence = entry.confidence.max(signature.confidence);
            for evidence in &signature.evidence {
                if entry.evidence.len() < MAX_SITE_EVIDENCE && !entry.evidence.contains(evidence) {
                    entry.evidence.push(evidence.clone());
                }
            }
        }
    }

    pub fn finish(self) -> TechProfile {
        TechProfile {
            signatures: self.merged.into_values().collect(),
        }
    }
}
