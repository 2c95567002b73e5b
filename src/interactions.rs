//! Naive drug interaction checker / 简易药物相互作用检查
//!
//! Two kinds of warnings are produced for every unordered pair of medicines:
//! - `duplicate_ingredient`: the compositions share ingredient tokens
//! - `known_interaction`: an ingredient appears in [`INTERACTION_RULES`]
//!
//! Rule warnings are emitted once per (rule token, other token) combination,
//! so a pair can carry several near-identical entries.

use serde::{Deserialize, Serialize};

use crate::dataset::MedicineRecord;
use crate::search::tokenizer::ingredient_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    DuplicateIngredient,
    KnownInteraction,
    NoInteractions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Medium,
    High,
}

/// Static rule: ingredient token -> warning / 规则表条目
pub struct InteractionRule {
    pub ingredient: &'static str,
    pub warning: &'static str,
    pub severity: Severity,
}

pub const INTERACTION_RULES: [InteractionRule; 3] = [
    InteractionRule {
        ingredient: "paracetamol",
        warning: "Do not take multiple medicines containing Paracetamol together",
        severity: Severity::High,
    },
    InteractionRule {
        ingredient: "aspirin",
        warning: "Aspirin may interact with blood thinners and NSAIDs",
        severity: Severity::Medium,
    },
    InteractionRule {
        ingredient: "ibuprofen",
        warning: "Avoid taking with other NSAIDs or aspirin",
        severity: Severity::Medium,
    },
];

pub fn rule_for(token: &str) -> Option<&'static InteractionRule> {
    INTERACTION_RULES.iter().find(|r| r.ingredient == token)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medicine1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medicine2: Option<String>,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    pub warning: String,
    pub severity: Severity,
    pub recommendation: String,
}

impl InteractionWarning {
    fn no_interactions() -> Self {
        Self {
            medicine1: None,
            medicine2: None,
            kind: InteractionKind::NoInteractions,
            ingredients: None,
            warning: "No known interactions detected".to_string(),
            severity: Severity::None,
            recommendation: "Always consult a healthcare professional before taking multiple medications"
                .to_string(),
        }
    }
}

struct Profile<'a> {
    name: &'a str,
    tokens: Vec<String>,
}

/// Push one `known_interaction` per (rule token in `from`, other token in `to`)
fn push_rule_warnings(out: &mut Vec<InteractionWarning>, first: &Profile, second: &Profile, from: &Profile, to: &Profile) {
    for ingredient in &from.tokens {
        let Some(rule) = rule_for(ingredient) else {
            continue;
        };
        for other in to.tokens.iter().filter(|t| *t != ingredient) {
            tracing::trace!("rule {} matched against {}", rule.ingredient, other);
            out.push(InteractionWarning {
                medicine1: Some(first.name.to_string()),
                medicine2: Some(second.name.to_string()),
                kind: InteractionKind::KnownInteraction,
                ingredients: None,
                warning: rule.warning.to_string(),
                severity: rule.severity,
                recommendation: "Consult a healthcare professional".to_string(),
            });
        }
    }
}

/// Check every unordered pair of `records` / 检查所有药品两两组合
///
/// Never fails. Without any finding a single `no_interactions` entry is returned.
pub fn check_interactions(records: &[&MedicineRecord]) -> Vec<InteractionWarning> {
    let profiles: Vec<Profile> = records
        .iter()
        .map(|r| Profile {
            name: &r.name,
            tokens: ingredient_tokens(&r.composition),
        })
        .collect();

    let mut warnings = Vec::new();

    for (i, a) in profiles.iter().enumerate() {
        for b in profiles.iter().skip(i + 1) {
            let common: Vec<String> = a
                .tokens
                .iter()
                .filter(|t| b.tokens.contains(t))
                .cloned()
                .collect();

            if !common.is_empty() {
                warnings.push(InteractionWarning {
                    medicine1: Some(a.name.to_string()),
                    medicine2: Some(b.name.to_string()),
                    kind: InteractionKind::DuplicateIngredient,
                    ingredients: Some(common),
                    warning: "These medicines contain common active ingredients".to_string(),
                    severity: Severity::High,
                    recommendation: "Consult a healthcare professional before taking together".to_string(),
                });
            }

            // Both directions, so the result does not depend on input order
            push_rule_warnings(&mut warnings, a, b, a, b);
            push_rule_warnings(&mut warnings, a, b, b, a);
        }
    }

    if warnings.is_empty() {
        return vec![InteractionWarning::no_interactions()];
    }

    tracing::debug!("interaction check over {} medicines: {} warnings", records.len(), warnings.len());
    warnings
}
