use std::cmp::Reverse;
use std::collections::HashSet;

use crate::domain::complaint::Complaint;
use crate::domain::rule::EscalationRule;
use crate::errors::DomainError;

/// Read-only rule collection the escalation engine evaluates against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<EscalationRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<EscalationRule>) -> Result<Self, DomainError> {
        if let Some(rule) = rules.iter().find(|rule| rule.hours_before_escalation == 0) {
            return Err(DomainError::Validation(format!(
                "escalation rule {} must allow at least one hour",
                rule.id
            )));
        }
        let mut seen = HashSet::new();
        if let Some(rule) = rules.iter().find(|rule| !seen.insert(rule.id)) {
            return Err(DomainError::Validation(format!(
                "escalation rule {} is defined more than once",
                rule.id
            )));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[EscalationRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matching<'r, 'c: 'r>(
        &'r self,
        complaint: &'c Complaint,
    ) -> impl Iterator<Item = &'r EscalationRule> + 'r {
        self.rules.iter().filter(move |rule| rule.matches(complaint))
    }

    /// The rule governing a complaint: most specific first, then the shortest
    /// deadline, then the lowest rule id.
    pub fn select(&self, complaint: &Complaint) -> Option<&EscalationRule> {
        self.rules.iter().filter(|rule| rule.matches(complaint)).min_by_key(|rule| {
            (Reverse(rule.specificity()), rule.hours_before_escalation, rule.id)
        })
    }
}
