use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TargetSelection;
use crate::domain::rule::EscalationRule;
use crate::domain::user::User;

/// Chooses who receives an auto-escalated complaint. `candidates` are the active users
/// holding the rule's role, ordered by user id.
pub trait TargetSelector: Send + Sync {
    fn select<'a>(&self, rule: &EscalationRule, candidates: &'a [User]) -> Option<&'a User>;
}

impl<F> TargetSelector for F
where
    F: Fn(&EscalationRule, &[User]) -> Option<usize> + Send + Sync,
{
    fn select<'a>(&self, rule: &EscalationRule, candidates: &'a [User]) -> Option<&'a User> {
        self(rule, candidates).and_then(|index| candidates.get(index))
    }
}

#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    cursor: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TargetSelector for RoundRobinSelector {
    fn select<'a>(&self, _rule: &EscalationRule, candidates: &'a [User]) -> Option<&'a User> {
        if candidates.is_empty() {
            return None;
        }
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        candidates.get(turn % candidates.len())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FirstCandidateSelector;

impl TargetSelector for FirstCandidateSelector {
    fn select<'a>(&self, _rule: &EscalationRule, candidates: &'a [User]) -> Option<&'a User> {
        candidates.first()
    }
}

#[derive(Debug)]
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }
}

impl TargetSelector for RandomSelector {
    fn select<'a>(&self, _rule: &EscalationRule, candidates: &'a [User]) -> Option<&'a User> {
        if candidates.is_empty() {
            return None;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates.get(rng.gen_range(0..candidates.len()))
    }
}

pub fn selector_for(selection: TargetSelection, seed: Option<u64>) -> Arc<dyn TargetSelector> {
    match selection {
        TargetSelection::RoundRobin => Arc::new(RoundRobinSelector::new()),
        TargetSelection::First => Arc::new(FirstCandidateSelector),
        TargetSelection::Random => match seed {
            Some(seed) => Arc::new(RandomSelector::seeded(seed)),
            None => Arc::new(RandomSelector::from_entropy()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        selector_for, FirstCandidateSelector, RandomSelector, RoundRobinSelector, TargetSelector,
    };
    use crate::config::TargetSelection;
    use crate::domain::rule::{EscalationRole, EscalationRule, RuleId};
    use crate::domain::user::{Role, User, UserId};

    fn rule() -> EscalationRule {
        EscalationRule {
            id: RuleId(1),
            category_id: None,
            priority: None,
            hours_before_escalation: 24,
            escalate_to_role: EscalationRole::Admin,
            active: true,
        }
    }

    fn admins(ids: &[&str]) -> Vec<User> {
        ids.iter()
            .map(|id| User {
                id: UserId((*id).to_owned()),
                name: (*id).to_owned(),
                email: format!("{id}@example.edu"),
                role: Role::Admin,
                active: true,
            })
            .collect()
    }

    #[test]
    fn round_robin_cycles_through_candidates() {
        let selector = RoundRobinSelector::new();
        let candidates = admins(&["a", "b", "c"]);

        let picks: Vec<_> = (0..4)
            .filter_map(|_| selector.select(&rule(), &candidates))
            .map(|user| user.id.0.as_str())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn empty_candidate_list_selects_nobody() {
        let rule = rule();
        assert!(RoundRobinSelector::new().select(&rule, &[]).is_none());
        assert!(FirstCandidateSelector.select(&rule, &[]).is_none());
        assert!(RandomSelector::seeded(7).select(&rule, &[]).is_none());
    }

    #[test]
    fn seeded_random_selection_is_reproducible() {
        let candidates = admins(&["a", "b", "c", "d", "e"]);
        let first = RandomSelector::seeded(42);
        let second = RandomSelector::seeded(42);

        for _ in 0..10 {
            assert_eq!(
                first.select(&rule(), &candidates).map(|user| &user.id),
                second.select(&rule(), &candidates).map(|user| &user.id)
            );
        }
    }

    #[test]
    fn closures_act_as_selectors() {
        let last = |_: &EscalationRule, candidates: &[User]| candidates.len().checked_sub(1);
        let candidates = admins(&["a", "b"]);

        assert_eq!(last.select(&rule(), &candidates).map(|user| user.id.0.as_str()), Some("b"));
    }

    #[test]
    fn configured_strategy_builds_matching_selector() {
        let candidates = admins(&["a", "b"]);
        let first = selector_for(TargetSelection::First, None);

        for _ in 0..3 {
            assert_eq!(first.select(&rule(), &candidates).map(|user| user.id.0.as_str()), Some("a"));
        }
    }
}
