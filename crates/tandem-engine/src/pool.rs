//! Account pair groups and quota-driven failover.
//!
//! Orders always go to the active group. When either of its ledgers denies
//! an admission, the pool scans the remaining groups in configured order
//! and promotes the first one whose ledgers both admit. Groups that fail
//! to connect are marked dead for the rest of the run.

use std::sync::Arc;

use tracing::warn;

use tandem_account::AccountHandle;
use tandem_quota::{Admission, WindowKind};

use crate::error::{EngineError, EngineResult};

/// A matched pair of accounts that trade against each other.
pub struct AccountPairGroup {
    name: String,
    leg_a: Arc<AccountHandle>,
    leg_b: Arc<AccountHandle>,
}

impl AccountPairGroup {
    pub fn new(
        name: impl Into<String>,
        leg_a: Arc<AccountHandle>,
        leg_b: Arc<AccountHandle>,
    ) -> Self {
        Self {
            name: name.into(),
            leg_a,
            leg_b,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leg_a(&self) -> &Arc<AccountHandle> {
        &self.leg_a
    }

    pub fn leg_b(&self) -> &Arc<AccountHandle> {
        &self.leg_b
    }

    /// Ask both ledgers for one more order. Leg A is checked first, so a
    /// double denial reports leg A's window.
    pub fn admission_at(&self, now: u64) -> GroupAdmission {
        for handle in [&self.leg_a, &self.leg_b] {
            if let Admission::Denied {
                window,
                retry_after_ms,
            } = handle.ledger().can_admit_at(now)
            {
                return GroupAdmission::Denied {
                    account: handle.name().to_string(),
                    window,
                    retry_after_ms,
                };
            }
        }
        GroupAdmission::Granted
    }

    /// Milliseconds until both legs would admit again. Zero if they
    /// already do. The group frees up when its slower leg does.
    pub fn unlock_wait_ms_at(&self, now: u64) -> u64 {
        let wait_a = self.leg_a.ledger().can_admit_at(now).retry_after_ms();
        let wait_b = self.leg_b.ledger().can_admit_at(now).retry_after_ms();
        wait_a.max(wait_b)
    }
}

/// Verdict for one prospective paired order on a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAdmission {
    Granted,
    Denied {
        account: String,
        window: WindowKind,
        retry_after_ms: u64,
    },
}

impl GroupAdmission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Ordered collection of groups with one active at a time.
pub struct PoolManager {
    groups: Vec<AccountPairGroup>,
    active: usize,
    dead: Vec<bool>,
}

impl PoolManager {
    pub fn new(groups: Vec<AccountPairGroup>) -> EngineResult<Self> {
        if groups.is_empty() {
            return Err(EngineError::NoGroups);
        }
        let dead = vec![false; groups.len()];
        Ok(Self {
            groups,
            active: 0,
            dead,
        })
    }

    pub fn group(&self, index: usize) -> &AccountPairGroup {
        &self.groups[index]
    }

    pub fn active_group(&self) -> &AccountPairGroup {
        &self.groups[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn set_active(&mut self, index: usize) {
        self.active = index;
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_dead(&self, index: usize) -> bool {
        self.dead[index]
    }

    /// Groups still eligible for trading.
    pub fn live_groups(&self) -> usize {
        self.dead.iter().filter(|d| !**d).count()
    }

    /// Retire a group for the rest of the run.
    pub fn mark_dead(&mut self, index: usize) {
        if !self.dead[index] {
            self.dead[index] = true;
            warn!(group = self.groups[index].name(), "group marked dead");
        }
    }

    /// First live group, in configured order, whose ledgers both admit.
    pub fn find_admitting_at(&self, now: u64) -> Option<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.dead[*i])
            .find(|(_, g)| g.admission_at(now).is_granted())
            .map(|(i, _)| i)
    }

    /// Shortest wait until some live group admits. `None` when every
    /// group is dead.
    pub fn shortest_unlock_at(&self, now: u64) -> Option<u64> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.dead[*i])
            .map(|(_, g)| g.unlock_wait_ms_at(now))
            .min()
    }
}
