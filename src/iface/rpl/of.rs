//! Objective functions.
//!
//! The objective function decides how a Rank is computed from a parent's
//! Rank, which candidate parent is preferable, and which DODAG to join
//! when several are available. The function in use is selected at DIO
//! parse time by the objective code point (OCP) carried in the DODAG
//! Configuration option; a DIO advertising an unsupported OCP does not
//! create an instance.

use super::consts::DEFAULT_MIN_HOP_RANK_INCREASE;
use super::dag::Dodag;
use super::parents::Parent;
use super::rank::Rank;

pub(crate) trait ObjectiveFunction {
    /// The objective code point of this objective function.
    fn objective_code_point(&self) -> u16;

    /// Return the Rank resulting from selecting the given parent.
    fn calculate_rank(&self, parent_rank: Rank, link_metric: u16) -> Rank;

    /// Return whether `candidate` is a better parent than `current`.
    fn parent_is_better(&self, current: &Parent, candidate: &Parent) -> bool;

    /// Return whether `candidate` is a better DODAG than `current`.
    fn dag_is_better(&self, current: &Dodag, candidate: &Dodag) -> bool;

    /// Forget accumulated state on a global repair.
    fn reset(&mut self);

    fn min_hop_rank_increase(&self) -> u16;
    fn set_min_hop_rank_increase(&mut self, value: u16);

    fn max_rank_increase(&self) -> u16;
    fn set_max_rank_increase(&mut self, value: u16);
}

/// Objective Function Zero, RFC 6552.
#[derive(Debug)]
pub(crate) struct ObjectiveFunction0 {
    min_hop_rank_increase: u16,
    max_rank_increase: u16,
}

impl ObjectiveFunction0 {
    pub(crate) const OCP: u16 = 0;

    const RANK_STRETCH: u16 = 0;
    const RANK_FACTOR: u16 = 1;
    const RANK_STEP: u16 = 3;

    fn rank_increase(&self) -> u16 {
        (Self::RANK_FACTOR * Self::RANK_STEP + Self::RANK_STRETCH) * self.min_hop_rank_increase
    }
}

impl Default for ObjectiveFunction0 {
    fn default() -> Self {
        Self {
            min_hop_rank_increase: DEFAULT_MIN_HOP_RANK_INCREASE,
            // OF0 does not define a maximum rank increase; 0 leaves the
            // depth of the DODAG unlimited.
            max_rank_increase: 0,
        }
    }
}

impl ObjectiveFunction for ObjectiveFunction0 {
    fn objective_code_point(&self) -> u16 {
        Self::OCP
    }

    fn calculate_rank(&self, parent_rank: Rank, _link_metric: u16) -> Rank {
        if parent_rank.is_infinite() {
            return Rank::INFINITE;
        }

        Rank::new(
            parent_rank
                .raw_value()
                .saturating_add(self.rank_increase()),
            self.min_hop_rank_increase,
        )
    }

    fn parent_is_better(&self, current: &Parent, candidate: &Parent) -> bool {
        candidate.rank.dag_rank() < current.rank.dag_rank()
    }

    fn dag_is_better(&self, current: &Dodag, candidate: &Dodag) -> bool {
        if current.grounded != candidate.grounded {
            return candidate.grounded;
        }
        if current.preference != candidate.preference {
            return candidate.preference > current.preference;
        }
        candidate.rank < current.rank
    }

    fn reset(&mut self) {}

    fn min_hop_rank_increase(&self) -> u16 {
        self.min_hop_rank_increase
    }

    fn set_min_hop_rank_increase(&mut self, value: u16) {
        self.min_hop_rank_increase = value;
    }

    fn max_rank_increase(&self) -> u16 {
        self.max_rank_increase
    }

    fn set_max_rank_increase(&mut self, value: u16) {
        self.max_rank_increase = value;
    }
}

/// The Minimum Rank with Hysteresis Objective Function, RFC 6719, with
/// ETX as its metric carried directly in the Rank.
#[derive(Debug)]
pub(crate) struct Mrhof {
    min_hop_rank_increase: u16,
    max_rank_increase: u16,
}

impl Mrhof {
    pub(crate) const OCP: u16 = 1;

    /// ETX fixed-point divisor: an ETX of 1 is 128.
    pub(crate) const ETX_DIVISOR: u16 = 128;
    /// Links with a higher metric are unusable.
    pub(crate) const MAX_LINK_METRIC: u16 = 10 * Self::ETX_DIVISOR;
    /// Paths with a higher cost are unusable.
    const MAX_PATH_COST: u32 = 100 * Self::ETX_DIVISOR as u32;
    /// A candidate must beat the current parent by this margin before we
    /// switch. Keeps the topology from oscillating on metric noise.
    const PARENT_SWITCH_THRESHOLD: u32 = Self::ETX_DIVISOR as u32 / 2;

    fn path_cost(&self, parent: &Parent) -> u32 {
        if parent.link_metric > Self::MAX_LINK_METRIC {
            return Self::MAX_PATH_COST + 1;
        }
        parent.path_cost()
    }
}

impl Default for Mrhof {
    fn default() -> Self {
        Self {
            min_hop_rank_increase: DEFAULT_MIN_HOP_RANK_INCREASE,
            max_rank_increase: 7 * DEFAULT_MIN_HOP_RANK_INCREASE,
        }
    }
}

impl ObjectiveFunction for Mrhof {
    fn objective_code_point(&self) -> u16 {
        Self::OCP
    }

    fn calculate_rank(&self, parent_rank: Rank, link_metric: u16) -> Rank {
        if parent_rank.is_infinite() {
            return Rank::INFINITE;
        }

        // The rank increase is the link metric, but never less than
        // MinHopRankIncrease.
        let rank_increase = link_metric.max(self.min_hop_rank_increase);

        let value = parent_rank.raw_value().saturating_add(rank_increase);
        if value as u32 > Self::MAX_PATH_COST {
            return Rank::INFINITE;
        }

        Rank::new(value, self.min_hop_rank_increase)
    }

    fn parent_is_better(&self, current: &Parent, candidate: &Parent) -> bool {
        self.path_cost(candidate) + Self::PARENT_SWITCH_THRESHOLD < self.path_cost(current)
    }

    fn dag_is_better(&self, current: &Dodag, candidate: &Dodag) -> bool {
        if current.grounded != candidate.grounded {
            return candidate.grounded;
        }
        if current.preference != candidate.preference {
            return candidate.preference > current.preference;
        }
        candidate.rank < current.rank
    }

    fn reset(&mut self) {}

    fn min_hop_rank_increase(&self) -> u16 {
        self.min_hop_rank_increase
    }

    fn set_min_hop_rank_increase(&mut self, value: u16) {
        self.min_hop_rank_increase = value;
    }

    fn max_rank_increase(&self) -> u16 {
        self.max_rank_increase
    }

    fn set_max_rank_increase(&mut self, value: u16) {
        self.max_rank_increase = value;
    }
}

/// The objective function of an instance, dispatched over the supported
/// implementations. New objective functions are added as new trait
/// implementations plus a variant here.
#[derive(Debug)]
pub(crate) enum Of {
    Of0(ObjectiveFunction0),
    Mrhof(Mrhof),
}

impl Of {
    /// Look up an objective function by its objective code point.
    pub(crate) fn from_ocp(ocp: u16) -> Option<Self> {
        match ocp {
            ObjectiveFunction0::OCP => Some(Of::Of0(ObjectiveFunction0::default())),
            Mrhof::OCP => Some(Of::Mrhof(Mrhof::default())),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn ObjectiveFunction {
        match self {
            Of::Of0(of) => of,
            Of::Mrhof(of) => of,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ObjectiveFunction {
        match self {
            Of::Of0(of) => of,
            Of::Mrhof(of) => of,
        }
    }
}

impl ObjectiveFunction for Of {
    fn objective_code_point(&self) -> u16 {
        self.inner().objective_code_point()
    }

    fn calculate_rank(&self, parent_rank: Rank, link_metric: u16) -> Rank {
        self.inner().calculate_rank(parent_rank, link_metric)
    }

    fn parent_is_better(&self, current: &Parent, candidate: &Parent) -> bool {
        self.inner().parent_is_better(current, candidate)
    }

    fn dag_is_better(&self, current: &Dodag, candidate: &Dodag) -> bool {
        self.inner().dag_is_better(current, candidate)
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn min_hop_rank_increase(&self) -> u16 {
        self.inner().min_hop_rank_increase()
    }

    fn set_min_hop_rank_increase(&mut self, value: u16) {
        self.inner_mut().set_min_hop_rank_increase(value)
    }

    fn max_rank_increase(&self) -> u16 {
        self.inner().max_rank_increase()
    }

    fn set_max_rank_increase(&mut self, value: u16) {
        self.inner_mut().set_max_rank_increase(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Ipv6Address, RplInstanceId};

    fn parent(rank: u16, link_metric: u16) -> Parent {
        Parent {
            address: Ipv6Address::default(),
            rank: Rank::new(rank, DEFAULT_MIN_HOP_RANK_INCREASE),
            dtsn: Default::default(),
            link_metric,
            updated: false,
            router_address: None,
            nbr: None,
            instance_id: RplInstanceId::from(0x1e),
            dodag_id: Default::default(),
        }
    }

    #[test]
    fn of0_rank_increase() {
        let of = ObjectiveFunction0::default();
        assert_eq!(
            of.calculate_rank(Rank::ROOT, 0),
            Rank::new(256 + 3 * 256, DEFAULT_MIN_HOP_RANK_INCREASE)
        );
        assert_eq!(of.calculate_rank(Rank::INFINITE, 0), Rank::INFINITE);
    }

    #[test]
    fn mrhof_rank_is_path_cost() {
        let of = Mrhof::default();
        // Rank increase is the link metric when above MinHopRankIncrease.
        assert_eq!(
            of.calculate_rank(Rank::ROOT, 3 * Mrhof::ETX_DIVISOR),
            Rank::new(256 + 3 * 128, DEFAULT_MIN_HOP_RANK_INCREASE)
        );
        // ... and MinHopRankIncrease when below it.
        assert_eq!(
            of.calculate_rank(Rank::ROOT, 128),
            Rank::new(256 + 256, DEFAULT_MIN_HOP_RANK_INCREASE)
        );
    }

    #[test]
    fn mrhof_hysteresis() {
        let of = Mrhof::default();
        let current = parent(512, 2 * Mrhof::ETX_DIVISOR);

        // Marginally better: no switch.
        let candidate = parent(512, 2 * Mrhof::ETX_DIVISOR - 10);
        assert!(!of.parent_is_better(&current, &candidate));

        // Better by more than the threshold: switch.
        let candidate = parent(256, Mrhof::ETX_DIVISOR);
        assert!(of.parent_is_better(&current, &candidate));
    }

    #[test]
    fn unsupported_ocp() {
        assert!(Of::from_ocp(0).is_some());
        assert!(Of::from_ocp(1).is_some());
        assert!(Of::from_ocp(0x1234).is_none());
    }
}
