use rand::seq::SliceRandom;
use rand::Rng;

use super::domain::{Ubs, UbsId};

/// Which candidate set produced a main-unit assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTier {
    /// Active unit serving the patient's neighborhood.
    Neighborhood,
    /// Any active unit.
    AnyActive,
    /// Any unit, active or not.
    AnyUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainUbsAssignment {
    pub ubs_id: UbsId,
    pub tier: AssignmentTier,
}

/// A new main unit is needed when none is set or the neighborhood was edited.
pub fn needs_assignment(
    current: Option<UbsId>,
    previous_neighborhood: Option<&str>,
    neighborhood: &str,
) -> bool {
    current.is_none() || previous_neighborhood.is_some_and(|previous| previous != neighborhood)
}

/// Candidate sets in fallback order.
pub fn candidate_tiers<'a>(
    units: &'a [Ubs],
    neighborhood: &str,
) -> [(AssignmentTier, Vec<&'a Ubs>); 3] {
    [
        (
            AssignmentTier::Neighborhood,
            units
                .iter()
                .filter(|unit| unit.active && unit.serves(neighborhood))
                .collect(),
        ),
        (
            AssignmentTier::AnyActive,
            units.iter().filter(|unit| unit.active).collect(),
        ),
        (AssignmentTier::AnyUnit, units.iter().collect()),
    ]
}

/// Picks uniformly from the first non-empty tier; `None` only when there are no units.
pub fn select_main_ubs<R: Rng + ?Sized>(
    units: &[Ubs],
    neighborhood: &str,
    rng: &mut R,
) -> Option<MainUbsAssignment> {
    candidate_tiers(units, neighborhood)
        .into_iter()
        .find_map(|(tier, candidates)| {
            candidates.choose(&mut *rng).map(|unit| MainUbsAssignment {
                ubs_id: unit.id,
                tier,
            })
        })
}
