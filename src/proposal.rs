//! A module which contains the definition of the proposal identifier used to order rounds of the
//! basic Paxos algorithm.

use std::fmt;

use uuid::Uuid;

/// The identifier of one round of the basic Paxos algorithm. It is a pair of a proposal number and
/// the unique identifier of the node which created it, compared lexicographically. The node
/// identifier acts as a tiebreak, so that two identifiers created by different nodes are always
/// distinct and comparable, even when the nodes picked the same proposal number.
///
/// "No identifier yet" is represented as `Option<ProposalId>`: `None` orders strictly below every
/// real identifier, so `Some(id) > None` holds for every `id`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalId {
    // The proposal number. It is strictly positive: nodes start counting at 1.
    pub number: u64,

    // The unique identifier of the node which created this proposal identifier.
    pub node_uid: Uuid,
}

impl ProposalId {
    pub fn new(number: u64, node_uid: Uuid) -> Self {
        ProposalId { number, node_uid }
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.number, self.node_uid)
    }
}
