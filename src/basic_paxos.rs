//! The module that contains the structs representing proposers, acceptors and learners of the
//! basic Paxos algorithm, plus the composed node which plays all three roles at once. It also
//! contains the main logic of the algorithm.
//!
//! The algorithm here is deliberately decoupled from all messaging concerns: every outbound event
//! goes through a [`Messenger`](crate::messenger::Messenger), and inbound events arrive through
//! the `recv_*` methods, each of which runs to completion synchronously. Retransmits, timeouts and
//! liveness detection are the host's job; reordering, duplication and loss of messages never
//! compromise the decided value.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use log::Level;
use uuid::Uuid;

use crate::messenger::Messenger;
use crate::proposal::ProposalId;

/// The struct representing the proposer in the basic Paxos algorithm. A proposer drives rounds of
/// the Prepare/Promise phase until it collects a quorum of promises, at which point it becomes the
/// round's leader and drives its value to the acceptors.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Proposer<T> {
    // The unique identifier of the node acting as this proposer.
    node_uid: Uuid,

    // The number of promises which must be collected before this proposer leads the round. For
    // safety it must be a strict majority of the acceptor population.
    quorum_size: usize,

    // The value this proposer is driving, if any. It is either the value handed to set_proposal
    // or a previously accepted value learned from a Promise.
    proposed_value: Option<T>,

    // The identifier of the current round, if one has been started.
    proposal_id: Option<ProposalId>,

    // The highest previously-accepted identifier reported by any Promise of the current round.
    last_accepted_id: Option<ProposalId>,

    // The smallest proposal number this node has not used yet. It never decreases.
    next_proposal_number: u64,

    // The unique identifiers of the acceptors which promised the current round.
    promises_rcvd: HashSet<Uuid>,

    // True iff a quorum of promises has been collected for proposal_id and no newer round has
    // been started since.
    leader: bool,
}

impl<T> Proposer<T>
where
    T: Clone + Debug + PartialEq,
{
    pub fn new(node_uid: Uuid, quorum_size: usize) -> Self {
        Proposer {
            node_uid,
            quorum_size,
            proposed_value: None,
            proposal_id: None,
            last_accepted_id: None,
            next_proposal_number: 1,
            promises_rcvd: HashSet::new(),
            leader: false,
        }
    }

    /// Sets the proposal value for this node iff this node is not already aware of another
    /// proposal having already been accepted. Once a value is in flight it must be driven to the
    /// end of the instance, so later calls are no-ops.
    pub fn set_proposal<M: Messenger<T>>(&mut self, messenger: &mut M, value: T) {
        if self.proposed_value.is_none() {
            self.proposed_value = Some(value.clone());

            if self.leader {
                if let Some(proposal_id) = self.proposal_id {
                    messenger.send_accept(proposal_id, value);
                }
            }
        }
    }

    /// Starts a new round: abandons any leadership claim, picks a proposal identifier higher than
    /// any this node has used before, and broadcasts a Prepare for it.
    pub fn prepare<M: Messenger<T>>(&mut self, messenger: &mut M) {
        self.leader = false;
        self.promises_rcvd = HashSet::new();
        self.proposal_id = Some(ProposalId::new(self.next_proposal_number, self.node_uid));

        self.next_proposal_number += 1;

        if log_enabled!(Level::Info) {
            info!("[P={:?}] I will send Prepare for round {:?}.", self.node_uid, self.proposal_id);
        }

        if let Some(proposal_id) = self.proposal_id {
            messenger.send_prepare(proposal_id);
        }
    }

    /// Retransmits the Prepare of the current round without starting a new one. Does nothing if no
    /// round has been started yet.
    pub fn resend_prepare<M: Messenger<T>>(&mut self, messenger: &mut M) {
        if let Some(proposal_id) = self.proposal_id {
            messenger.send_prepare(proposal_id);
        }
    }

    /// Updates the proposal counter as proposals are seen on the network. When co-located with
    /// acceptors and/or learners, this avoids a message delay when attempting to assume leadership
    /// (a guaranteed NACK if the proposal number is too low). Proposals originating from this node
    /// never feed back into the counter.
    pub fn observe_proposal(&mut self, from_uid: Uuid, proposal_id: ProposalId) {
        if from_uid != self.node_uid
            && proposal_id >= ProposalId::new(self.next_proposal_number, self.node_uid)
        {
            self.next_proposal_number = proposal_id.number + 1;
        }
    }

    /// Called when an explicit NACK is sent in response to a Prepare message. The promised
    /// identifier it reports counts as an observed proposal; starting a new round is left to the
    /// host's retry policy.
    pub fn recv_prepare_nack(&mut self, from_uid: Uuid, _proposal_id: ProposalId, promised_id: ProposalId) {
        self.observe_proposal(from_uid, promised_id);
    }

    /// Called when an explicit NACK is sent in response to an Accept! message. The promised
    /// identifier counts as an observed proposal, so the next round starts above it.
    pub fn recv_accept_nack(&mut self, from_uid: Uuid, _proposal_id: ProposalId, promised_id: ProposalId) {
        self.observe_proposal(from_uid, promised_id);
    }

    /// Retransmits an Accept! message iff this node is the leader and has a proposal value.
    pub fn resend_accept<M: Messenger<T>>(&mut self, messenger: &mut M) {
        if self.leader {
            if let (Some(proposal_id), Some(value)) = (self.proposal_id, self.proposed_value.clone()) {
                messenger.send_accept(proposal_id, value);
            }
        }
    }

    /// Called when a Promise message is received from the network.
    pub fn recv_promise<M: Messenger<T>>(
        &mut self,
        messenger: &mut M,
        from_uid: Uuid,
        proposal_id: ProposalId,
        prev_accepted_id: Option<ProposalId>,
        prev_accepted_value: Option<T>,
    ) {
        if proposal_id > ProposalId::new(self.next_proposal_number - 1, self.node_uid) {
            self.next_proposal_number = proposal_id.number + 1;
        }

        if self.leader
            || Some(proposal_id) != self.proposal_id
            || self.promises_rcvd.contains(&from_uid)
        {
            return;
        }

        self.promises_rcvd.insert(from_uid);

        if log_enabled!(Level::Info) {
            info!(
                "[P={:?}] Promise from {:?} for round {}: {} of {} collected.",
                self.node_uid,
                from_uid,
                proposal_id,
                self.promises_rcvd.len(),
                self.quorum_size
            );
        }

        if prev_accepted_id > self.last_accepted_id {
            self.last_accepted_id = prev_accepted_id;

            // Only override the current proposal value if the acceptor has accepted one. An empty
            // report must not clobber a real local proposal.
            if let Some(value) = prev_accepted_value {
                self.proposed_value = Some(value);
            }
        }

        if self.promises_rcvd.len() == self.quorum_size {
            self.leader = true;

            messenger.on_leadership_acquired();

            if let Some(value) = self.proposed_value.clone() {
                messenger.send_accept(proposal_id, value);
            }
        }
    }

    pub fn node_uid(&self) -> Uuid {
        self.node_uid
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn set_quorum_size(&mut self, quorum_size: usize) {
        self.quorum_size = quorum_size;
    }

    pub fn proposed_value(&self) -> Option<&T> {
        self.proposed_value.as_ref()
    }

    pub fn proposal_id(&self) -> Option<ProposalId> {
        self.proposal_id
    }

    pub fn last_accepted_id(&self) -> Option<ProposalId> {
        self.last_accepted_id
    }

    pub fn next_proposal_number(&self) -> u64 {
        self.next_proposal_number
    }

    pub fn promises_rcvd(&self) -> &HashSet<Uuid> {
        &self.promises_rcvd
    }

    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

/// The struct representing the acceptor in the basic Paxos algorithm. An acceptor maintains the
/// monotonic promise which makes Paxos safe: once it has promised an identifier, it rejects every
/// older Prepare and Accept!, and it reports its most recently accepted value to newer proposers.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Acceptor<T> {
    // The highest identifier this acceptor has promised not to reject, if any. It never
    // decreases.
    promised_id: Option<ProposalId>,

    // The value of promised_id immediately before the most recent upgrade. It is reported in
    // Promise messages and is updated only when the promise is upgraded, never on the duplicate
    // or NACK paths.
    previous_id: Option<ProposalId>,

    // The identifier of the most recent Accept! honored, if any.
    accepted_id: Option<ProposalId>,

    // The value of the most recent Accept! honored, if any. Once set it is only ever replaced by
    // the value of another honored Accept!.
    accepted_value: Option<T>,
}

impl<T> Acceptor<T>
where
    T: Clone + Debug,
{
    pub fn new() -> Self {
        Acceptor {
            promised_id: None,
            previous_id: None,
            accepted_id: None,
            accepted_value: None,
        }
    }

    /// Called when a Prepare message is received from the network. A Prepare for the currently
    /// promised identifier is answered with an identical Promise, so that a proposer's retransmit
    /// is lossless.
    pub fn recv_prepare<M: Messenger<T>>(&mut self, messenger: &mut M, from_uid: Uuid, proposal_id: ProposalId) {
        if Some(proposal_id) == self.promised_id {
            // Duplicate of the currently promised proposal.
            messenger.send_promise(from_uid, proposal_id, self.previous_id, self.accepted_value.clone());
        } else if Some(proposal_id) > self.promised_id {
            self.previous_id = self.promised_id;
            self.promised_id = Some(proposal_id);

            if log_enabled!(Level::Info) {
                info!("I promised {} to {:?}.", proposal_id, from_uid);
            }

            messenger.send_promise(from_uid, proposal_id, self.previous_id, self.accepted_value.clone());
        } else if let Some(promised_id) = self.promised_id {
            messenger.send_prepare_nack(from_uid, proposal_id, promised_id);
        }
    }

    /// Called when an Accept! message is received from the network. The acceptance is broadcast
    /// to all learners.
    pub fn recv_accept_request<M: Messenger<T>>(
        &mut self,
        messenger: &mut M,
        from_uid: Uuid,
        proposal_id: ProposalId,
        value: T,
    ) {
        if Some(proposal_id) >= self.promised_id {
            self.promised_id = Some(proposal_id);
            self.accepted_id = Some(proposal_id);
            self.accepted_value = Some(value.clone());

            if log_enabled!(Level::Info) {
                info!("I accepted {} with {:?}.", proposal_id, value);
            }

            messenger.send_accepted(from_uid, proposal_id, value);
        } else if let Some(promised_id) = self.promised_id {
            messenger.send_accept_nack(from_uid, proposal_id, promised_id);
        }
    }

    pub fn promised_id(&self) -> Option<ProposalId> {
        self.promised_id
    }

    pub fn previous_id(&self) -> Option<ProposalId> {
        self.previous_id
    }

    pub fn accepted_id(&self) -> Option<ProposalId> {
        self.accepted_id
    }

    pub fn accepted_value(&self) -> Option<&T> {
        self.accepted_value.as_ref()
    }
}

impl<T> Default for Acceptor<T>
where
    T: Clone + Debug,
{
    fn default() -> Self {
        Acceptor::new()
    }
}

/// The per-proposal bookkeeping of a learner: how many acceptors ever accepted the proposal, how
/// many still stand by it, and the value they accepted it with.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProposalTally<T> {
    pub accept_count: usize,
    pub retain_count: usize,
    pub value: T,
}

/// The struct representing the learner in the basic Paxos algorithm. A learner tallies Accepted
/// messages across acceptors and declares a final value once any single proposal has been
/// accepted by a quorum of distinct acceptors.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Learner<T> {
    quorum_size: usize,

    // Maps a proposal identifier to its tally.
    proposals: HashMap<ProposalId, ProposalTally<T>>,

    // Maps an acceptor's unique identifier to the last proposal identifier seen from it.
    acceptors: HashMap<Uuid, ProposalId>,

    // Set exactly once, when some proposal reaches a quorum of acceptances.
    final_value: Option<T>,
    final_proposal_id: Option<ProposalId>,
}

impl<T> Learner<T>
where
    T: Clone + Debug + PartialEq,
{
    pub fn new(quorum_size: usize) -> Self {
        Learner {
            quorum_size,
            proposals: HashMap::new(),
            acceptors: HashMap::new(),
            final_value: None,
            final_proposal_id: None,
        }
    }

    /// True once this learner has reached a resolution.
    pub fn complete(&self) -> bool {
        self.final_proposal_id.is_some()
    }

    /// Called when an Accepted message is received from the network. An acceptor may switch its
    /// vote to a newer proposal at any time; the tallies follow it, and proposals no longer backed
    /// by any acceptor are dropped.
    pub fn recv_accepted<M: Messenger<T>>(
        &mut self,
        messenger: &mut M,
        from_uid: Uuid,
        proposal_id: ProposalId,
        accepted_value: T,
    ) {
        if self.final_value.is_some() {
            return; // already done
        }

        let last_pn = self.acceptors.get(&from_uid).copied();

        if Some(proposal_id) <= last_pn {
            return; // old message
        }

        self.acceptors.insert(from_uid, proposal_id);

        if let Some(last_pn) = last_pn {
            let dropped = {
                match self.proposals.get_mut(&last_pn) {
                    Some(tally) => {
                        tally.retain_count -= 1;
                        tally.retain_count == 0
                    }
                    None => false,
                }
            };

            if dropped {
                self.proposals.remove(&last_pn);

                if log_enabled!(Level::Info) {
                    info!("No acceptor stands by {} anymore; dropped.", last_pn);
                }
            }
        }

        let resolved = {
            let tally = self
                .proposals
                .entry(proposal_id)
                .or_insert_with(|| ProposalTally {
                    accept_count: 0,
                    retain_count: 0,
                    value: accepted_value.clone(),
                });

            assert_eq!(
                tally.value, accepted_value,
                "Bug: previously accepted value is not equal to current one for the same proposal"
            );

            tally.accept_count += 1;
            tally.retain_count += 1;

            tally.accept_count == self.quorum_size
        };

        if resolved {
            self.final_value = Some(accepted_value.clone());
            self.final_proposal_id = Some(proposal_id);
            self.proposals.clear();
            self.acceptors.clear();

            messenger.on_resolution(proposal_id, accepted_value);
        }
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn set_quorum_size(&mut self, quorum_size: usize) {
        self.quorum_size = quorum_size;
    }

    pub fn proposals(&self) -> &HashMap<ProposalId, ProposalTally<T>> {
        &self.proposals
    }

    pub fn acceptors(&self) -> &HashMap<Uuid, ProposalId> {
        &self.acceptors
    }

    pub fn final_value(&self) -> Option<&T> {
        self.final_value.as_ref()
    }

    pub fn final_proposal_id(&self) -> Option<ProposalId> {
        self.final_proposal_id
    }
}

/// The algorithmic state of a [`Node`], with no messenger inside, so that a host can serialize it
/// (an acceptor's promises must survive restarts) and later rebuild a working node around a fresh
/// messenger with [`Node::recover`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NodeState<T> {
    pub proposer: Proposer<T>,
    pub acceptor: Acceptor<T>,
    pub learner: Learner<T>,
}

/// This struct supports the common model where each node on a network performs all three Paxos
/// roles: proposer, acceptor and learner.
pub struct Node<T, M> {
    messenger: M,

    proposer: Proposer<T>,
    acceptor: Acceptor<T>,
    learner: Learner<T>,
}

impl<T, M> Node<T, M>
where
    T: Clone + Debug + PartialEq,
    M: Messenger<T>,
{
    pub fn new(messenger: M, node_uid: Uuid, quorum_size: usize) -> Self {
        Node {
            messenger,
            proposer: Proposer::new(node_uid, quorum_size),
            acceptor: Acceptor::new(),
            learner: Learner::new(quorum_size),
        }
    }

    /// Rebuilds a node around a fresh messenger from previously serialized algorithmic state.
    pub fn recover(state: NodeState<T>, messenger: M) -> Self {
        Node {
            messenger,
            proposer: state.proposer,
            acceptor: state.acceptor,
            learner: state.learner,
        }
    }

    /// Returns a copy of the algorithmic state, suitable for serialization.
    pub fn snapshot(&self) -> NodeState<T> {
        NodeState {
            proposer: self.proposer.clone(),
            acceptor: self.acceptor.clone(),
            learner: self.learner.clone(),
        }
    }

    pub fn node_uid(&self) -> Uuid {
        self.proposer.node_uid()
    }

    /// The application is responsible for whatever reconfiguration protocol makes changing the
    /// quorum size safe; this only stores the new threshold for both tallying roles.
    pub fn change_quorum_size(&mut self, quorum_size: usize) {
        self.proposer.set_quorum_size(quorum_size);
        self.learner.set_quorum_size(quorum_size);
    }

    pub fn set_proposal(&mut self, value: T) {
        self.proposer.set_proposal(&mut self.messenger, value);
    }

    pub fn prepare(&mut self) {
        self.proposer.prepare(&mut self.messenger);
    }

    pub fn resend_prepare(&mut self) {
        self.proposer.resend_prepare(&mut self.messenger);
    }

    pub fn observe_proposal(&mut self, from_uid: Uuid, proposal_id: ProposalId) {
        self.proposer.observe_proposal(from_uid, proposal_id);
    }

    pub fn resend_accept(&mut self) {
        self.proposer.resend_accept(&mut self.messenger);
    }

    /// Even when this node is not the target of the Prepare, seeing it keeps the local proposal
    /// counter ahead of the network, so the proposer's counter is updated before the acceptor
    /// logic runs.
    pub fn recv_prepare(&mut self, from_uid: Uuid, proposal_id: ProposalId) {
        self.proposer.observe_proposal(from_uid, proposal_id);
        self.acceptor.recv_prepare(&mut self.messenger, from_uid, proposal_id);
    }

    pub fn recv_promise(
        &mut self,
        from_uid: Uuid,
        proposal_id: ProposalId,
        prev_accepted_id: Option<ProposalId>,
        prev_accepted_value: Option<T>,
    ) {
        self.proposer.recv_promise(
            &mut self.messenger,
            from_uid,
            proposal_id,
            prev_accepted_id,
            prev_accepted_value,
        );
    }

    pub fn recv_prepare_nack(&mut self, from_uid: Uuid, proposal_id: ProposalId, promised_id: ProposalId) {
        self.proposer.recv_prepare_nack(from_uid, proposal_id, promised_id);
    }

    pub fn recv_accept_nack(&mut self, from_uid: Uuid, proposal_id: ProposalId, promised_id: ProposalId) {
        self.proposer.recv_accept_nack(from_uid, proposal_id, promised_id);
    }

    pub fn recv_accept_request(&mut self, from_uid: Uuid, proposal_id: ProposalId, value: T) {
        self.acceptor.recv_accept_request(&mut self.messenger, from_uid, proposal_id, value);
    }

    pub fn recv_accepted(&mut self, from_uid: Uuid, proposal_id: ProposalId, accepted_value: T) {
        self.learner.recv_accepted(&mut self.messenger, from_uid, proposal_id, accepted_value);
    }

    pub fn proposer(&self) -> &Proposer<T> {
        &self.proposer
    }

    pub fn acceptor(&self) -> &Acceptor<T> {
        &self.acceptor
    }

    pub fn learner(&self) -> &Learner<T> {
        &self.learner
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut M {
        &mut self.messenger
    }
}
