//! A module which contains the outbound side of the transport boundary: the trait the algorithm
//! calls to emit protocol events, and a queueing implementation of it for hosts which drain
//! outbound messages into a transport of their own.

use std::collections::VecDeque;
use std::fmt::Debug;

use log::Level;
use uuid::Uuid;

use crate::message::{Accept, AcceptNack, Accepted, Message, Prepare, PrepareNack, Promise};
use crate::proposal::ProposalId;

/// The interface through which the algorithm emits outbound protocol events. The algorithm
/// performs no I/O of its own: every `send_*` call is assumed to return without blocking, so an
/// implementation wiring these calls to an asynchronous transport must buffer the event before
/// returning.
pub trait Messenger<T> {
    /// Broadcasts a Prepare message to all nodes.
    fn send_prepare(&mut self, proposal_id: ProposalId);

    /// Sends a Promise message to the specified node.
    fn send_promise(
        &mut self,
        to_uid: Uuid,
        proposal_id: ProposalId,
        previous_id: Option<ProposalId>,
        accepted_value: Option<T>,
    );

    /// Sends a Prepare NACK message for the proposal to the specified node.
    fn send_prepare_nack(&mut self, to_uid: Uuid, proposal_id: ProposalId, promised_id: ProposalId);

    /// Broadcasts an Accept! message to all nodes.
    fn send_accept(&mut self, proposal_id: ProposalId, proposal_value: T);

    /// Sends an Accept! NACK message for the proposal to the specified node.
    fn send_accept_nack(&mut self, to_uid: Uuid, proposal_id: ProposalId, promised_id: ProposalId);

    /// Broadcasts an Accepted message to all nodes. to_uid names the proposer whose Accept! was
    /// honored.
    fn send_accepted(&mut self, to_uid: Uuid, proposal_id: ProposalId, accepted_value: T);

    /// Called when leadership has been acquired. This is not a guaranteed position: another node
    /// may assume leadership at any time, and it is even possible that another has successfully
    /// done so before this callback runs. Use this method with care.
    fn on_leadership_acquired(&mut self);

    /// Called when a resolution is reached. Unlike leadership, a resolution is authoritative and
    /// final for the instance.
    fn on_resolution(&mut self, proposal_id: ProposalId, value: T);
}

/// A messenger which queues outbound events as [`Message`] values, stamped with the unique
/// identifier of the node which emitted them, for a host transport to drain and deliver. The
/// upward signals are recorded as counters and a final value so that the host can observe them
/// after each inbound event is processed.
pub struct Outbox<T> {
    node_uid: Uuid,

    messages: VecDeque<Message<T>>,

    // How many times on_leadership_acquired fired. It is a count rather than a flag so that hosts
    // can assert the once-per-round edge trigger.
    leadership_acquired: usize,

    resolution: Option<(ProposalId, T)>,

    // How many times on_resolution fired. At most 1 in a correct system.
    resolutions: usize,
}

impl<T> Outbox<T> {
    pub fn new(node_uid: Uuid) -> Self {
        Outbox {
            node_uid,
            messages: VecDeque::new(),
            leadership_acquired: 0,
            resolution: None,
            resolutions: 0,
        }
    }

    /// Removes and returns the oldest queued outbound message, if any.
    pub fn pop(&mut self) -> Option<Message<T>> {
        self.messages.pop_front()
    }

    /// Removes and returns all queued outbound messages, oldest first.
    pub fn drain(&mut self) -> Vec<Message<T>> {
        self.messages.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn leadership_acquired(&self) -> usize {
        self.leadership_acquired
    }

    pub fn resolution(&self) -> Option<&(ProposalId, T)> {
        self.resolution.as_ref()
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions
    }
}

impl<T> Messenger<T> for Outbox<T>
where
    T: Debug,
{
    fn send_prepare(&mut self, proposal_id: ProposalId) {
        self.messages.push_back(Message::Prepare(Prepare {
            from_uid: self.node_uid,
            proposal_id,
        }));
    }

    fn send_promise(
        &mut self,
        to_uid: Uuid,
        proposal_id: ProposalId,
        previous_id: Option<ProposalId>,
        accepted_value: Option<T>,
    ) {
        self.messages.push_back(Message::Promise(Promise {
            from_uid: self.node_uid,
            to_uid,
            proposal_id,
            previous_id,
            accepted_value,
        }));
    }

    fn send_prepare_nack(
        &mut self,
        to_uid: Uuid,
        proposal_id: ProposalId,
        promised_id: ProposalId,
    ) {
        self.messages.push_back(Message::PrepareNack(PrepareNack {
            from_uid: self.node_uid,
            to_uid,
            proposal_id,
            promised_id,
        }));
    }

    fn send_accept(&mut self, proposal_id: ProposalId, proposal_value: T) {
        self.messages.push_back(Message::Accept(Accept {
            from_uid: self.node_uid,
            proposal_id,
            proposal_value,
        }));
    }

    fn send_accept_nack(&mut self, to_uid: Uuid, proposal_id: ProposalId, promised_id: ProposalId) {
        self.messages.push_back(Message::AcceptNack(AcceptNack {
            from_uid: self.node_uid,
            to_uid,
            proposal_id,
            promised_id,
        }));
    }

    fn send_accepted(&mut self, to_uid: Uuid, proposal_id: ProposalId, accepted_value: T) {
        self.messages.push_back(Message::Accepted(Accepted {
            from_uid: self.node_uid,
            to_uid,
            proposal_id,
            accepted_value,
        }));
    }

    fn on_leadership_acquired(&mut self) {
        self.leadership_acquired += 1;

        if log_enabled!(Level::Info) {
            info!("[{:?}] leadership acquired", self.node_uid);
        }
    }

    fn on_resolution(&mut self, proposal_id: ProposalId, value: T) {
        self.resolutions += 1;

        if log_enabled!(Level::Info) {
            info!("[{:?}] resolved {} with {:?}", self.node_uid, proposal_id, value);
        }

        if self.resolution.is_none() {
            self.resolution = Some((proposal_id, value));
        }
    }
}
