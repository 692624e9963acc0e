//! A module which contains the definition of the messages exchanged by the nodes running the basic
//! Paxos algorithm. Encoding and delivery of these messages is the transport's concern; the types
//! here only give hosts a concrete representation to route.

use uuid::Uuid;

use crate::proposal::ProposalId;

/// An enum which contains all types of messages which nodes, in the basic Paxos algorithm, can
/// exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Message<T> {
    Prepare(Prepare),
    Promise(Promise<T>),
    PrepareNack(PrepareNack),
    Accept(Accept<T>),
    AcceptNack(AcceptNack),
    Accepted(Accepted<T>),
}

/// In phase 1a, a proposal identifier is sent from 1 proposer to ALL acceptors.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Prepare {
    // The unique identifier of the sender of this message (which is a proposer).
    pub from_uid: Uuid,

    // The identifier of the round the proposer is trying to start.
    pub proposal_id: ProposalId,
}

/// In phase 1b, an acceptor answers a Prepare with the promise not to accept any older proposal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Promise<T> {
    // The unique identifier of the sender of this message (which is an acceptor).
    pub from_uid: Uuid,

    // The unique identifier of the proposer this promise answers. It should match the from_uid of
    // the corresponding Prepare message.
    pub to_uid: Uuid,

    // The proposal identifier the acceptor now promises not to reject.
    pub proposal_id: ProposalId,

    // The identifier the acceptor had promised immediately before this one, if any.
    pub previous_id: Option<ProposalId>,

    // The value the acceptor most recently accepted, if any. It is reported so that the proposer
    // can adopt a previously accepted value instead of its own.
    pub accepted_value: Option<T>,
}

/// An explicit rejection of a Prepare message. NACKs are optional in Paxos, but they can be used
/// to inform other nodes of rejections.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct PrepareNack {
    // The unique identifier of the acceptor which rejects the proposal.
    pub from_uid: Uuid,

    // The unique identifier of the proposer whose Prepare was rejected.
    pub to_uid: Uuid,

    // The identifier of the rejected proposal.
    pub proposal_id: ProposalId,

    // The identifier which caused the rejection: the acceptor has already promised it.
    pub promised_id: ProposalId,
}

/// In phase 2a, a proposal identifier and the picked value are sent from 1 proposer to ALL
/// acceptors.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Accept<T> {
    // The unique identifier of the sender of this message (which is the round's leader).
    pub from_uid: Uuid,

    pub proposal_id: ProposalId,

    // The value the leader is driving to a quorum.
    pub proposal_value: T,
}

/// An explicit rejection of an Accept message.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct AcceptNack {
    // The unique identifier of the acceptor which rejects the proposal.
    pub from_uid: Uuid,

    // The unique identifier of the proposer whose Accept was rejected.
    pub to_uid: Uuid,

    pub proposal_id: ProposalId,

    // The identifier which caused the rejection: the acceptor has already promised it.
    pub promised_id: ProposalId,
}

/// In phase 2b, an acceptor broadcasts the proposal it has just honored to ALL learners.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Accepted<T> {
    // The unique identifier of the sender of this message (which is an acceptor).
    pub from_uid: Uuid,

    // The unique identifier of the proposer whose Accept was honored.
    pub to_uid: Uuid,

    pub proposal_id: ProposalId,

    // The value this acceptor has accepted for proposal_id.
    pub accepted_value: T,
}
