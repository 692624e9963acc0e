//! Helpers shared by the integration tests: deterministic node identifiers and an in-memory
//! delivery of protocol messages to a set of nodes.

#![allow(dead_code)]

use uuid::Uuid;

use basic_paxos::basic_paxos::Node;
use basic_paxos::message::Message;
use basic_paxos::messenger::Outbox;
use basic_paxos::proposal::ProposalId;

pub type TestNode = Node<String, Outbox<String>>;

/// A deterministic node identifier, ordered by `n`.
pub fn uid(n: u8) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[15] = n;
    Uuid::from_bytes(bytes)
}

pub fn pid(number: u64, n: u8) -> ProposalId {
    ProposalId::new(number, uid(n))
}

pub fn node(n: u8, quorum_size: usize) -> TestNode {
    Node::new(Outbox::new(uid(n)), uid(n), quorum_size)
}

/// Hands one message to every node in `nodes` entitled to it: broadcasts go to all of them,
/// unicasts to the one named by to_uid. Passing a subset of the cluster simulates loss for the
/// nodes left out.
pub fn deliver(nodes: &mut [TestNode], message: &Message<String>) {
    match message {
        Message::Prepare(m) => {
            for node in nodes.iter_mut() {
                node.recv_prepare(m.from_uid, m.proposal_id);
            }
        }
        Message::Promise(m) => {
            if let Some(node) = nodes.iter_mut().find(|n| n.node_uid() == m.to_uid) {
                node.recv_promise(m.from_uid, m.proposal_id, m.previous_id, m.accepted_value.clone());
            }
        }
        Message::PrepareNack(m) => {
            if let Some(node) = nodes.iter_mut().find(|n| n.node_uid() == m.to_uid) {
                node.recv_prepare_nack(m.from_uid, m.proposal_id, m.promised_id);
            }
        }
        Message::Accept(m) => {
            for node in nodes.iter_mut() {
                node.recv_accept_request(m.from_uid, m.proposal_id, m.proposal_value.clone());
            }
        }
        Message::AcceptNack(m) => {
            if let Some(node) = nodes.iter_mut().find(|n| n.node_uid() == m.to_uid) {
                node.recv_accept_nack(m.from_uid, m.proposal_id, m.promised_id);
            }
        }
        Message::Accepted(m) => {
            for node in nodes.iter_mut() {
                node.recv_accepted(m.from_uid, m.proposal_id, m.accepted_value.clone());
            }
        }
    }
}

/// Collects every queued outbound message from every node, in node order.
pub fn drain_all(nodes: &mut [TestNode]) -> Vec<Message<String>> {
    let mut messages = Vec::new();
    for node in nodes.iter_mut() {
        messages.extend(node.messenger_mut().drain());
    }
    messages
}

/// Delivers every outbound message, oldest first, to the whole cluster, until no node has
/// anything left to send.
pub fn run_to_quiescence(nodes: &mut [TestNode]) {
    loop {
        let messages = drain_all(nodes);
        if messages.is_empty() {
            return;
        }
        for message in &messages {
            deliver(nodes, message);
        }
    }
}
