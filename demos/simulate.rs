//! An example which simulates one instance of the basic Paxos algorithm locally (on one machine),
//! delivering the protocol messages in a random order with occasional duplicates.
//!
//! Run this example as follows
//!     RUST_LOG=basic_paxos=info,simulate=info cargo run --example simulate
//! The cluster shape and the schedule seed are read from `Config.toml`.

extern crate basic_paxos;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate rand;
extern crate uuid;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use basic_paxos::basic_paxos::Node;
use basic_paxos::configurations::get_config;
use basic_paxos::message::Message;
use basic_paxos::messenger::Outbox;

type SimNode = Node<String, Outbox<String>>;

fn main() {
    env_logger::init();

    let settings = get_config("Config");
    info!("Settings = {:?}\n", settings);

    assert!(
        settings.cluster.proposers >= 1 && settings.cluster.proposers <= settings.cluster.nodes,
        "the number of proposing nodes must be between 1 and the cluster size"
    );

    let quorum_size = settings.cluster.quorum_size();
    let mut rng = StdRng::seed_from_u64(settings.schedule.seed);

    let mut nodes: Vec<SimNode> = (0..settings.cluster.nodes)
        .map(|_| {
            let node_uid = Uuid::new_v4();
            Node::new(Outbox::new(node_uid), node_uid, quorum_size)
        })
        .collect();

    // The first few nodes compete, each driving its own value.
    for i in 0..settings.cluster.proposers {
        let value = format!("value-{}", i);
        nodes[i].set_proposal(value);
        nodes[i].prepare();
    }

    let mut bus: Vec<Message<String>> = Vec::new();
    let mut deliveries: usize = 0;
    let mut retries: usize = 0;

    loop {
        for node in nodes.iter_mut() {
            bus.extend(node.messenger_mut().drain());
        }

        if bus.is_empty() {
            if nodes.iter().all(|n| n.learner().complete()) {
                break;
            }

            // The algorithm detects no absence of progress on its own; play the part of the
            // external retry policy and start a new round.
            retries += 1;
            nodes[0].prepare();
            continue;
        }

        let i = rng.gen_range(0, bus.len());
        let message = bus.swap_remove(i);

        deliver(&mut nodes, &message);
        deliveries += 1;

        if rng.gen_bool(settings.schedule.duplicate_rate) {
            deliver(&mut nodes, &message);
            deliveries += 1;
        }
    }

    info!("Deliveries = {}, retries = {}\n", deliveries, retries);

    for node in &nodes {
        println!(
            "{} decided {:?} at {:?}",
            node.node_uid(),
            node.learner().final_value(),
            node.learner().final_proposal_id()
        );
    }
}

/// Hands one message to every node entitled to it: broadcasts go to all nodes, unicasts to the
/// node named by to_uid.
fn deliver(nodes: &mut Vec<SimNode>, message: &Message<String>) {
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
