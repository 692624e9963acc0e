//! End-to-end runs of one Paxos instance over three nodes (quorum of 2), with message loss and
//! crashes simulated by simply not delivering what a lost or crashed node would have received.

extern crate basic_paxos;
extern crate uuid;

mod common;

use basic_paxos::message::Message;
use common::{deliver, drain_all, node, pid, uid};

#[test]
fn clean_single_proposer_decision() {
    let mut nodes = vec![node(1, 2), node(2, 2), node(3, 2)];

    nodes[0].prepare();
    let prepare = nodes[0].messenger_mut().drain();
    assert_eq!(prepare.len(), 1);

    // Only the first two acceptors hear the Prepare.
    deliver(&mut nodes[..2], &prepare[0]);

    let promises = drain_all(&mut nodes[..2]);
    assert_eq!(promises.len(), 2);
    for promise in &promises {
        match promise {
            Message::Promise(p) => {
                assert_eq!(p.proposal_id, pid(1, 1));
                assert_eq!(p.previous_id, None);
                assert_eq!(p.accepted_value, None);
            }
            other => panic!("expected a Promise, got {:?}", other),
        }
        deliver(&mut nodes[..1], promise);
    }

    assert!(nodes[0].proposer().is_leader());
    assert_eq!(nodes[0].messenger().leadership_acquired(), 1);

    // The leader only now picks a value, and drives it immediately.
    nodes[0].set_proposal("x".to_string());
    let accept = nodes[0].messenger_mut().drain();
    assert_eq!(accept.len(), 1);

    deliver(&mut nodes[..2], &accept[0]);
    let accepteds = drain_all(&mut nodes[..2]);
    assert_eq!(accepteds.len(), 2);
    for accepted in &accepteds {
        deliver(&mut nodes, accepted);
    }

    for n in &nodes {
        assert!(n.learner().complete());
        assert_eq!(n.learner().final_value(), Some(&"x".to_string()));
        assert_eq!(n.learner().final_proposal_id(), Some(pid(1, 1)));
        assert_eq!(n.messenger().resolutions(), 1);
    }
}

#[test]
fn later_of_two_competing_proposers_wins() {
    let mut nodes = vec![node(1, 2), node(2, 2), node(3, 2)];

    // A's round (1, A) reaches only A's own acceptor.
    nodes[0].prepare();
    let prepare_a = nodes[0].messenger_mut().drain();
    deliver(&mut nodes[..1], &prepare_a[0]);
    let promise_a = nodes[0].messenger_mut().drain();
    deliver(&mut nodes[..1], &promise_a[0]);
    assert!(!nodes[0].proposer().is_leader());

    // B, unaware of A's round, picks (1, B), which wins the tiebreak.
    nodes[1].prepare();
    assert_eq!(nodes[1].proposer().proposal_id(), Some(pid(1, 2)));
    assert!(pid(1, 2) > pid(1, 1));

    let prepare_b = nodes[1].messenger_mut().drain();
    deliver(&mut nodes[..2], &prepare_b[0]);

    assert_eq!(nodes[0].acceptor().promised_id(), Some(pid(1, 2)));
    assert_eq!(nodes[0].acceptor().previous_id(), Some(pid(1, 1)));

    let promises_b = drain_all(&mut nodes[..2]);
    assert_eq!(promises_b.len(), 2);

    // A late Accept at the superseded round is refused.
    nodes[0].recv_accept_request(uid(1), pid(1, 1), "x".to_string());
    match nodes[0].messenger_mut().drain().as_slice() {
        [Message::AcceptNack(nack)] => {
            assert_eq!(nack.proposal_id, pid(1, 1));
            assert_eq!(nack.promised_id, pid(1, 2));
        }
        other => panic!("expected an AcceptNack, got {:?}", other),
    }

    for promise in &promises_b {
        deliver(&mut nodes[1..2], promise);
    }
    assert!(nodes[1].proposer().is_leader());

    nodes[1].set_proposal("y".to_string());
    let accept_b = nodes[1].messenger_mut().drain();
    deliver(&mut nodes[..2], &accept_b[0]);

    let accepteds = drain_all(&mut nodes[..2]);
    for accepted in &accepteds {
        deliver(&mut nodes, accepted);
    }

    for n in &nodes {
        assert_eq!(n.learner().final_value(), Some(&"y".to_string()));
        assert_eq!(n.learner().final_proposal_id(), Some(pid(1, 2)));
    }
}

#[test]
fn recovery_adopts_the_previously_accepted_value() {
    let mut nodes = vec![node(1, 2), node(2, 2), node(3, 2)];

    // A leads round (1, A); every acceptor hears the Prepare, so every counter moves past 1.
    nodes[0].prepare();
    let prepare_a = nodes[0].messenger_mut().drain();
    deliver(&mut nodes, &prepare_a[0]);

    let promises_a = drain_all(&mut nodes);
    assert_eq!(promises_a.len(), 3);
    for promise in promises_a.iter().take(2) {
        deliver(&mut nodes[..1], promise);
    }
    assert!(nodes[0].proposer().is_leader());

    // The Accept reaches acceptor B alone, and B's acceptance reaches nobody: A then crashes.
    nodes[0].set_proposal("x".to_string());
    let accept_a = nodes[0].messenger_mut().drain();
    deliver(&mut nodes[1..2], &accept_a[0]);
    let _lost = nodes[1].messenger_mut().drain();
    assert_eq!(nodes[1].acceptor().accepted_value(), Some(&"x".to_string()));

    // C tries to drive a value of its own.
    nodes[2].set_proposal("z".to_string());
    nodes[2].prepare();
    assert_eq!(nodes[2].proposer().proposal_id(), Some(pid(2, 3)));

    let prepare_c = nodes[2].messenger_mut().drain();
    deliver(&mut nodes[1..], &prepare_c[0]);

    let promise_b = nodes[1].messenger_mut().drain();
    match &promise_b[0] {
        Message::Promise(p) => {
            assert_eq!(p.previous_id, Some(pid(1, 1)));
            assert_eq!(p.accepted_value, Some("x".to_string()));
        }
        other => panic!("expected a Promise, got {:?}", other),
    }
    let promise_c = nodes[2].messenger_mut().drain();

    // B's report makes C abandon its own value before leadership is even reached.
    deliver(&mut nodes[2..], &promise_b[0]);
    assert_eq!(nodes[2].proposer().proposed_value(), Some(&"x".to_string()));

    deliver(&mut nodes[2..], &promise_c[0]);
    assert!(nodes[2].proposer().is_leader());

    let accept_c = nodes[2].messenger_mut().drain();
    match &accept_c[0] {
        Message::Accept(a) => {
            assert_eq!(a.proposal_id, pid(2, 3));
            assert_eq!(a.proposal_value, "x".to_string());
        }
        other => panic!("expected an Accept, got {:?}", other),
    }

    deliver(&mut nodes[1..], &accept_c[0]);
    let accepteds = drain_all(&mut nodes[1..]);
    assert_eq!(accepteds.len(), 2);
    for accepted in &accepteds {
        deliver(&mut nodes[1..], accepted);
    }

    for n in &nodes[1..] {
        assert_eq!(n.learner().final_value(), Some(&"x".to_string()));
        assert_eq!(n.learner().final_proposal_id(), Some(pid(2, 3)));
    }
}

#[test]
fn empty_reports_do_not_displace_the_local_proposal() {
    let mut nodes = vec![node(1, 2), node(2, 2), node(3, 2)];

    nodes[0].set_proposal("z".to_string());
    nodes[0].prepare();

    let prepare = nodes[0].messenger_mut().drain();
    deliver(&mut nodes[1..], &prepare[0]);

    let promises = drain_all(&mut nodes[1..]);
    assert_eq!(promises.len(), 2);
    for promise in &promises {
        match promise {
            Message::Promise(p) => assert_eq!(p.accepted_value, None),
            other => panic!("expected a Promise, got {:?}", other),
        }
        deliver(&mut nodes[..1], promise);
    }

    assert!(nodes[0].proposer().is_leader());
    assert_eq!(nodes[0].proposer().proposed_value(), Some(&"z".to_string()));

    match nodes[0].messenger_mut().drain().as_slice() {
        [Message::Accept(a)] => assert_eq!(a.proposal_value, "z".to_string()),
        other => panic!("expected exactly one Accept, got {:?}", other),
    }
}

#[test]
fn learner_follows_an_acceptor_switching_rounds() {
    let mut c = node(3, 2);

    c.recv_accepted(uid(1), pid(1, 1), "x".to_string());
    {
        let tally = &c.learner().proposals()[&pid(1, 1)];
        assert_eq!((tally.accept_count, tally.retain_count), (1, 1));
    }

    c.recv_accepted(uid(1), pid(2, 2), "y".to_string());
    assert!(c.learner().proposals().get(&pid(1, 1)).is_none());
    {
        let tally = &c.learner().proposals()[&pid(2, 2)];
        assert_eq!((tally.accept_count, tally.retain_count), (1, 1));
    }

    c.recv_accepted(uid(2), pid(2, 2), "y".to_string());
    assert!(c.learner().complete());
    assert_eq!(c.learner().final_value(), Some(&"y".to_string()));
    assert_eq!(c.learner().final_proposal_id(), Some(pid(2, 2)));
    assert_eq!(c.messenger().resolutions(), 1);
}

#[test]
#[should_panic(expected = "Bug: previously accepted value")]
fn conflicting_acceptances_for_one_round_abort() {
    let mut c = node(3, 2);

    c.recv_accepted(uid(1), pid(1, 1), "x".to_string());
    c.recv_accepted(uid(2), pid(1, 1), "y".to_string());
}
