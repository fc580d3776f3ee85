//! Recompute-and-send, the only state-mutating computation
//!
//! Both strategies funnel through [`recompute_and_send`]. The scope only
//! selects which edges are averaged and refreshed; the flow sum always
//! covers the full neighbor set. Narrowing it to the scope breaks flow
//! conservation.

use flowup_core::{Envelope, FlowUpdatingMessage, Message, PeerId};

use crate::PeerState;

/// Edges touched by a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every neighbor (collect-all)
    AllNeighbors,
    /// A single edge (pairwise)
    Edge(PeerId),
}

/// Run one round over `scope` and return the messages to send.
///
/// 1. `local = value - Σ flows[n]` over all neighbors
/// 2. `avg` = mean of `local` and the scoped estimates
/// 3. per scoped neighbor `m`: `flows[m] += avg - estimates[m]`,
///    `estimates[m] = avg`, emit `(self, flows[m], avg)` to `m`
pub fn recompute_and_send(state: &mut PeerState, scope: Scope) -> Vec<Envelope> {
    let local_estimate = state.local_estimate();

    let (avg, targets) = match scope {
        Scope::AllNeighbors => {
            let count = state.neighbors().len() as f64 + 1.0;
            let avg = (local_estimate + state.estimates_sum()) / count;
            (avg, state.neighbors().to_vec())
        }
        Scope::Edge(peer) => {
            let avg = (state.estimate(peer) + local_estimate) / 2.0;
            (avg, vec![peer])
        }
    };

    state.finish_round(avg);

    let sender = state.id();
    let outgoing: Vec<Envelope> = targets
        .into_iter()
        .map(|peer| {
            let new_flow = state.flow(peer) + avg - state.estimate(peer);
            state.set_edge(peer, new_flow, avg);
            Envelope::new(
                peer,
                Message::FlowUpdating(FlowUpdatingMessage::new(sender, new_flow, avg)),
            )
        })
        .collect();

    tracing::trace!(
        peer = %sender,
        ?scope,
        avg,
        sent = outgoing.len(),
        "recomputed"
    );

    outgoing
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u64) -> PeerId {
        PeerId::new(n)
    }

    fn flow_of(envelope: &Envelope) -> (f64, f64) {
        match envelope.message {
            Message::FlowUpdating(msg) => (msg.flow, msg.estimate),
            other => panic!("unexpected message {other}"),
        }
    }

    #[test]
    fn test_all_neighbors_round_from_zero_state() {
        let mut state = PeerState::new(id(0), 9.0, [id(1), id(2)]);
        let out = recompute_and_send(&mut state, Scope::AllNeighbors);

        // (9 + 0 + 0) / 3
        assert_eq!(state.last_avg(), 3.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to, id(1));
        assert_eq!(flow_of(&out[0]), (3.0, 3.0));
        assert_eq!(state.flow(id(2)), 3.0);
        assert_eq!(state.estimate(id(2)), 3.0);
        assert_eq!(state.rounds(), 1);
    }

    #[test]
    fn test_edge_round_uses_full_flow_sum() {
        let mut state = PeerState::new(id(0), 10.0, [id(1), id(2)]);
        state.set_edge(id(1), 2.0, 4.0);
        state.set_edge(id(2), 3.0, 6.0);

        let out = recompute_and_send(&mut state, Scope::Edge(id(1)));

        // local = 10 - (2 + 3) = 5, avg = (4 + 5) / 2
        assert_eq!(state.last_avg(), 4.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, id(1));
        assert_eq!(state.flow(id(1)), 2.5);
        assert_eq!(state.estimate(id(1)), 4.5);
    }

    #[test]
    fn test_edge_round_leaves_other_edges_alone() {
        let mut state = PeerState::new(id(0), 1.0, [id(1), id(2), id(3)]);
        state.set_edge(id(2), -1.5, 7.0);
        state.set_edge(id(3), 0.25, -2.0);

        recompute_and_send(&mut state, Scope::Edge(id(1)));

        assert_eq!(state.flow(id(2)), -1.5);
        assert_eq!(state.estimate(id(2)), 7.0);
        assert_eq!(state.flow(id(3)), 0.25);
        assert_eq!(state.estimate(id(3)), -2.0);
    }

    #[test]
    fn test_isolated_peer_averages_itself() {
        let mut state = PeerState::new(id(0), 42.0, []);
        let out = recompute_and_send(&mut state, Scope::AllNeighbors);
        assert!(out.is_empty());
        assert_eq!(state.last_avg(), 42.0);
    }

    proptest! {
        // After any round the local estimate lands on the new average
        #[test]
        fn round_aligns_local_estimate_with_average(
            value in -1e3f64..1e3,
            edges in proptest::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 1..6),
            single in any::<bool>(),
        ) {
            let neighbors: Vec<PeerId> = (1..=edges.len() as u64).map(PeerId::new).collect();
            let mut state = PeerState::new(id(0), value, neighbors.iter().copied());
            for (peer, (flow, estimate)) in neighbors.iter().zip(&edges) {
                state.set_edge(*peer, *flow, *estimate);
            }

            let scope = if single { Scope::Edge(neighbors[0]) } else { Scope::AllNeighbors };
            recompute_and_send(&mut state, scope);

            prop_assert!((state.local_estimate() - state.last_avg()).abs() < 1e-6);
            prop_assert_eq!(state.value(), value);
        }
    }
}
