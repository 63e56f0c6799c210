use chainsim::{
    BlockId, PeerDegree, PeerGraph, RunLimit, SimulationConfig, Simulator, StaleMiningPolicy,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

fn degree_range(n: usize, a: usize, b: usize) -> PeerDegree {
    let min = 1 + a % (n - 1);
    let max = min + b % (n - min);
    PeerDegree::new(min, max)
}

fn simulator(seed: u64, node_count: usize, stale: StaleMiningPolicy) -> Simulator {
    let config = SimulationConfig {
        node_count,
        mean_transaction_interarrival: 0.2,
        mean_block_interarrival: 0.8,
        stale_mining: stale,
        seed: Some(seed),
        ..Default::default()
    };
    Simulator::new(config).expect("valid configuration")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_peer_graphs_are_connected(
        seed in any::<u64>(),
        n in 2usize..40,
        a in 0usize..100,
        b in 0usize..100,
    ) {
        let degree = degree_range(n, a, b);
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let graph = PeerGraph::random(n, degree, &mut rng);

        prop_assert!(graph.is_connected());
        prop_assert!(graph.diameter().is_some());
        for i in 0..n {
            let node = chainsim::NodeId(i);
            let peers = graph.peers(node).unwrap();
            prop_assert!(peers.len() >= degree.min);
            prop_assert!(!peers.contains(&node));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_supply_grows_only_by_mining_rewards(seed in any::<u64>(), n in 3usize..10) {
        let mut sim = simulator(seed, n, StaleMiningPolicy::AbandonIfSuperseded);
        let initial = sim.total_supply();

        sim.run(RunLimit::Events(1_500)).unwrap();

        let counts = sim.counts();
        let reward = sim.config().mining_reward;
        prop_assert_eq!(sim.total_supply(), initial + reward * counts.blocks_mined());
    }

    #[test]
    fn test_every_block_extends_its_local_parent(seed in any::<u64>(), n in 3usize..10) {
        let policy = if seed % 2 == 0 {
            StaleMiningPolicy::AbandonIfSuperseded
        } else {
            StaleMiningPolicy::Never
        };
        let mut sim = simulator(seed, n, policy);
        sim.run(RunLimit::Until(10.0)).unwrap();

        for node in sim.nodes() {
            let tree = node.blocks();
            prop_assert_eq!(tree.get(BlockId::GENESIS).map(|b| b.length), Some(0));
            for block in tree.blocks() {
                if let Some(parent) = block.parent {
                    let parent = tree.get(parent);
                    prop_assert!(parent.is_some());
                    prop_assert_eq!(block.length, parent.unwrap().length + 1);
                }
            }

            let chain = node.longest_chain();
            prop_assert_eq!(chain.last().map(|b| b.id), Some(BlockId::GENESIS));
            prop_assert_eq!(chain.len() as u64, chain[0].length + 1);
        }
    }

    #[test]
    fn test_pruning_leaves_exactly_the_longest_chain(seed in any::<u64>(), n in 3usize..8) {
        let mut sim = simulator(seed, n, StaleMiningPolicy::AbandonIfSuperseded);
        sim.run(RunLimit::Until(8.0)).unwrap();

        let tips: Vec<BlockId> = sim.nodes().iter().map(|node| node.tip_id()).collect();
        sim.prune_chains();

        for (node, tip) in sim.nodes().iter().zip(tips) {
            let chain = node.longest_chain();
            prop_assert_eq!(chain.len(), node.blocks().len());
            prop_assert_eq!(node.tip_id(), tip);
            for block in node.blocks().blocks() {
                if let Some(parent) = block.parent {
                    prop_assert!(node.blocks().contains(parent));
                }
            }
        }
    }
}

#[test]
fn test_same_seed_gives_identical_runs() {
    let mut first = simulator(1234, 6, StaleMiningPolicy::AbandonIfSuperseded);
    let mut second = simulator(1234, 6, StaleMiningPolicy::AbandonIfSuperseded);

    let a = first.run(RunLimit::Until(15.0)).unwrap();
    let b = second.run(RunLimit::Until(15.0)).unwrap();

    assert_eq!(a, b);
    assert_eq!(first.report(), second.report());
}
