use chainsim::{
    error::Result, PeerDegree, RunLimit, SimulationConfig, Simulator, SimulatorError,
    StaleMiningPolicy,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            "node_count": 6,
            "slow_fraction": 0.5,
            "mean_block_interarrival": 2.5,
            "peer_degree": {{ "min": 2, "max": 4 }},
            "allow_empty_blocks": false,
            "stale_mining": "abandon_if_superseded",
            "seed": 5
        }}"#
    )?;

    let config = SimulationConfig::from_json_file(file.path())?;
    assert_eq!(config.node_count, 6);
    assert_eq!(config.slow_node_count(), 3);
    assert_eq!(config.peer_degree(), PeerDegree::new(2, 4));
    assert_eq!(config.mean_block_interarrival, 2.5);
    assert!(!config.allow_empty_blocks);
    assert_eq!(config.stale_mining, StaleMiningPolicy::AbandonIfSuperseded);

    let mut sim = Simulator::new(config)?;
    let counts = sim.run(RunLimit::Events(200))?;
    assert_eq!(counts.total(), 200);

    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let err = SimulationConfig::from_json_file("/nonexistent/chainsim.json").unwrap_err();
    assert!(matches!(err, SimulatorError::Io(_)));
}

#[test]
fn test_invalid_configuration_fails_before_running() {
    let config = SimulationConfig {
        node_count: 4,
        peer_degree: Some(PeerDegree::new(2, 7)),
        ..Default::default()
    };
    assert!(matches!(
        Simulator::new(config),
        Err(SimulatorError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_builder_rejects_mismatched_overrides() {
    let config = SimulationConfig {
        node_count: 4,
        ..Default::default()
    };
    let result = Simulator::builder()
        .with_config(config.clone())
        .balances(vec![10; 3])
        .build();
    assert!(result.is_err());

    let result = Simulator::builder()
        .with_config(config)
        .propagation_delays(vec![vec![0.0; 4]; 3])
        .build();
    assert!(result.is_err());
}

#[test]
fn test_config_roundtrips_through_json() -> Result<()> {
    let config = SimulationConfig {
        seed: Some(42),
        peer_degree: Some(PeerDegree::new(3, 5)),
        ..Default::default()
    };
    let json = serde_json::to_string(&config)?;
    assert_eq!(SimulationConfig::from_json_str(&json)?, config);
    Ok(())
}
