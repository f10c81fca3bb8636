use std::collections::BTreeMap;
use std::fs;

use clamp_core::{sample_grid, RngHandle};
use clamp_engine::write_event_chains_dwt;
use clamp_protocol::{find_epochs, EpochPool, MonteCarloEvent, Simulation};

fn simulation_with_chains() -> Simulation {
    let time = sample_grid(0.0, 1.0, 0.5).unwrap();
    let stimuli = BTreeMap::new();
    let mut epochs = find_epochs(&time, 1.0, &stimuli);
    let mut pool = EpochPool::new();
    for epoch in &mut epochs {
        epoch.unique = pool.intern(&epoch.stimuli);
    }
    Simulation {
        time,
        end_time: 1.0,
        weight: Vec::new(),
        mask: Vec::new(),
        stimuli,
        epochs,
        probability: Vec::new(),
        waveforms: Vec::new(),
        events: vec![vec![
            vec![
                MonteCarloEvent {
                    state: 0,
                    duration: 0.134,
                },
                MonteCarloEvent {
                    state: 1,
                    duration: 0.866,
                },
            ],
            vec![MonteCarloEvent {
                state: 0,
                duration: 1.0,
            }],
        ]],
        reference: Vec::new(),
        rng: RngHandle::from_seed(0),
    }
}

#[test]
fn dwt_files_use_segments_crlf_and_milliseconds() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("chains.dwt");
    let grid = vec![vec![simulation_with_chains()]];
    write_event_chains_dwt(&base, &grid).unwrap();
    let path = dir.path().join("chains (0,0,0).dwt");
    let text = fs::read_to_string(&path).unwrap();
    let expected = "Segment: 1 Dwells: 1 Sampling(ms): 1\r\n\
                    0\t134\r\n\
                    1\t866\r\n\
                    \r\n\
                    Segment: 2 Dwells: 0 Sampling(ms): 1\r\n\
                    0\t1000\r\n\
                    \r\n";
    assert_eq!(text, expected);
}
