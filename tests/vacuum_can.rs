use vaccan_dqn::{ChamberConfig, Environment, Error, State, Termination, VacuumCan};

fn vacuum_can(max_episode_steps: Option<usize>) -> VacuumCan {
    VacuumCan::new(ChamberConfig {
        seed: Some(42),
        max_episode_steps,
        ..ChamberConfig::default()
    })
    .unwrap()
}

#[test]
fn every_action_keeps_observation_shape() {
    let mut env = vacuum_can(None);
    let initial = env.reset();
    assert_eq!(initial.to_features().len(), State::DIM);

    for action in 0..env.action_space().n {
        env.reset_to(30.0);
        let step = env.step(action).unwrap();
        assert_eq!(step.next_state.to_features().len(), initial.to_features().len());
        assert!(env.observation_space().contains(&step.next_state));
    }
}

#[test]
fn unheated_can_near_ambient_survives() {
    let mut env = vacuum_can(None);
    env.reset_to(20.0);
    for _ in 0..5000 {
        let step = env.step(0).unwrap();
        assert!(!step.done, "terminated at {:?}", step.next_state);
        assert_eq!(step.reward, 1.0);
        assert!((15.0..=60.0).contains(&step.next_state.temperature));
    }
}

#[test]
fn full_heat_overheats_and_rewards_stop_after_done() {
    let mut env = vacuum_can(None);
    env.reset_to(20.0);
    let top = env.action_space().n - 1;

    let mut terminal = None;
    for _ in 0..10_000 {
        let step = env.step(top).unwrap();
        assert_eq!(step.reward, 1.0);
        if step.done {
            terminal = Some(step);
            break;
        }
    }
    let terminal = terminal.expect("full heat should leave the safety band");
    assert_eq!(terminal.info.termination, Some(Termination::TooHot));
    assert!(terminal.next_state.temperature > 60.0);

    for _ in 0..3 {
        let after = env.step(top).unwrap();
        assert!(after.done);
        assert_eq!(after.reward, 0.0);
    }

    // a reset starts a fresh episode with rewards again
    env.reset_to(25.0);
    let step = env.step(0).unwrap();
    assert!(!step.done);
    assert_eq!(step.reward, 1.0);
}

#[test]
fn out_of_range_action_is_rejected_without_side_effects() {
    let mut env = vacuum_can(Some(1000));
    env.reset_to(20.0);
    env.step(3).unwrap();
    let state = env.state();
    let elapsed = env.elapsed();

    let n = env.action_space().n;
    let err = env.step(n).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidAction { action, n_actions } if action == n && n_actions == n
    ));
    assert_eq!(env.state(), state);
    assert_eq!(env.elapsed(), elapsed);
}

#[test]
fn cold_start_below_band_terminates_immediately() {
    let mut env = vacuum_can(None);
    env.reset_to(10.0);
    let step = env.step(0).unwrap();
    assert!(step.done);
    assert_eq!(step.info.termination, Some(Termination::TooCold));
}
