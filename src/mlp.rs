use std::path::Path;

use candle_core::{DType, Tensor, backprop::GradStore};
use candle_nn::{AdamW, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap, linear, loss};

use crate::{
    config::AgentConfig,
    device::DEVICE,
    error::{Error, Result},
    learner::Learner,
    state::State,
};

/// Rescale every gradient so their global L2 norm is at most `max_norm`.
/// Returns the norm before clipping.
fn clip_gradients(grad_store: &mut GradStore, var_map: &VarMap, max_norm: f32) -> Result<f32> {
    let mut total_norm_sq: f32 = 0.0;
    let mut grads = vec![];

    for var in var_map.all_vars() {
        let tensor = var.as_tensor();
        if let Some(grad) = grad_store.get(tensor) {
            total_norm_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
            grads.push((var.clone(), grad.clone()));
        }
    }

    let total_norm = total_norm_sq.sqrt();
    if total_norm > max_norm {
        let scale = (max_norm / total_norm) as f64;
        for (var, grad) in grads {
            grad_store.insert(var.as_tensor(), grad.affine(scale, 0.0)?);
        }
    }

    Ok(total_norm)
}

fn build_layers(topology: &[usize], var_map: &VarMap) -> Result<Vec<Linear>> {
    let vb = VarBuilder::from_varmap(var_map, DType::F32, &DEVICE);
    topology
        .windows(2)
        .enumerate()
        .map(|(i, dims)| -> Result<Linear> { Ok(linear(dims[0], dims[1], vb.pp(i))?) })
        .collect()
}

/// Multi-layer perceptron mapping a [`State`] to one value per heating level.
///
/// ReLU between hidden layers, linear output. Trained with AdamW (no weight
/// decay) and an inverse-time learning-rate schedule
/// `lr_t = lr / (1 + decay * t)`, where `t` counts updates.
pub struct QNetwork {
    layers: Vec<Linear>,
    var_map: VarMap,
    topology: Vec<usize>,
    optimiser: AdamW,
    base_learning_rate: f64,
    learning_rate_decay: f64,
    max_grad_norm: f32,
    updates: usize,
}

impl QNetwork {
    pub fn new(
        topology: &[usize],
        learning_rate: f64,
        learning_rate_decay: f64,
        max_grad_norm: f32,
    ) -> Result<Self> {
        if topology.len() < 2 || topology.contains(&0) {
            return Err(Error::Config(format!(
                "network topology {topology:?} needs at least two non-zero layers"
            )));
        }
        if topology[0] != State::DIM {
            return Err(Error::DimensionMismatch {
                expected: State::DIM,
                actual: topology[0],
            });
        }

        let var_map = VarMap::new();
        let layers = build_layers(topology, &var_map)?;
        let optimiser = AdamW::new(
            var_map.all_vars(),
            ParamsAdamW {
                lr: learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        Ok(Self {
            layers,
            var_map,
            topology: topology.to_vec(),
            optimiser,
            base_learning_rate: learning_rate,
            learning_rate_decay,
            max_grad_norm,
            updates: 0,
        })
    }

    /// `[State::DIM, hidden..., n_actions]` network from the agent settings.
    pub fn from_config(config: &AgentConfig, n_actions: usize) -> Result<Self> {
        let mut topology = Vec::with_capacity(config.hidden_layers.len() + 2);
        topology.push(State::DIM);
        topology.extend_from_slice(&config.hidden_layers);
        topology.push(n_actions);
        Self::new(
            &topology,
            config.learning_rate,
            config.learning_rate_decay,
            config.max_grad_norm,
        )
    }

    pub fn topology(&self) -> &[usize] {
        &self.topology
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Learning rate the next update will use.
    pub fn learning_rate(&self) -> f64 {
        self.base_learning_rate / (1.0 + self.learning_rate_decay * self.updates as f64)
    }

    fn input_tensor(states: &[State]) -> Result<Tensor> {
        let features: Vec<f32> = states.iter().flat_map(|s| s.to_features()).collect();
        Ok(Tensor::from_vec(
            features,
            (states.len(), State::DIM),
            &DEVICE,
        )?)
    }

    fn output(&self, inputs: Tensor) -> Result<Tensor> {
        let mut x = inputs;
        let hidden = self.layers.len() - 1;
        for layer in self.layers.iter().take(hidden) {
            x = layer.forward(&x)?.relu()?;
        }
        if let Some(last_layer) = self.layers.last() {
            x = last_layer.forward(&x)?;
        }
        Ok(x)
    }

    /// Overwrite this network's parameters with same-named tensors from `source`.
    fn copy_parameters_from(&self, source: &VarMap) -> Result<()> {
        let source_vars = source
            .data()
            .lock()
            .map_err(|_| Error::ParameterStore("checkpoint parameters lock poisoned".into()))?;
        let target_vars = self
            .var_map
            .data()
            .lock()
            .map_err(|_| Error::ParameterStore("network parameters lock poisoned".into()))?;

        for (name, target) in target_vars.iter() {
            let Some(source_var) = source_vars.get(name) else {
                return Err(Error::Config(format!("checkpoint is missing `{name}`")));
            };
            target.set(source_var.as_tensor())?;
        }
        Ok(())
    }
}

impl Learner for QNetwork {
    fn num_actions(&self) -> usize {
        self.topology.last().copied().unwrap_or(0)
    }

    fn predict_batch(&self, states: &[State]) -> Result<Vec<Vec<f32>>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.output(Self::input_tensor(states)?)?;
        Ok(output.to_vec2::<f32>()?)
    }

    fn update(&mut self, states: &[State], targets: &[Vec<f32>]) -> Result<f32> {
        if states.len() != targets.len() {
            return Err(Error::DimensionMismatch {
                expected: states.len(),
                actual: targets.len(),
            });
        }
        if states.is_empty() {
            return Ok(0.0);
        }

        let n_actions = self.num_actions();
        let mut flat = Vec::with_capacity(targets.len() * n_actions);
        for row in targets {
            if row.len() != n_actions {
                return Err(Error::DimensionMismatch {
                    expected: n_actions,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let target_tensor = Tensor::from_vec(flat, (targets.len(), n_actions), &DEVICE)?;

        let predicted = self.output(Self::input_tensor(states)?)?;
        let loss = loss::mse(&predicted, &target_tensor)?;

        let mut grads = loss.backward()?;
        clip_gradients(&mut grads, &self.var_map, self.max_grad_norm)?;
        self.optimiser.set_learning_rate(self.learning_rate());
        self.optimiser.step(&grads)?;
        self.updates += 1;

        Ok(loss.to_scalar::<f32>()?)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.var_map
            .save(path)
            .map_err(|err| Error::checkpoint(path, err.into()))
    }

    /// Reads the whole checkpoint into a scratch network first, so a missing or
    /// mismatched file leaves the current parameters untouched.
    fn load(&mut self, path: &Path) -> Result<()> {
        let mut staged = VarMap::new();
        build_layers(&self.topology, &staged)?;
        staged
            .load(path)
            .map_err(|err| Error::checkpoint(path, err.into()))?;
        self.copy_parameters_from(&staged)
            .map_err(|err| Error::checkpoint(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> QNetwork {
        QNetwork::new(&[2, 12, 24, 20], 0.01, 0.0, 1.0).unwrap()
    }

    #[test]
    fn predicts_one_value_per_action() {
        let net = network();
        let values = net.predict(&State::new(25.0, 0.1)).unwrap();
        assert_eq!(values.len(), 20);
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_wrong_input_width() {
        assert!(matches!(
            QNetwork::new(&[3, 8, 4], 0.01, 0.0, 1.0),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn save_then_load_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.safetensors");
        let state = State::new(31.5, -0.02);

        let trained = network();
        trained.save(&path).unwrap();

        let mut fresh = network();
        fresh.load(&path).unwrap();

        assert_eq!(
            trained.predict(&state).unwrap(),
            fresh.predict(&state).unwrap()
        );
    }

    #[test]
    fn failed_load_keeps_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let state = State::new(20.0, 0.0);
        let mut net = network();
        let before = net.predict(&state).unwrap();

        let err = net.load(&dir.path().join("missing.safetensors")).unwrap_err();
        assert!(matches!(err, Error::Checkpoint { .. }));
        assert_eq!(net.predict(&state).unwrap(), before);
    }

    #[test]
    fn poisoned_parameter_store_is_reported_as_checkpoint_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.safetensors");
        let mut net = network();
        net.save(&path).unwrap();

        let shared = net.var_map.clone();
        let poisoner = std::thread::spawn(move || {
            let _guard = shared.data().lock().unwrap();
            panic!("writer died holding the parameter lock");
        });
        assert!(poisoner.join().is_err());

        let err = net.load(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Checkpoint { ref source, .. } if matches!(**source, Error::ParameterStore(_))
        ));
    }

    #[test]
    fn load_rejects_other_topology() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.safetensors");
        QNetwork::new(&[2, 4, 20], 0.01, 0.0, 1.0)
            .unwrap()
            .save(&path)
            .unwrap();
        assert!(network().load(&path).is_err());
    }

    #[test]
    fn repeated_updates_reduce_loss() {
        let mut net = QNetwork::new(&[2, 16, 4], 0.01, 0.0, 1.0).unwrap();
        let states = vec![State::new(0.5, 0.0), State::new(-0.5, 0.0)];
        let targets = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0, 1.0]];

        let first = net.update(&states, &targets).unwrap();
        let mut last = first;
        for _ in 0..300 {
            last = net.update(&states, &targets).unwrap();
        }
        assert!(last < first, "loss went from {first} to {last}");
        assert_eq!(net.updates(), 301);
    }

    #[test]
    fn learning_rate_decays_with_updates() {
        let mut net = QNetwork::new(&[2, 4, 2], 0.05, 0.01, 1.0).unwrap();
        assert_eq!(net.learning_rate(), 0.05);
        let states = vec![State::new(20.0, 0.0)];
        let targets = vec![vec![1.0, 1.0]];
        for _ in 0..100 {
            net.update(&states, &targets).unwrap();
        }
        assert!((net.learning_rate() - 0.025).abs() < 1e-12);
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let mut net = network();
        let err = net.update(&[State::new(20.0, 0.0)], &[]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }
}
