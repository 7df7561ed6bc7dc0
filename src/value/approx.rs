use std::path::PathBuf;

use burn::{
    optim::{GradientsParams, Optimizer},
    prelude::*,
    record::{BinFileRecorder, FullPrecisionSettings},
    tensor::{activation::relu, backend::AutodiffBackend, ElementConversion},
};
use log::{debug, info};
use nn::{
    loss::{MseLoss, Reduction},
    Linear, LinearConfig,
};
use strum::VariantArray;

use crate::maze::{Action, Position, Walls};

use super::{QFunction, QTable, ReturnTally, VFunction, VTable};

/// A small fully connected network mapping a feature vector to a scalar value
#[derive(Module, Debug)]
pub struct ValueNet<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    fc4: Linear<B>,
}

impl<B: Backend> ValueNet<B> {
    /// Forward pass, `[batch, inputs]` to `[batch, 1]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(input));
        let x = relu(self.fc2.forward(x));
        let x = relu(self.fc3.forward(x));
        self.fc4.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ValueNetConfig {
    #[config(default = 16)]
    pub hidden_in: usize,
    #[config(default = 128)]
    pub hidden: usize,
    #[config(default = 16)]
    pub hidden_out: usize,
    /// Learning rate handed to the optimizer
    #[config(default = 1e-3)]
    pub lr: f64,
}

impl ValueNetConfig {
    pub fn init<B: Backend>(&self, inputs: usize, device: &B::Device) -> ValueNet<B> {
        ValueNet {
            fc1: LinearConfig::new(inputs, self.hidden_in).init(device),
            fc2: LinearConfig::new(self.hidden_in, self.hidden).init(device),
            fc3: LinearConfig::new(self.hidden, self.hidden_out).init(device),
            fc4: LinearConfig::new(self.hidden_out, 1).init(device),
        }
    }

    /// `true` if every layer of `net` has the shape this config gives a network over `inputs` features
    fn fits<B: Backend>(&self, net: &ValueNet<B>, inputs: usize) -> bool {
        let layers = [
            (&net.fc1, [inputs, self.hidden_in]),
            (&net.fc2, [self.hidden_in, self.hidden]),
            (&net.fc3, [self.hidden, self.hidden_out]),
            (&net.fc4, [self.hidden_out, 1]),
        ];
        layers
            .iter()
            .all(|(layer, dims)| layer.weight.val().dims() == *dims)
    }
}

/// A function approximator honoring `predict(features) -> scalar` and `train(features, targets)`
///
/// Predictions are `0` until the network has been trained once or loaded from disk,
/// so a fresh approximator behaves like a zero-initialized table. Only trained
/// networks are ever written to disk.
///
/// Generic over the optimizer `O`, for example `AdamConfig::new().init()`.
pub struct Approximator<B: AutodiffBackend, O> {
    net: Option<ValueNet<B>>,
    optimizer: O,
    device: B::Device,
    inputs: usize,
    lr: f64,
    pending: Vec<(Vec<f32>, f32)>,
    trained: bool,
    path: Option<PathBuf>,
}

impl<B: AutodiffBackend, O: Optimizer<ValueNet<B>, B>> Approximator<B, O> {
    /// Build a network over `inputs` features, loading weights from `path` when possible
    ///
    /// A stored network whose layers do not fit `inputs` and `config` is ignored.
    pub fn new(
        inputs: usize,
        config: &ValueNetConfig,
        optimizer: O,
        device: B::Device,
        path: Option<PathBuf>,
    ) -> Self {
        let fresh = config.init::<B>(inputs, &device);
        let (net, trained) = match &path {
            Some(p) => match fresh.clone().load_file(p.clone(), &recorder(), &device) {
                Ok(net) if config.fits(&net, inputs) => {
                    info!("loaded value network from {}", p.display());
                    (net, true)
                }
                Ok(_) => {
                    info!(
                        "starting a fresh value network, {} holds a network of another shape",
                        p.display()
                    );
                    (fresh, false)
                }
                Err(err) => {
                    info!("starting a fresh value network, could not load {}: {err:?}", p.display());
                    (fresh, false)
                }
            },
            None => (fresh, false),
        };

        Self {
            net: Some(net),
            optimizer,
            device,
            inputs,
            lr: config.lr,
            pending: Vec::new(),
            trained,
            path,
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Number of queued training examples
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn predict(&self, features: &[f32]) -> f32 {
        debug_assert_eq!(features.len(), self.inputs);
        let (true, Some(net)) = (self.trained, self.net.as_ref()) else {
            return 0.0;
        };
        let input: Tensor<B, 2> = Tensor::<B, 1>::from_floats(features, &self.device).reshape([1, -1]);
        net.forward(input).into_scalar().elem::<f32>()
    }

    /// Queue one training example
    pub fn push(&mut self, features: Vec<f32>, target: f32) {
        debug_assert_eq!(features.len(), self.inputs);
        self.pending.push((features, target));
    }

    /// Train on every queued example for `epochs` passes of mini-batches, then clear the queue
    ///
    /// **Returns** the loss of the last batch, if any training happened
    pub fn train(&mut self, epochs: usize, size_batch: usize) -> Option<f32> {
        if self.pending.is_empty() || epochs == 0 {
            return None;
        }
        let examples = std::mem::take(&mut self.pending);
        let mut net = self.net.take()?;
        let mut last_loss = None;

        for _ in 0..epochs {
            for batch in examples.chunks(size_batch.max(1)) {
                let features = batch
                    .iter()
                    .flat_map(|(f, _)| f.iter().copied())
                    .collect::<Vec<_>>();
                let targets = batch.iter().map(|(_, t)| *t).collect::<Vec<_>>();

                let inputs: Tensor<B, 2> = Tensor::<B, 1>::from_floats(features.as_slice(), &self.device)
                    .reshape([-1, self.inputs as i32]);
                let targets: Tensor<B, 2> =
                    Tensor::<B, 1>::from_floats(targets.as_slice(), &self.device).unsqueeze_dim(1);

                let loss = MseLoss::<B>::new().forward(net.forward(inputs), targets, Reduction::Mean);
                last_loss = Some(loss.clone().into_scalar().elem::<f32>());

                let grads = GradientsParams::from_grads(loss.backward(), &net);
                net = self.optimizer.step(self.lr, net, grads);
            }
        }

        debug!(
            "trained value network on {} examples, last loss {:?}",
            examples.len(),
            last_loss
        );
        self.net = Some(net);
        self.trained = true;
        last_loss
    }

    /// Save the network weights, if the approximator has a path and has been trained
    pub fn persist(&self) -> crate::Result<()> {
        if !self.trained {
            return Ok(());
        }
        if let (Some(path), Some(net)) = (&self.path, &self.net) {
            net.clone().save_file(path.clone(), &recorder())?;
        }
        Ok(())
    }
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

/// How the action enters the feature vector of an [`ApproxQ`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionEncoding {
    /// The action index as a single scalar
    #[default]
    Index,
    /// Four indicator features
    OneHot,
}

/// Action values predicted from `(x, y, action)` features
///
/// When walls are supplied, a four-feature mask of the effective moves at the position is appended.
pub struct ApproxQ<B: AutodiffBackend, O> {
    approximator: Approximator<B, O>,
    size: (usize, usize),
    encoding: ActionEncoding,
    walls: Option<Walls>,
}

impl<B: AutodiffBackend, O: Optimizer<ValueNet<B>, B>> ApproxQ<B, O> {
    pub fn new(
        size: (usize, usize),
        encoding: ActionEncoding,
        walls: Option<Walls>,
        config: &ValueNetConfig,
        optimizer: O,
        device: B::Device,
        path: Option<PathBuf>,
    ) -> Self {
        let action_features = match encoding {
            ActionEncoding::Index => 1,
            ActionEncoding::OneHot => Action::COUNT,
        };
        let mask_features = if walls.is_some() { Action::COUNT } else { 0 };
        let inputs = 2 + action_features + mask_features;
        Self {
            approximator: Approximator::new(inputs, config, optimizer, device, path),
            size,
            encoding,
            walls,
        }
    }

    pub fn approximator(&self) -> &Approximator<B, O> {
        &self.approximator
    }

    pub fn features(&self, pos: Position, action: Action) -> Vec<f32> {
        let mut features = vec![pos.x as f32, pos.y as f32];
        match self.encoding {
            ActionEncoding::Index => features.push(action.index() as f32),
            ActionEncoding::OneHot => features.extend(
                Action::VARIANTS
                    .iter()
                    .map(|&a| if a == action { 1.0 } else { 0.0 }),
            ),
        }
        if let Some(walls) = &self.walls {
            features.extend(
                Action::VARIANTS
                    .iter()
                    .map(|&a| if walls.blocked(pos, a) { 0.0 } else { 1.0 }),
            );
        }
        features
    }
}

impl<B: AutodiffBackend, O: Optimizer<ValueNet<B>, B>> QFunction for ApproxQ<B, O> {
    fn get(&self, pos: Position, action: Action) -> f32 {
        self.approximator.predict(&self.features(pos, action))
    }

    fn set(&mut self, pos: Position, action: Action, value: f32) {
        let features = self.features(pos, action);
        self.approximator.push(features, value);
    }

    fn average_in(&mut self, tally: &ReturnTally) {
        for (pos, action, mean) in tally.means() {
            self.set(pos, action, mean);
        }
    }

    fn fit(&mut self, epochs: usize, size_batch: usize) {
        self.approximator.train(epochs, size_batch);
    }

    fn deferred(&self) -> bool {
        true
    }

    fn pending(&self) -> usize {
        self.approximator.pending()
    }

    fn table(&self) -> QTable {
        let (w, h) = self.size;
        let mut table = QTable::zeros(w, h);
        for x in 0..w {
            for y in 0..h {
                let pos = Position::new(x, y);
                for &action in Action::VARIANTS {
                    table.set(pos, action, self.get(pos, action));
                }
            }
        }
        table
    }

    fn persist(&self) -> crate::Result<()> {
        self.approximator.persist()
    }
}

/// State values predicted from `(x, y)` features
pub struct ApproxV<B: AutodiffBackend, O> {
    approximator: Approximator<B, O>,
    size: (usize, usize),
}

impl<B: AutodiffBackend, O: Optimizer<ValueNet<B>, B>> ApproxV<B, O> {
    pub fn new(
        size: (usize, usize),
        config: &ValueNetConfig,
        optimizer: O,
        device: B::Device,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            approximator: Approximator::new(2, config, optimizer, device, path),
            size,
        }
    }

    pub fn approximator(&self) -> &Approximator<B, O> {
        &self.approximator
    }
}

impl<B: AutodiffBackend, O: Optimizer<ValueNet<B>, B>> VFunction for ApproxV<B, O> {
    fn get(&self, pos: Position) -> f32 {
        self.approximator.predict(&[pos.x as f32, pos.y as f32])
    }

    fn set(&mut self, pos: Position, value: f32) {
        self.approximator.push(vec![pos.x as f32, pos.y as f32], value);
    }

    fn fit(&mut self, epochs: usize, size_batch: usize) {
        self.approximator.train(epochs, size_batch);
    }

    fn deferred(&self) -> bool {
        true
    }

    fn pending(&self) -> usize {
        self.approximator.pending()
    }

    fn table(&self) -> VTable {
        let (w, h) = self.size;
        let mut table = VTable::zeros(w, h);
        for x in 0..w {
            for y in 0..h {
                let pos = Position::new(x, y);
                table.set(pos, self.get(pos));
            }
        }
        table
    }

    fn persist(&self) -> crate::Result<()> {
        self.approximator.persist()
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    use super::*;

    type TestBackend = Autodiff<NdArray>;

    fn adam() -> impl Optimizer<ValueNet<TestBackend>, TestBackend> {
        AdamConfig::new().init::<TestBackend, ValueNet<TestBackend>>()
    }

    fn approx_q(
        walls: Option<Walls>,
        encoding: ActionEncoding,
        path: Option<PathBuf>,
    ) -> ApproxQ<TestBackend, impl Optimizer<ValueNet<TestBackend>, TestBackend>> {
        ApproxQ::new((3, 3), encoding, walls, &ValueNetConfig::new(), adam(), Default::default(), path)
    }

    fn approx_v(
        path: Option<PathBuf>,
    ) -> ApproxV<TestBackend, impl Optimizer<ValueNet<TestBackend>, TestBackend>> {
        ApproxV::new((2, 2), &ValueNetConfig::new(), adam(), Default::default(), path)
    }

    #[test]
    fn fresh_approximator_predicts_zero() {
        let q = approx_q(None, ActionEncoding::Index, None);
        assert_eq!(q.get(Position::new(1, 1), Action::Down), 0.0);
        assert!(q.table().values().iter().all(|&v| v == 0.0));

        let v = approx_v(None);
        assert_eq!(v.get(Position::new(0, 1)), 0.0);
    }

    #[test]
    fn feature_layouts() {
        let pos = Position::new(2, 1);
        let q = approx_q(None, ActionEncoding::Index, None);
        assert_eq!(q.features(pos, Action::Down), [2.0, 1.0, 2.0]);
        assert_eq!(q.approximator().inputs(), 3);

        let q = approx_q(Some(Walls::open(3, 3).unwrap()), ActionEncoding::OneHot, None);
        assert_eq!(
            q.features(pos, Action::Right),
            [2.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0]
        );
        assert_eq!(q.approximator().inputs(), 10);
    }

    #[test]
    fn set_is_deferred_until_fit() {
        let mut q = approx_q(None, ActionEncoding::OneHot, None);
        assert!(q.deferred());
        q.set(Position::new(0, 0), Action::Right, 1.0);
        assert_eq!(q.pending(), 1);
        assert_eq!(q.get(Position::new(0, 0), Action::Right), 0.0);

        q.fit(1, 8);
        assert_eq!(q.pending(), 0);
        assert!(q.approximator().is_trained());
    }

    #[test]
    fn training_moves_predictions_toward_targets() {
        let config = ValueNetConfig::new().with_lr(1e-2);
        let mut approximator =
            Approximator::<TestBackend, _>::new(2, &config, adam(), Default::default(), None);
        for x in 0..3 {
            for y in 0..3 {
                approximator.push(vec![x as f32, y as f32], 1.0);
            }
        }
        let first = approximator.train(1, 9).unwrap();
        for x in 0..3 {
            for y in 0..3 {
                approximator.push(vec![x as f32, y as f32], 1.0);
            }
        }
        let last = approximator.train(300, 9).unwrap();

        assert!(last < first, "Loss fell from {first} to {last}");
        let prediction = approximator.predict(&[1.0, 1.0]);
        assert!((prediction - 1.0).abs() < 0.25, "Predicted {prediction}");
    }

    #[test]
    fn weights_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");

        let mut v = approx_v(Some(path.clone()));
        v.set(Position::new(1, 1), 3.0);
        v.fit(5, 4);
        v.persist().unwrap();

        let reloaded = approx_v(Some(path));
        assert!(reloaded.approximator().is_trained());
        assert_eq!(reloaded.table(), v.table());
    }

    #[test]
    fn untrained_network_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v");

        let mut v = approx_v(Some(path.clone()));
        v.fit(5, 4);
        v.persist().unwrap();
        assert!(!path.with_extension("bin").exists());

        let reloaded = approx_v(Some(path));
        assert!(!reloaded.approximator().is_trained());
        assert!(reloaded.table().values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn network_of_another_shape_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values");

        let mut v = approx_v(Some(path.clone()));
        v.set(Position::new(1, 1), 3.0);
        v.fit(5, 4);
        v.persist().unwrap();

        let q = approx_q(None, ActionEncoding::OneHot, Some(path.clone()));
        assert!(!q.approximator().is_trained());
        assert_eq!(q.get(Position::new(1, 1), Action::Up), 0.0);

        let config = ValueNetConfig::new().with_hidden(32);
        let v = ApproxV::<TestBackend, _>::new((2, 2), &config, adam(), Default::default(), Some(path));
        assert!(!v.approximator().is_trained());
    }
}
