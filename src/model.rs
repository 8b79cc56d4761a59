//! Neural network model for wavelength classification
//!
//! A single hidden layer perceptron mapping filter transmittances to one
//! score per candidate wavelength.

use burn::{
    config::Config,
    module::Module,
    nn::{Linear, LinearConfig, Sigmoid, Tanh},
    tensor::{Float, Tensor, activation::softmax, backend::Backend},
};

/// Layer sizes of the classifier.
#[derive(Config, Debug)]
pub struct WaveClassifierConfig {
    /// Number of filter transmittances per sample
    #[config(default = 11)]
    pub inputs: usize,
    /// Width of the tanh hidden layer
    #[config(default = 100)]
    pub hidden: usize,
    /// Number of distinct wavelengths
    #[config(default = 750)]
    pub classes: usize,
}

impl WaveClassifierConfig {
    /// Creates a classifier with randomly initialized weights on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> WaveClassifier<B> {
        WaveClassifier {
            fc1: LinearConfig::new(self.inputs, self.hidden).init(device),
            fc2: LinearConfig::new(self.hidden, self.classes).init(device),
            tanh: Tanh::new(),
            sigmoid: Sigmoid::new(),
        }
    }
}

/// Neural network model for wavelength classification
///
/// Architecture: inputs → hidden (tanh) → classes, with two heads on the
/// output layer:
/// - `class_output`: element-wise logistic, each score in (0, 1)
/// - `output`: softmax over classes, used for the loss and for prediction
///
/// # Example
/// ```ignore
/// let device = NdArrayDevice::Cpu;
/// let model = WaveClassifierConfig::new().init::<NdArray>(&device);
/// let predictions = model.forward(input).output.argmax(1);
/// ```
#[derive(Module, Debug)]
pub struct WaveClassifier<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    tanh: Tanh,
    sigmoid: Sigmoid,
}

/// Both heads of a forward pass, each of shape `[batch_size, classes]`.
#[derive(Debug, Clone)]
pub struct ClassifierOutput<B: Backend> {
    pub class_output: Tensor<B, 2, Float>,
    pub output: Tensor<B, 2, Float>,
}

impl<B: Backend> WaveClassifier<B> {
    /// Performs a forward pass through the network
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch_size, inputs]
    ///
    /// # Returns
    /// * `ClassifierOutput<B>` - The logistic head and the softmax head
    pub fn forward(&self, input: Tensor<B, 2, Float>) -> ClassifierOutput<B> {
        let hidden = self.tanh.forward(self.fc1.forward(input));
        let logits = self.fc2.forward(hidden);

        ClassifierOutput {
            class_output: self.sigmoid.forward(logits.clone()),
            output: softmax(logits, 1),
        }
    }

    /// `[inputs, hidden, classes]` as stored in the weight tensors.
    pub fn layer_sizes(&self) -> [usize; 3] {
        let [inputs, hidden] = self.fc1.weight.val().dims();
        let [_, classes] = self.fc2.weight.val().dims();
        [inputs, hidden, classes]
    }

    /// Softmax head only.
    pub fn probabilities(&self, input: Tensor<B, 2, Float>) -> Tensor<B, 2, Float> {
        let hidden = self.tanh.forward(self.fc1.forward(input));
        softmax(self.fc2.forward(hidden), 1)
    }
}
