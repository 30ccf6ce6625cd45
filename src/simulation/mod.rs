pub mod generator;
pub mod stepper;

pub use generator::{CandleGenerator, GeneratorError, GeneratorParams};
pub use stepper::{MarketState, MarketStepper, StepperError};
