pub mod accumulator;
pub mod echo;

pub use accumulator::LineAccumulator;
pub use echo::LineEcho;
