mod paygate;

pub use paygate::ServerProcessor;
