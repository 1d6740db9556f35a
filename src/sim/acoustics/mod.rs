pub mod attenuator;
