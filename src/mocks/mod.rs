// This module is only compiled during tests

pub mod mock_bus;
pub mod mock_sensor;
