// The controller properties drive the same harness as the integration tests
#[allow(dead_code)]
#[path = "../integration/fakes.rs"]
mod fakes;

mod command_tests;
mod controller_tests;
mod materialize_tests;
