mod fakes;
mod launch_tests;
mod local_flow_tests;
mod vault_flow_tests;
