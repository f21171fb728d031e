//! Property tests for SSH argument construction

use std::path::Path;

use proptest::prelude::*;
use sshdeck_core::launcher::{shell_command, ssh_args};
use sshdeck_core::models::ConnectionRecord;

fn record(host: &str, user: &str, port: u16) -> ConnectionRecord {
    ConnectionRecord::new("generated", host, user).with_port(port)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the destination is always the last argument
    #[test]
    fn destination_is_last(host in "[a-z0-9.-]{1,30}", user in "[a-z_]{0,10}", port in any::<u16>()) {
        let record = record(&host, &user, port);
        let destination = record.destination();
        let args = ssh_args(&record, None);
        prop_assert_eq!(args.last(), Some(&destination));
    }

    /// Property: default ports are never passed explicitly
    #[test]
    fn default_port_is_omitted(host in "[a-z0-9.-]{1,30}", port in prop::sample::select(vec![0u16, 22])) {
        let args = ssh_args(&record(&host, "ops", port), None);
        prop_assert!(!args.contains(&"-p".to_string()));
        prop_assert_eq!(args.len(), 1);
    }

    /// Property: other ports are passed with `-p`
    #[test]
    fn other_ports_are_passed(host in "[a-z0-9.-]{1,30}", port in 1u16..) {
        prop_assume!(port != 22);
        let args = ssh_args(&record(&host, "ops", port), None);
        let expected = port.to_string();
        let at = args.iter().position(|a| a == "-p");
        prop_assert!(at.is_some());
        prop_assert_eq!(&args[at.unwrap() + 1], &expected);
    }

    /// Property: the identity file comes first
    #[test]
    fn identity_file_leads(name in "[a-z_]{1,12}") {
        let key = Path::new("/keys").join(format!("id_{name}"));
        let shown = key.display().to_string();
        let args = ssh_args(&record("h", "u", 2200), Some(&key));
        prop_assert_eq!(&args[0], "-i");
        prop_assert_eq!(&args[1], &shown);
    }

    /// Property: shell quoting survives splitting
    #[test]
    fn shell_command_splits_back(argv in prop::collection::vec("[a-zA-Z0-9 _.'\"$`*?;&|=-]{0,16}", 1..6)) {
        let joined = shell_command(&argv).unwrap();
        prop_assert_eq!(shlex::split(&joined), Some(argv));
    }
}
