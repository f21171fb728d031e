//! Property tests for key file naming

use std::path::Path;

use proptest::prelude::*;
use sshdeck_core::secret::{KeyMaterializer, public_key_path, sanitize_key_name};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: sanitized names contain only ASCII alphanumerics and `_`
    #[test]
    fn sanitized_names_are_word_characters(name in any::<String>()) {
        let sanitized = sanitize_key_name(&name);
        prop_assert!(sanitized.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'));
    }

    /// Property: sanitizing replaces byte for byte
    #[test]
    fn sanitizing_keeps_byte_length(name in any::<String>()) {
        prop_assert_eq!(sanitize_key_name(&name).len(), name.len());
    }

    /// Property: already sanitized names are unchanged
    #[test]
    fn sanitizing_is_idempotent(name in any::<String>()) {
        let once = sanitize_key_name(&name);
        prop_assert_eq!(sanitize_key_name(&once), once);
    }

    /// Property: key paths stay directly inside the key directory
    #[test]
    fn key_path_is_a_direct_child(name in any::<String>()) {
        let materializer = KeyMaterializer::new("/tmp/sshdeck/xterm_keys");
        let path = materializer.key_path(&name);
        prop_assert_eq!(path.parent(), Some(Path::new("/tmp/sshdeck/xterm_keys")));
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        prop_assert!(file.starts_with("id_"));
    }

    /// Property: the public key sits next to the private key
    #[test]
    fn public_key_is_a_sibling(name in "[a-z ]{1,20}") {
        let materializer = KeyMaterializer::new("/tmp/sshdeck/xterm_keys");
        let key = materializer.key_path(&name);
        let public = public_key_path(&key);
        prop_assert_eq!(public.parent(), key.parent());
        prop_assert!(public.to_string_lossy().ends_with(".pub"));
    }
}
