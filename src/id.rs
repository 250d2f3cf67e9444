//! Session and segment identifiers.

use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::OnceLock;

/// Length of generated identifiers.
pub const ID_LENGTH: usize = 36;

/// A random 36-character identifier over `[A-Za-z0-9]`.
///
/// Draws from the thread-local generator, which is a CSPRNG seeded from the OS.
pub fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

static PROCESS_SESSION_ID: OnceLock<String> = OnceLock::new();

/// Session id shared by the process-wide SDK instance, created on first use.
pub fn process_session_id() -> &'static str {
    PROCESS_SESSION_ID.get_or_init(generate_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_shape() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_ids_differ() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_process_session_id_is_stable() {
        assert_eq!(process_session_id(), process_session_id());
        assert_eq!(process_session_id().len(), ID_LENGTH);
    }
}
