use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const RESET_TOKEN_LENGTH: usize = 48;

pub fn generate_access_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_alphanumeric_and_distinct() {
        let a = generate_access_token(RESET_TOKEN_LENGTH);
        let b = generate_access_token(RESET_TOKEN_LENGTH);
        assert_eq!(a.len(), RESET_TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
