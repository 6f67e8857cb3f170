use secrecy::SecretString;

/// Process-wide configuration shared with the server once at startup.
///
/// The signing secret is set exactly once here and never mutated afterwards;
/// every token codec instance is constructed from it.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub secret: SecretString,
    pub token_ttl: u64,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            token_ttl: 0,
        }
    }

    pub fn set_token_ttl(&mut self, seconds: u64) {
        self.token_ttl = seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let mut args = GlobalArgs::new(SecretString::from("keyboard cat".to_string()));
        assert_eq!(args.secret.expose_secret(), "keyboard cat");
        assert_eq!(args.token_ttl, 0);

        args.set_token_ttl(900);
        assert_eq!(args.token_ttl, 900);
    }
}
