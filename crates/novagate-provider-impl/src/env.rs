//! Resolves the `{env:NAME}` placeholder the config layer allows in
//! [`ProviderAuth::ApiKey`] keys and header overrides, in case a value
//! survives unresolved to this layer (e.g. a header override read straight
//! from a config file that was never round-tripped through the loader).
//!
//! The config loader is expected to resolve these eagerly; this is a
//! defensive second pass, grounded on `gproxy-provider-core/src/provider/
//! mod.rs`'s `ProviderConfig` doc comment describing the same placeholder
//! convention.

pub(crate) fn resolve(value: &str) -> String {
    let trimmed = value.trim();
    let Some(name) = trimmed
        .strip_prefix("{env:")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return value.to_string();
    };
    std::env::var(name).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_plain_values() {
        assert_eq!(resolve("sk-live-abc"), "sk-live-abc");
    }

    #[test]
    fn resolves_known_env_var() {
        // SAFETY: test-only, single-threaded within this test.
        unsafe {
            std::env::set_var("NOVAGATE_TEST_ENV_KEY", "resolved-value");
        }
        assert_eq!(resolve("{env:NOVAGATE_TEST_ENV_KEY}"), "resolved-value");
        unsafe {
            std::env::remove_var("NOVAGATE_TEST_ENV_KEY");
        }
    }

    #[test]
    fn leaves_placeholder_for_missing_env_var() {
        assert_eq!(
            resolve("{env:NOVAGATE_DOES_NOT_EXIST}"),
            "{env:NOVAGATE_DOES_NOT_EXIST}"
        );
    }
}
