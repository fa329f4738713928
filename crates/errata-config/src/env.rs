use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` and `{{ env.VAR | default("x") }}` in raw TOML
///
/// Runs before deserialization, so config structs hold plain values.
/// Comment lines are copied verbatim, placeholders included.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    fn placeholder() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\)\s*)?\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut copied = 0;
        for captures in placeholder().captures_iter(line) {
            let Some(whole) = captures.get(0) else { continue };

            output.push_str(&line[copied..whole.start()]);
            output.push_str(&resolve(&captures)?);
            copied = whole.end();
        }
        output.push_str(&line[copied..]);
    }

    Ok(output)
}

fn resolve(captures: &Captures<'_>) -> anyhow::Result<String> {
    let key = &captures[1];
    let fallback = captures.get(2).map(|m| m.as_str());

    let Some(name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        anyhow::bail!("only variables scoped with 'env.' are supported: `{key}`");
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_string()),
        (Err(_), None) => anyhow::bail!("environment variable not found: `{name}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "[server]\nlisten_address = \"127.0.0.1:3000\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn variables_are_substituted() {
        temp_env::with_vars([("ERRATA_ADDR", Some("0.0.0.0:8080")), ("ERRATA_FILTER", Some("debug"))], || {
            let expanded =
                expand_env("listen_address = \"{{ env.ERRATA_ADDR }}\"\nfilter = \"{{env.ERRATA_FILTER}}\"").unwrap();
            assert_eq!(expanded, "listen_address = \"0.0.0.0:8080\"\nfilter = \"debug\"");
        });
    }

    #[test]
    fn unset_variable_is_an_error() {
        temp_env::with_var_unset("ERRATA_UNSET", || {
            let err = expand_env("filter = \"{{ env.ERRATA_UNSET }}\"").unwrap_err();
            assert!(err.to_string().contains("ERRATA_UNSET"));
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        let input = "format = \"{{ env.ERRATA_FORMAT | default(\"text\") }}\"";

        temp_env::with_var_unset("ERRATA_FORMAT", || {
            assert_eq!(expand_env(input).unwrap(), "format = \"text\"");
        });

        temp_env::with_var("ERRATA_FORMAT", Some("json"), || {
            assert_eq!(expand_env(input).unwrap(), "format = \"json\"");
        });
    }

    #[test]
    fn empty_default_is_allowed() {
        temp_env::with_var_unset("ERRATA_EMPTY", || {
            assert_eq!(
                expand_env("path = \"{{ env.ERRATA_EMPTY | default(\"\") }}\"").unwrap(),
                "path = \"\""
            );
        });
    }

    #[test]
    fn only_env_scope_is_supported() {
        let err = expand_env("key = \"{{ vault.SECRET }}\"").unwrap_err();
        assert!(err.to_string().contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comment_lines_are_left_alone() {
        temp_env::with_vars([("ERRATA_SET", Some("value"))], || {
            temp_env::with_var_unset("ERRATA_UNSET", || {
                let input = "  # old = \"{{ env.ERRATA_UNSET }}\"\nkey = \"{{ env.ERRATA_SET }}\"\n";
                assert_eq!(
                    expand_env(input).unwrap(),
                    "  # old = \"{{ env.ERRATA_UNSET }}\"\nkey = \"value\"\n"
                );
            });
        });
    }
}
