//! Key directive parsing.
//!
//! A key in a configuration fragment may carry directives after its base
//! name, separated by `|`:
//!
//! - `name|list` — children with numeric keys are appended, not matched
//! - `name|important` — the value replaces whatever is already merged
//! - `name|flat` — nested keys are installed as `name/child` one level up
//! - `name|<flag>` — the key is merged only while the named flag is `true`
//!
//! Tokens are resolved against the registered named flags first, so a flag
//! registered as `list` shadows the built-in directive.

use cfgweave_types::{MergeFlags, NamedFlags};

use crate::config::UnknownDirectivePolicy;

/// Separator between the base name and each directive token.
pub const SEPARATOR: char = '|';
/// Directive enabling list-mode for the key's children.
pub const LIST: &str = "list";
/// Directive adding `OVERWRITE` to the key's flags.
pub const IMPORTANT: &str = "important";
/// Directive adding `FLATTEN` to the key's flags.
pub const FLAT: &str = "flat";
/// Flag registered as `false` on every new engine.
pub const DISABLED: &str = "disabled";

/// A parsed key: base name plus raw directive tokens in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyDirectives<'k> {
    base: &'k str,
    tokens: Vec<&'k str>,
}

/// A directive token classified against the registered flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive<'k> {
    /// The token names a registered flag; `open` is its current value.
    Gate { name: &'k str, open: bool },
    List,
    Important,
    Flat,
    Unknown(&'k str),
}

/// What the merge should do with a key after evaluating its directives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluation<'k> {
    /// Merge the key's value with these settings.
    Merge(Step),
    /// Skip the key and its whole subtree because of `token`.
    Drop { token: &'k str },
}

/// Settings for one child traversal step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub flags: MergeFlags,
    /// Whether the child's own numeric keys are re-indexed.
    pub list_mode: bool,
}

impl<'k> Directive<'k> {
    /// Classify a token. Registered flags take precedence over built-ins.
    pub fn classify(token: &'k str, flags: &NamedFlags) -> Self {
        if let Some(open) = flags.get(token) {
            return Self::Gate { name: token, open };
        }
        match token {
            LIST => Self::List,
            IMPORTANT => Self::Important,
            FLAT => Self::Flat,
            _ => Self::Unknown(token),
        }
    }
}

impl<'k> KeyDirectives<'k> {
    /// Split `key` on `|` into a base name and directive tokens.
    pub fn parse(key: &'k str) -> Self {
        let mut parts = key.split(SEPARATOR);
        let base = parts.next().unwrap_or_default();
        Self {
            base,
            tokens: parts.collect(),
        }
    }

    /// The key without its directives.
    pub fn base(&self) -> &'k str {
        self.base
    }

    /// Raw directive tokens in declaration order.
    pub fn tokens(&self) -> &[&'k str] {
        &self.tokens
    }

    /// Evaluate the tokens in order, starting from the inherited flags.
    ///
    /// Evaluation stops at the first token that drops the key.
    pub fn evaluate(
        &self,
        flags: &NamedFlags,
        inherited: MergeFlags,
        policy: UnknownDirectivePolicy,
    ) -> Evaluation<'k> {
        let mut step = Step {
            flags: inherited,
            list_mode: false,
        };

        for &token in &self.tokens {
            match Directive::classify(token, flags) {
                Directive::Gate { open: true, .. } => {}
                Directive::Gate { open: false, .. } => return Evaluation::Drop { token },
                Directive::List => step.list_mode = true,
                Directive::Important => step.flags |= MergeFlags::OVERWRITE,
                Directive::Flat => step.flags |= MergeFlags::FLATTEN,
                Directive::Unknown(_) => {
                    if policy == UnknownDirectivePolicy::Exclude {
                        return Evaluation::Drop { token };
                    }
                }
            }
        }

        Evaluation::Merge(step)
    }
}

/// Returns `true` if `key` is a plain decimal number such as `3`, `-1`,
/// `0.5` or `1e3`. Such keys are re-indexed inside list-mode containers.
pub fn is_numeric_key(key: &str) -> bool {
    let body = key.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(key);
    body.bytes()
        .next()
        .is_some_and(|b| b.is_ascii_digit() || b == b'.')
        && body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        && body.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(pairs: &[(&str, bool)]) -> NamedFlags {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn step(evaluation: Evaluation<'_>) -> Step {
        match evaluation {
            Evaluation::Merge(step) => step,
            other => panic!("expected Merge, got {other:?}"),
        }
    }

    #[test]
    fn parse_plain_key() {
        let key = KeyDirectives::parse("server");
        assert_eq!(key.base(), "server");
        assert!(key.tokens().is_empty());
    }

    #[test]
    fn parse_keeps_token_order() {
        let key = KeyDirectives::parse("items|list|flat|debug");
        assert_eq!(key.base(), "items");
        assert_eq!(key.tokens(), ["list", "flat", "debug"]);
    }

    #[test]
    fn parse_empty_segments() {
        let key = KeyDirectives::parse("|list|");
        assert_eq!(key.base(), "");
        assert_eq!(key.tokens(), ["list", ""]);
    }

    #[test]
    fn registered_flag_shadows_builtin() {
        let registered = flags(&[("list", false)]);
        assert_eq!(
            Directive::classify("list", &registered),
            Directive::Gate {
                name: "list",
                open: false
            }
        );
        assert_eq!(Directive::classify("list", &NamedFlags::new()), Directive::List);
    }

    #[test]
    fn builtins_adjust_step() {
        let key = KeyDirectives::parse("x|list|important|flat");
        let step = step(key.evaluate(
            &NamedFlags::new(),
            MergeFlags::NONE,
            UnknownDirectivePolicy::Ignore,
        ));
        assert!(step.list_mode);
        assert_eq!(step.flags, MergeFlags::OVERWRITE | MergeFlags::FLATTEN);
    }

    #[test]
    fn inherited_flags_are_kept() {
        let key = KeyDirectives::parse("x");
        let step = step(key.evaluate(
            &NamedFlags::new(),
            MergeFlags::FLATTEN,
            UnknownDirectivePolicy::Ignore,
        ));
        assert_eq!(step.flags, MergeFlags::FLATTEN);
        assert!(!step.list_mode);
    }

    #[test]
    fn closed_gate_drops_key() {
        let key = KeyDirectives::parse("secret|important|debug");
        let evaluation = key.evaluate(
            &flags(&[("debug", false)]),
            MergeFlags::NONE,
            UnknownDirectivePolicy::Ignore,
        );
        assert_eq!(evaluation, Evaluation::Drop { token: "debug" });
    }

    #[test]
    fn open_gate_merges() {
        let key = KeyDirectives::parse("secret|debug");
        let step = step(key.evaluate(
            &flags(&[("debug", true)]),
            MergeFlags::NONE,
            UnknownDirectivePolicy::Ignore,
        ));
        assert_eq!(step.flags, MergeFlags::NONE);
    }

    #[test]
    fn unknown_token_follows_policy() {
        let key = KeyDirectives::parse("a|whatever");
        let ignored = key.evaluate(
            &NamedFlags::new(),
            MergeFlags::NONE,
            UnknownDirectivePolicy::Ignore,
        );
        assert!(matches!(ignored, Evaluation::Merge(_)));

        let excluded = key.evaluate(
            &NamedFlags::new(),
            MergeFlags::NONE,
            UnknownDirectivePolicy::Exclude,
        );
        assert_eq!(excluded, Evaluation::Drop { token: "whatever" });
    }

    #[test]
    fn numeric_keys() {
        for key in ["0", "12", "-1", "+3", "0.5", ".5", "1e3", "2E-2"] {
            assert!(is_numeric_key(key), "{key} should be numeric");
        }
        for key in ["", "a", "1a", "inf", "NaN", "-", ".", "1e", " 1", "0x10"] {
            assert!(!is_numeric_key(key), "{key} should not be numeric");
        }
    }
}
