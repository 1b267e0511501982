//! Package/class/member permission trees, separate from the per-engine
//! sandbox and composable by overlay.
//!
//! A [`Permissions`] instance is a tree keyed package → class → member.
//! Every node can carry an allow/deny marker per axis (read, write,
//! execute, annotation); the effective policy for a `(class, member, axis)`
//! triple is the nearest-ancestor decision, falling back to the instance
//! default. [`Permissions::unrestricted`] defaults to allow,
//! [`Permissions::restricted`] to deny.
//!
//! Textual rules express denials the way hosts write them:
//! `"pkg.sub {}"` hides a whole package, `"pkg.sub { Klass {} }"` one
//! class, `"pkg.sub { Klass { secret; } }"` a single member.

use ahash::AHashMap;

/// Per-node allow/deny markers; `None` defers to the parent node.
#[derive(Debug, Clone, Copy, Default)]
struct AxisDecision {
    read: Option<bool>,
    write: Option<bool>,
    execute: Option<bool>,
    annotation: Option<bool>,
}

impl AxisDecision {
    const DENY_ALL: Self = Self {
        read: Some(false),
        write: Some(false),
        execute: Some(false),
        annotation: Some(false),
    };

    fn get(&self, axis: PermissionAxis) -> Option<bool> {
        match axis {
            PermissionAxis::Read => self.read,
            PermissionAxis::Write => self.write,
            PermissionAxis::Execute => self.execute,
            PermissionAxis::Annotation => self.annotation,
        }
    }
}

/// Access axis for permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAxis {
    Read,
    Write,
    Execute,
    Annotation,
}

#[derive(Debug, Clone, Default)]
struct ClassNode {
    decision: AxisDecision,
    members: AHashMap<String, AxisDecision>,
}

#[derive(Debug, Clone, Default)]
struct PackageNode {
    decision: AxisDecision,
    classes: AHashMap<String, ClassNode>,
}

/// A composable permission policy.
#[derive(Debug, Clone)]
pub struct Permissions {
    packages: AHashMap<String, PackageNode>,
    default_allow: bool,
}

impl Permissions {
    /// Everything is allowed unless a rule denies it.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            packages: AHashMap::new(),
            default_allow: true,
        }
    }

    /// Everything is denied unless a rule allows it.
    #[must_use]
    pub fn restricted() -> Self {
        Self {
            packages: AHashMap::new(),
            default_allow: false,
        }
    }

    /// Parses denial rules over an unrestricted base.
    pub fn parse(rules: &[&str]) -> Result<Self, String> {
        Self::unrestricted().compose_rules(rules)
    }

    /// Returns a new policy layering `rules` over this one.
    pub fn compose(&self, rules: &[&str]) -> Result<Self, String> {
        self.clone().compose_rules(rules)
    }

    fn compose_rules(mut self, rules: &[&str]) -> Result<Self, String> {
        for rule in rules {
            apply_rule(&mut self, rule)?;
        }
        Ok(self)
    }

    /// Programmatic allow of one member axis, for building allow-lists over
    /// a restricted base.
    pub fn allow_member(&mut self, class: &str, member: &str, axis: PermissionAxis) {
        let (package, simple) = split_class(class);
        let node = self
            .packages
            .entry(package.to_owned())
            .or_default()
            .classes
            .entry(simple.to_owned())
            .or_default();
        let decision = node.members.entry(member.to_owned()).or_default();
        match axis {
            PermissionAxis::Read => decision.read = Some(true),
            PermissionAxis::Write => decision.write = Some(true),
            PermissionAxis::Execute => decision.execute = Some(true),
            PermissionAxis::Annotation => decision.annotation = Some(true),
        }
    }

    /// Nearest-ancestor decision for one class (no inheritance walk).
    fn decide_for_class(&self, class: &str, member: &str, axis: PermissionAxis) -> Option<bool> {
        let (package, simple) = split_class(class);
        let pkg = self.packages.get(package)?;
        if let Some(class_node) = pkg.classes.get(simple) {
            if let Some(decision) = class_node.members.get(member).and_then(|d| d.get(axis)) {
                return Some(decision);
            }
            if let Some(decision) = class_node.decision.get(axis) {
                return Some(decision);
            }
        }
        pkg.decision.get(axis)
    }

    /// Decision over an inheritance chain: the first class with an explicit
    /// decision wins; absent decisions fall back to the instance default.
    #[must_use]
    pub fn decide(&self, chain: &[std::sync::Arc<str>], member: &str, axis: PermissionAxis) -> bool {
        for class in chain {
            if let Some(decision) = self.decide_for_class(class, member, axis) {
                return decision;
            }
        }
        self.default_allow
    }

    #[must_use]
    pub fn allows_read(&self, chain: &[std::sync::Arc<str>], member: &str) -> bool {
        self.decide(chain, member, PermissionAxis::Read)
    }

    #[must_use]
    pub fn allows_write(&self, chain: &[std::sync::Arc<str>], member: &str) -> bool {
        self.decide(chain, member, PermissionAxis::Write)
    }

    #[must_use]
    pub fn allows_execute(&self, chain: &[std::sync::Arc<str>], member: &str) -> bool {
        self.decide(chain, member, PermissionAxis::Execute)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::unrestricted()
    }
}

fn split_class(class: &str) -> (&str, &str) {
    match class.rfind('.') {
        Some(pos) => (&class[..pos], &class[pos + 1..]),
        None => ("", class),
    }
}

// ---- textual rule parsing ----

/// Applies one denial rule of the form
/// `pkg { Klass { member; method(); } Other {} }` or bare `pkg {}`.
fn apply_rule(permissions: &mut Permissions, rule: &str) -> Result<(), String> {
    let mut tokens = RuleTokens::new(rule);
    let package = tokens.ident().ok_or_else(|| format!("expected package name in '{rule}'"))?;
    let node = permissions.packages.entry(package).or_default();
    match tokens.next() {
        None => {
            node.decision = AxisDecision::DENY_ALL;
            Ok(())
        }
        Some(RuleToken::Open) => {
            if tokens.peek_close() {
                tokens.next();
                node.decision = AxisDecision::DENY_ALL;
                return tokens.expect_end(rule);
            }
            while !tokens.peek_close() {
                let class = tokens.ident().ok_or_else(|| format!("expected class name in '{rule}'"))?;
                let class_node = node.classes.entry(class).or_default();
                match tokens.next() {
                    Some(RuleToken::Open) => {
                        if tokens.peek_close() {
                            class_node.decision = AxisDecision::DENY_ALL;
                            tokens.next();
                            continue;
                        }
                        while !tokens.peek_close() {
                            let member = tokens.ident().ok_or_else(|| format!("expected member name in '{rule}'"))?;
                            match tokens.next() {
                                Some(RuleToken::Semi) => {}
                                other => return Err(format!("expected ';' after member, got {other:?} in '{rule}'")),
                            }
                            class_node.members.insert(member, AxisDecision::DENY_ALL);
                        }
                        tokens.next();
                    }
                    other => return Err(format!("expected '{{' after class, got {other:?} in '{rule}'")),
                }
            }
            tokens.next();
            tokens.expect_end(rule)
        }
        other => Err(format!("unexpected {other:?} in '{rule}'")),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RuleToken {
    Ident(String),
    Open,
    Close,
    Semi,
}

struct RuleTokens {
    tokens: std::vec::IntoIter<RuleToken>,
    peeked: Option<RuleToken>,
}

impl RuleTokens {
    fn new(rule: &str) -> Self {
        let mut tokens = Vec::new();
        let mut chars = rule.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                '{' => {
                    tokens.push(RuleToken::Open);
                    chars.next();
                }
                '}' => {
                    tokens.push(RuleToken::Close);
                    chars.next();
                }
                ';' => {
                    tokens.push(RuleToken::Semi);
                    chars.next();
                }
                c if c.is_whitespace() => {
                    chars.next();
                }
                _ => {
                    let mut ident = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_alphanumeric() || c == '.' || c == '_' || c == '$' {
                            ident.push(c);
                            chars.next();
                        } else if c == '(' {
                            // method members may be written `name()`
                            chars.next();
                            if chars.peek() == Some(&')') {
                                chars.next();
                            }
                            break;
                        } else {
                            break;
                        }
                    }
                    if ident.is_empty() {
                        // skip an unknown character rather than loop forever
                        chars.next();
                    } else {
                        tokens.push(RuleToken::Ident(ident));
                    }
                }
            }
        }
        Self {
            tokens: tokens.into_iter(),
            peeked: None,
        }
    }

    fn next(&mut self) -> Option<RuleToken> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn peek_close(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        matches!(self.peeked, Some(RuleToken::Close) | None)
    }

    fn ident(&mut self) -> Option<String> {
        match self.next() {
            Some(RuleToken::Ident(s)) => Some(s),
            _ => None,
        }
    }

    fn expect_end(&mut self, rule: &str) -> Result<(), String> {
        match self.next() {
            None => Ok(()),
            Some(tok) => Err(format!("trailing {tok:?} in '{rule}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn chain(names: &[&str]) -> Vec<Arc<str>> {
        names.iter().map(|n| Arc::from(*n)).collect()
    }

    #[test]
    fn unrestricted_allows_by_default() {
        let p = Permissions::unrestricted();
        assert!(p.allows_read(&chain(&["pkg.Klass"]), "x"));
    }

    #[test]
    fn restricted_denies_by_default() {
        let p = Permissions::restricted();
        assert!(!p.allows_read(&chain(&["pkg.Klass"]), "x"));
    }

    #[test]
    fn package_rule_denies_the_whole_subpackage() {
        let p = Permissions::parse(&["pkg.sub {}"]).unwrap();
        assert!(!p.allows_read(&chain(&["pkg.sub.Klass"]), "x"));
        assert!(p.allows_read(&chain(&["pkg.other.Klass"]), "x"));
    }

    #[test]
    fn class_rule_denies_only_that_class() {
        let p = Permissions::parse(&["pkg.sub { Klass {} }"]).unwrap();
        assert!(!p.allows_execute(&chain(&["pkg.sub.Klass"]), "m"));
        assert!(p.allows_execute(&chain(&["pkg.sub.Other"]), "m"));
    }

    #[test]
    fn member_rule_denies_only_that_member() {
        let p = Permissions::parse(&["pkg.sub { Klass { secret; } }"]).unwrap();
        assert!(!p.allows_read(&chain(&["pkg.sub.Klass"]), "secret"));
        assert!(p.allows_read(&chain(&["pkg.sub.Klass"]), "balance"));
    }

    #[test]
    fn method_members_may_carry_parens() {
        let p = Permissions::parse(&["pkg { Klass { exec(); } }"]).unwrap();
        assert!(!p.allows_execute(&chain(&["pkg.Klass"]), "exec"));
    }

    #[test]
    fn compose_layers_rules_additively() {
        let base = Permissions::parse(&["pkg.a {}"]).unwrap();
        let composed = base.compose(&["pkg.b {}"]).unwrap();
        assert!(!composed.allows_read(&chain(&["pkg.a.K"]), "x"));
        assert!(!composed.allows_read(&chain(&["pkg.b.K"]), "x"));
        // the base is unchanged
        assert!(base.allows_read(&chain(&["pkg.b.K"]), "x"));
    }

    #[test]
    fn inherited_class_decision_applies_through_the_chain() {
        let p = Permissions::parse(&["pkg { Base {} }"]).unwrap();
        assert!(!p.allows_read(&chain(&["pkg.Derived", "pkg.Base"]), "x"));
    }

    #[test]
    fn allow_member_overrides_restricted_default() {
        let mut p = Permissions::restricted();
        p.allow_member("pkg.Klass", "balance", PermissionAxis::Read);
        assert!(p.allows_read(&chain(&["pkg.Klass"]), "balance"));
        assert!(!p.allows_read(&chain(&["pkg.Klass"]), "other"));
    }
}
