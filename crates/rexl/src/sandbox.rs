//! Per-engine sandbox gating host-object access by class and member name.
//!
//! A sandbox is an ordered list of per-class entries. Each entry is either
//! an allow-list (only the named members are visible, optionally under
//! aliases) or a block-list (the named members, or the whole class, are
//! hidden). Entries are consulted in declaration order; the first entry
//! matching the receiver's class decides. With inheritance enabled the
//! receiver's whole registered super chain is consulted, otherwise only the
//! declared class.
//!
//! Denied members are indistinguishable from undefined ones: the sandbox
//! answers `None` and the caller reports "undefined", leaking nothing about
//! the member's existence.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

/// Access axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Read,
    Write,
    Execute,
}

/// Member visibility rule for one axis of one class entry.
#[derive(Debug, Clone, Default)]
enum MemberRule {
    /// No restriction on this axis.
    #[default]
    AllowAll,
    /// Only these script-visible names, each mapped to its host name.
    Allow(AHashMap<String, Arc<str>>),
    /// These names are hidden; an empty set hides every member.
    Block(AHashSet<String>),
}

impl MemberRule {
    /// `Some(host_name)` when access is admitted.
    fn resolve(&self, name: &str) -> Option<Arc<str>> {
        match self {
            Self::AllowAll => Some(Arc::from(name)),
            Self::Allow(map) => map.get(name).cloned(),
            Self::Block(set) => {
                if set.is_empty() || set.contains(name) {
                    None
                } else {
                    Some(Arc::from(name))
                }
            }
        }
    }
}

/// Sandbox configuration for one class.
#[derive(Debug, Clone, Default)]
pub struct ClassSandbox {
    read: MemberRule,
    write: MemberRule,
    execute: MemberRule,
}

impl ClassSandbox {
    fn allow_listed() -> Self {
        Self {
            read: MemberRule::Allow(AHashMap::new()),
            write: MemberRule::Allow(AHashMap::new()),
            execute: MemberRule::Allow(AHashMap::new()),
        }
    }

    fn block_listed() -> Self {
        Self {
            read: MemberRule::Block(AHashSet::new()),
            write: MemberRule::Block(AHashSet::new()),
            execute: MemberRule::Block(AHashSet::new()),
        }
    }

    /// Admits `members` on the read axis (allow entries only).
    pub fn reading(&mut self, members: &[&str]) -> &mut Self {
        for m in members {
            self.insert(Axis::Read, m, m);
        }
        self
    }

    pub fn writing(&mut self, members: &[&str]) -> &mut Self {
        for m in members {
            self.insert(Axis::Write, m, m);
        }
        self
    }

    pub fn executing(&mut self, members: &[&str]) -> &mut Self {
        for m in members {
            self.insert(Axis::Execute, m, m);
        }
        self
    }

    /// Exposes host member `host_name` under the script-visible `alias`,
    /// on all three axes.
    pub fn alias(&mut self, alias: &str, host_name: &str) -> &mut Self {
        self.insert(Axis::Read, alias, host_name);
        self.insert(Axis::Write, alias, host_name);
        self.insert(Axis::Execute, alias, host_name);
        self
    }

    /// Names the members hidden by a block entry. Without this, the whole
    /// class is hidden.
    pub fn hiding(&mut self, members: &[&str]) -> &mut Self {
        for axis in [Axis::Read, Axis::Write, Axis::Execute] {
            let rule = self.rule_mut(axis);
            if let MemberRule::Block(set) = rule {
                for m in members {
                    set.insert((*m).to_owned());
                }
            }
        }
        self
    }

    fn insert(&mut self, axis: Axis, script_name: &str, host_name: &str) {
        let rule = self.rule_mut(axis);
        if let MemberRule::Allow(map) = rule {
            map.insert(script_name.to_owned(), Arc::from(host_name));
        }
    }

    fn rule_mut(&mut self, axis: Axis) -> &mut MemberRule {
        match axis {
            Axis::Read => &mut self.read,
            Axis::Write => &mut self.write,
            Axis::Execute => &mut self.execute,
        }
    }

    fn resolve(&self, axis: Axis, name: &str) -> Option<Arc<str>> {
        match axis {
            Axis::Read => self.read.resolve(name),
            Axis::Write => self.write.resolve(name),
            Axis::Execute => self.execute.resolve(name),
        }
    }
}

/// The per-engine sandbox.
#[derive(Debug, Clone)]
pub struct Sandbox {
    entries: Vec<(Arc<str>, ClassSandbox)>,
    inherit: bool,
    allow_null_key: bool,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// An empty, inheriting sandbox: everything defers to permissions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            inherit: true,
            allow_null_key: true,
        }
    }

    /// A sandbox consulting only the declared class, not its supers.
    #[must_use]
    pub fn non_inheritable() -> Self {
        Self {
            inherit: false,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn reject_null_keys(mut self) -> Self {
        self.allow_null_key = false;
        self
    }

    #[must_use]
    pub fn allows_null_key(&self) -> bool {
        self.allow_null_key
    }

    /// Adds an allow-list entry for `class`; only members subsequently
    /// named (or aliased) are visible on it.
    pub fn allow(&mut self, class: &str) -> &mut ClassSandbox {
        self.entries.push((Arc::from(class), ClassSandbox::allow_listed()));
        &mut self.entries.last_mut().expect("just pushed").1
    }

    /// Adds a block-list entry for `class`; by default the whole class is
    /// hidden, `hiding` narrows it to named members.
    pub fn block(&mut self, class: &str) -> &mut ClassSandbox {
        self.entries.push((Arc::from(class), ClassSandbox::block_listed()));
        &mut self.entries.last_mut().expect("just pushed").1
    }

    /// Resolves a property read; `None` is a denial.
    #[must_use]
    pub fn read(&self, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        self.resolve(Axis::Read, chain, name)
    }

    #[must_use]
    pub fn write(&self, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        self.resolve(Axis::Write, chain, name)
    }

    #[must_use]
    pub fn execute(&self, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        self.resolve(Axis::Execute, chain, name)
    }

    fn resolve(&self, axis: Axis, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        let consulted: &[Arc<str>] = if self.inherit { chain } else { &chain[..chain.len().min(1)] };
        // first declared entry matching a consulted class decides
        for (class, entry) in &self.entries {
            if consulted.iter().any(|c| c == class) {
                return entry.resolve(axis, name);
            }
        }
        // absent entry defers to permissions
        Some(Arc::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> Vec<Arc<str>> {
        names.iter().map(|n| Arc::from(*n)).collect()
    }

    #[test]
    fn allow_list_admits_only_named_members() {
        let mut sandbox = Sandbox::new();
        sandbox.allow("Acct").reading(&["balance"]);
        let c = chain(&["Acct"]);
        assert_eq!(sandbox.read(&c, "balance").as_deref(), Some("balance"));
        assert_eq!(sandbox.read(&c, "secret"), None);
        // axes are independent: nothing was allowed for write
        assert_eq!(sandbox.write(&c, "balance"), None);
    }

    #[test]
    fn block_list_hides_exactly_the_named_members() {
        let mut sandbox = Sandbox::new();
        sandbox.block("Acct").hiding(&["secret"]);
        let c = chain(&["Acct"]);
        assert_eq!(sandbox.read(&c, "balance").as_deref(), Some("balance"));
        assert_eq!(sandbox.read(&c, "secret"), None);
    }

    #[test]
    fn block_without_members_hides_the_class() {
        let mut sandbox = Sandbox::new();
        sandbox.block("Acct");
        let c = chain(&["Acct"]);
        assert_eq!(sandbox.read(&c, "anything"), None);
        assert_eq!(sandbox.execute(&c, "anything"), None);
    }

    #[test]
    fn alias_maps_script_name_to_host_name() {
        let mut sandbox = Sandbox::new();
        sandbox.allow("Acct").alias("total", "internalTotal");
        let c = chain(&["Acct"]);
        assert_eq!(sandbox.read(&c, "total").as_deref(), Some("internalTotal"));
        // the host name itself is not in the allow list
        assert_eq!(sandbox.read(&c, "internalTotal"), None);
    }

    #[test]
    fn inheritance_consults_the_super_chain() {
        let mut inheriting = Sandbox::new();
        inheriting.block("Base");
        let c = chain(&["Derived", "Base"]);
        assert_eq!(inheriting.read(&c, "x"), None);

        let mut flat = Sandbox::non_inheritable();
        flat.block("Base");
        assert_eq!(flat.read(&c, "x").as_deref(), Some("x"));
    }

    #[test]
    fn declaration_order_decides() {
        let mut sandbox = Sandbox::new();
        sandbox.allow("Acct").reading(&["balance"]);
        sandbox.block("Acct");
        let c = chain(&["Acct"]);
        // the allow entry was declared first and wins
        assert_eq!(sandbox.read(&c, "balance").as_deref(), Some("balance"));
    }
}
