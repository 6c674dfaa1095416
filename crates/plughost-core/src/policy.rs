//! Allow-list policy and dispatch targets.
//!
//! Both are parsed from the host's string syntax, where the case-insensitive
//! token `All` means "every module".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token meaning "unrestricted" in an allow-list and "broadcast" as a target.
pub const ALL_TOKEN: &str = "All";

/// Case-insensitive module name comparison.
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

fn is_all(value: &str) -> bool {
    same_name(value.trim(), ALL_TOKEN)
}

/// Which discovered modules may be initialized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AllowPolicy {
    /// Every module is allowed.
    #[default]
    All,
    /// Only the named modules are allowed.
    Only(Vec<String>),
}

impl AllowPolicy {
    /// Parse `All` or a comma-separated list of module names.
    pub fn parse(list: &str) -> Self {
        if is_all(list) {
            return AllowPolicy::All;
        }

        AllowPolicy::Only(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowPolicy::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, name: &str) -> bool {
        match self {
            AllowPolicy::All => true,
            AllowPolicy::Only(names) => names.iter().any(|allowed| same_name(allowed, name)),
        }
    }
}

impl fmt::Display for AllowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowPolicy::All => f.write_str(ALL_TOKEN),
            AllowPolicy::Only(names) => f.write_str(&names.join(",")),
        }
    }
}

impl From<String> for AllowPolicy {
    fn from(list: String) -> Self {
        AllowPolicy::parse(&list)
    }
}

impl From<&str> for AllowPolicy {
    fn from(list: &str) -> Self {
        AllowPolicy::parse(list)
    }
}

impl From<AllowPolicy> for String {
    fn from(policy: AllowPolicy) -> Self {
        policy.to_string()
    }
}

/// Addressee of a journal action or command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every loaded module.
    All,
    /// One module, looked up case-insensitively.
    Module(String),
}

impl Target {
    pub fn parse(target: &str) -> Self {
        if is_all(target) {
            Target::All
        } else {
            Target::Module(target.to_string())
        }
    }
}

impl From<&str> for Target {
    fn from(target: &str) -> Self {
        Target::parse(target)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str(ALL_TOKEN),
            Target::Module(name) => f.write_str(name),
        }
    }
}
