//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store mutations, used to label transactions in logs and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Upsert,
    Update,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "add",
            Operation::Upsert => "upsert",
            Operation::Update => "update",
            Operation::Remove => "remove",
        };
        f.write_str(name)
    }
}
