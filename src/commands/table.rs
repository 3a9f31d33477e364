//! The command table.
//!
//! Every supported command is one static [`CommandSpec`]: its name, how many
//! arguments it takes, and the handler method that runs it. Dispatch is a
//! lookup by upper-cased name followed by an arity check, so handlers can
//! index their arguments without re-checking counts.

use crate::commands::CommandHandler;
use crate::protocol::RespValue;
use bytes::Bytes;

/// Allowed number of arguments, not counting the command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive on both ends
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }
}

/// Handler signature shared by every command.
pub type CommandFn = fn(&CommandHandler, &[Bytes]) -> RespValue;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub(crate) run: CommandFn,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

pub static COMMAND_TABLE: &[CommandSpec] = &[
    // Scalars
    CommandSpec {
        name: "SET",
        arity: Arity::Range(2, 3),
        run: CommandHandler::cmd_set,
    },
    CommandSpec {
        name: "GET",
        arity: Arity::Exact(1),
        run: CommandHandler::cmd_get,
    },
    CommandSpec {
        name: "DEL",
        arity: Arity::AtLeast(1),
        run: CommandHandler::cmd_del,
    },
    // Lists
    CommandSpec {
        name: "LPUSH",
        arity: Arity::AtLeast(2),
        run: CommandHandler::cmd_lpush,
    },
    CommandSpec {
        name: "RPUSH",
        arity: Arity::AtLeast(2),
        run: CommandHandler::cmd_rpush,
    },
    CommandSpec {
        name: "LPOP",
        arity: Arity::Exact(1),
        run: CommandHandler::cmd_lpop,
    },
    CommandSpec {
        name: "RPOP",
        arity: Arity::Exact(1),
        run: CommandHandler::cmd_rpop,
    },
    // Hashes
    CommandSpec {
        name: "HSET",
        arity: Arity::Exact(3),
        run: CommandHandler::cmd_hset,
    },
    CommandSpec {
        name: "HGET",
        arity: Arity::Exact(2),
        run: CommandHandler::cmd_hget,
    },
    // Sets
    CommandSpec {
        name: "SADD",
        arity: Arity::AtLeast(2),
        run: CommandHandler::cmd_sadd,
    },
    CommandSpec {
        name: "SREM",
        arity: Arity::AtLeast(2),
        run: CommandHandler::cmd_srem,
    },
    CommandSpec {
        name: "SMEMBERS",
        arity: Arity::Exact(1),
        run: CommandHandler::cmd_smembers,
    },
];

/// Finds a command by its upper-cased name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMAND_TABLE.iter().find(|spec| spec.name == name)
}
