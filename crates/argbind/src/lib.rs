//! Token scanning and typed option binding for command-line frameworks.
//!
//! A command declares its flags, keys, option groups and positional parameters
//! on a [`Signature`]. [`parse`] then takes the raw argv (minus the program
//! name), routes it through a [`CommandGroup`] and binds every token:
//! - combined short flags (`-abc`) and `--key=value` are split up front
//! - global options of each group on the route are accepted anywhere
//! - once every positional slot before a collected parameter is filled, the
//!   remaining tokens are collected verbatim
//!
//! Results come back as a [`Bindings`] map keyed by declaration id; nothing is
//! mutated on the declarations themselves, so one command tree can serve any
//! number of parses.
//!
//! ```
//! use argbind::{Flag, Key, Param, Signature, SimpleCommand, parse_command};
//!
//! let mut sig = Signature::new();
//! let verbose = sig.flag(Flag::new(["-v", "--verbose"]));
//! let jobs = sig.key(Key::<u32>::new(["-j", "--jobs"]));
//! let target = sig.param(Param::required("target"));
//! let cmd = SimpleCommand::new("build", sig);
//!
//! let parsed = parse_command(&cmd, ["-v", "-j", "4", "release"]).unwrap();
//! assert!(parsed.bindings.flag(verbose));
//! assert_eq!(parsed.bindings.value(jobs), Some(&4));
//! assert_eq!(parsed.bindings.param(target), Some("release"));
//! ```

mod bindings;
mod command;
mod cursor;
mod decl;
mod error;
mod group;
mod normalize;
mod parser;

pub use bindings::{Bindings, BoundValue};
pub use command::{Command, CommandGroup, Route, SimpleCommand};
pub use cursor::TokenCursor;
pub use decl::{
    Collected, CollectedKeyRef, CollectedParamRef, Counter, CounterRef, DeclId, DeclKind, Flag,
    FlagRef, Key, KeyRef, Param, ParamRef, Signature, Validator,
};
pub use error::{InvalidValueReason, ParseError, ParseResult};
pub use group::{GroupKind, OptionGroup};
pub use normalize::{is_option_shaped, normalize};
pub use parser::{Parsed, parse, parse_command};
