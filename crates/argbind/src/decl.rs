//! Option and parameter declarations, and the [`Signature`] that owns them.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{InvalidValueReason, ParseError, ParseResult};
use crate::group::{GroupKind, OptionGroup};
use crate::normalize::{is_option_shaped, split_short_cluster};

static NEXT_SIGNATURE: AtomicU32 = AtomicU32::new(1);

/// Stable identity of one declaration: the owning signature plus its
/// registration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId {
    signature: u32,
    index: u32,
}

impl DeclId {
    pub fn signature(&self) -> u32 {
        self.signature
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.signature, self.index)
    }
}

/// What a declaration is, for callers that walk a signature generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Flag,
    Counter,
    Key,
    CollectedKey,
    Param,
    OptionalParam,
    Collected,
    OptionalCollected,
}

impl DeclKind {
    pub fn is_option(self) -> bool {
        matches!(
            self,
            Self::Flag | Self::Counter | Self::Key | Self::CollectedKey
        )
    }
}

pub(crate) type ErasedValue = Box<dyn Any + Send + Sync>;
type BindFn = Box<dyn Fn(&str) -> Result<ErasedValue, InvalidValueReason> + Send + Sync>;
type ConvertFn<T> = Arc<dyn Fn(&str) -> Result<T, String> + Send + Sync>;

fn collect_keys<K, S>(keys: K) -> Vec<String>
where
    K: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter().map(Into::into).collect()
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A check applied to a converted key value.
///
/// The message is what the user sees when the check fails, so it should read
/// as the tail of "invalid value 'x' for --key: ...".
pub struct Validator<T> {
    message: String,
    check: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl<T> Validator<T> {
    pub fn custom<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            check: Arc::new(check),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn accepts(&self, value: &T) -> bool {
        (self.check)(value)
    }
}

impl<T> Validator<T>
where
    T: PartialOrd + fmt::Display + Send + Sync + 'static,
{
    pub fn greater_than(bound: T) -> Self {
        Self::custom(format!("must be greater than {bound}"), move |v| *v > bound)
    }

    pub fn less_than(bound: T) -> Self {
        Self::custom(format!("must be less than {bound}"), move |v| *v < bound)
    }

    pub fn within(range: RangeInclusive<T>) -> Self {
        let message = format!("must be between {} and {}", range.start(), range.end());
        Self::custom(message, move |v| range.contains(v))
    }
}

impl<T> Validator<T>
where
    T: PartialEq + fmt::Display + Send + Sync + 'static,
{
    pub fn one_of(allowed: impl IntoIterator<Item = T>) -> Self {
        let allowed: Vec<T> = allowed.into_iter().collect();
        let message = format!("must be one of: {}", join_display(&allowed));
        Self::custom(message, move |v| allowed.contains(v))
    }

    pub fn not_one_of(rejected: impl IntoIterator<Item = T>) -> Self {
        let rejected: Vec<T> = rejected.into_iter().collect();
        let message = format!("must not be one of: {}", join_display(&rejected));
        Self::custom(message, move |v| !rejected.contains(v))
    }
}

impl Validator<String> {
    pub fn not_empty() -> Self {
        Self::custom("must not be empty", |v: &String| !v.is_empty())
    }
}

fn join_display<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Boolean option that consumes no value.
///
/// Presence sets the flag to the opposite of its default.
#[derive(Debug, Clone)]
pub struct Flag {
    keys: Vec<String>,
    default: bool,
    help: String,
}

impl Flag {
    pub fn new<K, S>(keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: collect_keys(keys),
            default: false,
            help: String::new(),
        }
    }

    pub fn default_value(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    /// Shorthand for `default_value(true)`: passing the flag turns it off.
    pub fn inverted(self) -> Self {
        self.default_value(true)
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// Option that counts its occurrences (`-vvv` is 3).
#[derive(Debug, Clone)]
pub struct Counter {
    keys: Vec<String>,
    help: String,
}

impl Counter {
    pub fn new<K, S>(keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: collect_keys(keys),
            help: String::new(),
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// Option that takes the next token as its value.
///
/// Register with [`Signature::key`] for a single value or
/// [`Signature::collected_key`] to accept it repeatedly.
pub struct Key<T> {
    keys: Vec<String>,
    help: String,
    value_name: Option<String>,
    expected: &'static str,
    convert: ConvertFn<T>,
    validators: Vec<Validator<T>>,
}

impl<T> Key<T>
where
    T: FromStr + Send + Sync + 'static,
    T::Err: fmt::Display,
{
    pub fn new<K, S>(keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_converter(keys, short_type_name::<T>(), |raw| {
            raw.parse::<T>().map_err(|e| e.to_string())
        })
    }
}

impl<T: Send + Sync + 'static> Key<T> {
    /// Build a key with a custom conversion. `expected` names the type in
    /// conversion errors.
    pub fn with_converter<K, S, F>(keys: K, expected: &'static str, convert: F) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        Self {
            keys: collect_keys(keys),
            help: String::new(),
            value_name: None,
            expected,
            convert: Arc::new(convert),
            validators: Vec::new(),
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn value_name(mut self, name: impl Into<String>) -> Self {
        self.value_name = Some(name.into());
        self
    }

    /// Add a validator. Validators run in the order they were added.
    pub fn validate(mut self, validator: Validator<T>) -> Self {
        self.validators.push(validator);
        self
    }

    fn into_decl(self, collected: bool) -> OptionDecl {
        let Key {
            keys,
            help,
            value_name,
            expected,
            convert,
            validators,
        } = self;

        let bind: BindFn = Box::new(move |raw: &str| {
            let value = convert(raw)
                .map_err(|message| InvalidValueReason::Conversion { expected, message })?;
            if let Some(failed) = validators.iter().find(|v| !v.accepts(&value)) {
                return Err(InvalidValueReason::Validation {
                    message: failed.message().to_string(),
                });
            }
            Ok(Box::new(value) as ErasedValue)
        });

        OptionDecl {
            keys,
            help,
            body: OptionBody::Key {
                collected,
                expected,
                value_name,
                bind,
            },
        }
    }
}

/// Single positional parameter.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    help: String,
    required: bool,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// Trailing parameter that takes every remaining token.
///
/// Requires at least one token unless marked [`Collected::optional`].
#[derive(Debug, Clone)]
pub struct Collected {
    name: String,
    help: String,
    required: bool,
}

impl Collected {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            id: DeclId,
        }

        impl $name {
            pub fn id(&self) -> DeclId {
                self.id
            }
        }
    };
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            id: DeclId,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub fn id(&self) -> DeclId {
                self.id
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.id).finish()
            }
        }
    };
}

handle!(CounterRef);
handle!(ParamRef);
handle!(CollectedParamRef);
typed_handle!(
    /// Handle to a single-valued key of type `T`.
    KeyRef
);
typed_handle!(
    /// Handle to a repeatable key of type `T`.
    CollectedKeyRef
);

/// Handle to a flag; remembers the default so unset flags read correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagRef {
    id: DeclId,
    default: bool,
}

impl FlagRef {
    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn default_value(&self) -> bool {
        self.default
    }
}

pub(crate) struct OptionDecl {
    pub(crate) keys: Vec<String>,
    pub(crate) help: String,
    pub(crate) body: OptionBody,
}

pub(crate) enum OptionBody {
    Flag {
        default: bool,
    },
    Counter,
    Key {
        collected: bool,
        expected: &'static str,
        value_name: Option<String>,
        bind: BindFn,
    },
}

impl fmt::Debug for OptionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag { default } => f.debug_struct("Flag").field("default", default).finish(),
            Self::Counter => f.write_str("Counter"),
            Self::Key {
                collected,
                expected,
                value_name,
                ..
            } => f
                .debug_struct("Key")
                .field("collected", collected)
                .field("expected", expected)
                .field("value_name", value_name)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    Required,
    Optional,
    Collected { required: bool },
}

#[derive(Debug)]
pub(crate) struct ParamDecl {
    pub(crate) name: String,
    pub(crate) help: String,
    pub(crate) kind: ParamKind,
}

#[derive(Debug)]
pub(crate) enum Decl {
    Option(OptionDecl),
    Param(ParamDecl),
}

impl fmt::Debug for OptionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionDecl")
            .field("keys", &self.keys)
            .field("body", &self.body)
            .finish()
    }
}

/// The declared flags, keys, option groups and positional parameters of one
/// command (or the global options of one command group).
#[derive(Debug)]
pub struct Signature {
    id: u32,
    decls: Vec<Decl>,
    groups: Vec<OptionGroup>,
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl Signature {
    pub fn new() -> Self {
        Self {
            id: NEXT_SIGNATURE.fetch_add(1, Ordering::Relaxed),
            decls: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn push(&mut self, decl: Decl) -> DeclId {
        let index = u32::try_from(self.decls.len()).unwrap_or(u32::MAX);
        self.decls.push(decl);
        DeclId {
            signature: self.id,
            index,
        }
    }

    pub fn flag(&mut self, flag: Flag) -> FlagRef {
        let Flag { keys, default, help } = flag;
        let id = self.push(Decl::Option(OptionDecl {
            keys,
            help,
            body: OptionBody::Flag { default },
        }));
        FlagRef { id, default }
    }

    pub fn counter(&mut self, counter: Counter) -> CounterRef {
        let Counter { keys, help } = counter;
        let id = self.push(Decl::Option(OptionDecl {
            keys,
            help,
            body: OptionBody::Counter,
        }));
        CounterRef { id }
    }

    pub fn key<T: Send + Sync + 'static>(&mut self, key: Key<T>) -> KeyRef<T> {
        let id = self.push(Decl::Option(key.into_decl(false)));
        KeyRef {
            id,
            _marker: PhantomData,
        }
    }

    pub fn collected_key<T: Send + Sync + 'static>(&mut self, key: Key<T>) -> CollectedKeyRef<T> {
        let id = self.push(Decl::Option(key.into_decl(true)));
        CollectedKeyRef {
            id,
            _marker: PhantomData,
        }
    }

    pub fn param(&mut self, param: Param) -> ParamRef {
        let Param {
            name,
            help,
            required,
        } = param;
        let kind = if required {
            ParamKind::Required
        } else {
            ParamKind::Optional
        };
        let id = self.push(Decl::Param(ParamDecl { name, help, kind }));
        ParamRef { id }
    }

    pub fn collected(&mut self, collected: Collected) -> CollectedParamRef {
        let Collected {
            name,
            help,
            required,
        } = collected;
        let id = self.push(Decl::Param(ParamDecl {
            name,
            help,
            kind: ParamKind::Collected { required },
        }));
        CollectedParamRef { id }
    }

    /// Constrain how many of `members` may be present after a parse.
    ///
    /// Members must be options registered on this signature; [`Signature::validate`]
    /// rejects anything else.
    pub fn group(&mut self, kind: GroupKind, members: impl IntoIterator<Item = DeclId>) {
        self.groups.push(OptionGroup::new(kind, members));
    }

    pub fn groups(&self) -> &[OptionGroup] {
        &self.groups
    }

    pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        (0..self.decls.len()).map(move |index| DeclId {
            signature: self.id,
            index: index as u32,
        })
    }

    pub fn owns(&self, id: DeclId) -> bool {
        id.signature == self.id && id.index() < self.decls.len()
    }

    pub(crate) fn decl(&self, id: DeclId) -> Option<&Decl> {
        if id.signature != self.id {
            return None;
        }
        self.decls.get(id.index())
    }

    pub fn kind(&self, id: DeclId) -> Option<DeclKind> {
        let kind = match self.decl(id)? {
            Decl::Option(o) => match &o.body {
                OptionBody::Flag { .. } => DeclKind::Flag,
                OptionBody::Counter => DeclKind::Counter,
                OptionBody::Key { collected: false, .. } => DeclKind::Key,
                OptionBody::Key { collected: true, .. } => DeclKind::CollectedKey,
            },
            Decl::Param(p) => match p.kind {
                ParamKind::Required => DeclKind::Param,
                ParamKind::Optional => DeclKind::OptionalParam,
                ParamKind::Collected { required: true } => DeclKind::Collected,
                ParamKind::Collected { required: false } => DeclKind::OptionalCollected,
            },
        };
        Some(kind)
    }

    /// Option keys in declaration order; empty for parameters.
    pub fn keys(&self, id: DeclId) -> &[String] {
        match self.decl(id) {
            Some(Decl::Option(o)) => &o.keys,
            _ => &[],
        }
    }

    pub fn help(&self, id: DeclId) -> Option<&str> {
        match self.decl(id)? {
            Decl::Option(o) => Some(o.help.as_str()),
            Decl::Param(p) => Some(p.help.as_str()),
        }
    }

    /// Display name: the first long key of an option (falling back to its first
    /// key), or a parameter's name.
    pub fn label(&self, id: DeclId) -> Option<&str> {
        match self.decl(id)? {
            Decl::Option(o) => o
                .keys
                .iter()
                .find(|k| k.starts_with("--"))
                .or_else(|| o.keys.first())
                .map(String::as_str),
            Decl::Param(p) => Some(p.name.as_str()),
        }
    }

    /// Find the option declared under exactly `key`.
    pub fn find_option(&self, key: &str) -> Option<DeclId> {
        self.option(key).map(|(id, _)| id)
    }

    pub(crate) fn option(&self, key: &str) -> Option<(DeclId, &OptionDecl)> {
        self.ids().zip(&self.decls).find_map(|(id, decl)| match decl {
            Decl::Option(o) if o.keys.iter().any(|k| k == key) => Some((id, o)),
            _ => None,
        })
    }

    pub(crate) fn option_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.decls
            .iter()
            .filter_map(|decl| match decl {
                Decl::Option(o) => Some(o.keys.as_slice()),
                Decl::Param(_) => None,
            })
            .flatten()
            .map(String::as_str)
    }

    pub(crate) fn params(&self) -> impl Iterator<Item = (DeclId, &ParamDecl)> + '_ {
        self.ids().zip(&self.decls).filter_map(|(id, decl)| match decl {
            Decl::Param(p) => Some((id, p)),
            Decl::Option(_) => None,
        })
    }

    /// Check the declarations are usable: well-formed unique keys, parameters
    /// in a bindable order, and groups that only reference this signature's
    /// options.
    pub fn validate(&self) -> ParseResult<()> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (index, decl) in self.decls.iter().enumerate() {
            let Decl::Option(o) = decl else { continue };
            if o.keys.is_empty() {
                return Err(ParseError::InvalidDeclaration(format!(
                    "option #{index} has no keys"
                )));
            }
            for key in &o.keys {
                if !is_option_shaped(key) || key == "--" || key.contains('=') {
                    return Err(ParseError::InvalidDeclaration(format!(
                        "'{key}' is not a valid option key"
                    )));
                }
                if split_short_cluster(key).is_some() {
                    return Err(ParseError::InvalidDeclaration(format!(
                        "'{key}' would be split into single-letter flags; use a long key (--{})",
                        &key[1..]
                    )));
                }
                if let Some(prev) = seen.insert(key.as_str(), index) {
                    if prev != index {
                        return Err(ParseError::InvalidDeclaration(format!(
                            "option key {key} is declared more than once"
                        )));
                    }
                }
            }
        }

        let mut optional: Option<&str> = None;
        let mut collected: Option<&str> = None;
        let mut names: HashSet<&str> = HashSet::new();
        for (_, p) in self.params() {
            if p.name.trim().is_empty() {
                return Err(ParseError::InvalidDeclaration(
                    "parameter name must not be empty".to_string(),
                ));
            }
            if !names.insert(p.name.as_str()) {
                return Err(ParseError::InvalidDeclaration(format!(
                    "parameter <{}> is declared more than once",
                    p.name
                )));
            }
            if let Some(last) = collected {
                return Err(ParseError::InvalidDeclaration(format!(
                    "parameter <{}> cannot follow collected parameter <{last}>",
                    p.name
                )));
            }
            match p.kind {
                ParamKind::Required => {
                    if let Some(opt) = optional {
                        return Err(ParseError::InvalidDeclaration(format!(
                            "required parameter <{}> cannot follow optional parameter <{opt}>",
                            p.name
                        )));
                    }
                }
                ParamKind::Optional => optional = Some(p.name.as_str()),
                ParamKind::Collected { .. } => collected = Some(p.name.as_str()),
            }
        }

        for group in &self.groups {
            if group.members().is_empty() {
                return Err(ParseError::InvalidDeclaration(
                    "option group has no members".to_string(),
                ));
            }
            for &member in group.members() {
                match self.decl(member) {
                    Some(Decl::Option(_)) => {}
                    Some(Decl::Param(p)) => {
                        return Err(ParseError::InvalidDeclaration(format!(
                            "option group cannot contain parameter <{}>",
                            p.name
                        )));
                    }
                    None => {
                        return Err(ParseError::InvalidDeclaration(format!(
                            "option group references {member}, \
                             which is not declared on this command"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
