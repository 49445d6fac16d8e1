//! Serializable command-tree declarations for argbind.
//!
//! A [`GroupManifest`] describes a command group as data (usually JSON):
//! global options, commands with their options, option groups and
//! parameters, and nested groups. [`GroupManifest::build`] turns it into an
//! [`argbind::CommandGroup`] plus a [`Catalog`] that knows how to read every
//! declaration back out of the parse result.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use argbind::{
    Bindings, Collected, CollectedParamRef, Command, CommandGroup, Counter, CounterRef, DeclId,
    Flag, FlagRef, GroupKind, Key, Param, ParamRef, ParseError, Signature, Validator,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validator value {value} for {key} is not a valid {expected}")]
    ValidatorValue {
        key: String,
        value: String,
        expected: ValueType,
    },

    #[error("option group member {member} is not an option of '{command}'")]
    UnknownGroupMember { command: String, member: String },

    #[error(transparent)]
    Declaration(#[from] ParseError),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct GroupManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandManifest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgroups: Vec<GroupManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CommandManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OptionSpec {
    Flag {
        keys: Vec<String>,
        #[serde(default)]
        default: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        help: String,
    },
    Counter {
        keys: Vec<String>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        help: String,
    },
    Key(KeySpec),
    CollectedKey(KeySpec),
}

impl OptionSpec {
    pub fn keys(&self) -> &[String] {
        match self {
            Self::Flag { keys, .. } | Self::Counter { keys, .. } => keys,
            Self::Key(spec) | Self::CollectedKey(spec) => &spec.keys,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct KeySpec {
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValidatorSpec>,
}

/// Type a key's value is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Int,
    Uint,
    Float,
    Bool,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Bool => "bool",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidatorSpec {
    GreaterThan(Value),
    LessThan(Value),
    OneOf(Vec<Value>),
    NotOneOf(Vec<Value>),
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ParamKindSpec {
    #[default]
    Required,
    Optional,
    Collected,
    OptionalCollected,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKindSpec,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKindSpec {
    ExactlyOne,
    AtMostOne,
    AtLeastOne,
}

impl From<GroupKindSpec> for GroupKind {
    fn from(kind: GroupKindSpec) -> Self {
        match kind {
            GroupKindSpec::ExactlyOne => GroupKind::ExactlyOne,
            GroupKindSpec::AtMostOne => GroupKind::AtMostOne,
            GroupKindSpec::AtLeastOne => GroupKind::AtLeastOne,
        }
    }
}

/// Option group; members are referenced by any of their keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSpec {
    pub kind: GroupKindSpec,
    pub members: Vec<String>,
}

/// A command built from a [`CommandManifest`].
#[derive(Debug)]
pub struct ManifestCommand {
    name: String,
    summary: String,
    aliases: Vec<String>,
    signature: Signature,
}

impl ManifestCommand {
    pub fn summary(&self) -> &str {
        &self.summary
    }
}

impl Command for ManifestCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn aliases(&self) -> &[String] {
        &self.aliases
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// How to read one declaration back out of [`Bindings`].
#[derive(Debug, Clone, Copy)]
pub enum DeclHandle {
    Flag(FlagRef),
    Counter(CounterRef),
    Key {
        id: DeclId,
        value_type: ValueType,
        collected: bool,
    },
    Param(ParamRef),
    Collected(CollectedParamRef),
}

impl DeclHandle {
    /// Bound value as JSON: flags are booleans, counters numbers, single keys
    /// and parameters a value or `null`, repeatable ones arrays.
    pub fn render(&self, bindings: &Bindings) -> Value {
        match *self {
            Self::Flag(flag) => Value::Bool(bindings.flag(flag)),
            Self::Counter(counter) => json!(bindings.count(counter)),
            Self::Key {
                id,
                value_type,
                collected,
            } => {
                let values = match value_type {
                    ValueType::String => typed_json::<String>(bindings, id),
                    ValueType::Int => typed_json::<i64>(bindings, id),
                    ValueType::Uint => typed_json::<u64>(bindings, id),
                    ValueType::Float => typed_json::<f64>(bindings, id),
                    ValueType::Bool => typed_json::<bool>(bindings, id),
                };
                if collected {
                    Value::Array(values)
                } else {
                    values.into_iter().last().unwrap_or(Value::Null)
                }
            }
            Self::Param(param) => bindings
                .param(param)
                .map_or(Value::Null, |v| Value::String(v.to_string())),
            Self::Collected(param) => Value::Array(
                bindings
                    .collected(param)
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        }
    }
}

fn typed_json<T: Serialize + 'static>(bindings: &Bindings, id: DeclId) -> Vec<Value> {
    bindings
        .typed::<T>(id)
        .into_iter()
        .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
        .collect()
}

/// Every declaration built from a manifest, by id.
#[derive(Debug, Default)]
pub struct Catalog {
    handles: HashMap<DeclId, DeclHandle>,
}

impl Catalog {
    pub fn get(&self, id: DeclId) -> Option<&DeclHandle> {
        self.handles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn insert(&mut self, id: DeclId, handle: DeclHandle) {
        self.handles.insert(id, handle);
    }
}

impl GroupManifest {
    pub fn from_json(source: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the command tree and validate its declarations.
    pub fn build(&self) -> Result<(CommandGroup, Catalog), MetadataError> {
        let mut catalog = Catalog::default();
        let group = build_group(self, &mut catalog)?;
        group.validate()?;
        Ok((group, catalog))
    }
}

fn build_group(
    manifest: &GroupManifest,
    catalog: &mut Catalog,
) -> Result<CommandGroup, MetadataError> {
    let options = build_signature(
        &manifest.name,
        &manifest.options,
        &manifest.groups,
        &[],
        catalog,
    )?;
    let mut group = CommandGroup::new(manifest.name.clone()).with_options(options);
    for alias in &manifest.aliases {
        group = group.alias(alias.clone());
    }
    for command in &manifest.commands {
        group = group.command(command.build_into(catalog)?);
    }
    for sub in &manifest.subgroups {
        group = group.group(build_group(sub, catalog)?);
    }
    Ok(group)
}

impl CommandManifest {
    /// Build a standalone command (no routing), e.g. for `argbind::parse_command`.
    pub fn build(&self) -> Result<(ManifestCommand, Catalog), MetadataError> {
        let mut catalog = Catalog::default();
        let command = self.build_into(&mut catalog)?;
        command.signature().validate()?;
        Ok((command, catalog))
    }

    fn build_into(&self, catalog: &mut Catalog) -> Result<ManifestCommand, MetadataError> {
        let signature =
            build_signature(&self.name, &self.options, &self.groups, &self.params, catalog)?;
        Ok(ManifestCommand {
            name: self.name.clone(),
            summary: self.summary.clone(),
            aliases: self.aliases.clone(),
            signature,
        })
    }
}

fn build_signature(
    owner: &str,
    options: &[OptionSpec],
    groups: &[GroupSpec],
    params: &[ParamSpec],
    catalog: &mut Catalog,
) -> Result<Signature, MetadataError> {
    let mut sig = Signature::new();

    for option in options {
        let handle = match option {
            OptionSpec::Flag {
                keys,
                default,
                help,
            } => DeclHandle::Flag(sig.flag(
                Flag::new(keys.iter().cloned())
                    .default_value(*default)
                    .help(help.clone()),
            )),
            OptionSpec::Counter { keys, help } => DeclHandle::Counter(
                sig.counter(Counter::new(keys.iter().cloned()).help(help.clone())),
            ),
            OptionSpec::Key(spec) => register_key(&mut sig, spec, false)?,
            OptionSpec::CollectedKey(spec) => register_key(&mut sig, spec, true)?,
        };
        catalog.insert(handle_id(&handle), handle);
    }

    for param in params {
        let handle = match param.kind {
            ParamKindSpec::Required => DeclHandle::Param(
                sig.param(Param::required(param.name.clone()).help(param.help.clone())),
            ),
            ParamKindSpec::Optional => DeclHandle::Param(
                sig.param(Param::optional(param.name.clone()).help(param.help.clone())),
            ),
            ParamKindSpec::Collected => DeclHandle::Collected(
                sig.collected(Collected::new(param.name.clone()).help(param.help.clone())),
            ),
            ParamKindSpec::OptionalCollected => DeclHandle::Collected(
                sig.collected(
                    Collected::new(param.name.clone())
                        .optional()
                        .help(param.help.clone()),
                ),
            ),
        };
        catalog.insert(handle_id(&handle), handle);
    }

    for group in groups {
        let members = group
            .members
            .iter()
            .map(|member| {
                sig.find_option(member)
                    .ok_or_else(|| MetadataError::UnknownGroupMember {
                        command: owner.to_string(),
                        member: member.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        sig.group(group.kind.into(), members);
    }

    Ok(sig)
}

fn handle_id(handle: &DeclHandle) -> DeclId {
    match handle {
        DeclHandle::Flag(f) => f.id(),
        DeclHandle::Counter(c) => c.id(),
        DeclHandle::Key { id, .. } => *id,
        DeclHandle::Param(p) => p.id(),
        DeclHandle::Collected(c) => c.id(),
    }
}

fn register_key(
    sig: &mut Signature,
    spec: &KeySpec,
    collected: bool,
) -> Result<DeclHandle, MetadataError> {
    let id = match spec.value_type {
        ValueType::String => typed_key::<String>(sig, spec, collected)?,
        ValueType::Int => typed_key::<i64>(sig, spec, collected)?,
        ValueType::Uint => typed_key::<u64>(sig, spec, collected)?,
        ValueType::Float => typed_key::<f64>(sig, spec, collected)?,
        ValueType::Bool => typed_key::<bool>(sig, spec, collected)?,
    };
    Ok(DeclHandle::Key {
        id,
        value_type: spec.value_type,
        collected,
    })
}

/// Values that can appear as validator bounds in a manifest.
trait JsonBound: Sized {
    fn from_json(value: &Value) -> Option<Self>;
}

impl JsonBound for String {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl JsonBound for i64 {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl JsonBound for u64 {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_u64()
    }
}

impl JsonBound for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl JsonBound for bool {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

fn typed_key<T>(
    sig: &mut Signature,
    spec: &KeySpec,
    collected: bool,
) -> Result<DeclId, MetadataError>
where
    T: JsonBound + FromStr + PartialOrd + fmt::Display + Send + Sync + 'static,
    T::Err: fmt::Display,
{
    let mut key = Key::<T>::new(spec.keys.iter().cloned()).help(spec.help.clone());
    if let Some(name) = &spec.value_name {
        key = key.value_name(name.clone());
    }
    for validator in &spec.validators {
        key = key.validate(build_validator::<T>(validator, spec)?);
    }

    let id = if collected {
        sig.collected_key(key).id()
    } else {
        sig.key(key).id()
    };
    Ok(id)
}

fn build_validator<T>(
    validator: &ValidatorSpec,
    spec: &KeySpec,
) -> Result<Validator<T>, MetadataError>
where
    T: JsonBound + PartialOrd + fmt::Display + Send + Sync + 'static,
{
    let bound = |value: &Value| {
        T::from_json(value).ok_or_else(|| MetadataError::ValidatorValue {
            key: spec.keys.first().cloned().unwrap_or_default(),
            value: value.to_string(),
            expected: spec.value_type,
        })
    };
    let bounds = |values: &[Value]| values.iter().map(bound).collect::<Result<Vec<T>, _>>();

    Ok(match validator {
        ValidatorSpec::GreaterThan(v) => Validator::greater_than(bound(v)?),
        ValidatorSpec::LessThan(v) => Validator::less_than(bound(v)?),
        ValidatorSpec::OneOf(values) => Validator::one_of(bounds(values)?),
        ValidatorSpec::NotOneOf(values) => Validator::not_one_of(bounds(values)?),
        ValidatorSpec::NotEmpty => {
            Validator::custom("must not be empty", |v: &T| !v.to_string().is_empty())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "tool",
        "options": [{ "kind": "flag", "keys": ["-v", "--verbose"] }],
        "commands": [{
            "name": "greet",
            "aliases": ["hi"],
            "summary": "Say hello",
            "options": [
                { "kind": "key", "keys": ["-n", "--times"], "value-type": "int",
                  "validators": [{ "greater-than": 0 }] },
                { "kind": "collected-key", "keys": ["-f", "--file"] },
                { "kind": "flag", "keys": ["-q"], "default": true },
                { "kind": "counter", "keys": ["-d"] }
            ],
            "groups": [{ "kind": "at-most-one", "members": ["-q", "-d"] }],
            "params": [
                { "name": "who" },
                { "name": "rest", "kind": "optional-collected" }
            ]
        }],
        "subgroups": [{
            "name": "remote",
            "commands": [{ "name": "add", "params": [{ "name": "url" }] }]
        }]
    }"#;

    fn render(parsed: &argbind::Parsed<'_>, catalog: &Catalog) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for sig in parsed.signatures() {
            for id in sig.ids() {
                let (Some(handle), Some(label)) = (catalog.get(id), sig.label(id)) else {
                    continue;
                };
                out.insert(label.to_string(), handle.render(&parsed.bindings));
            }
        }
        out
    }

    #[test]
    fn builds_and_parses_manifest() {
        let manifest = GroupManifest::from_json(MANIFEST).unwrap();
        let (group, catalog) = manifest.build().unwrap();
        assert_eq!(catalog.len(), 8);

        let parsed = argbind::parse(
            &group,
            ["-v", "hi", "-n", "3", "-f", "a", "--file", "b", "world", "x", "-y"],
        )
        .unwrap();
        assert_eq!(parsed.path, vec!["greet"]);

        let out = render(&parsed, &catalog);
        assert_eq!(out["--verbose"], json!(true));
        assert_eq!(out["--times"], json!(3));
        assert_eq!(out["--file"], json!(["a", "b"]));
        assert_eq!(out["-q"], json!(true));
        assert_eq!(out["-d"], json!(0));
        assert_eq!(out["who"], json!("world"));
        assert_eq!(out["rest"], json!(["x", "-y"]));
    }

    #[test]
    fn manifest_validators_and_groups_apply() {
        let (group, _) = GroupManifest::from_json(MANIFEST).unwrap().build().unwrap();

        let err = argbind::parse(&group, ["greet", "-n", "0", "w"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid value '0' for -n: must be greater than 0");

        let err = argbind::parse(&group, ["greet", "-q", "-d", "w"]).unwrap_err();
        assert_eq!(err.to_string(), "must pass at most one of the following: -q -d");
    }

    #[test]
    fn rejects_validator_of_wrong_type() {
        let manifest = CommandManifest {
            name: "cmd".to_string(),
            options: vec![OptionSpec::Key(KeySpec {
                keys: vec!["-n".to_string()],
                value_type: ValueType::Uint,
                validators: vec![ValidatorSpec::LessThan(json!("ten"))],
                ..Default::default()
            })],
            ..Default::default()
        };
        let err = manifest.build().unwrap_err();
        assert!(
            matches!(err, MetadataError::ValidatorValue { expected: ValueType::Uint, .. }),
            "{err}"
        );
    }

    #[test]
    fn rejects_unknown_group_member() {
        let manifest = CommandManifest {
            name: "cmd".to_string(),
            options: vec![OptionSpec::Flag {
                keys: vec!["-a".to_string()],
                default: false,
                help: String::new(),
            }],
            groups: vec![GroupSpec {
                kind: GroupKindSpec::ExactlyOne,
                members: vec!["-a".to_string(), "-b".to_string()],
            }],
            ..Default::default()
        };
        let err = manifest.build().unwrap_err();
        assert_eq!(err.to_string(), "option group member -b is not an option of 'cmd'");
    }

    #[test]
    fn declaration_errors_surface_from_build() {
        let manifest = GroupManifest {
            name: "tool".to_string(),
            commands: vec![
                CommandManifest {
                    name: "a".to_string(),
                    aliases: vec!["b".to_string()],
                    ..Default::default()
                },
                CommandManifest {
                    name: "b".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let err = manifest.build().unwrap_err();
        assert!(matches!(err, MetadataError::Declaration(_)), "{err}");
    }

    #[test]
    fn serializes_with_kebab_case_keys() {
        let manifest = GroupManifest::from_json(MANIFEST).unwrap();
        let text = manifest.to_json_pretty().unwrap();
        assert!(text.contains("\"value-type\": \"int\""));
        assert!(text.contains("\"kind\": \"collected-key\""));
        assert!(text.contains("\"optional-collected\""));
        let again = GroupManifest::from_json(&text).unwrap();
        assert_eq!(again.commands[0].options.len(), 4);
    }
}
