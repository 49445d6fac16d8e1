//! The scanner: walks the cursor, classifies each token and binds it.

use std::fmt;

use crate::bindings::Bindings;
use crate::command::{Command, CommandGroup, Resolved, resolve};
use crate::cursor::TokenCursor;
use crate::decl::{DeclId, OptionBody, OptionDecl, ParamDecl, ParamKind, Signature};
use crate::error::{ParseError, ParseResult};
use crate::group::check_groups;
use crate::normalize::{is_option_shaped, normalize};

/// A successful parse.
pub struct Parsed<'a> {
    /// The selected command.
    pub command: &'a dyn Command,
    /// Command and group names consumed while routing, outermost first.
    pub path: Vec<&'a str>,
    pub bindings: Bindings,
    /// Tokens bound to positional parameters (collected ones included), in
    /// the order they were assigned.
    pub positional: Vec<String>,
    scope: Vec<&'a Signature>,
}

impl<'a> Parsed<'a> {
    /// Every signature that took part in the parse: global options of each
    /// group on the route, then the command's own signature.
    pub fn signatures(&self) -> &[&'a Signature] {
        &self.scope
    }
}

impl fmt::Debug for Parsed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsed")
            .field("command", &self.command.name())
            .field("path", &self.path)
            .field("bindings", &self.bindings)
            .field("positional", &self.positional)
            .finish()
    }
}

/// Route `tokens` through `group` and bind them against the selected command.
///
/// `tokens` is argv without the program name.
pub fn parse<I, S>(group: &CommandGroup, tokens: I) -> ParseResult<Parsed<'_>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    group.validate()?;

    let mut cursor = normalized_cursor(tokens);
    let mut bindings = Bindings::default();
    let Resolved {
        command,
        path,
        globals,
    } = resolve(group, &mut cursor, &mut bindings)?;

    let mut scope = globals;
    scope.push(command.signature());
    let positional = scan(&scope, &mut cursor, &mut bindings)?;

    // Command groups first, then each enclosing group's globals on their own.
    for signature in scope.iter().rev() {
        check_groups(signature, &bindings)?;
    }

    Ok(Parsed {
        command,
        path,
        bindings,
        positional,
        scope,
    })
}

/// Bind `tokens` against a single command, without routing.
pub fn parse_command<I, S>(command: &dyn Command, tokens: I) -> ParseResult<Parsed<'_>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let signature = command.signature();
    signature.validate()?;

    let mut cursor = normalized_cursor(tokens);
    let mut bindings = Bindings::default();
    let scope = vec![signature];
    let positional = scan(&scope, &mut cursor, &mut bindings)?;
    check_groups(signature, &bindings)?;

    Ok(Parsed {
        command,
        path: vec![command.name()],
        bindings,
        positional,
        scope,
    })
}

fn normalized_cursor<I, S>(tokens: I) -> TokenCursor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
    normalize(&mut tokens);
    TokenCursor::new(tokens)
}

pub(crate) struct OptionMatch<'s> {
    id: DeclId,
    decl: &'s OptionDecl,
}

/// Look `token` up in `layers`, innermost (last) first.
pub(crate) fn find_option<'s>(layers: &[&'s Signature], token: &str) -> Option<OptionMatch<'s>> {
    layers
        .iter()
        .rev()
        .copied()
        .find_map(|signature| signature.option(token))
        .map(|(id, decl)| OptionMatch { id, decl })
}

/// Bind a matched option. Keys pop their value from `cursor`.
pub(crate) fn bind_option(
    found: OptionMatch<'_>,
    key: String,
    cursor: &mut TokenCursor,
    bindings: &mut Bindings,
) -> ParseResult<()> {
    let OptionMatch { id, decl } = found;
    match &decl.body {
        OptionBody::Flag { default } => bindings.set_flag(id, !default),
        OptionBody::Counter => bindings.bump_counter(id),
        OptionBody::Key {
            collected, bind, ..
        } => {
            if !collected && bindings.has_value(id) {
                return Err(ParseError::DuplicateKey { decl: id, key });
            }
            let Some(raw) = cursor.pop() else {
                return Err(ParseError::ExpectedValueAfterKey { key });
            };
            let value = bind(&raw).map_err(|reason| ParseError::InvalidKeyValue {
                decl: id,
                key,
                value: raw.clone(),
                reason,
            })?;
            bindings.push_value(id, raw, value);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    /// Every remaining token belongs to the collected parameter.
    Locked,
}

/// Bind the remaining tokens against `layers`.
///
/// Options are looked up in every layer; positional parameters come from the
/// last layer (the command itself). Returns the tokens assigned positionally.
pub(crate) fn scan(
    layers: &[&Signature],
    cursor: &mut TokenCursor,
    bindings: &mut Bindings,
) -> ParseResult<Vec<String>> {
    let Some(command) = layers.last() else {
        return Ok(Vec::new());
    };
    let params: Vec<(DeclId, &ParamDecl)> = command.params().collect();
    let (slots, collected) = match params.split_last() {
        Some((&(id, param), rest)) if matches!(param.kind, ParamKind::Collected { .. }) => {
            (rest, Some((id, param)))
        }
        _ => (params.as_slice(), None),
    };

    let mut state = ScanState::Scanning;
    let mut options_ended = false;
    let mut filled = 0usize;
    let mut positional = Vec::new();

    loop {
        if state == ScanState::Scanning && collected.is_some() && filled == slots.len() {
            tracing::debug!(consumed = cursor.consumed(), "positional slots filled, collecting");
            state = ScanState::Locked;
        }

        let Some(token) = cursor.pop() else { break };

        if let (ScanState::Locked, Some((id, _))) = (state, collected) {
            tracing::trace!(token = %token, "collected");
            bindings.push_token(id, token.clone());
            positional.push(token);
            continue;
        }

        if !options_ended {
            if token == "--" {
                options_ended = true;
                continue;
            }
            if let Some(found) = find_option(layers, &token) {
                tracing::trace!(token = %token, "option");
                bind_option(found, token, cursor, bindings)?;
                continue;
            }
            if is_option_shaped(&token) {
                return Err(ParseError::UnrecognizedOption(token));
            }
        }

        match slots.get(filled) {
            Some((id, param)) => {
                tracing::trace!(token = %token, param = %param.name, "positional");
                bindings.push_token(*id, token.clone());
                positional.push(token);
                filled += 1;
            }
            None => return Err(ParseError::UnexpectedArgument(token)),
        }
    }

    if let Some((id, param)) = slots[filled..]
        .iter()
        .find(|(_, p)| p.kind == ParamKind::Required)
    {
        return Err(ParseError::MissingParameter {
            decl: *id,
            name: param.name.clone(),
        });
    }
    if let Some((id, param)) = collected {
        if param.kind == (ParamKind::Collected { required: true }) && !bindings.is_present(id) {
            return Err(ParseError::MissingParameter {
                decl: id,
                name: param.name.clone(),
            });
        }
    }

    Ok(positional)
}
