use std::collections::{HashMap, HashSet};

use crate::bindings::Bindings;
use crate::cursor::TokenCursor;
use crate::decl::Signature;
use crate::error::{ParseError, ParseResult};
use crate::normalize::is_option_shaped;
use crate::parser::{bind_option, find_option};

/// What the resolver and scanner need to know about a command.
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn aliases(&self) -> &[String] {
        &[]
    }

    fn signature(&self) -> &Signature;
}

/// Plain named command around a [`Signature`].
#[derive(Debug)]
pub struct SimpleCommand {
    name: String,
    aliases: Vec<String>,
    signature: Signature,
}

impl SimpleCommand {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            signature,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

impl Command for SimpleCommand {
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

/// One routing target inside a [`CommandGroup`].
pub enum Route {
    Command(Box<dyn Command>),
    Group(CommandGroup),
}

impl Route {
    pub fn name(&self) -> &str {
        match self {
            Self::Command(c) => c.name(),
            Self::Group(g) => g.name(),
        }
    }

    pub fn aliases(&self) -> &[String] {
        match self {
            Self::Command(c) => c.aliases(),
            Self::Group(g) => g.aliases(),
        }
    }

    fn matches(&self, raw: &str) -> bool {
        self.name() == raw || self.aliases().iter().any(|a| a == raw)
    }
}

/// Candidate commands (and nested groups) plus the global options accepted
/// while routing to them.
pub struct CommandGroup {
    name: String,
    aliases: Vec<String>,
    options: Signature,
    routes: Vec<Route>,
}

impl std::fmt::Debug for CommandGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<&str> = self.routes.iter().map(Route::name).collect();
        f.debug_struct("CommandGroup")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("options", &self.options)
            .field("routes", &routes)
            .finish()
    }
}

impl CommandGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            options: Signature::new(),
            routes: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Replace the global options of this group.
    pub fn with_options(mut self, options: Signature) -> Self {
        self.options = options;
        self
    }

    pub fn command(mut self, command: impl Command + 'static) -> Self {
        self.routes.push(Route::Command(Box::new(command)));
        self
    }

    pub fn boxed_command(mut self, command: Box<dyn Command>) -> Self {
        self.routes.push(Route::Command(command));
        self
    }

    pub fn group(mut self, group: CommandGroup) -> Self {
        self.routes.push(Route::Group(group));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn options(&self) -> &Signature {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Signature {
        &mut self.options
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn find_route(&self, raw: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.name() == raw)
            .or_else(|| self.routes.iter().find(|r| r.matches(raw)))
    }

    /// Validate every signature in the tree, route names and aliases, and
    /// that no command redeclares a global option key it inherits.
    pub fn validate(&self) -> ParseResult<()> {
        self.validate_with(&HashSet::new())
    }

    fn validate_with<'a>(&'a self, inherited: &HashSet<&'a str>) -> ParseResult<()> {
        self.options.validate()?;
        let mut keys = inherited.clone();
        for key in self.options.option_keys() {
            if !keys.insert(key) {
                return Err(ParseError::InvalidDeclaration(format!(
                    "global option {key} of '{}' is already declared by an enclosing group",
                    self.name
                )));
            }
        }

        validate_route_names(&self.name, &self.routes)?;

        for route in &self.routes {
            match route {
                Route::Command(c) => {
                    let sig = c.signature();
                    sig.validate()?;
                    if let Some(key) = sig.option_keys().find(|k| keys.contains(k)) {
                        return Err(ParseError::InvalidDeclaration(format!(
                            "option {key} of command '{}' shadows a global option",
                            c.name()
                        )));
                    }
                }
                Route::Group(g) => g.validate_with(&keys)?,
            }
        }
        Ok(())
    }
}

fn validate_route_names(group: &str, routes: &[Route]) -> ParseResult<()> {
    let mut names: HashSet<&str> = HashSet::new();
    for route in routes {
        if route.name().trim().is_empty() {
            return Err(ParseError::InvalidDeclaration(format!(
                "'{group}' has a command with an empty name"
            )));
        }
        if !names.insert(route.name()) {
            return Err(ParseError::InvalidDeclaration(format!(
                "command name conflict in '{group}': '{}' is declared more than once",
                route.name()
            )));
        }
    }

    let mut alias_map: HashMap<&str, &str> = HashMap::new();
    for route in routes {
        for alias in route.aliases() {
            if alias.trim() != alias {
                return Err(ParseError::InvalidDeclaration(format!(
                    "alias '{alias}' of '{}' has surrounding whitespace",
                    route.name()
                )));
            }
            let alias = alias.as_str();
            if alias.is_empty() || alias == route.name() {
                continue;
            }
            if names.contains(alias) {
                return Err(ParseError::InvalidDeclaration(format!(
                    "alias conflict: '{alias}' is both a command name and an alias (command: {})",
                    route.name()
                )));
            }
            if let Some(prev) = alias_map.insert(alias, route.name()) {
                if prev != route.name() {
                    return Err(ParseError::InvalidDeclaration(format!(
                        "alias conflict: '{alias}' refers to both '{prev}' and '{}'",
                        route.name()
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Outcome of routing: the selected command, the names consumed to reach it,
/// and the global signatures of every group on the way (outermost first).
pub(crate) struct Resolved<'g> {
    pub(crate) command: &'g dyn Command,
    pub(crate) path: Vec<&'g str>,
    pub(crate) globals: Vec<&'g Signature>,
}

/// Consume leading tokens until a command is selected.
///
/// Global options of every group entered so far are bound as they appear.
pub(crate) fn resolve<'g>(
    root: &'g CommandGroup,
    cursor: &mut TokenCursor,
    bindings: &mut Bindings,
) -> ParseResult<Resolved<'g>> {
    let mut group = root;
    let mut path: Vec<&'g str> = Vec::new();
    let mut globals: Vec<&'g Signature> = vec![&root.options];

    loop {
        let Some(token) = cursor.pop() else {
            let name = if path.is_empty() {
                root.name().to_string()
            } else {
                path.join(" ")
            };
            return Err(ParseError::NoCommand { group: name });
        };

        if let Some(found) = find_option(&globals, &token) {
            tracing::trace!(token = %token, "global option");
            bind_option(found, token, cursor, bindings)?;
            continue;
        }
        if is_option_shaped(&token) {
            return Err(ParseError::UnrecognizedOption(token));
        }

        match group.find_route(&token) {
            Some(Route::Command(command)) => {
                path.push(command.name());
                tracing::debug!(command = %path.join(" "), "resolved command");
                return Ok(Resolved {
                    command: &**command,
                    path,
                    globals,
                });
            }
            Some(Route::Group(sub)) => {
                tracing::debug!(group = sub.name(), "entering command group");
                path.push(sub.name());
                globals.push(&sub.options);
                group = sub;
            }
            None => {
                let mut name = path.join(" ");
                if !name.is_empty() {
                    name.push(' ');
                }
                name.push_str(&token);
                return Err(ParseError::CommandNotFound { name });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_padded_aliases() {
        let group = CommandGroup::new("tool")
            .command(SimpleCommand::new("exec", Signature::new()).alias(" x "));
        let err = group.validate().unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidDeclaration(
                "alias ' x ' of 'exec' has surrounding whitespace".to_string()
            )
        );
    }

    #[test]
    fn routes_match_names_and_aliases_exactly() {
        let group = CommandGroup::new("tool")
            .command(SimpleCommand::new("exec", Signature::new()).alias("x"));
        assert!(group.validate().is_ok());
        assert_eq!(group.find_route("x").map(Route::name), Some("exec"));
        assert_eq!(group.find_route("exec").map(Route::name), Some("exec"));
        assert!(group.find_route(" x").is_none());
    }
}
