use crate::bindings::Bindings;
use crate::decl::{DeclId, Signature};
use crate::error::{ParseError, ParseResult};

/// Cardinality rule of an [`OptionGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    ExactlyOne,
    AtMostOne,
    AtLeastOne,
}

impl GroupKind {
    pub fn quantifier(self) -> &'static str {
        match self {
            Self::ExactlyOne => "exactly one",
            Self::AtMostOne => "at most one",
            Self::AtLeastOne => "at least one",
        }
    }

    pub fn allows(self, present: usize) -> bool {
        match self {
            Self::ExactlyOne => present == 1,
            Self::AtMostOne => present <= 1,
            Self::AtLeastOne => present >= 1,
        }
    }
}

/// Constraint over sibling options of one signature, checked after scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionGroup {
    kind: GroupKind,
    members: Vec<DeclId>,
}

impl OptionGroup {
    pub fn new(kind: GroupKind, members: impl IntoIterator<Item = DeclId>) -> Self {
        Self {
            kind,
            members: members.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn members(&self) -> &[DeclId] {
        &self.members
    }
}

/// Evaluate every group of `signature` against the finished bindings, in
/// declaration order.
pub(crate) fn check_groups(signature: &Signature, bindings: &Bindings) -> ParseResult<()> {
    for (index, group) in signature.groups().iter().enumerate() {
        let present = group
            .members()
            .iter()
            .filter(|id| bindings.is_present(**id))
            .count();
        if group.kind().allows(present) {
            continue;
        }

        tracing::debug!(kind = ?group.kind(), group = index, present, "option group violated");
        let members = group
            .members()
            .iter()
            .map(|id| {
                signature
                    .keys(*id)
                    .first()
                    .cloned()
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        return Err(ParseError::OptionGroupMisuse {
            kind: group.kind(),
            group: index,
            member_ids: group.members().to_vec(),
            members,
            present,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_allow_expected_counts() {
        assert!(!GroupKind::ExactlyOne.allows(0));
        assert!(GroupKind::ExactlyOne.allows(1));
        assert!(!GroupKind::ExactlyOne.allows(2));
        assert!(GroupKind::AtMostOne.allows(0));
        assert!(!GroupKind::AtMostOne.allows(2));
        assert!(!GroupKind::AtLeastOne.allows(0));
        assert!(GroupKind::AtLeastOne.allows(3));
    }

    #[test]
    fn misuse_names_the_failing_group_and_members() {
        use crate::decl::Flag;

        let mut sig = Signature::new();
        let a = sig.flag(Flag::new(["-a"]));
        let b = sig.flag(Flag::new(["-b", "--bee"]));
        sig.group(GroupKind::AtLeastOne, [a.id(), b.id()]);
        sig.group(GroupKind::AtMostOne, [a.id(), b.id()]);

        let mut bindings = Bindings::default();
        bindings.set_flag(a.id(), true);
        bindings.set_flag(b.id(), true);

        let err = check_groups(&sig, &bindings).unwrap_err();
        assert_eq!(
            err,
            ParseError::OptionGroupMisuse {
                kind: GroupKind::AtMostOne,
                group: 1,
                member_ids: vec![a.id(), b.id()],
                members: vec!["-a".to_string(), "-b".to_string()],
                present: 2,
            }
        );
    }
}
