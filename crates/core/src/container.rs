//! The two kinds of aggregate that own membership and leadership intervals.

/// Which aggregate a ledger operates on.
///
/// The membership and leadership ledgers are generic over the container
/// kind; the kind selects the interval tables and the exclusivity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Team,
    Project,
}

/// How strictly open membership intervals are deduplicated for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusivity {
    /// At most one open interval per user across *all* containers of the
    /// kind. A user belongs to at most one team at a time.
    Global,
    /// At most one open interval per (user, container) pair. A user may be
    /// active in several projects, but at most once per project.
    PerContainer,
}

impl ContainerKind {
    /// Entity name used in error messages and log fields.
    pub fn entity(self) -> &'static str {
        match self {
            ContainerKind::Team => "Team",
            ContainerKind::Project => "Project",
        }
    }

    pub fn exclusivity(self) -> Exclusivity {
        match self {
            ContainerKind::Team => Exclusivity::Global,
            ContainerKind::Project => Exclusivity::PerContainer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_membership_is_globally_exclusive() {
        assert_eq!(ContainerKind::Team.exclusivity(), Exclusivity::Global);
    }

    #[test]
    fn project_membership_is_exclusive_per_container() {
        assert_eq!(
            ContainerKind::Project.exclusivity(),
            Exclusivity::PerContainer
        );
    }
}
