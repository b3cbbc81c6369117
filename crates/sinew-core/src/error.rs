use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    UnknownRelationship,
    InvalidDefinition,
    UndecodablePayload,
    StoreBackendFailure,
    CorruptReport,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnknownRelationship => "E2001",
            Self::InvalidDefinition => "E2002",
            Self::UndecodablePayload => "E3001",
            Self::CorruptReport => "E3002",
            Self::StoreBackendFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownRelationship => "Unknown relationship",
            Self::InvalidDefinition => "Invalid relationship definition",
            Self::UndecodablePayload => "Undecodable link payload",
            Self::CorruptReport => "Corrupt persisted report",
            Self::StoreBackendFailure => "Store backend failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sw init` to create the store database."),
            Self::ConfigParseError => Some("Fix syntax in sinew.toml and retry."),
            Self::UnknownRelationship => {
                Some("Run `sw schema list` to see registered relationships.")
            }
            Self::InvalidDefinition => {
                Some("Run `sw schema validate` for the full rule violations.")
            }
            Self::UndecodablePayload => {
                Some("Inspect the raw attribute; malformed payloads need manual repair.")
            }
            Self::CorruptReport => Some("Re-run `sw audit` to replace the persisted report."),
            Self::StoreBackendFailure => Some("Check database path, permissions, and disk space."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::UnknownRelationship,
            ErrorCode::InvalidDefinition,
            ErrorCode::UndecodablePayload,
            ErrorCode::CorruptReport,
            ErrorCode::StoreBackendFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::UnknownRelationship.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }
}
