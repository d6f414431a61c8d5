//! Typed ID definitions for roster records.

use crate::define_id;

// =============================================================================
// Roster
// =============================================================================

define_id!(MemberId, "mbr");

// =============================================================================
// History
// =============================================================================

define_id!(HoldId, "hold");
define_id!(ActivityId, "act");

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdError;

    #[test]
    fn test_member_id_roundtrip() {
        let id = MemberId::new();
        let parsed: MemberId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("mbr_"));
    }

    #[test]
    fn test_member_id_rejects_hold_prefix() {
        let hold = HoldId::new().to_string();
        let err = hold.parse::<MemberId>().unwrap_err();
        assert!(matches!(err, IdError::InvalidPrefix { expected: "mbr", .. }));
    }

    #[test]
    fn test_missing_separator() {
        let result: Result<MemberId, _> = "mbr01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert_eq!(result.unwrap_err(), IdError::MissingSeparator);
    }

    #[test]
    fn test_empty() {
        assert_eq!("".parse::<ActivityId>().unwrap_err(), IdError::Empty);
    }

    #[test]
    fn test_invalid_ulid() {
        let result: Result<HoldId, _> = "hold_not-a-ulid".parse();
        assert!(matches!(result.unwrap_err(), IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_serializes_as_canonical_string() {
        let id = MemberId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let parsed: MemberId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        let bad = serde_json::from_str::<MemberId>("\"act_01HV4Z2WQXKJNM8GPQY6VBKC3D\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_prefixes_unique() {
        let prefixes = [MemberId::PREFIX, HoldId::PREFIX, ActivityId::PREFIX];
        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(prefixes.len(), unique.len());
    }
}
