//! Comprehensive unit tests for the Identifiers module
//!
//! Tests cover all identifier types, their creation, parsing,
//! conversion, and display formatting.

use core_kernel::{
    BatchId, CommRecordId, LineItemId, OutcomeRecordId, PayerCaseId, RequestId,
};
use uuid::Uuid;

mod request_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = RequestId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = RequestId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = RequestId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_display_includes_prefix() {
        let id = RequestId::new();
        assert!(id.to_string().starts_with("REQ-"));
        assert_eq!(RequestId::prefix(), "REQ");
    }
}

mod parsing_tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_display() {
        let original = BatchId::new();
        let parsed: BatchId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_parsing_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: PayerCaseId = uuid.to_string().parse().unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn test_parsing_rejects_garbage() {
        let result: Result<CommRecordId, _> = "not-a-uuid".parse();
        assert!(result.is_err());
    }
}

mod prefix_tests {
    use super::*;

    #[test]
    fn test_each_family_has_distinct_prefix() {
        let prefixes = [
            RequestId::prefix(),
            BatchId::prefix(),
            LineItemId::prefix(),
            PayerCaseId::prefix(),
            CommRecordId::prefix(),
            OutcomeRecordId::prefix(),
        ];
        for (i, a) in prefixes.iter().enumerate() {
            for b in prefixes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = LineItemId::new();
        let json = serde_json::to_string(&id).unwrap();
        // serialized as the bare UUID, not the prefixed display form
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
