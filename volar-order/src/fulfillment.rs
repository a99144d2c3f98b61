use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Boarding pass reference. Format: VOLAR-{timestamp}-{short ticket id}
pub fn boarding_pass_reference(ticket_id: Uuid, issued_at: DateTime<Utc>) -> String {
    let simple = ticket_id.simple().to_string();
    let short_id = simple.get(..8).unwrap_or(&simple);
    format!("VOLAR-{}-{}", issued_at.timestamp(), short_id.to_uppercase())
}

/// QR payload for mobile boarding passes
pub fn boarding_pass_qr_data(reference: &str, ticket_id: Uuid, seat_code: &str) -> String {
    serde_json::json!({
        "boarding_pass": reference,
        "ticket_id": ticket_id,
        "seat": seat_code,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let id = Uuid::parse_str("1f2e3d4c-0000-4000-8000-000000000000").unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(boarding_pass_reference(id, at), "VOLAR-1700000000-1F2E3D4C");
    }

    #[test]
    fn test_qr_payload_carries_seat() {
        let id = Uuid::new_v4();
        let qr: serde_json::Value =
            serde_json::from_str(&boarding_pass_qr_data("VOLAR-1-ABC", id, "C4")).unwrap();
        assert_eq!(qr["seat"], "C4");
        assert_eq!(qr["boarding_pass"], "VOLAR-1-ABC");
    }
}
