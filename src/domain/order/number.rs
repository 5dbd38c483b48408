use uuid::Uuid;

/// Human-readable prefix carried by every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// `ORD-` plus 8 uppercase hex characters taken from a fresh UUID. Collisions
/// are rare but possible; the storage layer enforces uniqueness and the
/// workflow regenerates on conflict rather than trusting randomness alone.
pub fn generate_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", ORDER_NUMBER_PREFIX, hex[..8].to_uppercase())
}

// ============================================================================
// Unit Tests
// ============================================================================
