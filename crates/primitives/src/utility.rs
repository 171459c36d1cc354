use crate::error::ApiError;
use chrono::Utc;
use uuid::Uuid;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Transaction ids are `TXN_{base36 millisecond epoch}_{random 128-bit hex}`,
/// uppercased. The random tail makes collisions implausible under any clock
/// skew; the time prefix keeps ids roughly sortable for operators.
pub fn generate_transaction_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    let tail = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN_{}_{}", to_base36(millis), tail)
}

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 alphabet is ascii")
}

/// Convert a 2dp decimal amount into integer minor units (cents).
/// Rejects non-finite values, non-positive values, and anything with more
/// than two fractional digits.
pub fn to_minor_units(amount: f64) -> Result<i64, ApiError> {
    if !amount.is_finite() {
        return Err(ApiError::Validation("amount must be a number".into()));
    }
    if amount <= 0.0 {
        return Err(ApiError::Validation("amount must be positive".into()));
    }

    let scaled = amount * 100.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        return Err(ApiError::Validation(
            "amount must have at most two decimal places".into(),
        ));
    }

    Ok(scaled.round() as i64)
}

/// Render integer minor units back into a 2dp decimal for API payloads.
pub fn to_major_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_shape() {
        let id = generate_transaction_id();
        assert!(id.starts_with("TXN_"));
        assert_eq!(id, id.to_uppercase());

        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].bytes().all(|b| BASE36.contains(&b)));
        assert_eq!(parts[2].len(), 32);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn transaction_ids_are_unique() {
        let a = generate_transaction_id();
        let b = generate_transaction_id();
        assert_ne!(a, b);
    }

    #[test]
    fn base36_round_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36), "100");
    }

    #[test]
    fn minor_units_accepts_two_decimals() {
        assert_eq!(to_minor_units(0.01).unwrap(), 1);
        assert_eq!(to_minor_units(100.50).unwrap(), 10_050);
        assert_eq!(to_minor_units(10_000.00).unwrap(), 1_000_000);
    }

    #[test]
    fn minor_units_rejects_bad_amounts() {
        assert!(to_minor_units(0.0).is_err());
        assert!(to_minor_units(-5.0).is_err());
        assert!(to_minor_units(1.001).is_err());
        assert!(to_minor_units(f64::NAN).is_err());
        assert!(to_minor_units(f64::INFINITY).is_err());
    }

    #[test]
    fn major_units_round_trip() {
        assert_eq!(to_major_units(10_050), 100.50);
        assert_eq!(to_major_units(to_minor_units(9_899.50).unwrap()), 9_899.50);
    }
}
