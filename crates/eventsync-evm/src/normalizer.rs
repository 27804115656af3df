//! Converts alloy `DynSolValue` → eventsync `FieldValue`.

use alloy_dyn_abi::DynSolValue;
use eventsync_core::value::FieldValue;

/// Convert a decoded `DynSolValue` into a `FieldValue`.
pub fn normalize(val: DynSolValue) -> FieldValue {
    match val {
        DynSolValue::Bool(b) => FieldValue::Bool(b),

        // Integers that fit in 128 bits stay native, wider ones become decimal strings.
        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => FieldValue::Uint(v),
            Err(_) => FieldValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => FieldValue::FixedBytes(word[..size.min(32)].to_vec()),

        DynSolValue::Bytes(b) => FieldValue::Bytes(b),

        DynSolValue::String(s) => FieldValue::Str(s),

        DynSolValue::Address(a) => FieldValue::Address(format!("{a:#x}")),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            FieldValue::Array(vals.into_iter().map(normalize).collect())
        }

        DynSolValue::Tuple(vals) => FieldValue::Tuple(vals.into_iter().map(normalize).collect()),

        DynSolValue::Function(f) => FieldValue::Bytes(f.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, I256, U256};

    #[test]
    fn small_uint_is_native() {
        assert_eq!(normalize(DynSolValue::Uint(U256::from(42u64), 256)), FieldValue::Uint(42));
    }

    #[test]
    fn wide_uint_is_decimal() {
        let v = normalize(DynSolValue::Uint(U256::MAX, 256));
        assert_eq!(
            v,
            FieldValue::BigUint(
                "115792089237316195423570985008687907853269984665640564039457584007913129639935".into()
            )
        );
    }

    #[test]
    fn negative_int() {
        let v = normalize(DynSolValue::Int(I256::try_from(-5i64).unwrap(), 256));
        assert_eq!(v, FieldValue::Int(-5));
    }

    #[test]
    fn address_is_lowercase() {
        let addr: Address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap();
        assert_eq!(
            normalize(DynSolValue::Address(addr)),
            FieldValue::Address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045".into())
        );
    }

    #[test]
    fn fixed_bytes_truncated_to_size() {
        let mut word = B256::ZERO;
        word[0] = 0xab;
        word[1] = 0xcd;
        assert_eq!(
            normalize(DynSolValue::FixedBytes(word, 2)),
            FieldValue::FixedBytes(vec![0xab, 0xcd])
        );
    }

    #[test]
    fn nested_tuple() {
        let v = normalize(DynSolValue::Tuple(vec![
            DynSolValue::Bool(false),
            DynSolValue::Array(vec![DynSolValue::String("x".into())]),
        ]));
        assert_eq!(
            v,
            FieldValue::Tuple(vec![
                FieldValue::Bool(false),
                FieldValue::Array(vec![FieldValue::Str("x".into())]),
            ])
        );
    }
}
