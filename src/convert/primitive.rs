// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Converters for primitive types.
//!
//! Writing preserves the exact width. Reading is lenient so a value that
//! came back wider from the text codec (Int64 for an i32, Double for an f32)
//! still restores its field.

use super::{mismatch, ConvertContext, ValueConvert};
use crate::error::Result;
use crate::value::Value;

macro_rules! impl_primitive_convert {
    ($($t:ty => |$v:ident| $to:expr, $from:ident;)*) => {
        $(
            impl ValueConvert for $t {
                fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
                    let $v = self;
                    Ok($to)
                }

                fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
                    value.$from().ok_or_else(|| mismatch::<$t>(value))
                }
            }
        )*
    };
}

impl_primitive_convert! {
    bool => |v| Value::Bool(*v), to_bool;
    i32 => |v| Value::Int32(*v), to_i32;
    i64 => |v| Value::Int64(*v), to_i64;
    u8 => |v| Value::Int32(i32::from(*v)), to_u8;
    f32 => |v| Value::Float32(*v), to_f32;
    f64 => |v| Value::Float64(*v), to_f64;
    char => |v| Value::Char(*v), to_char;
    String => |v| Value::String(v.clone()), to_text;
}

impl ValueConvert for u32 {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(Value::Int64(i64::from(*self)))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        value
            .to_i64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| mismatch::<u32>(value))
    }
}

impl ValueConvert for Vec<u8> {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(Value::Bytes(self.clone()))
    }

    /// Accepts raw bytes, or the integer list the text codec writes bytes as
    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::List(items) => items
                .iter()
                .map(|item| item.to_u8().ok_or_else(|| mismatch::<u8>(item)))
                .collect(),
            other => Err(mismatch::<Vec<u8>>(other)),
        }
    }
}

impl ValueConvert for Value {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRegistry;
    use crate::error::SaveError;
    use crate::identity::IdentityTable;

    fn with_ctx(f: impl FnOnce(&ConvertContext<'_>)) {
        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        f(&ConvertContext::new(&ids, &assets));
    }

    #[test]
    fn test_exact_width_on_write() {
        with_ctx(|ctx| {
            assert_eq!(7i32.to_value(ctx).unwrap(), Value::Int32(7));
            assert_eq!(7i64.to_value(ctx).unwrap(), Value::Int64(7));
            assert_eq!(1.5f32.to_value(ctx).unwrap(), Value::Float32(1.5));
            assert_eq!(200u8.to_value(ctx).unwrap(), Value::Int32(200));
        });
    }

    #[test]
    fn test_lenient_read() {
        with_ctx(|ctx| {
            assert_eq!(i32::from_value(&Value::Int64(10), ctx).unwrap(), 10);
            assert_eq!(f32::from_value(&Value::Float64(0.25), ctx).unwrap(), 0.25);
            assert_eq!(f32::from_value(&Value::Int64(2), ctx).unwrap(), 2.0);
            assert!(bool::from_value(&Value::String("True".into()), ctx).unwrap());
            assert_eq!(char::from_value(&Value::String("q".into()), ctx).unwrap(), 'q');
        });
    }

    #[test]
    fn test_out_of_range_is_mismatch() {
        with_ctx(|ctx| {
            let err = i32::from_value(&Value::Int64(i64::MAX), ctx).unwrap_err();
            assert!(matches!(err, SaveError::TypeMismatch { found: "Int64", .. }));
            assert!(u8::from_value(&Value::Int32(-1), ctx).is_err());
            assert!(i32::from_value(&Value::Null, ctx).is_err());
        });
    }

    #[test]
    fn test_bytes_from_int_list() {
        with_ctx(|ctx| {
            let list = Value::List(vec![Value::Int64(1), Value::Int64(255)]);
            assert_eq!(Vec::<u8>::from_value(&list, ctx).unwrap(), vec![1, 255]);
            let bad = Value::List(vec![Value::Int64(256)]);
            assert!(Vec::<u8>::from_value(&bad, ctx).is_err());
        });
    }
}
