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

//! Enums serialize as their variant name.

use std::any::Any;
use std::marker::PhantomData;

use super::{ConvertContext, TypeConverter};
use crate::error::{Result, SaveError};
use crate::value::Value;

/// Enum with a fixed table of named variants.
///
/// Implement with [`save_enum!`](crate::save_enum).
pub trait SaveEnum: Copy + PartialEq + Send + Sync + 'static {
    /// Variants in declaration order
    const VARIANTS: &'static [(&'static str, Self)];

    fn variant_name(&self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(_, v)| v == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    /// Case-insensitive lookup. An empty name means the first variant.
    fn from_variant_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Self::VARIANTS.first().map(|(_, v)| *v);
        }
        Self::VARIANTS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

/// Implement [`SaveEnum`] for a fieldless enum.
///
/// ```
/// use archetype_save::save_enum;
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Difficulty { Easy, Normal, Hard }
///
/// save_enum!(Difficulty { Easy, Normal, Hard });
/// ```
#[macro_export]
macro_rules! save_enum {
    ($t:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::convert::SaveEnum for $t {
            const VARIANTS: &'static [(&'static str, Self)] = &[
                $((stringify!($variant), $t::$variant)),+
            ];
        }
    };
}

pub(crate) struct EnumConverter<T>(PhantomData<fn() -> T>);

impl<T> EnumConverter<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: SaveEnum> TypeConverter for EnumConverter<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn convert_from(&self, value: &dyn Any, _ctx: &ConvertContext<'_>) -> Result<Value> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| SaveError::UnsupportedType(self.type_name().to_owned()))?;
        Ok(Value::String(value.variant_name().to_owned()))
    }

    fn convert_to(&self, data: &Value, _ctx: &ConvertContext<'_>) -> Result<Box<dyn Any>> {
        let name = match data {
            Value::Null => String::new(),
            other => other.to_text().ok_or_else(|| SaveError::TypeMismatch {
                expected: self.type_name(),
                found: other.type_name(),
            })?,
        };
        let variant = T::from_variant_name(&name).ok_or_else(|| SaveError::InvalidEnum {
            enum_name: self.type_name(),
            value: name,
        })?;
        Ok(Box::new(variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRegistry;
    use crate::convert::ConverterRegistry;
    use crate::identity::IdentityTable;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Mode {
        Walk,
        Run,
        Fly,
    }

    crate::save_enum!(Mode { Walk, Run, Fly });

    #[test]
    fn test_names() {
        assert_eq!(Mode::Run.variant_name(), "Run");
        assert_eq!(Mode::from_variant_name("fly"), Some(Mode::Fly));
        assert_eq!(Mode::from_variant_name(""), Some(Mode::Walk));
        assert_eq!(Mode::from_variant_name("Swim"), None);
    }

    #[test]
    fn test_registry_round_trip() {
        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let mut registry = ConverterRegistry::new();
        assert!(registry.register_enum::<Mode>());

        let v = registry.convert_from(&Mode::Fly, &ctx).unwrap();
        assert_eq!(v, Value::String("Fly".into()));
        let back: Mode = registry.convert_to(&Value::String("RUN".into()), &ctx).unwrap();
        assert_eq!(back, Mode::Run);

        let err = registry
            .convert_to::<Mode>(&Value::String("Swim".into()), &ctx)
            .unwrap_err();
        assert!(matches!(err, SaveError::InvalidEnum { .. }));
    }
}
