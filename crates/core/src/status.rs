//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table (`asset_statuses`, `association_types`).

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $tag:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Stable upper-case tag, used in logs and diagnostics.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $tag ),+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(value: StatusId) -> Result<Self, Self::Error> {
                match value {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        "Unknown {} id {other}",
                        $label
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        // Serialized as the database id so API payloads match the row shape.
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i16(self.id())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let id = StatusId::deserialize(deserializer)?;
                $name::try_from(id).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_status_enum! {
    /// Operational status of a leasable asset (chip, router, equipment).
    AssetStatus ("asset status") {
        Available = 1 => "AVAILABLE",
        Rented = 2 => "RENTED",
        Subscribed = 3 => "SUBSCRIBED",
        NoData = 4 => "NO_DATA",
        Blocked = 5 => "BLOCKED",
        Maintenance = 6 => "MAINTENANCE",
    }
}

define_status_enum! {
    /// Kind of client/asset association.
    AssociationType ("association type") {
        Rental = 1 => "RENTAL",
        Subscription = 2 => "SUBSCRIPTION",
    }
}

impl AssociationType {
    /// Asset status an asset takes while an association of this type is active.
    ///
    /// Fixed table; there is no default for unknown types because unknown
    /// ids never make it past [`AssociationType::try_from`].
    pub fn leased_status(self) -> AssetStatus {
        match self {
            AssociationType::Rental => AssetStatus::Rented,
            AssociationType::Subscription => AssetStatus::Subscribed,
        }
    }
}

impl AssetStatus {
    /// Status an asset reverts to when its active association is closed.
    pub const RELEASED: AssetStatus = AssetStatus::Available;

    /// Whether the status is only legal while an association is active.
    pub fn is_leased(self) -> bool {
        matches!(self, AssetStatus::Rented | AssetStatus::Subscribed)
    }

    /// Whether a new association may be opened from this status.
    pub fn accepts_association(self) -> bool {
        matches!(self, AssetStatus::Available | AssetStatus::NoData)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn asset_status_ids_match_seed_data() {
        assert_eq!(AssetStatus::Available.id(), 1);
        assert_eq!(AssetStatus::Rented.id(), 2);
        assert_eq!(AssetStatus::Subscribed.id(), 3);
        assert_eq!(AssetStatus::NoData.id(), 4);
        assert_eq!(AssetStatus::Blocked.id(), 5);
        assert_eq!(AssetStatus::Maintenance.id(), 6);
    }

    #[test]
    fn association_type_ids_match_seed_data() {
        assert_eq!(AssociationType::Rental.id(), 1);
        assert_eq!(AssociationType::Subscription.id(), 2);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = AssetStatus::Rented.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn status_from_known_id() {
        assert_eq!(AssetStatus::try_from(6).unwrap(), AssetStatus::Maintenance);
        assert_eq!(
            AssociationType::try_from(2).unwrap(),
            AssociationType::Subscription
        );
    }

    #[test]
    fn unknown_association_type_is_validation_error() {
        assert_matches!(AssociationType::try_from(3), Err(CoreError::Validation(msg)) => {
            assert!(msg.contains("association type"));
        });
        assert!(AssetStatus::try_from(0).is_err());
    }

    #[test]
    fn leased_status_table() {
        assert_eq!(AssociationType::Rental.leased_status(), AssetStatus::Rented);
        assert_eq!(
            AssociationType::Subscription.leased_status(),
            AssetStatus::Subscribed
        );
        assert!(AssociationType::Rental.leased_status().is_leased());
    }

    #[test]
    fn blocked_and_maintenance_refuse_associations() {
        assert!(AssetStatus::Available.accepts_association());
        assert!(AssetStatus::NoData.accepts_association());
        assert!(!AssetStatus::Blocked.accepts_association());
        assert!(!AssetStatus::Maintenance.accepts_association());
        assert!(!AssetStatus::Rented.accepts_association());
    }

    #[test]
    fn serializes_as_database_id() {
        assert_eq!(serde_json::to_string(&AssetStatus::Subscribed).unwrap(), "3");
        let parsed: AssociationType = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, AssociationType::Rental);
        assert!(serde_json::from_str::<AssociationType>("9").is_err());
    }

    #[test]
    fn display_uses_tag() {
        assert_eq!(AssetStatus::NoData.to_string(), "NO_DATA");
        assert_eq!(AssociationType::Rental.to_string(), "RENTAL");
    }
}
